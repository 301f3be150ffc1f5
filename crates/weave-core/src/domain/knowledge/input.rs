//! Pre-formatted event blocks
//!
//! Calendar events and whiteboard stickies reach the extractor as plain-text
//! messages of `KEY: value` lines, headed by a `SOURCE:` line.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::state::ConversationMessage;

pub const CALENDAR_SOURCE_LINE: &str = "SOURCE: CALENDAR";
pub const WHITEBOARD_SOURCE_LINE: &str = "SOURCE: WHITEBOARD";

/// A calendar event as supplied by the calendar adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl CalendarEventInput {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_participants(mut self, participants: Vec<String>) -> Self {
        self.participants = participants;
        self
    }

    /// Reject events the extractor could not key a meeting on
    pub fn validate(&self) -> Result<()> {
        if !is_single_line_value(&self.id) {
            return Err(Error::InvalidInput(
                "calendar event id must be a non-empty single line".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("calendar event title is empty".to_string()));
        }
        Ok(())
    }

    /// Render the canonical calendar block
    ///
    /// `DESCRIPTION` is always last so it may span several lines.
    pub fn to_block(&self) -> String {
        format!(
            "{source}\nEVENT_ID: {id}\nTITLE: {title}\nSTART: {start}\nEND: {end}\nPARTICIPANTS: {participants}\nDESCRIPTION: {description}",
            source = CALENDAR_SOURCE_LINE,
            id = self.id,
            title = self.title,
            start = self.start.as_deref().unwrap_or(""),
            end = self.end.as_deref().unwrap_or(""),
            participants = self.participants.join(", "),
            description = self.description.as_deref().unwrap_or(""),
        )
    }

    pub fn to_message(&self) -> ConversationMessage {
        ConversationMessage::calendar(self.to_block())
    }
}

/// A whiteboard sticky note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNoteInput {
    pub id: String,
    pub text: String,
}

impl StickyNoteInput {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_single_line_value(&self.id) {
            return Err(Error::InvalidInput(
                "sticky id must be a non-empty single line".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_block(&self) -> String {
        format!(
            "{}\nSTICKY_ID: {}\nTEXT: {}",
            WHITEBOARD_SOURCE_LINE, self.id, self.text
        )
    }

    pub fn to_message(&self) -> ConversationMessage {
        ConversationMessage::whiteboard(self.to_block())
    }
}

fn is_single_line_value(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains('\n')
}

/// Value of the first `KEY: value` line, if that value is non-empty
pub fn block_field<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    let value = block
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(key)?.strip_prefix(':'))?
        .trim();
    (!value.is_empty()).then_some(value)
}

/// Value of a field plus every line after it
pub fn block_tail(block: &str, key: &str) -> Option<String> {
    let mut lines = block.lines();
    let first = lines.find_map(|line| {
        line.trim_start()
            .strip_prefix(key)?
            .strip_prefix(':')
            .map(str::trim)
    })?;

    let rest: Vec<&str> = lines.collect();
    let text = if rest.is_empty() {
        first.to_string()
    } else {
        format!("{}\n{}", first, rest.join("\n"))
    };

    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}
