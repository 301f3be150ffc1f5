//! Instruction sets for structured extraction
//!
//! Chat and calendar extraction ask different things of the model: chat is
//! generous (every technical term and implied goal becomes a node), calendar
//! is literal (only what the event text states). Keep the two sets distinct.

/// Worked example input embedded in the chat instructions
pub const CHAT_PROMPT_EXAMPLE_INPUT: &str = "We need to fix the login bug by tomorrow's meeting.";

/// Worked example output embedded in the chat instructions
pub const CHAT_PROMPT_EXAMPLE_OUTPUT: &str = r#"{
  "nodes": [
    {"id": "bug-login", "type": "Bug", "content": "Fix the login bug"},
    {"id": "meeting-tomorrow", "type": "Meeting", "content": "Tomorrow's meeting"}
  ],
  "edges": [
    {"source": "bug-login", "target": "meeting-tomorrow", "type": "SCHEDULED_FOR"}
  ]
}"#;

const CHAT_RULES: &str = r#"You extract a knowledge graph from team chat messages.

Allowed node types: Decision, Feature, Bug, Tech, Meeting, Person, Goal, Task.
Allowed edge types: RELATES_TO, BLOCKED_BY, SCHEDULED_FOR, DEPENDS_ON, IMPLEMENTS, DECIDED_IN.

Rules:
1. Create a node for every technical term, tool or library that is mentioned.
2. Create a Goal node for any goal the message states or implies.
3. Node ids are short, lowercase and hyphenated, prefixed by the type (e.g. "bug-login", "tech-postgres").
4. Reuse the same id for the same thing so repeated mentions update one node.
5. Only connect nodes that appear in your own "nodes" list.

Return JSON only, with no prose and no code fences, shaped as:
{"nodes": [{"id": "...", "type": "...", "content": "..."}], "edges": [{"source": "...", "target": "...", "type": "..."}]}"#;

const CALENDAR_RULES: &str = r#"You extract a knowledge graph from a calendar event.

The event arrives as lines of the form KEY: value (SOURCE, EVENT_ID, TITLE, START, END, PARTICIPANTS, DESCRIPTION).

Hard constraints:
1. Emit exactly one Meeting node. Its id must be "meeting-" followed by the EVENT_ID value, verbatim. Its content is the TITLE.
2. Emit a Person node for each name listed in PARTICIPANTS, with an ATTENDED edge from the person to the meeting.
3. Emit a Decision node only where the DESCRIPTION contains an explicit "DECISION:" marker, with a DECIDED_IN edge to the meeting.
4. Emit a Feature node only where the DESCRIPTION explicitly names a feature, with a RELATES_TO edge to the meeting.
5. Do not infer anything beyond the literal text. Do not guess assignees, owners or deadlines.
6. Every node must carry metadata {"source": "calendar", "eventId": "<EVENT_ID>"}.

Allowed node types: Meeting, Person, Decision, Feature.
Allowed edge types: ATTENDED, DECIDED_IN, RELATES_TO.

Return JSON only, with no prose and no code fences, shaped as:
{"nodes": [{"id": "...", "type": "...", "content": "...", "metadata": {}}], "edges": [{"source": "...", "target": "...", "type": "..."}]}"#;

/// System instruction for chat provenance
pub fn chat_instructions() -> String {
    format!(
        "{}\n\nExample input:\n{}\n\nExample output:\n{}",
        CHAT_RULES, CHAT_PROMPT_EXAMPLE_INPUT, CHAT_PROMPT_EXAMPLE_OUTPUT
    )
}

/// System instruction for calendar provenance
pub fn calendar_instructions() -> String {
    CALENDAR_RULES.to_string()
}

/// User prompt wrapping the message under extraction
pub fn extraction_prompt(message: &str) -> String {
    format!("Extract the knowledge graph from this input:\n\n{}", message)
}
