//! Knowledge edge types
//!
//! Edges are directed and append-only. Endpoints are plain node ids that are
//! never validated, so an edge may reference a node that does not exist.

use serde::{Deserialize, Serialize};

/// A typed, directed relationship between two node ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

impl KnowledgeEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type,
        }
    }

    /// Whether `id` is either endpoint
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// A stored edge
///
/// `id` is assigned by the store on insert. Two records with the same
/// `(source, target, type)` triple are still distinct records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: i64,
    #[serde(flatten)]
    pub edge: KnowledgeEdge,
}

/// Edge vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeType {
    /// Generic association
    RelatesTo,
    /// Source cannot proceed until target is resolved
    BlockedBy,
    /// Source is planned for the target meeting or date
    ScheduledFor,
    /// Sticky note promoted to a task card
    BecameTask,
    DependsOn,
    /// Person attended a meeting
    Attended,
    /// Decision taken in a meeting
    DecidedIn,
    Implements,
    /// Unrecognized type, stored as given
    Unknown(String),
}

impl EdgeType {
    /// Get the string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::RelatesTo => "RELATES_TO",
            Self::BlockedBy => "BLOCKED_BY",
            Self::ScheduledFor => "SCHEDULED_FOR",
            Self::BecameTask => "BECAME_TASK",
            Self::DependsOn => "DEPENDS_ON",
            Self::Attended => "ATTENDED",
            Self::DecidedIn => "DECIDED_IN",
            Self::Implements => "IMPLEMENTS",
            Self::Unknown(raw) => raw,
        }
    }

    /// Parse from string; accepts `RELATES_TO`, `relates_to` and `relates-to`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "RELATES_TO" => Self::RelatesTo,
            "BLOCKED_BY" => Self::BlockedBy,
            "SCHEDULED_FOR" => Self::ScheduledFor,
            "BECAME_TASK" => Self::BecameTask,
            "DEPENDS_ON" => Self::DependsOn,
            "ATTENDED" => Self::Attended,
            "DECIDED_IN" => Self::DecidedIn,
            "IMPLEMENTS" => Self::Implements,
            _ => Self::Unknown(s.trim().to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Get all known edge types
    pub fn all() -> &'static [EdgeType] {
        &[
            Self::RelatesTo,
            Self::BlockedBy,
            Self::ScheduledFor,
            Self::BecameTask,
            Self::DependsOn,
            Self::Attended,
            Self::DecidedIn,
            Self::Implements,
        ]
    }
}

impl From<String> for EdgeType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EdgeType> for String {
    fn from(t: EdgeType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
