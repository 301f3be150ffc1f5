//! Knowledge node types
//!
//! Nodes are the vertices of the knowledge graph. Their `id` is assigned by
//! the extractor (or the linker) and doubles as the idempotency key for upserts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A typed, content-bearing vertex in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Stable identifier, unique across the store
    pub id: String,
    /// Node classification
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Human-readable label or body
    #[serde(default)]
    pub content: String,
    /// Provenance and cross-reference fields (`source`, `eventId`, `syncedAt`, `originalSticky`, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl KnowledgeNode {
    /// Create a node with empty metadata
    pub fn new(id: impl Into<String>, node_type: NodeType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set a metadata entry, replacing any previous value for the key
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Read a metadata entry as a string
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn is_type(&self, node_type: &NodeType) -> bool {
        &self.node_type == node_type
    }
}

/// Node vocabulary
///
/// The set is open: anything the model invents that is not recognized is kept
/// verbatim in [`NodeType::Unknown`] so it round-trips through storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    /// A choice that was made
    Decision,
    /// Product capability
    Feature,
    /// Defect to fix
    Bug,
    /// Technology, library or technical term
    Tech,
    /// Scheduled gathering
    Meeting,
    Person,
    /// Whiteboard sticky note
    Sticky,
    /// Task-board card
    KanbanCard,
    /// Stated or implied objective
    Goal,
    Task,
    /// Unrecognized type, stored as given
    Unknown(String),
}

impl NodeType {
    /// Get the string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Decision => "Decision",
            Self::Feature => "Feature",
            Self::Bug => "Bug",
            Self::Tech => "Tech",
            Self::Meeting => "Meeting",
            Self::Person => "Person",
            Self::Sticky => "Sticky",
            Self::KanbanCard => "KanbanCard",
            Self::Goal => "Goal",
            Self::Task => "Task",
            Self::Unknown(raw) => raw,
        }
    }

    /// Parse from string, case-insensitive on the known names
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "decision" => Self::Decision,
            "feature" => Self::Feature,
            "bug" => Self::Bug,
            "tech" => Self::Tech,
            "meeting" => Self::Meeting,
            "person" => Self::Person,
            "sticky" => Self::Sticky,
            "kanbancard" | "kanban_card" => Self::KanbanCard,
            "goal" => Self::Goal,
            "task" => Self::Task,
            _ => Self::Unknown(s.trim().to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Get all known node types
    pub fn all() -> &'static [NodeType] {
        &[
            Self::Decision,
            Self::Feature,
            Self::Bug,
            Self::Tech,
            Self::Meeting,
            Self::Person,
            Self::Sticky,
            Self::KanbanCard,
            Self::Goal,
            Self::Task,
        ]
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
