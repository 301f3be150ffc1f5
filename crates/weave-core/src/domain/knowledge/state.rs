//! Per-request extraction state
//!
//! Built for a single request and dropped after the response is produced.
//! The persisted store is the system of record; this is only the hand-off
//! between extraction, traversal and linking.

use serde::{Deserialize, Serialize};

use super::edge::KnowledgeEdge;
use super::node::KnowledgeNode;

/// Sentinel intent value asking the traversal engine to start from the
/// freshest extracted node
pub const SEARCH_INTENT: &str = "search";

/// Origin of an input event; selects the extraction policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Chat,
    Calendar,
    Whiteboard,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Calendar => "calendar",
            Self::Whiteboard => "whiteboard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Some(Self::Chat),
            "calendar" => Some(Self::Calendar),
            "whiteboard" => Some(Self::Whiteboard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One role-tagged turn of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Speaker role (`user`, `assistant`, `system`)
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub provenance: Provenance,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            provenance,
        }
    }

    /// A human chat turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content, Provenance::Chat)
    }

    /// A system-generated calendar event turn
    pub fn calendar(content: impl Into<String>) -> Self {
        Self::new("system", content, Provenance::Calendar)
    }

    /// A system-generated whiteboard turn
    pub fn whiteboard(content: impl Into<String>) -> Self {
        Self::new("system", content, Provenance::Whiteboard)
    }
}

/// Traversal query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    /// Start from the first freshly extracted node
    Search,
    /// Start from a concrete node id
    Node(String),
}

impl Intent {
    pub fn parse(s: &str) -> Self {
        if s == SEARCH_INTENT {
            Self::Search
        } else {
            Self::Node(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Search => SEARCH_INTENT,
            Self::Node(id) => id,
        }
    }
}

impl From<String> for Intent {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.as_str().to_string()
    }
}

/// Output of every extraction and linking operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBatch {
    #[serde(default)]
    pub knowledge_nodes: Vec<KnowledgeNode>,
    #[serde(default)]
    pub knowledge_edges: Vec<KnowledgeEdge>,
}

impl KnowledgeBatch {
    pub fn new(knowledge_nodes: Vec<KnowledgeNode>, knowledge_edges: Vec<KnowledgeEdge>) -> Self {
        Self {
            knowledge_nodes,
            knowledge_edges,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.knowledge_nodes.is_empty() && self.knowledge_edges.is_empty()
    }
}

/// A connected subgraph returned by traversal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}

impl Subgraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

/// Response envelope of `retrieve_subgraph`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub search_results: Subgraph,
}

/// Ephemeral state threaded through one request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionState {
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    /// Most recent extraction or linking batch
    #[serde(default)]
    pub knowledge_nodes: Vec<KnowledgeNode>,
    #[serde(default)]
    pub knowledge_edges: Vec<KnowledgeEdge>,
    #[serde(default)]
    pub intent: Option<Intent>,
    /// Most recent traversal result
    #[serde(default)]
    pub search_results: Option<Subgraph>,
}

impl ExtractionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding a single message
    pub fn from_message(message: ConversationMessage) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<KnowledgeNode>) -> Self {
        self.knowledge_nodes = nodes;
        self
    }

    pub fn push_message(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn latest_message(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Replace the current batch with `batch`
    pub fn apply_batch(&mut self, batch: &KnowledgeBatch) {
        self.knowledge_nodes = batch.knowledge_nodes.clone();
        self.knowledge_edges = batch.knowledge_edges.clone();
    }

    pub fn apply_search_results(&mut self, results: Subgraph) {
        self.search_results = Some(results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::{EdgeType, NodeType};

    #[test]
    fn test_intent_parsing() {
        assert_eq!(Intent::parse("search"), Intent::Search);
        assert_eq!(Intent::parse("bug-login"), Intent::Node("bug-login".into()));
        assert_eq!(Intent::parse("Search"), Intent::Node("Search".into()));
        assert_eq!(Intent::Search.as_str(), "search");
    }

    #[test]
    fn test_provenance_parsing() {
        assert_eq!(Provenance::parse("Calendar"), Some(Provenance::Calendar));
        assert_eq!(Provenance::parse("email"), None);
        assert_eq!(Provenance::default(), Provenance::Chat);
    }

    #[test]
    fn test_latest_message() {
        let mut state = ExtractionState::new();
        assert!(state.latest_message().is_none());

        state.push_message(ConversationMessage::user("first"));
        state.push_message(ConversationMessage::calendar("second"));

        let latest = state.latest_message().unwrap();
        assert_eq!(latest.content, "second");
        assert_eq!(latest.provenance, Provenance::Calendar);
    }

    #[test]
    fn test_apply_batch_replaces_previous() {
        let mut state = ExtractionState::new()
            .with_nodes(vec![KnowledgeNode::new("old", NodeType::Tech, "old")]);

        let batch = KnowledgeBatch::new(
            vec![KnowledgeNode::new("bug-login", NodeType::Bug, "Login bug")],
            vec![KnowledgeEdge::new("bug-login", "meeting-tomorrow", EdgeType::ScheduledFor)],
        );
        state.apply_batch(&batch);

        assert_eq!(state.knowledge_nodes.len(), 1);
        assert_eq!(state.knowledge_nodes[0].id, "bug-login");
        assert_eq!(state.knowledge_edges.len(), 1);
    }

    #[test]
    fn test_batch_json_is_camel_case() {
        let json = serde_json::to_value(KnowledgeBatch::empty()).unwrap();
        assert!(json.get("knowledgeNodes").is_some());
        assert!(json.get("knowledgeEdges").is_some());

        let results = serde_json::to_value(SearchResults::default()).unwrap();
        assert!(results["searchResults"]["nodes"].is_array());
    }

    #[test]
    fn test_state_deserializes_intent_sentinel() {
        let state: ExtractionState =
            serde_json::from_str(r#"{"messages": [], "intent": "search"}"#).unwrap();
        assert_eq!(state.intent, Some(Intent::Search));
    }
}
