//! Structured extraction of knowledge from provenance text
//!
//! The extractor turns one message into a candidate [`KnowledgeBatch`]. Model
//! output is untrusted: it is parsed as an untyped JSON envelope and each
//! entry is validated on its own, so one bad entry never costs the batch.
//! Extraction never fails. Model-service errors and malformed output both
//! degrade to an empty batch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::llm::CompletionService;

use super::edge::{EdgeType, KnowledgeEdge};
use super::input::{block_field, block_tail};
use super::node::{KnowledgeNode, NodeType};
use super::prompts;
use super::state::{KnowledgeBatch, Provenance};

/// Metadata keys stamped on extracted nodes
pub const META_SOURCE: &str = "source";
pub const META_EVENT_ID: &str = "eventId";
pub const META_SYNCED_AT: &str = "syncedAt";
pub const META_STICKY_ID: &str = "stickyId";

/// LLM-backed extractor
#[derive(Clone)]
pub struct StructuredExtractor {
    service: Arc<dyn CompletionService>,
}

impl std::fmt::Debug for StructuredExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredExtractor")
            .field("service", &self.service.name())
            .finish()
    }
}

impl StructuredExtractor {
    /// Create a new extractor around an injected completion service
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Extract a candidate batch from one message
    ///
    /// Any failure is logged and turned into an empty batch.
    pub async fn extract(&self, message: &str, provenance: Provenance) -> KnowledgeBatch {
        let batch = match self.try_extract(message, provenance).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    provenance = %provenance,
                    service = self.service.name(),
                    code = e.code(),
                    error = %e,
                    "Extraction yields no knowledge"
                );
                KnowledgeBatch::empty()
            }
        };

        info!(
            provenance = %provenance,
            node_count = batch.knowledge_nodes.len(),
            edge_count = batch.knowledge_edges.len(),
            "Extraction finished"
        );

        batch
    }

    /// Extract a candidate batch, surfacing why nothing was produced
    pub async fn try_extract(&self, message: &str, provenance: Provenance) -> Result<KnowledgeBatch> {
        match provenance {
            Provenance::Chat => self.extract_chat(message).await,
            Provenance::Calendar => self.extract_calendar(message).await,
            Provenance::Whiteboard => extract_sticky(message),
        }
    }

    async fn extract_chat(&self, message: &str) -> Result<KnowledgeBatch> {
        let mut batch = self
            .complete_and_parse(&prompts::chat_instructions(), message)
            .await?;

        for node in &mut batch.knowledge_nodes {
            node.metadata
                .entry(META_SOURCE.to_string())
                .or_insert_with(|| Value::from(Provenance::Chat.as_str()));
        }
        Ok(batch)
    }

    async fn extract_calendar(&self, message: &str) -> Result<KnowledgeBatch> {
        let event_id = block_field(message, "EVENT_ID").ok_or_else(|| {
            Error::ExtractionFailed("calendar message has no EVENT_ID line".to_string())
        })?;
        let title = block_field(message, "TITLE").unwrap_or(event_id);

        let batch = self
            .complete_and_parse(&prompts::calendar_instructions(), message)
            .await?;
        Ok(enforce_calendar_constraints(batch, event_id, title))
    }

    async fn complete_and_parse(&self, instructions: &str, message: &str) -> Result<KnowledgeBatch> {
        let response = self
            .service
            .complete(instructions, &prompts::extraction_prompt(message))
            .await?;
        parse_completion(&response)
    }
}

/// Parse raw model text into a validated batch
///
/// Fails only when the envelope itself is unusable. Invalid entries inside a
/// usable envelope are dropped.
pub fn parse_completion(response: &str) -> Result<KnowledgeBatch> {
    let json_str = extract_json_from_response(response);
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| Error::MalformedOutput(format!("Invalid JSON: {}", e)))?;

    let Value::Object(envelope) = value else {
        return Err(Error::MalformedOutput(
            "Top-level value is not an object".to_string(),
        ));
    };

    let nodes = entries(&envelope, "nodes")?
        .iter()
        .filter_map(|entry| {
            let node = node_from_value(entry);
            if node.is_none() {
                debug!(entry = %entry, "Dropping invalid node entry");
            }
            node
        })
        .collect();

    let edges = entries(&envelope, "edges")?
        .iter()
        .filter_map(|entry| {
            let edge = edge_from_value(entry);
            if edge.is_none() {
                debug!(entry = %entry, "Dropping invalid edge entry");
            }
            edge
        })
        .collect();

    Ok(KnowledgeBatch::new(collapse_duplicate_ids(nodes), edges))
}

fn entries<'a>(envelope: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a [Value]> {
    match envelope.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::MalformedOutput(format!("`{}` is not an array", key))),
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn node_from_value(value: &Value) -> Option<KnowledgeNode> {
    let id = non_empty_str(value, "id")?;
    let node_type = NodeType::parse(non_empty_str(value, "type")?);

    let content = match (value.get("content"), value.get("label")) {
        (Some(Value::String(content)), _) => content.clone(),
        (None | Some(Value::Null), Some(Value::String(label))) => label.clone(),
        (None | Some(Value::Null), None | Some(Value::Null)) => String::new(),
        _ => return None,
    };

    let mut node = KnowledgeNode::new(id, node_type, content);
    match value.get("metadata") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            node.metadata = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        }
        Some(_) => return None,
    }
    Some(node)
}

fn edge_from_value(value: &Value) -> Option<KnowledgeEdge> {
    Some(KnowledgeEdge::new(
        non_empty_str(value, "source")?,
        non_empty_str(value, "target")?,
        EdgeType::parse(non_empty_str(value, "type")?),
    ))
}

/// Keep one node per id: the last occurrence, at the first position
fn collapse_duplicate_ids(nodes: Vec<KnowledgeNode>) -> Vec<KnowledgeNode> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut collapsed: Vec<KnowledgeNode> = Vec::with_capacity(nodes.len());

    for node in nodes {
        match positions.get(&node.id) {
            Some(&idx) => collapsed[idx] = node,
            None => {
                positions.insert(node.id.clone(), collapsed.len());
                collapsed.push(node);
            }
        }
    }
    collapsed
}

/// Apply the calendar hard constraints to a parsed batch
///
/// Exactly one `Meeting` node with id `meeting-<eventId>` survives, placed
/// first. Edges pointing at renamed or folded meetings are rewritten, and
/// every node is stamped with calendar provenance.
pub fn enforce_calendar_constraints(batch: KnowledgeBatch, event_id: &str, title: &str) -> KnowledgeBatch {
    let meeting_id = format!("meeting-{}", event_id);
    let synced_at = Utc::now().to_rfc3339();

    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut meeting: Option<KnowledgeNode> = None;
    let mut others = Vec::with_capacity(batch.knowledge_nodes.len());

    for node in batch.knowledge_nodes {
        if node.node_type == NodeType::Meeting || node.id == meeting_id {
            renamed.insert(node.id.clone(), meeting_id.clone());
            if meeting.is_none() {
                let mut canonical = node;
                canonical.id = meeting_id.clone();
                canonical.node_type = NodeType::Meeting;
                if canonical.content.trim().is_empty() {
                    canonical.content = title.to_string();
                }
                meeting = Some(canonical);
            } else {
                debug!(folded = %node.id, meeting_id = %meeting_id, "Folding extra meeting node");
            }
        } else {
            others.push(node);
        }
    }

    let meeting = meeting.unwrap_or_else(|| KnowledgeNode::new(&meeting_id, NodeType::Meeting, title));

    let mut nodes = Vec::with_capacity(others.len() + 1);
    nodes.push(meeting);
    nodes.extend(others);
    for node in &mut nodes {
        node.metadata
            .insert(META_SOURCE.to_string(), Value::from(Provenance::Calendar.as_str()));
        node.metadata
            .insert(META_EVENT_ID.to_string(), Value::from(event_id));
        node.metadata
            .insert(META_SYNCED_AT.to_string(), Value::from(synced_at.as_str()));
    }

    let edges = batch
        .knowledge_edges
        .into_iter()
        .map(|mut edge| {
            if let Some(id) = renamed.get(&edge.source) {
                edge.source = id.clone();
            }
            if let Some(id) = renamed.get(&edge.target) {
                edge.target = id.clone();
            }
            edge
        })
        .collect();

    KnowledgeBatch::new(nodes, edges)
}

/// Build the sticky node for a whiteboard block without calling the model
fn extract_sticky(message: &str) -> Result<KnowledgeBatch> {
    let sticky_id = block_field(message, "STICKY_ID").ok_or_else(|| {
        Error::ExtractionFailed("whiteboard message has no STICKY_ID line".to_string())
    })?;
    let text = block_tail(message, "TEXT").unwrap_or_default();

    let node = KnowledgeNode::new(format!("sticky-{}", sticky_id), NodeType::Sticky, text)
        .with_metadata(META_SOURCE, Provenance::Whiteboard.as_str())
        .with_metadata(META_STICKY_ID, sticky_id);

    Ok(KnowledgeBatch::new(vec![node], Vec::new()))
}

/// Extract JSON from a response that might contain markdown or other text
fn extract_json_from_response(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                return response[json_start..json_start + end].trim().to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}'))
        && start < end
    {
        return response[start..=end].to_string();
    }

    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::{CalendarEventInput, StickyNoteInput};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Completion stub returning a canned answer and recording prompts
    struct ScriptedCompletion {
        reply: std::result::Result<String, String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedCompletion {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            self.reply.clone().map_err(Error::LLMError)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_chat_example_scenario() {
        let stub = ScriptedCompletion::replying(prompts::CHAT_PROMPT_EXAMPLE_OUTPUT);
        let extractor = StructuredExtractor::new(stub.clone());

        let batch = extractor
            .extract(prompts::CHAT_PROMPT_EXAMPLE_INPUT, Provenance::Chat)
            .await;

        assert_eq!(batch.knowledge_nodes.len(), 2);
        assert_eq!(batch.knowledge_nodes[0].id, "bug-login");
        assert_eq!(batch.knowledge_nodes[0].node_type, NodeType::Bug);
        assert_eq!(batch.knowledge_nodes[1].id, "meeting-tomorrow");
        assert_eq!(batch.knowledge_nodes[1].node_type, NodeType::Meeting);
        assert_eq!(
            batch.knowledge_edges,
            vec![KnowledgeEdge::new(
                "bug-login",
                "meeting-tomorrow",
                EdgeType::ScheduledFor
            )]
        );
        assert_eq!(batch.knowledge_nodes[0].metadata_str(META_SOURCE), Some("chat"));

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("technical term"));
        assert!(calls[0].1.contains(prompts::CHAT_PROMPT_EXAMPLE_INPUT));
    }

    #[tokio::test]
    async fn test_malformed_output_yields_empty_batch() {
        for reply in ["not json at all", "{\"nodes\": [", "[1, 2, 3]", "{\"nodes\": 5}"] {
            let extractor = StructuredExtractor::new(ScriptedCompletion::replying(reply));
            let batch = extractor.extract("anything", Provenance::Chat).await;
            assert!(batch.is_empty(), "reply {:?} should yield an empty batch", reply);
        }
    }

    #[tokio::test]
    async fn test_service_failure_yields_empty_batch() {
        let stub = ScriptedCompletion::failing("quota exceeded");
        let extractor = StructuredExtractor::new(stub.clone());

        let batch = extractor.extract("We use Postgres", Provenance::Chat).await;
        assert!(batch.is_empty());
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_calendar_determinism() {
        let reply = r#"```json
        {"nodes": [
            {"id": "sync-meeting", "type": "Meeting", "content": "Weekly sync"},
            {"id": "person-alice", "type": "Person", "content": "alice"}
         ],
         "edges": [{"source": "person-alice", "target": "sync-meeting", "type": "ATTENDED"}]}
        ```"#;
        let extractor = StructuredExtractor::new(ScriptedCompletion::replying(reply));
        let event = CalendarEventInput::new("evt-42", "Weekly sync")
            .with_participants(vec!["alice".into()]);

        let batch = extractor
            .extract(&event.to_block(), Provenance::Calendar)
            .await;

        assert_eq!(batch.knowledge_nodes.len(), 2);
        let meeting = &batch.knowledge_nodes[0];
        assert_eq!(meeting.id, "meeting-evt-42");
        assert_eq!(meeting.node_type, NodeType::Meeting);
        for node in &batch.knowledge_nodes {
            assert_eq!(node.metadata_str(META_SOURCE), Some("calendar"));
            assert_eq!(node.metadata_str(META_EVENT_ID), Some("evt-42"));
            assert!(node.metadata_str(META_SYNCED_AT).is_some());
        }
        assert_eq!(batch.knowledge_edges[0].target, "meeting-evt-42");
    }

    #[tokio::test]
    async fn test_calendar_synthesizes_missing_meeting() {
        let extractor = StructuredExtractor::new(ScriptedCompletion::replying(
            r#"{"nodes": [], "edges": []}"#,
        ));
        let event = CalendarEventInput::new("evt-7", "Retro");

        let batch = extractor
            .extract(&event.to_block(), Provenance::Calendar)
            .await;

        assert_eq!(batch.knowledge_nodes.len(), 1);
        assert_eq!(batch.knowledge_nodes[0].id, "meeting-evt-7");
        assert_eq!(batch.knowledge_nodes[0].content, "Retro");
    }

    #[tokio::test]
    async fn test_calendar_without_event_id_skips_model() {
        let stub = ScriptedCompletion::replying(prompts::CHAT_PROMPT_EXAMPLE_OUTPUT);
        let extractor = StructuredExtractor::new(stub.clone());

        let batch = extractor
            .extract("SOURCE: CALENDAR\nTITLE: No id", Provenance::Calendar)
            .await;

        assert!(batch.is_empty());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_try_extract_surfaces_errors() {
        let extractor = StructuredExtractor::new(ScriptedCompletion::replying("no json"));
        let err = extractor
            .try_extract("hello", Provenance::Chat)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));

        let err = extractor
            .try_extract("SOURCE: WHITEBOARD\nTEXT: orphan", Provenance::Whiteboard)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));

        let extractor = StructuredExtractor::new(ScriptedCompletion::failing("down"));
        let err = extractor
            .try_extract("hello", Provenance::Chat)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LLMError(_)));
    }

    #[tokio::test]
    async fn test_whiteboard_builds_sticky_without_model() {
        let stub = ScriptedCompletion::failing("must not be called");
        let extractor = StructuredExtractor::new(stub.clone());
        let sticky = StickyNoteInput::new("s1", "Add dark mode");

        let batch = extractor
            .extract(&sticky.to_block(), Provenance::Whiteboard)
            .await;

        assert_eq!(stub.call_count(), 0);
        assert_eq!(batch.knowledge_nodes.len(), 1);
        let node = &batch.knowledge_nodes[0];
        assert_eq!(node.id, "sticky-s1");
        assert_eq!(node.node_type, NodeType::Sticky);
        assert_eq!(node.content, "Add dark mode");
        assert_eq!(node.metadata_str(META_SOURCE), Some("whiteboard"));
        assert_eq!(node.metadata_str(META_STICKY_ID), Some("s1"));
    }

    #[test]
    fn test_invalid_entries_are_dropped_individually() {
        let batch = parse_completion(
            r#"{
                "nodes": [
                    {"id": "tech-rust", "type": "Tech", "content": "Rust"},
                    {"id": "", "type": "Tech", "content": "empty id"},
                    {"type": "Bug", "content": "no id"},
                    {"id": "goal-ship", "type": "Goal", "label": "Ship v2"},
                    {"id": "bad-meta", "type": "Tech", "content": "x", "metadata": [1]},
                    "just a string"
                ],
                "edges": [
                    {"source": "tech-rust", "target": "goal-ship", "type": "IMPLEMENTS"},
                    {"source": "tech-rust", "type": "RELATES_TO"},
                    {"source": "a", "target": "b", "type": 3}
                ]
            }"#,
        )
        .unwrap();

        let ids: Vec<&str> = batch.knowledge_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["tech-rust", "goal-ship"]);
        assert_eq!(batch.knowledge_nodes[1].content, "Ship v2");
        assert_eq!(batch.knowledge_edges.len(), 1);
    }

    #[test]
    fn test_missing_content_defaults_to_empty() {
        let batch = parse_completion(
            r#"{"nodes": [
                {"id": "tech-rust", "type": "Tech"},
                {"id": "tech-go", "type": "Tech", "content": null},
                {"id": "tech-zig", "type": "Tech", "content": 7}
            ]}"#,
        )
        .unwrap();

        let ids: Vec<&str> = batch.knowledge_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["tech-rust", "tech-go"]);
        assert!(batch.knowledge_nodes.iter().all(|n| n.content.is_empty()));
    }

    #[test]
    fn test_duplicate_ids_collapse_to_last() {
        let batch = parse_completion(
            r#"{"nodes": [
                {"id": "tech-db", "type": "Tech", "content": "first"},
                {"id": "goal-x", "type": "Goal", "content": "goal"},
                {"id": "tech-db", "type": "Tech", "content": "second"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(batch.knowledge_nodes.len(), 2);
        assert_eq!(batch.knowledge_nodes[0].content, "second");
        assert!(batch.knowledge_edges.is_empty());
    }

    #[test]
    fn test_unknown_types_are_kept() {
        let batch = parse_completion(
            r#"{"nodes": [{"id": "epic-1", "type": "Epic", "content": "Big"}],
                "edges": [{"source": "epic-1", "target": "x", "type": "MENTIONS"}]}"#,
        )
        .unwrap();

        assert_eq!(
            batch.knowledge_nodes[0].node_type,
            NodeType::Unknown("Epic".into())
        );
        assert_eq!(
            batch.knowledge_edges[0].edge_type,
            EdgeType::Unknown("MENTIONS".into())
        );
    }

    #[test]
    fn test_enforce_calendar_folds_extra_meetings() {
        let batch = KnowledgeBatch::new(
            vec![
                KnowledgeNode::new("decision-ship", NodeType::Decision, "Ship Friday"),
                KnowledgeNode::new("m1", NodeType::Meeting, "Planning"),
                KnowledgeNode::new("m2", NodeType::Meeting, "Planning again"),
            ],
            vec![
                KnowledgeEdge::new("decision-ship", "m2", EdgeType::DecidedIn),
                KnowledgeEdge::new("m1", "m2", EdgeType::RelatesTo),
            ],
        );

        let batch = enforce_calendar_constraints(batch, "evt-9", "Planning");

        let meetings: Vec<_> = batch
            .knowledge_nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Meeting)
            .collect();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].id, "meeting-evt-9");
        assert_eq!(meetings[0].content, "Planning");
        assert_eq!(batch.knowledge_nodes.len(), 2);
        assert_eq!(batch.knowledge_edges[0].target, "meeting-evt-9");
        assert_eq!(batch.knowledge_edges[1].source, "meeting-evt-9");
        assert_eq!(batch.knowledge_edges[1].target, "meeting-evt-9");
    }

    #[test]
    fn test_extract_json_from_response() {
        let response = "Here's the graph:\n```json\n{\"nodes\": []}\n```";
        assert_eq!(extract_json_from_response(response), "{\"nodes\": []}");

        let response = "```\n{\"edges\": []}\n```";
        assert_eq!(extract_json_from_response(response), "{\"edges\": []}");

        let response = "The result is {\"nodes\": []} as shown.";
        assert_eq!(extract_json_from_response(response), "{\"nodes\": []}");
    }
}
