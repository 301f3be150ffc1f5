//! Knowledge extraction and graph retrieval
//!
//! Turns chat messages, calendar events and whiteboard stickies into a typed
//! knowledge graph, persists it idempotently by node id, and answers
//! subgraph queries by bounded traversal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Extraction                               │
//! │  Message → ExtractionOrchestrator → StructuredExtractor → Batch │
//! │                                  ↓                              │
//! │                     persist_batch → GraphStore                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Retrieval                                │
//! │  Intent → TraversalEngine → seed edges + forward chase → Subgraph│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Model
//!
//! - **KnowledgeNode**: a typed vertex; `id` is the upsert key
//! - **KnowledgeEdge**: a typed, directed, append-only relationship
//! - **ExtractionState**: per-request hand-off between the stages
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weave_core::domain::knowledge::{ConversationMessage, ExtractionState, Intent, KnowledgePipeline};
//!
//! let pipeline = KnowledgePipeline::new(llm, store);
//!
//! let state = ExtractionState::from_message(ConversationMessage::user("We need to fix the login bug"));
//! let batch = pipeline.extract_from_chat(&state).await?;
//!
//! let query = ExtractionState::new().with_intent(Intent::Node("bug-login".into()));
//! let results = pipeline.retrieve_subgraph(&query).await?;
//! ```

mod edge;
mod extractor;
mod input;
mod linker;
mod node;
mod orchestrator;
mod persistence;
pub mod prompts;
mod repository;
mod service;
mod state;
mod traversal;

pub use edge::{EdgeRecord, EdgeType, KnowledgeEdge};
pub use extractor::{
    META_EVENT_ID, META_SOURCE, META_STICKY_ID, META_SYNCED_AT, StructuredExtractor,
    enforce_calendar_constraints, parse_completion,
};
pub use input::{CalendarEventInput, StickyNoteInput, block_field, block_tail};
pub use linker::{META_ORIGINAL_STICKY, StickyTaskLinker, cards_for_stickies};
pub use node::{KnowledgeNode, NodeType};
pub use orchestrator::{ExtractionOrchestrator, ExtractionPhase, OrchestratedExtraction};
pub use persistence::persist_batch;
pub use repository::{GraphStats, GraphStore, TraversedEdge};
pub use service::KnowledgePipeline;
pub use state::{
    ConversationMessage, ExtractionState, Intent, KnowledgeBatch, Provenance, SEARCH_INTENT,
    SearchResults, Subgraph,
};
pub use traversal::{DEFAULT_FORWARD_DEPTH, TraversalEngine};
