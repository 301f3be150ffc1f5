//! Weave Core Library
//!
//! This crate provides the knowledge extraction and graph retrieval pipeline:
//! - Schema types for knowledge nodes, edges and per-request state
//! - Structured extraction through an injected LLM completion service
//! - Idempotent persistence to SQLite or in-memory graph stores
//! - Bounded subgraph traversal
//! - Sticky-note to task-card linking

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::knowledge::{
        CalendarEventInput, ConversationMessage, EdgeType, ExtractionState, GraphStore, Intent,
        KnowledgeBatch, KnowledgeEdge, KnowledgeNode, KnowledgePipeline, NodeType, Provenance,
        SearchResults, StickyNoteInput, Subgraph,
    };
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::knowledge::{InMemoryGraphStore, SqliteGraphStore};
    pub use crate::llm::{CompletionService, LlmClient};
    pub use crate::storage::Database;
}
