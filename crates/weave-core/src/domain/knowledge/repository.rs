//! Store trait for knowledge graph persistence
//!
//! Two logical collections: nodes keyed by `id` (upsert) and edges (append).
//! The trait abstracts over storage backends (SQLite, in-memory).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::edge::{EdgeRecord, KnowledgeEdge};
use super::node::{KnowledgeNode, NodeType};

/// Persistence seam for the knowledge graph
///
/// Implementations must make a single-node upsert atomic. Nothing else is
/// coordinated: concurrent upserts of one id are last-write-wins and edges
/// are never checked against the node collection.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========== Node Operations ==========

    /// Insert the node, or replace every field of the existing node with this id
    async fn upsert_node(&self, node: &KnowledgeNode) -> Result<()>;

    async fn get_node(&self, id: &str) -> Result<Option<KnowledgeNode>>;

    /// Fetch every node whose id is in `ids`; unknown ids are skipped
    async fn get_nodes(&self, ids: &[String]) -> Result<Vec<KnowledgeNode>>;

    async fn list_nodes_by_type(&self, node_type: &NodeType) -> Result<Vec<KnowledgeNode>>;

    async fn count_nodes(&self) -> Result<u64>;

    // ========== Edge Operations ==========

    /// Append an edge unconditionally
    async fn insert_edge(&self, edge: &KnowledgeEdge) -> Result<EdgeRecord>;

    /// Every edge where `id` is the source or the target
    async fn edges_touching(&self, id: &str) -> Result<Vec<EdgeRecord>>;

    /// Directed chase from `from_ids`
    ///
    /// Depth 1 edges have a source in `from_ids`; depth `n + 1` edges have a
    /// source equal to the target of a depth `n` edge. Stops after
    /// `max_depth`. An edge reachable along several paths may appear more
    /// than once with different depths.
    async fn forward_edges(&self, from_ids: &[String], max_depth: u32) -> Result<Vec<TraversedEdge>>;

    async fn count_edges(&self) -> Result<u64>;

    // ========== Statistics ==========

    /// Get overall graph statistics
    async fn stats(&self) -> Result<GraphStats>;
}

/// An edge found by [`GraphStore::forward_edges`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversedEdge {
    pub record: EdgeRecord,
    /// 1-based hop count from the starting ids
    pub depth: u32,
}

/// Statistics about the knowledge graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: u64,
    pub total_edges: u64,
    /// Node counts per type, sorted by type name
    pub nodes_by_type: Vec<(String, u64)>,
    /// Edge counts per type, sorted by type name
    pub edges_by_type: Vec<(String, u64)>,
    /// Edges whose source or target has no node
    pub dangling_edges: u64,
}
