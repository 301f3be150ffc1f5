//! Applying a candidate batch to a [`GraphStore`]

use tracing::{debug, info};

use crate::error::Result;

use super::repository::GraphStore;
use super::state::KnowledgeBatch;

/// Upsert every node in order, then append every edge
///
/// Writes are sequential so a repeated id inside one batch resolves to its
/// last occurrence. The first storage error is returned as-is; writes already
/// made stay in place.
pub async fn persist_batch<S>(store: &S, batch: &KnowledgeBatch) -> Result<()>
where
    S: GraphStore + ?Sized,
{
    for node in &batch.knowledge_nodes {
        store.upsert_node(node).await?;
    }

    for edge in &batch.knowledge_edges {
        let record = store.insert_edge(edge).await?;
        debug!(edge_id = record.id, source = %edge.source, target = %edge.target, "Edge appended");
    }

    info!(
        node_count = batch.knowledge_nodes.len(),
        edge_count = batch.knowledge_edges.len(),
        "Batch persisted"
    );
    Ok(())
}
