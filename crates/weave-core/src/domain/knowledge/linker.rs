//! Promotion of whiteboard stickies to task-board cards

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::Result;

use super::edge::{EdgeType, KnowledgeEdge};
use super::extractor::META_SOURCE;
use super::node::{KnowledgeNode, NodeType};
use super::persistence::persist_batch;
use super::repository::GraphStore;
use super::state::{ExtractionState, KnowledgeBatch};

/// Metadata key on a card pointing back at its sticky
pub const META_ORIGINAL_STICKY: &str = "originalSticky";

/// Creates one `KanbanCard` and one `BECAME_TASK` edge per sticky
///
/// There is no "already linked" check: every run mints fresh cards.
pub struct StickyTaskLinker<S: GraphStore + ?Sized> {
    store: Arc<S>,
}

impl<S: GraphStore + ?Sized> Clone for StickyTaskLinker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GraphStore + ?Sized> StickyTaskLinker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Link every sticky in `state.knowledge_nodes`, persist, and return only
    /// the new cards and edges
    pub async fn link(&self, state: &ExtractionState) -> Result<KnowledgeBatch> {
        let batch = cards_for_stickies(&state.knowledge_nodes);
        if batch.is_empty() {
            info!("No stickies to link");
            return Ok(batch);
        }

        persist_batch(self.store.as_ref(), &batch).await?;
        info!(card_count = batch.knowledge_nodes.len(), "Stickies linked to tasks");
        Ok(batch)
    }
}

/// Build the cards and edges for every sticky in `nodes`
pub fn cards_for_stickies(nodes: &[KnowledgeNode]) -> KnowledgeBatch {
    let mut batch = KnowledgeBatch::empty();

    for sticky in nodes.iter().filter(|n| n.is_type(&NodeType::Sticky)) {
        let card = KnowledgeNode::new(
            format!("card-{}", Uuid::new_v4()),
            NodeType::KanbanCard,
            sticky.content.clone(),
        )
        .with_metadata(META_ORIGINAL_STICKY, sticky.id.as_str())
        .with_metadata(META_SOURCE, "linker");

        batch
            .knowledge_edges
            .push(KnowledgeEdge::new(&sticky.id, &card.id, EdgeType::BecameTask));
        batch.knowledge_nodes.push(card);
    }

    batch
}
