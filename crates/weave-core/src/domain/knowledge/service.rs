//! Knowledge pipeline service
//!
//! Bundles the orchestrator, traversal engine and sticky linker behind the
//! four operations the caller sees: chat extraction, calendar extraction,
//! subgraph retrieval and sticky linking.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::llm::CompletionService;

use super::extractor::StructuredExtractor;
use super::linker::StickyTaskLinker;
use super::orchestrator::ExtractionOrchestrator;
use super::repository::{GraphStats, GraphStore};
use super::state::{ExtractionState, KnowledgeBatch, Provenance, SearchResults};
use super::traversal::TraversalEngine;

/// Knowledge extraction and retrieval pipeline
pub struct KnowledgePipeline<S: GraphStore + ?Sized> {
    store: Arc<S>,
    orchestrator: ExtractionOrchestrator<S>,
    traversal: TraversalEngine<S>,
    linker: StickyTaskLinker<S>,
}

impl<S: GraphStore + ?Sized> Clone for KnowledgePipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            orchestrator: self.orchestrator.clone(),
            traversal: self.traversal.clone(),
            linker: self.linker.clone(),
        }
    }
}

impl<S: GraphStore + ?Sized> KnowledgePipeline<S> {
    /// Create a pipeline with the default traversal depth
    pub fn new(service: Arc<dyn CompletionService>, store: Arc<S>) -> Self {
        let extractor = StructuredExtractor::new(service);
        Self {
            orchestrator: ExtractionOrchestrator::new(extractor, Arc::clone(&store)),
            traversal: TraversalEngine::new(Arc::clone(&store)),
            linker: StickyTaskLinker::new(Arc::clone(&store)),
            store,
        }
    }

    /// Create a pipeline honoring the traversal settings in `config`
    pub fn from_config(
        service: Arc<dyn CompletionService>,
        store: Arc<S>,
        config: &Config,
    ) -> Result<Self> {
        let mut pipeline = Self::new(service, store);
        pipeline.traversal = TraversalEngine::from_config(Arc::clone(&pipeline.store), &config.traversal)?;
        Ok(pipeline)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn traversal(&self) -> &TraversalEngine<S> {
        &self.traversal
    }

    /// Extract from the newest message as a chat turn and persist the result
    pub async fn extract_from_chat(&self, state: &ExtractionState) -> Result<KnowledgeBatch> {
        let outcome = self.orchestrator.run_as(state, Provenance::Chat).await?;
        Ok(outcome.batch)
    }

    /// Extract from the newest message as a formatted calendar block and
    /// persist the result
    pub async fn extract_from_calendar_event(&self, state: &ExtractionState) -> Result<KnowledgeBatch> {
        let outcome = self.orchestrator.run_as(state, Provenance::Calendar).await?;
        Ok(outcome.batch)
    }

    /// Retrieve the subgraph around the start node resolved from `state.intent`
    pub async fn retrieve_subgraph(&self, state: &ExtractionState) -> Result<SearchResults> {
        let search_results = self.traversal.retrieve(state).await?;
        Ok(SearchResults { search_results })
    }

    /// Promote every sticky in `state.knowledge_nodes` to a task card
    pub async fn link_stickies_to_tasks(&self, state: &ExtractionState) -> Result<KnowledgeBatch> {
        self.linker.link(state).await
    }

    /// Extract from the newest message using its own provenance, then record
    /// the batch in `state`
    pub async fn process(&self, state: &mut ExtractionState) -> Result<KnowledgeBatch> {
        let outcome = self.orchestrator.run(state).await?;
        state.apply_batch(&outcome.batch);
        info!(phase = %outcome.phase, "Message processed");
        Ok(outcome.batch)
    }

    /// Run [`process`](Self::process) and, when an intent is set, retrieve
    /// the matching subgraph into `state`
    pub async fn process_and_retrieve(&self, state: &mut ExtractionState) -> Result<KnowledgeBatch> {
        let batch = self.process(state).await?;
        if state.intent.is_some() {
            let results = self.traversal.retrieve(state).await?;
            state.apply_search_results(results);
        }
        Ok(batch)
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        self.store.stats().await
    }
}
