//! Extraction orchestrator
//!
//! Picks the extraction strategy from the provenance of the newest message,
//! runs it and persists the result. Extraction itself cannot fail; only a
//! storage error escapes.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;

use super::extractor::StructuredExtractor;
use super::persistence::persist_batch;
use super::repository::GraphStore;
use super::state::{ExtractionState, KnowledgeBatch, Provenance};

/// Lifecycle of one orchestrated extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPhase {
    Idle,
    Extracting,
    /// Batch was non-empty and written to the store
    Persisted,
    /// Extraction produced nothing; the store was not touched
    FailedSoft,
}

impl ExtractionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Persisted => "persisted",
            Self::FailedSoft => "failed_soft",
        }
    }
}

impl std::fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of [`ExtractionOrchestrator::run`]
#[derive(Debug, Clone)]
pub struct OrchestratedExtraction {
    pub batch: KnowledgeBatch,
    /// Terminal phase reached (`Persisted` or `FailedSoft`)
    pub phase: ExtractionPhase,
}

/// Dispatches extraction by provenance and forwards to persistence
pub struct ExtractionOrchestrator<S: GraphStore + ?Sized> {
    extractor: StructuredExtractor,
    store: Arc<S>,
}

impl<S: GraphStore + ?Sized> Clone for ExtractionOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            extractor: self.extractor.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GraphStore + ?Sized> ExtractionOrchestrator<S> {
    pub fn new(extractor: StructuredExtractor, store: Arc<S>) -> Self {
        Self { extractor, store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Extract from the newest message in `state`, using its provenance, and
    /// persist the batch
    ///
    /// A state with no messages yields an empty batch.
    pub async fn run(&self, state: &ExtractionState) -> Result<OrchestratedExtraction> {
        let provenance = state.latest_message().map(|m| m.provenance);
        self.run_with(state, provenance).await
    }

    /// Like [`run`](Self::run), but with the extraction policy forced to `provenance`
    pub async fn run_as(
        &self,
        state: &ExtractionState,
        provenance: Provenance,
    ) -> Result<OrchestratedExtraction> {
        self.run_with(state, Some(provenance)).await
    }

    async fn run_with(
        &self,
        state: &ExtractionState,
        provenance: Option<Provenance>,
    ) -> Result<OrchestratedExtraction> {
        let mut phase = ExtractionPhase::Idle;

        let (Some(message), Some(provenance)) = (state.latest_message(), provenance) else {
            warn!(phase = %phase, "No message to extract from");
            return Ok(OrchestratedExtraction {
                batch: KnowledgeBatch::empty(),
                phase: ExtractionPhase::FailedSoft,
            });
        };

        phase = ExtractionPhase::Extracting;
        info!(phase = %phase, provenance = %provenance, "Extraction started");

        let batch = self.extractor.extract(&message.content, provenance).await;

        if batch.is_empty() {
            phase = ExtractionPhase::FailedSoft;
            warn!(phase = %phase, provenance = %provenance, "Extraction produced no knowledge");
            return Ok(OrchestratedExtraction { batch, phase });
        }

        persist_batch(self.store.as_ref(), &batch).await?;

        phase = ExtractionPhase::Persisted;
        info!(
            phase = %phase,
            provenance = %provenance,
            node_count = batch.knowledge_nodes.len(),
            edge_count = batch.knowledge_edges.len(),
            "Extraction persisted"
        );

        Ok(OrchestratedExtraction { batch, phase })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::{ConversationMessage, prompts};
    use crate::error::Error;
    use crate::infrastructure::knowledge::InMemoryGraphStore;
    use crate::llm::CompletionService;
    use async_trait::async_trait;

    struct FixedCompletion(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl CompletionService for FixedCompletion {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .map_err(|e| Error::LLMError(e.to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn orchestrator(
        reply: std::result::Result<&'static str, &'static str>,
    ) -> (ExtractionOrchestrator<InMemoryGraphStore>, Arc<InMemoryGraphStore>) {
        let store = Arc::new(InMemoryGraphStore::new());
        let extractor = StructuredExtractor::new(Arc::new(FixedCompletion(reply)));
        (ExtractionOrchestrator::new(extractor, store.clone()), store)
    }

    #[tokio::test]
    async fn test_run_persists_batch() {
        let (orchestrator, store) = orchestrator(Ok(prompts::CHAT_PROMPT_EXAMPLE_OUTPUT));
        let state = ExtractionState::from_message(ConversationMessage::user(
            prompts::CHAT_PROMPT_EXAMPLE_INPUT,
        ));

        let outcome = orchestrator.run(&state).await.unwrap();

        assert_eq!(outcome.phase, ExtractionPhase::Persisted);
        assert_eq!(outcome.batch.knowledge_nodes.len(), 2);
        assert_eq!(store.count_nodes().await.unwrap(), 2);
        assert_eq!(store.count_edges().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_fails_soft_on_service_error() {
        let (orchestrator, store) = orchestrator(Err("timeout"));
        let state = ExtractionState::from_message(ConversationMessage::user("hello"));

        let outcome = orchestrator.run(&state).await.unwrap();

        assert_eq!(outcome.phase, ExtractionPhase::FailedSoft);
        assert!(outcome.batch.is_empty());
        assert_eq!(store.count_nodes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_without_messages() {
        let (orchestrator, _store) = orchestrator(Ok(prompts::CHAT_PROMPT_EXAMPLE_OUTPUT));

        let outcome = orchestrator.run(&ExtractionState::new()).await.unwrap();
        assert_eq!(outcome.phase, ExtractionPhase::FailedSoft);
        assert!(outcome.batch.is_empty());
    }

    #[tokio::test]
    async fn test_run_reads_only_latest_message() {
        let (orchestrator, store) = orchestrator(Err("unused"));
        let mut state = ExtractionState::from_message(ConversationMessage::user("old chat"));
        state.push_message(ConversationMessage::whiteboard(
            "SOURCE: WHITEBOARD\nSTICKY_ID: s9\nTEXT: Write docs",
        ));

        let outcome = orchestrator.run(&state).await.unwrap();

        assert_eq!(outcome.phase, ExtractionPhase::Persisted);
        assert_eq!(outcome.batch.knowledge_nodes[0].id, "sticky-s9");
        assert!(store.get_node("sticky-s9").await.unwrap().is_some());
    }
}
