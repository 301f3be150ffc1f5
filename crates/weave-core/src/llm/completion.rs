//! The completion seam used by the extractor
//!
//! Extraction only needs "system instruction + user prompt in, free text
//! out". Keeping that behind a trait lets callers inject the HTTP client,
//! a local model, or a scripted stub in tests.

use async_trait::async_trait;

use crate::error::Result;

/// A language-model completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a single-turn prompt and return the raw model text
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
