//! Shared test doubles for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use weave_core::infrastructure::knowledge::{InMemoryGraphStore, SqliteGraphStore};
use weave_core::llm::CompletionService;
use weave_core::storage::Database;
use weave_core::{Error, Result};

/// Completion service replaying a script of canned replies
///
/// Replies are consumed in order; the last one repeats once the script runs out.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    last: Mutex<Option<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<std::result::Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text)])
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::new(vec![Err(message)])
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn system_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(system, _)| system.clone())
            .collect()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));

        let next = self.script.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        };

        reply.map_err(Error::LLMError)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub async fn sqlite_store() -> Arc<SqliteGraphStore> {
    let db = Database::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteGraphStore::new(db.pool().clone()))
}

pub fn memory_store() -> Arc<InMemoryGraphStore> {
    Arc::new(InMemoryGraphStore::new())
}

