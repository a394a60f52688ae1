//! Test doubles shared by the memory unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ctxmem_core::{CompletionClient, CompletionRequest, Error, InMemorySemanticStore, MemoryKvStore};

use crate::config::MemoryConfig;

/// Completion client answering from a script, recording every request
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, Error>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::Other(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> ctxmem_core::Result<String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other("script exhausted".into())))
    }
}

/// Fresh in-process collaborators
pub fn collaborators() -> (Arc<MemoryKvStore>, Arc<InMemorySemanticStore>) {
    (Arc::new(MemoryKvStore::new()), Arc::new(InMemorySemanticStore::new()))
}

/// Memory config with thresholds small enough for short test transcripts
pub fn small_config() -> MemoryConfig {
    let mut config = MemoryConfig::default();
    config.consolidation.min_tokens = 5;
    config
}
