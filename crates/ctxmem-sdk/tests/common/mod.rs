//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ctxmem_sdk::ctxmem_core::{
    self, CompletionClient, CompletionRequest, InMemorySemanticStore, MemoryKvStore,
};
use ctxmem_sdk::{MemoryConfig, MemoryOrchestrator, NewMemoryEntry, Role};

/// Completion endpoint that answers from a fixed script
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<ctxmem_core::Result<String>>>,
    calls: Mutex<Vec<CompletionRequest>>,
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
            .push_back(Err(ctxmem_core::Error::Other(message.to_string())));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> ctxmem_core::Result<String> {
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ctxmem_core::Error::Other("no scripted response left".into())))
    }
}

/// Orchestrator plus handles to its in-process collaborators
pub struct Harness {
    pub memory: MemoryOrchestrator,
    pub kv: Arc<MemoryKvStore>,
    pub semantic: Arc<InMemorySemanticStore>,
    pub completion: Option<Arc<ScriptedCompletion>>,
}

pub fn harness(config: MemoryConfig, completion: Option<ScriptedCompletion>) -> Harness {
    let kv = Arc::new(MemoryKvStore::new());
    let semantic = Arc::new(InMemorySemanticStore::new());
    let completion = completion.map(Arc::new);

    let memory = MemoryOrchestrator::new(
        kv.clone(),
        semantic.clone(),
        completion.clone().map(|c| c as Arc<dyn CompletionClient>),
        config,
    );

    Harness {
        memory,
        kv,
        semantic,
        completion,
    }
}

pub fn turn(session: &str, agent: &str, role: Role, content: &str) -> NewMemoryEntry {
    NewMemoryEntry::new(session, agent, role, content)
}
