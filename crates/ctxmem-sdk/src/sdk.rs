//! Main SDK Entry Point
//!
//! Builds the collaborators named by the configuration and ties them to a
//! memory orchestrator.

use std::sync::Arc;

use ctxmem_core::{CompletionClient, InMemorySemanticStore, KeyedStore, MemoryKvStore, SemanticStore};
use tracing::{debug, info};

use crate::memory::MemoryOrchestrator;
use crate::tasks::TaskRunner;
use crate::{SDKConfig, SDKResult};

/// ctxmem SDK - Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use ctxmem_sdk::{NewMemoryEntry, Role, SDK, SDKConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let sdk = SDK::new(SDKConfig::in_memory())?;
///
///     sdk.memory()
///         .add_memory(NewMemoryEntry::new("session-1", "agent-1", Role::User, "Hello"))
///         .await?;
///
///     let state = sdk.memory().get_memory_stats("session-1", "agent-1").await?;
///     println!("{} turns buffered", state.short_term_entries);
///
///     Ok(())
/// }
/// ```
pub struct SDK {
    /// SDK configuration
    config: SDKConfig,

    /// Memory orchestrator over all tiers
    memory: MemoryOrchestrator,
}

impl SDK {
    /// Create a new SDK instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The database cannot be opened
    /// - A configured collaborator needs a feature this build lacks
    pub fn new(config: SDKConfig) -> SDKResult<Self> {
        config.validate()?;

        let store = open_store(&config)?;
        let semantic = open_semantic(&config)?;
        let completion = open_completion(&config)?;

        Self::with_collaborators(config, store, semantic, completion)
    }

    /// Create an SDK over caller-supplied collaborators.
    pub fn with_collaborators(
        config: SDKConfig,
        store: Arc<dyn KeyedStore>,
        semantic: Arc<dyn SemanticStore>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> SDKResult<Self> {
        config.validate()?;

        let runner = Arc::new(TaskRunner::new(config.runner.max_concurrent));
        let memory = MemoryOrchestrator::new(store, semantic, completion, config.memory.clone())
            .with_runner(runner)
            .with_operation_timeout(config.operation_timeout());

        Ok(Self { config, memory })
    }

    /// Get SDK configuration
    pub fn config(&self) -> &SDKConfig {
        &self.config
    }

    /// Access the memory orchestrator
    pub fn memory(&self) -> &MemoryOrchestrator {
        &self.memory
    }

    /// Wait for background work to finish before shutting down
    pub async fn shutdown(&self) {
        self.memory.wait_for_background().await;
        info!("SDK shut down");
    }
}

fn open_store(config: &SDKConfig) -> SDKResult<Arc<dyn KeyedStore>> {
    let Some(path) = &config.store.database_path else {
        debug!("Using in-process keyed store");
        return Ok(Arc::new(MemoryKvStore::new()));
    };

    #[cfg(feature = "sqlite")]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "Opening SQLite keyed store");
        Ok(Arc::new(ctxmem_core::SqliteKvStore::open(path)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(crate::SDKError::invalid_operation(format!(
            "database_path {} is set but this build lacks the sqlite feature",
            path.display()
        )))
    }
}

fn open_semantic(config: &SDKConfig) -> SDKResult<Arc<dyn SemanticStore>> {
    let Some(base_url) = &config.semantic.base_url else {
        debug!("Using in-process semantic store");
        return Ok(Arc::new(InMemorySemanticStore::new()));
    };

    #[cfg(feature = "http")]
    {
        let timeout = std::time::Duration::from_millis(config.semantic.timeout_ms);
        let mut store = ctxmem_core::HttpSemanticStore::new(base_url.as_str(), timeout)?;
        if let Some(key) = &config.semantic.api_key {
            store = store.with_api_key(key.as_str());
        }
        debug!(base_url = %base_url, "Using HTTP semantic store");
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "http"))]
    {
        Err(crate::SDKError::invalid_operation(format!(
            "semantic.base_url {} is set but this build lacks the http feature",
            base_url
        )))
    }
}

fn open_completion(config: &SDKConfig) -> SDKResult<Option<Arc<dyn CompletionClient>>> {
    let Some(base_url) = &config.completion.base_url else {
        debug!("No completion endpoint configured, consolidation disabled");
        return Ok(None);
    };

    #[cfg(feature = "http")]
    {
        let timeout = std::time::Duration::from_millis(config.completion.timeout_ms);
        let mut client = ctxmem_core::HttpCompletionClient::new(base_url.as_str(), timeout)?;
        if let Some(model) = &config.completion.model {
            client = client.with_model(model.as_str());
        }
        if let Some(key) = &config.completion.api_key {
            client = client.with_api_key(key.as_str());
        }
        debug!(base_url = %base_url, "Using HTTP completion endpoint");
        Ok(Some(Arc::new(client)))
    }

    #[cfg(not(feature = "http"))]
    {
        Err(crate::SDKError::invalid_operation(format!(
            "completion.base_url {} is set but this build lacks the http feature",
            base_url
        )))
    }
}
