//! SDK Configuration
//!
//! Defines configuration options for the ctxmem SDK. Every section has
//! defaults, so a config file only needs the values it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::SDKResult;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CTXMEM_CONFIG";

/// SDK configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SDKConfig {
    /// Keyed store configuration
    pub store: StoreConfig,

    /// Memory tier configuration
    pub memory: MemoryConfig,

    /// Semantic search collaborator
    pub semantic: SemanticConfig,

    /// Text completion collaborator
    pub completion: CompletionConfig,

    /// Background task runner
    pub runner: RunnerConfig,

    /// Deadline applied to every orchestrator operation, in milliseconds (0 disables)
    pub operation_timeout_ms: u64,
}

/// Keyed store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file; `None` keeps everything in process memory
    pub database_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: Some(default_data_dir().join("ctxmem.db")),
        }
    }
}

/// Memory system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub short_term: ShortTermConfig,
    pub working: WorkingConfig,
    pub long_term: LongTermConfig,
    pub consolidation: ConsolidationConfig,
    pub budget: BudgetConfig,
}

/// Short-term buffer ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortTermConfig {
    /// Maximum buffered turns per session (default: 50)
    pub max_entries: usize,

    /// Maximum buffered tokens per session (default: 4000)
    pub max_tokens: usize,

    /// Sliding TTL in seconds (default: 86400 = 24 hours)
    pub ttl_seconds: u64,
}

impl Default for ShortTermConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_tokens: 4000,
            ttl_seconds: 86_400, // 24 hours
        }
    }
}

impl ShortTermConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Working memory ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingConfig {
    /// Maximum loaded documents per session (default: 5)
    pub max_documents: usize,

    /// Maximum cached chunk tokens per session (default: 8000)
    pub max_tokens: usize,

    /// Sliding TTL in seconds (default: 3600 = 1 hour)
    pub ttl_seconds: u64,

    /// Query similarity below which cached context is stale (default: 0.5)
    pub staleness_threshold: f64,
}

impl Default for WorkingConfig {
    fn default() -> Self {
        Self {
            max_documents: 5,
            max_tokens: 8000,
            ttl_seconds: 3600, // 1 hour
            staleness_threshold: 0.5,
        }
    }
}

impl WorkingConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Long-term memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LongTermConfig {
    /// Enable long-term memory (default: true)
    pub enabled: bool,

    /// Results returned by a search when the caller gives no top_k (default: 5)
    pub default_top_k: usize,

    /// Collection name prefix; the agent id is appended (default: "ltm-")
    pub collection_prefix: String,

    /// Entries kept per agent when pruning (default: 1000)
    pub max_entries_per_agent: usize,
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_top_k: 5,
            collection_prefix: "ltm-".into(),
            max_entries_per_agent: 1000,
        }
    }
}

/// Consolidation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Minimum seconds between consolidations of one session (default: 3600)
    pub interval_seconds: u64,

    /// Buffered tokens required before an unforced consolidation runs (default: 500)
    pub min_tokens: usize,

    /// Oldest entries folded into one summary (default: 20)
    pub max_entries: usize,

    /// Token limit for the summary request (default: 500)
    pub summary_max_tokens: usize,

    /// Temperature for the summary request (default: 0.3)
    pub summary_temperature: f32,

    /// Token limit for the fact extraction request (default: 500)
    pub facts_max_tokens: usize,

    /// Temperature for the fact extraction request (default: 0.1)
    pub facts_temperature: f32,

    /// Also extract atomic facts during consolidation (default: false)
    pub extract_facts: bool,

    /// Evaluate consolidation in the background after every add (default: true)
    pub auto_consolidate: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3600, // 1 hour
            min_tokens: 500,
            max_entries: 20,
            summary_max_tokens: 500,
            summary_temperature: 0.3,
            facts_max_tokens: 500,
            facts_temperature: 0.1,
            extract_facts: false,
            auto_consolidate: true,
        }
    }
}

impl ConsolidationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Token budget split across tiers for formatted context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Budget used when the caller gives none (default: 4000)
    pub default_budget: usize,

    /// Short-term share in percent (default: 50)
    pub short_term_percent: u8,

    /// Working share in percent (default: 35)
    pub working_percent: u8,

    /// Long-term share in percent (default: 15)
    pub long_term_percent: u8,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_budget: 4000,
            short_term_percent: 50,
            working_percent: 35,
            long_term_percent: 15,
        }
    }
}

/// Semantic search collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Service URL; `None` uses the in-process store
    pub base_url: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Request timeout in milliseconds (default: 10000)
    pub timeout_ms: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_ms: 10_000,
        }
    }
}

/// Text completion collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// OpenAI-compatible endpoint base URL; `None` disables consolidation calls
    pub base_url: Option<String>,

    /// Model name sent with each request
    pub model: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Request timeout in milliseconds (default: 60000)
    pub timeout_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None,
            timeout_ms: 60_000,
        }
    }
}

/// Background task runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Background consolidations allowed to run at once (default: 4)
    pub max_concurrent: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ctxmem")
}

impl SDKConfig {
    /// Config with every tier kept in process memory
    pub fn in_memory() -> Self {
        Self {
            store: StoreConfig {
                database_path: None,
            },
            ..Default::default()
        }
    }

    /// Set the SQLite database path
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.database_path = Some(path.into());
        self
    }

    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set the semantic search service
    pub fn with_semantic(mut self, base_url: impl Into<String>) -> Self {
        self.semantic.base_url = Some(base_url.into());
        self
    }

    /// Set the completion endpoint
    pub fn with_completion(mut self, base_url: impl Into<String>) -> Self {
        self.completion.base_url = Some(base_url.into());
        self
    }

    /// Set the per-operation deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Per-operation deadline, if any
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_ms > 0).then(|| Duration::from_millis(self.operation_timeout_ms))
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Load configuration from the default path and environment.
    pub fn load() -> SDKResult<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> SDKResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> SDKResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("CTXMEM_COMPLETION_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("CTXMEM_SEMANTIC_API_KEY") {
            self.semantic.api_key = Some(key);
        }
        if let Ok(path) = std::env::var("CTXMEM_DATABASE_PATH") {
            self.store.database_path = Some(PathBuf::from(path));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let memory = &self.memory;

        if memory.short_term.max_entries == 0 {
            return Err(ConfigValidationError::invalid(
                "memory.short_term.max_entries",
                "must be greater than 0",
            ));
        }
        if memory.short_term.max_tokens == 0 {
            return Err(ConfigValidationError::invalid(
                "memory.short_term.max_tokens",
                "must be greater than 0",
            ));
        }
        if memory.short_term.ttl_seconds == 0 {
            return Err(ConfigValidationError::invalid(
                "memory.short_term.ttl_seconds",
                "must be greater than 0",
            ));
        }
        if memory.working.max_documents == 0 {
            return Err(ConfigValidationError::invalid(
                "memory.working.max_documents",
                "must be greater than 0",
            ));
        }
        if memory.working.ttl_seconds == 0 {
            return Err(ConfigValidationError::invalid(
                "memory.working.ttl_seconds",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&memory.working.staleness_threshold) {
            return Err(ConfigValidationError::invalid(
                "memory.working.staleness_threshold",
                "must be between 0 and 1",
            ));
        }
        if memory.long_term.collection_prefix.is_empty() {
            return Err(ConfigValidationError::invalid(
                "memory.long_term.collection_prefix",
                "must not be empty",
            ));
        }
        if memory.consolidation.max_entries == 0 {
            return Err(ConfigValidationError::invalid(
                "memory.consolidation.max_entries",
                "must be greater than 0",
            ));
        }

        let budget = &memory.budget;
        let total = budget.short_term_percent as u32 + budget.working_percent as u32 + budget.long_term_percent as u32;
        if total > 100 {
            return Err(ConfigValidationError::BudgetShares { total });
        }

        if self.runner.max_concurrent == 0 {
            return Err(ConfigValidationError::invalid(
                "runner.max_concurrent",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("budget shares add up to {total}%, must not exceed 100%")]
    BudgetShares { total: u32 },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigValidationError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SDKConfig::default();
        assert_eq!(config.memory.short_term.max_entries, 50);
        assert_eq!(config.memory.working.max_documents, 5);
        assert_eq!(config.memory.budget.short_term_percent, 50);
        assert_eq!(config.memory.budget.working_percent, 35);
        assert_eq!(config.memory.budget.long_term_percent, 15);
        assert!(config.memory.long_term.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SDKConfig::in_memory()
            .with_semantic("http://localhost:6333")
            .with_completion("http://localhost:8080")
            .with_operation_timeout(Duration::from_secs(5));

        assert!(config.store.database_path.is_none());
        assert_eq!(config.semantic.base_url.as_deref(), Some("http://localhost:6333"));
        assert_eq!(config.completion.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(SDKConfig::default().operation_timeout(), None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SDKConfig::default();
        config.memory.short_term.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.memory.working.staleness_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = SDKConfig::default();
        config.memory.budget.long_term_percent = 40;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::BudgetShares { total: 125 })
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SDKConfig = toml::from_str(
            r#"
            operation_timeout_ms = 2500

            [memory.short_term]
            max_entries = 10

            [completion]
            base_url = "http://localhost:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.operation_timeout_ms, 2500);
        assert_eq!(config.memory.short_term.max_entries, 10);
        assert_eq!(config.memory.short_term.max_tokens, 4000);
        assert_eq!(config.memory.working.max_documents, 5);
        assert_eq!(config.completion.timeout_ms, 60_000);
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = SDKConfig::in_memory();
        config.memory.working.max_documents = 3;
        config.save_to(&path).unwrap();

        let loaded = SDKConfig::load_from(&path).unwrap();
        assert_eq!(loaded.memory.working.max_documents, 3);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp = tempfile::tempdir().unwrap();
        let config = SDKConfig::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.memory.short_term.max_entries, 50);
    }
}
