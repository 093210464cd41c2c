//! Internal implementation for config module
//!
//! Handles .vidrecall/config.toml - engine, store, embedding and ingestion
//! settings. Every field has a default so partial files load.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Config Types
// =============================================================================

/// Configuration stored in .vidrecall/config.toml
/// All sections are optional with defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub embeddings: EmbeddingsSection,
    #[serde(default)]
    pub ingest: IngestSection,
}

impl EngineConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(r.gap_threshold_secs.is_finite() && r.gap_threshold_secs >= 0.0) {
            bail!("retrieval.gap_threshold_secs must be >= 0, got {}", r.gap_threshold_secs);
        }
        if let Some(margin) = r.adjacency_margin_secs {
            if !(margin.is_finite() && margin >= 0.0) {
                bail!("retrieval.adjacency_margin_secs must be >= 0, got {}", margin);
            }
        }
        if r.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if r.max_results == 0 {
            bail!("retrieval.max_results must be at least 1");
        }
        if r.max_query_chars == 0 {
            bail!("retrieval.max_query_chars must be at least 1");
        }
        if r.store_timeout_ms == 0 {
            bail!("retrieval.store_timeout_ms must be positive");
        }
        if !(-1.0..=1.0).contains(&r.min_score) {
            bail!("retrieval.min_score must be within [-1, 1], got {}", r.min_score);
        }
        if let Some(gap) = r.score_gap {
            if !(gap.is_finite() && gap >= 0.0) {
                bail!("retrieval.score_gap must be >= 0, got {}", gap);
            }
        }
        if self.store.dimensions == 0 {
            bail!("store.dimensions must be at least 1");
        }
        if self.store.pool_size == 0 {
            bail!("store.pool_size must be at least 1");
        }
        if self.ingest.max_segment_words == 0 {
            bail!("ingest.max_segment_words must be at least 1");
        }
        if !(self.ingest.segment_gap_secs.is_finite() && self.ingest.segment_gap_secs >= 0.0) {
            bail!("ingest.segment_gap_secs must be >= 0, got {}", self.ingest.segment_gap_secs);
        }
        Ok(())
    }
}

/// Retrieval tuning: grouping, alignment, ranking, timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Max gap (seconds) between consecutive hits in one window
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold_secs: f64,
    /// Max distance (seconds) between a visual and an audio window to pair
    /// them; falls back to `gap_threshold_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacency_margin_secs: Option<f64>,
    /// Candidates requested per modality search
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum cosine similarity for a candidate
    #[serde(default)]
    pub min_score: f32,
    /// Cap on windows/pairs in a result
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Longest accepted question, in characters
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    /// Timeout for each observation store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Pause before the single retry of an unavailable store call
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Cut a ranked list at the first score drop larger than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_gap: Option<f32>,
}

fn default_gap_threshold() -> f64 {
    2.0
}
fn default_top_k() -> usize {
    20
}
fn default_max_results() -> usize {
    5
}
fn default_max_query_chars() -> usize {
    1000
}
fn default_store_timeout_ms() -> u64 {
    2000
}
fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            gap_threshold_secs: default_gap_threshold(),
            adjacency_margin_secs: None,
            top_k: default_top_k(),
            min_score: 0.0,
            max_results: default_max_results(),
            max_query_chars: default_max_query_chars(),
            store_timeout_ms: default_store_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            score_gap: None,
        }
    }
}

impl RetrievalSection {
    pub fn adjacency_margin(&self) -> f64 {
        self.adjacency_margin_secs
            .unwrap_or(self.gap_threshold_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Directory holding observations.db and observations.usearch
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Embedding dimension (384 for all-MiniLM-L6-v2)
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Concurrent database connections
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_store_path() -> String {
    ".vidrecall/data".to_string()
}
fn default_dimensions() -> usize {
    384
}
fn default_pool_size() -> usize {
    4
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            dimensions: default_dimensions(),
            pool_size: default_pool_size(),
        }
    }
}

impl StoreSection {
    /// Store directory with `~` and environment variables expanded
    pub fn resolved_path(&self) -> PathBuf {
        match shellexpand::full(&self.path) {
            Ok(expanded) => PathBuf::from(expanded.into_owned()),
            Err(_) => PathBuf::from(&self.path),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsSection {
    /// Embedding model name
    #[serde(default = "default_model")]
    pub model: String,
    /// ONNX model file
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// HuggingFace tokenizer.json
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: String,
    /// Prefix for asymmetric models (e.g. "query: " for E5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_prefix: Option<String>,
}

fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_model_path() -> String {
    "resources/models/all-minilm-l6-v2/model_quantized.onnx".to_string()
}
fn default_tokenizer_path() -> String {
    "resources/models/all-minilm-l6-v2/tokenizer.json".to_string()
}

impl Default for EmbeddingsSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            model_path: default_model_path(),
            tokenizer_path: default_tokenizer_path(),
            query_prefix: None,
            passage_prefix: None,
        }
    }
}

/// Transcript segmentation during ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    /// Silence (seconds) between words that ends a speech segment
    #[serde(default = "default_segment_gap")]
    pub segment_gap_secs: f64,
    /// Words per segment before a forced break
    #[serde(default = "default_max_segment_words")]
    pub max_segment_words: usize,
}

fn default_segment_gap() -> f64 {
    2.0
}
fn default_max_segment_words() -> usize {
    8
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            segment_gap_secs: default_segment_gap(),
            max_segment_words: default_max_segment_words(),
        }
    }
}

// =============================================================================
// Path Functions
// =============================================================================

/// Get the .vidrecall directory for a project
pub fn vidrecall_dir(project_path: &Path) -> PathBuf {
    project_path.join(".vidrecall")
}

/// Get the config file path for a project
pub fn config_path(project_path: &Path) -> PathBuf {
    vidrecall_dir(project_path).join("config.toml")
}

// =============================================================================
// Config Load/Save
// =============================================================================

/// Load config from .vidrecall/config.toml, defaults when absent
pub fn load(project_path: &Path) -> Result<EngineConfig> {
    let path = config_path(project_path);

    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    load_file(&path)
}

/// Load config from an explicit file
pub fn load_file(path: &Path) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    let config: EngineConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}

/// Save config to .vidrecall/config.toml
pub fn save(project_path: &Path, config: &EngineConfig) -> Result<()> {
    let path = config_path(project_path);

    // Ensure .vidrecall directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(&path, contents)?;
    Ok(())
}
