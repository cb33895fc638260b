//! Runtime configuration.
//!
//! Every numeric knob of the retrieval cascade, the quality rubric and the
//! sentiment weights lives here so it can be tuned without touching code.
//! A missing file means defaults; a partial file fills the rest with defaults.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub training: TrainingConfig,
    pub sentiment: SentimentConfig,
    pub external: ExternalConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Descending similarity thresholds tried in order before falling back.
    pub thresholds: Vec<f64>,
    pub top_k: usize,
    pub cache_capacity: usize,
    pub seed: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![0.10, 0.05, 0.02, 0.01],
            top_k: 3,
            cache_capacity: 512,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub initial_interval_secs: f64,
    pub min_interval_secs: f64,
    pub max_interval_secs: f64,
    pub backoff_secs: f64,
    pub probes_per_cycle: usize,
    pub velocity_window: usize,
    pub velocity_epsilon: f64,
    pub interval_step: f64,
    pub min_response_len: usize,
    pub completeness_weight: f64,
    pub confidence_weight: f64,
    pub keyword_weight: f64,
    pub keyword_saturation: usize,
    pub weak_probe_threshold: f64,
    pub join_timeout_secs: f64,
    pub session_history: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            initial_interval_secs: 60.0,
            min_interval_secs: 15.0,
            max_interval_secs: 600.0,
            backoff_secs: 5.0,
            probes_per_cycle: 5,
            velocity_window: 5,
            velocity_epsilon: 0.01,
            interval_step: 0.10,
            min_response_len: 20,
            completeness_weight: 0.4,
            confidence_weight: 0.3,
            keyword_weight: 0.3,
            keyword_saturation: 3,
            weak_probe_threshold: 0.5,
            join_timeout_secs: 5.0,
            session_history: 50,
        }
    }
}

impl TrainingConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_secs.max(0.0))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.join_timeout_secs.max(0.0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Weighted-total difference under which the reading is neutral.
    pub neutral_margin: f64,
    pub strong_weight: f64,
    pub moderate_weight: f64,
    pub weak_weight: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            neutral_margin: 1.0,
            strong_weight: 3.0,
            moderate_weight: 2.0,
            weak_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub enabled: bool,
    pub timeout_secs: f64,
    pub market_base_url: String,
    pub news_base_url: String,
    pub news_api_key: Option<String>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 4.0,
            market_base_url: "https://api.coingecko.com/api/v3".to_string(),
            news_base_url: "https://min-api.cryptocompare.com/data/v2".to_string(),
            news_api_key: None,
        }
    }
}

impl ExternalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub primary_corpus: Option<PathBuf>,
    pub stylized_corpus: Option<PathBuf>,
    pub articles: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub export_turns: usize,
    /// Stored exports kept in the database; older ones are pruned.
    pub export_keep: usize,
    pub log_dir: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            primary_corpus: None,
            stylized_corpus: None,
            articles: None,
            database: None,
            export_dir: PathBuf::from("exports"),
            export_turns: 50,
            export_keep: 20,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config from `COINPAL_CONFIG` and the other env overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("COINPAL_CONFIG") {
            Ok(path) => Config::load(Path::new(&path))?,
            Err(_) => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("COINPAL_LOG_DIR") {
            self.data.log_dir = Some(PathBuf::from(dir));
        }
        if let Ok(db) = std::env::var("COINPAL_DB") {
            self.data.database = Some(PathBuf::from(db));
        }
        if matches!(std::env::var("COINPAL_OFFLINE").as_deref(), Ok("1") | Ok("true")) {
            self.external.enabled = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let thresholds = &self.retrieval.thresholds;
        if thresholds.is_empty() {
            return Err(AssistantError::Config("retrieval.thresholds is empty".into()));
        }
        if thresholds.iter().any(|t| !(*t > 0.0 && *t <= 1.0)) {
            return Err(AssistantError::Config(
                "retrieval.thresholds must lie in (0, 1]".into(),
            ));
        }
        if thresholds.windows(2).any(|w| w[1] >= w[0]) {
            return Err(AssistantError::Config(
                "retrieval.thresholds must be strictly descending".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(AssistantError::Config("retrieval.top_k must be >= 1".into()));
        }
        if self.retrieval.cache_capacity == 0 {
            return Err(AssistantError::Config(
                "retrieval.cache_capacity must be >= 1".into(),
            ));
        }

        let t = &self.training;
        if !(t.min_interval_secs > 0.0
            && t.min_interval_secs <= t.initial_interval_secs
            && t.initial_interval_secs <= t.max_interval_secs)
        {
            return Err(AssistantError::Config(format!(
                "training intervals must satisfy 0 < min ({}) <= initial ({}) <= max ({})",
                t.min_interval_secs, t.initial_interval_secs, t.max_interval_secs
            )));
        }
        if self.data.export_keep == 0 {
            return Err(AssistantError::Config("data.export_keep must be >= 1".into()));
        }

        if t.velocity_window < 2 {
            return Err(AssistantError::Config(
                "training.velocity_window must be >= 2".into(),
            ));
        }
        if t.probes_per_cycle == 0 {
            return Err(AssistantError::Config(
                "training.probes_per_cycle must be >= 1".into(),
            ));
        }
        Ok(())
    }
}
