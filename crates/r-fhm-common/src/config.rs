//! ---
//! fhm_section: "01-core-functionality"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Shared primitives and utilities for the fuel health monitor runtime."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_mode() -> Mode {
    Mode::Simulation
}

fn default_simulator_seed() -> u64 {
    0xF0E1u64
}

fn default_rpm_min() -> u32 {
    1500
}

fn default_rpm_max() -> u32 {
    4000
}

/// Probability of a synthetic temperature excursion per sample. The
/// historical docstring claimed 5% while the executable constant was 0.1;
/// the executable value is the one preserved here.
fn default_temp_excursion_probability() -> f64 {
    0.1
}

fn default_stream_enabled() -> bool {
    true
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("target/fhm/anomaly_model.json")
}

fn default_min_training_samples() -> usize {
    20
}

fn default_trees() -> usize {
    100
}

fn default_tree_sample_size() -> usize {
    256
}

fn default_contamination() -> f64 {
    0.05
}

fn default_model_seed() -> u64 {
    0x5EED
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from("target/fhm")
}

fn default_telemetry_file() -> String {
    "telemetry.jsonl".to_owned()
}

fn default_tank_file() -> String {
    "tanks.json".to_owned()
}

fn default_topic() -> String {
    "helicopter/fuel".to_owned()
}

fn default_transport_in_memory() -> bool {
    true
}

fn default_transport_capacity() -> usize {
    1024
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default api address")
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    "0.0.0.0:9898"
        .parse()
        .expect("valid default metrics address")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_alert_receiver() -> String {
    "operations".to_owned()
}

/// Primary configuration object for the R-FHM runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_FHM_CONFIG";

    /// Load configuration from disk, respecting the `R_FHM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulator.validate()?;
        self.stream.validate()?;
        self.model.validate()?;
        self.transport.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Operating mode for the monitor.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Production,
    #[default]
    Simulation,
}

impl Mode {
    pub fn is_simulation(&self) -> bool {
        matches!(self, Mode::Simulation)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Mode::Production),
            "simulation" => Ok(Mode::Simulation),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Settings controlling the synthetic fuel-system sample generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_simulator_seed")]
    pub seed: u64,
    #[serde(default = "default_rpm_min")]
    pub rpm_min: u32,
    #[serde(default = "default_rpm_max")]
    pub rpm_max: u32,
    #[serde(default = "default_temp_excursion_probability")]
    pub temp_excursion_probability: f64,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rpm_min >= self.rpm_max {
            return Err(anyhow!(
                "simulator rpm_min ({}) must be below rpm_max ({})",
                self.rpm_min,
                self.rpm_max
            ));
        }
        if !(0.0..=1.0).contains(&self.temp_excursion_probability) {
            return Err(anyhow!(
                "simulator temp_excursion_probability must lie in [0, 1], got {}",
                self.temp_excursion_probability
            ));
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: default_simulator_seed(),
            rpm_min: default_rpm_min(),
            rpm_max: default_rpm_max(),
            temp_excursion_probability: default_temp_excursion_probability(),
        }
    }
}

/// Settings for the background streaming loop.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_enabled")]
    pub enabled: bool,
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub tick_interval: Duration,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("stream tick_interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: default_stream_enabled(),
            tick_interval: default_tick_interval(),
        }
    }
}

/// Settings for the anomaly model lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,
    #[serde(default = "default_trees")]
    pub trees: usize,
    #[serde(default = "default_tree_sample_size")]
    pub tree_sample_size: usize,
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_model_seed")]
    pub seed: u64,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trees == 0 {
            return Err(anyhow!("model trees must be greater than zero"));
        }
        if self.tree_sample_size == 0 {
            return Err(anyhow!("model tree_sample_size must be greater than zero"));
        }
        if self.min_training_samples == 0 {
            return Err(anyhow!(
                "model min_training_samples must be greater than zero"
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(anyhow!(
                "model contamination must lie in (0, 0.5], got {}",
                self.contamination
            ));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            min_training_samples: default_min_training_samples(),
            trees: default_trees(),
            tree_sample_size: default_tree_sample_size(),
            contamination: default_contamination(),
            seed: default_model_seed(),
        }
    }
}

/// Settings for on-disk telemetry and tank storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_telemetry_file")]
    pub telemetry_file: String,
    #[serde(default = "default_tank_file")]
    pub tank_file: String,
}

impl StorageConfig {
    pub fn telemetry_path(&self) -> PathBuf {
        self.directory.join(&self.telemetry_file)
    }

    pub fn tank_path(&self) -> PathBuf {
        self.directory.join(&self.tank_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
            telemetry_file: default_telemetry_file(),
            tank_file: default_tank_file(),
        }
    }
}

/// Settings for the outbound telemetry broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_transport_in_memory")]
    pub in_memory_enabled: bool,
    #[serde(default = "default_transport_capacity")]
    pub queue_capacity: usize,
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(anyhow!("transport topic must not be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("transport queue_capacity must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            in_memory_enabled: default_transport_in_memory(),
            queue_capacity: default_transport_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Settings for operator alert delivery. Without a webhook URL the
/// dispatcher falls back to log-only delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub webhook_url: Option<Url>,
    #[serde(default = "default_alert_receiver")]
    pub receiver: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            receiver: default_alert_receiver(),
        }
    }
}
