//! Quanta Viewer - browse clusters of LLM next-token predictions
//!
//! This crate provides:
//! - Cluster ranking by group size with a dense rank <-> label table
//! - Safe HTML rendering of token sequences with the predicted token highlighted
//! - Loading of pre-computed cluster and context documents
//! - A browser dashboard and JSON API for stepping through clusters

pub mod cluster;
pub mod render;
pub mod navigation;
pub mod data;
pub mod view;
pub mod api;

pub use cluster::{rank, ClusterAssignment, ClusterLabel, RankTable, RankedClusters};
pub use data::{Dataset, Sample};
pub use render::{render, render_sequence, Rendering};
pub use view::ClusterView;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading the viewer configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the viewer
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ViewerConfig {
    /// Cluster document (cluster count -> [labels, auxiliary])
    #[serde(default = "default_cluster_file")]
    pub cluster_file: PathBuf,

    /// Context document (sample key -> {context, answer})
    #[serde(default = "default_context_file")]
    pub context_file: PathBuf,

    /// Address to bind the dashboard to
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Trailing tokens shown per sample
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Cluster count selected on first load (falls back to the smallest)
    #[serde(default = "default_n_clusters")]
    pub default_n_clusters: usize,

    /// Sidebar heading
    #[serde(default = "default_title")]
    pub title: String,

    /// Sidebar description (HTML allowed)
    #[serde(default = "default_description")]
    pub description: String,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cluster_file() -> PathBuf { PathBuf::from("ERIC-QUANTA-CLUSTERS-GRADIENTS.json") }
fn default_context_file() -> PathBuf { PathBuf::from("ERIC-QUANTA-CONTEXTS.json") }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8501 }
fn default_max_len() -> usize { render::DEFAULT_MAX_LEN }
fn default_n_clusters() -> usize { 400 }
fn default_title() -> String { "LLM skill clusters".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_description() -> String {
    concat!(
        "This visualization accompanies the paper ",
        "<a href=\"https://arxiv.org/abs/2303.13506\">The Quantization Model of Neural Scaling</a>. ",
        "It lets you explore clusters of skill \"quanta\" for pythia-70m. ",
        "For n_clusters=400 the most interesting clusters are at index 50 and 100."
    )
    .to_string()
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            cluster_file: default_cluster_file(),
            context_file: default_context_file(),
            host: default_host(),
            port: default_port(),
            max_len: default_max_len(),
            default_n_clusters: default_n_clusters(),
            title: default_title(),
            description: default_description(),
            log_level: default_log_level(),
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config file, or use defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_len == 0 {
            return Err(ConfigError::Invalid("max_len must be at least 1".to_string()));
        }
        if self.cluster_file.as_os_str().is_empty() || self.context_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "cluster_file and context_file must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured log level, `INFO` if unrecognised
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ViewerConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_len, 150);
        assert_eq!(config.default_n_clusters, 400);
        assert_eq!(config.bind_addr(), "127.0.0.1:8501");
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_config_overrides() {
        let config = ViewerConfig::from_toml_str(
            r#"
            cluster_file = "data/clusters.json"
            context_file = "data/contexts.json"
            port = 9000
            max_len = 40
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.cluster_file, PathBuf::from("data/clusters.json"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_len, 40);
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_zero_max_len_rejected() {
        let err = ViewerConfig::from_toml_str("max_len = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_toml_rejected() {
        let err = ViewerConfig::from_toml_str("port = \"not a port\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = ViewerConfig::load(Path::new("/nonexistent/quanta.toml")).unwrap();
        assert_eq!(config.port, 8501);
    }
}
