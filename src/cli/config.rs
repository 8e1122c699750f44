//! TOML configuration file support.
//!
//! Settings that would otherwise be repeated on every invocation can live in a
//! config file; command-line flags override them:
//!
//! ```toml
//! # msqc.toml
//! [store]
//! root = "runs"
//! format = "parquet"
//!
//! [gather]
//! workers = 8
//!
//! [delta]
//! in_run_reference = "median"
//! rt_window = 0.1
//! delta_mz_ppm_fail = 10.0
//!
//! [catalog]
//! path = "catalog.toml"
//! ```

use anyhow::{Context, Result};
use msqc::catalog::ReferenceCatalog;
use msqc::delta::DeltaSettings;
use msqc::pipeline::{PipelineConfig, DEFAULT_WORKERS};
use msqc::store::StoreFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "msqc.toml";

/// Store root used when neither flag nor config names one
pub const DEFAULT_ROOT: &str = "runs";

/// Root configuration structure for msqc.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Where run tables live.
    #[serde(default)]
    pub store: StoreConfig,

    /// Table fetch settings.
    #[serde(default)]
    pub gather: GatherConfig,

    /// Delta reference and tolerances.
    #[serde(default)]
    pub delta: DeltaSettings,

    /// Reference catalog source.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// `[store]` section.
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one sub-directory per run.
    pub root: Option<PathBuf>,

    /// Table file format.
    pub format: Option<StoreFormat>,
}

/// `[gather]` section.
#[derive(Debug, Default, Deserialize)]
pub struct GatherConfig {
    /// Concurrent table fetches.
    pub workers: Option<usize>,
}

/// `[catalog]` section.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogConfig {
    /// Catalog TOML file; the builtin catalog is used when absent.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Explicit config file, else `msqc.toml` if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Store root, flag first
    pub fn store_root(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.store.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    /// Store format, flag first
    pub fn store_format(&self, flag: Option<StoreFormat>) -> StoreFormat {
        flag.or(self.store.format).unwrap_or_default()
    }

    /// Pipeline settings, `workers` flag first
    pub fn pipeline_config(&self, workers: Option<usize>) -> PipelineConfig {
        PipelineConfig {
            workers: workers.or(self.gather.workers).unwrap_or(DEFAULT_WORKERS).max(1),
            delta: self.delta.clone(),
        }
    }

    /// Catalog from `[catalog] path`, or the builtin one
    pub fn load_catalog(&self) -> Result<ReferenceCatalog> {
        match &self.catalog.path {
            Some(path) => ReferenceCatalog::from_toml_file(path)
                .with_context(|| format!("Failed to load catalog: {}", path.display())),
            None => Ok(ReferenceCatalog::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msqc::delta::InRunReference;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [store]
            root = "/data/runs"
            format = "parquet"

            [gather]
            workers = 4

            [delta]
            in_run_reference = "QC01_HILIC_Pos_1"
            rt_window = 0.2
            delta_mz_ppm_fail = 12.0

            [catalog]
            path = "catalog.toml"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.store.root, Some(PathBuf::from("/data/runs")));
        assert_eq!(config.store.format, Some(StoreFormat::Parquet));
        assert_eq!(config.gather.workers, Some(4));
        assert_eq!(
            config.delta.in_run_reference,
            InRunReference::Injection("QC01_HILIC_Pos_1".to_string())
        );
        assert_eq!(config.delta.rt_window, 0.2);
        assert_eq!(config.delta.tolerances.delta_mz_ppm_fail, 12.0);
        assert_eq!(config.delta.tolerances.delta_rt_fail, 0.2);
        assert_eq!(config.catalog.path, Some(PathBuf::from("catalog.toml")));
    }

    #[test]
    fn test_flags_override_file() {
        let config = Config::from_str("[store]\nroot = \"a\"\n[gather]\nworkers = 2\n").unwrap();
        assert_eq!(config.store_root(Some(PathBuf::from("b"))), PathBuf::from("b"));
        assert_eq!(config.store_root(None), PathBuf::from("a"));
        assert_eq!(config.pipeline_config(None).workers, 2);
        assert_eq!(config.pipeline_config(Some(6)).workers, 6);
        assert_eq!(config.store_format(Some(StoreFormat::Parquet)), StoreFormat::Parquet);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.store_root(None), PathBuf::from(DEFAULT_ROOT));
        assert_eq!(config.store_format(None), StoreFormat::Csv);
        assert_eq!(config.pipeline_config(None), PipelineConfig::default());
        assert!(config.load_catalog().is_ok());
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::from_file(Path::new("/nonexistent/msqc.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
