use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::{TransferOptions, DEFAULT_PART_SIZE, DEFAULT_WORKERS};
use crate::store::S3Settings;

/// Global configuration loaded from `~/.config/txl/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxlConfig {
    /// Base URL of the transfer broker (credentials and listings). Must end with `/`.
    pub broker_url: String,
    /// Object store host used when the broker does not name one.
    pub default_endpoint: String,
    /// SigV4 signing region.
    pub region: String,
    /// Talk https (true) or plain http (false) to the object store.
    pub secure: bool,
    /// Bytes per ranged request.
    pub part_size_bytes: u64,
    /// Concurrent range fetches per download.
    pub workers: usize,
    /// Maximum parts fetched but not yet written; defaults to `workers`.
    #[serde(default)]
    pub flow_ceiling: Option<usize>,
    pub connect_timeout_secs: u64,
}

impl Default for TxlConfig {
    fn default() -> Self {
        Self {
            broker_url: "http://txl.transferxl.com/".to_string(),
            default_endpoint: "s3.wasabisys.com".to_string(),
            region: "us-east-1".to_string(),
            secure: true,
            part_size_bytes: DEFAULT_PART_SIZE,
            workers: DEFAULT_WORKERS,
            flow_ceiling: None,
            connect_timeout_secs: 30,
        }
    }
}

impl TxlConfig {
    /// Pipeline options for one download. Not validated here; the pipeline
    /// rejects zero values with `TransferError::InvalidOptions`.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions::new(self.part_size_bytes, self.workers)
            .with_flow_ceiling(self.flow_ceiling.unwrap_or(self.workers))
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            region: self.region.clone(),
            secure: self.secure,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("txl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TxlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TxlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TxlConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TxlConfig::default();
        assert_eq!(cfg.broker_url, "http://txl.transferxl.com/");
        assert_eq!(cfg.default_endpoint, "s3.wasabisys.com");
        assert_eq!(cfg.part_size_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.workers, 16);
        assert!(cfg.flow_ceiling.is_none());
        assert!(cfg.secure);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TxlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TxlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            broker_url = "http://127.0.0.1:8080/"
            default_endpoint = "127.0.0.1:9000"
            region = "eu-central-1"
            secure = false
            part_size_bytes = 8_388_608
            workers = 4
            connect_timeout_secs = 5
        "#;
        let cfg: TxlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.default_endpoint, "127.0.0.1:9000");
        assert_eq!(cfg.part_size_bytes, 8 * 1024 * 1024);
        assert_eq!(cfg.workers, 4);
        assert!(!cfg.secure);
        assert!(cfg.flow_ceiling.is_none());

        let opts = cfg.transfer_options();
        assert_eq!(opts.part_size, 8 * 1024 * 1024);
        assert_eq!(opts.workers, 4);
        assert_eq!(opts.flow_ceiling, 4);

        let s3 = cfg.s3_settings();
        assert_eq!(s3.region, "eu-central-1");
        assert_eq!(s3.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_toml_flow_ceiling() {
        let toml = r#"
            broker_url = "http://txl.transferxl.com/"
            default_endpoint = "s3.wasabisys.com"
            region = "us-east-1"
            secure = true
            part_size_bytes = 1048576
            workers = 8
            flow_ceiling = 32
            connect_timeout_secs = 30
        "#;
        let cfg: TxlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.flow_ceiling, Some(32));
        assert_eq!(cfg.transfer_options().flow_ceiling, 32);
    }

    #[test]
    fn zero_workers_fail_validation() {
        let cfg = TxlConfig {
            workers: 0,
            ..TxlConfig::default()
        };
        assert!(cfg.transfer_options().validate().is_err());
    }
}
