use std::path::PathBuf;

use anyhow::{bail, Context};
use marketfeed_market_data::CollectorConfig;

/// Whether to run a single cycle or loop until stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Scheduled,
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "scheduled" => Ok(Self::Scheduled),
            other => bail!("Invalid MF_MODE '{other}', expected 'once' or 'scheduled'"),
        }
    }
}

/// Process settings read from the environment (and `.env`).
pub struct Config {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub mode: RunMode,
    pub interval_minutes: Option<u64>,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config_path = std::env::var("MF_CONFIG").ok().map(PathBuf::from);
        let data_dir = std::env::var("MF_DATA_DIR").ok().map(PathBuf::from);
        let mode = std::env::var("MF_MODE")
            .unwrap_or_else(|_| "scheduled".into())
            .parse()?;
        let interval_minutes = match std::env::var("MF_INTERVAL_MINUTES") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("Invalid MF_INTERVAL_MINUTES '{raw}'"))?,
            ),
            Err(_) => None,
        };
        let log_format = std::env::var("MF_LOG_FORMAT").unwrap_or_else(|_| "text".into());
        Ok(Self {
            config_path,
            data_dir,
            mode,
            interval_minutes,
            log_format,
        })
    }

    /// The collector configuration: the JSON file if one is set (defaults
    /// otherwise), with environment overrides applied on top.
    pub fn collector_config(&self) -> anyhow::Result<CollectorConfig> {
        let mut collector = match &self.config_path {
            Some(path) => CollectorConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => CollectorConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            collector.data_dir = dir.clone();
        }
        if let Some(minutes) = self.interval_minutes {
            collector.interval_minutes = minutes;
        }
        Ok(collector)
    }
}
