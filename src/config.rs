//! Analyzer configuration.
//!
//! Every default reproduces the literal behavior of the report scripts this
//! tool feeds: a 60 second rate window, a x2 burst multiplier and the
//! `Flags [S]` SYN marker.

use std::env;
use std::path::Path;
use std::str::FromStr;

use dotenv::dotenv;
use serde::{Deserialize, Serialize};

use crate::error::{DumpstatError, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub detection: DetectionSettings,
    pub rate: RateSettings,
    pub extraction: ExtractionSettings,
    pub ingest: IngestSettings,
    pub report: ReportSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Threshold is this many times the mean per-source packet count.
    pub burst_multiplier: f64,
    /// Substring of the info text that marks a TCP SYN.
    pub syn_marker: String,
    pub anomaly_timestamp: AnomalyTimestamp,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            burst_multiplier: 2.0,
            syn_marker: "Flags [S]".to_string(),
            anomaly_timestamp: AnomalyTimestamp::CaptureStart,
        }
    }
}

/// Which timestamp a burst event carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyTimestamp {
    /// First record of the whole capture.
    CaptureStart,
    /// First record sent by the flagged source.
    FirstSeen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    Fixed,
    Measured,
}

impl FromStr for RateMode {
    type Err = DumpstatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(RateMode::Fixed),
            "measured" => Ok(RateMode::Measured),
            other => Err(DumpstatError::Config(format!("unknown rate mode '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateSettings {
    pub mode: RateMode,
    /// Window used in fixed mode, and as the fallback when a measured span is empty.
    pub window_seconds: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            mode: RateMode::Fixed,
            window_seconds: 60.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Lines containing one of these get a protocol tag.
    pub family_markers: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            family_markers: vec!["IP".to_string(), "ARP".to_string(), "STP".to_string()],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub workers: usize,
    pub min_lines_per_worker: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            min_lines_per_worker: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub top_n: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

impl AnalyzerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DumpstatError::Config(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DumpstatError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides (and `.env`) applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        dotenv().ok();

        if let Ok(val) = env::var("DUMPSTAT_WORKERS") {
            self.ingest.workers = val
                .parse()
                .map_err(|_| DumpstatError::Config(format!("DUMPSTAT_WORKERS: bad value '{}'", val)))?;
        }
        if let Ok(val) = env::var("DUMPSTAT_RATE_MODE") {
            self.rate.mode = val.parse()?;
        }
        if let Ok(val) = env::var("DUMPSTAT_BURST_MULTIPLIER") {
            self.detection.burst_multiplier = val.parse().map_err(|_| {
                DumpstatError::Config(format!("DUMPSTAT_BURST_MULTIPLIER: bad value '{}'", val))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.detection.burst_multiplier > 0.0) {
            return Err(DumpstatError::Config(
                "detection.burst_multiplier must be positive".to_string(),
            ));
        }
        if !(self.rate.window_seconds > 0.0) {
            return Err(DumpstatError::Config(
                "rate.window_seconds must be positive".to_string(),
            ));
        }
        if self.detection.syn_marker.is_empty() {
            return Err(DumpstatError::Config("detection.syn_marker is empty".to_string()));
        }
        Ok(())
    }
}
