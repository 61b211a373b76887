use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use build_order_system_pips::PipConfig;
use build_order_system_tracker::TrackerConfig;
use serde::Deserialize;

/// Tunables loaded from the optional `--config` file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AppConfig {
    pub(crate) tracker: TrackerConfig,
    pub(crate) pips: PipConfig,
}

impl AppConfig {
    /// Reads the configuration file, falling back to defaults when absent.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.tracker.validate()?;
        let floor = config.pips.confidence_floor;
        ensure!(
            (0.0..=1.0).contains(&floor),
            "pip setting confidence_floor = {floor} is out of range"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let config = AppConfig::parse("[tracker]\nseconds_per_tick = 2.5\n").expect("valid config");
        assert!((config.tracker.seconds_per_tick - 2.5).abs() < f64::EPSILON);
        assert!((config.tracker.confidence_threshold - 0.95).abs() < f32::EPSILON);
        assert_eq!(config.pips, PipConfig::default());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(AppConfig::parse("[camera]\nfps = 30\n").is_err());
    }

    #[test]
    fn out_of_range_tunables_are_rejected() {
        for text in [
            "[tracker]\nseconds_per_tick = inf\n",
            "[tracker]\nseconds_per_tick = -1.0\n",
            "[tracker]\nsection_gap_seconds = nan\n",
            "[pips]\nconfidence_floor = 1.5\n",
        ] {
            let error = AppConfig::parse(text).expect_err("setting is out of range");
            assert!(error.to_string().contains("out of range"), "{error}");
        }
    }

    #[test]
    fn absent_file_means_defaults() {
        assert_eq!(AppConfig::load(None).expect("defaults"), AppConfig::default());
    }
}
