use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::n64_controller::{InvalidTiming, Timing};
use crate::sim_line::{Reply, SimulatedLine};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] InvalidTiming),
}

/// Settings for the simulated controller used on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub read_cost_ns: u64,
    pub reply_delay_us: u32,
    pub replies: Vec<Reply>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            read_cost_ns: 250,
            reply_delay_us: 2,
            replies: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Build a line with the configured costs. Replies are not queued.
    pub fn line(&self, timing: Timing) -> SimulatedLine {
        SimulatedLine::new(timing)
            .with_read_cost_ns(self.read_cost_ns)
            .with_reply_delay_us(self.reply_delay_us)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub timing: Timing,
    pub poll_interval_ms: u64,
    pub simulation: SimulationConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            poll_interval_ms: 16,
            simulation: SimulationConfig::default(),
        }
    }
}

impl LinkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: LinkConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::n64_controller::N64State;

    #[test]
    fn empty_document_uses_defaults() {
        let config = LinkConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, LinkConfig::default());
        assert_eq!(config.timing.polling_delay_ns, 25);
        assert_eq!(config.timing.edge_timeout_us, 20);
    }

    #[test]
    fn partial_timing_keeps_other_defaults() {
        let config = LinkConfig::from_yaml_str(
            "
timing:
  polling_delay_ns: 40
  edge_timeout_us: 50
poll_interval_ms: 5
",
        )
        .unwrap();

        assert_eq!(config.timing.polling_delay_ns, 40);
        assert_eq!(config.timing.edge_timeout_us, 50);
        assert_eq!(config.timing.sample_delay_us, 2);
        assert_eq!(config.poll_interval_ms, 5);
    }

    #[test]
    fn rejects_sample_point_outside_cell() {
        let err = LinkConfig::from_yaml_str(
            "
timing:
  sample_delay_us: 3
",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_polling_delay() {
        let err = LinkConfig::from_yaml_str("timing: { polling_delay_ns: 0 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_polling_delay_as_long_as_a_pulse() {
        let err = LinkConfig::from_yaml_str("timing: { polling_delay_ns: 1000 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_edge_timeout_shorter_than_a_cell() {
        let err = LinkConfig::from_yaml_str("timing: { edge_timeout_us: 3 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(LinkConfig::from_yaml_str("timing: { edge_timeout_us: 4 }").is_ok());
    }

    #[test]
    fn rejects_zero_pulses_without_overflow() {
        let err = LinkConfig::from_yaml_str(
            "timing: { short_pulse_us: 0, long_pulse_us: 0, sample_delay_us: 0 }",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let huge = format!(
            "timing: {{ short_pulse_us: {}, long_pulse_us: {}, sample_delay_us: {} }}",
            u32::MAX - 2,
            u32::MAX,
            u32::MAX - 1
        );
        let err = LinkConfig::from_yaml_str(&huge).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn reports_parse_errors() {
        let err = LinkConfig::from_yaml_str("poll_interval_ms: fast").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "
simulation:
  read_cost_ns: 100
  replies:
    - reply: report
      state: {{ data1: 16 }}
    - reply: held_low
"
        )
        .unwrap();

        let config = LinkConfig::load(file.path()).unwrap();
        assert_eq!(config.simulation.read_cost_ns, 100);
        assert_eq!(
            config.simulation.replies,
            vec![
                Reply::Report {
                    state: N64State {
                        data1: 16,
                        ..N64State::default()
                    }
                },
                Reply::HeldLow,
            ]
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinkConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
