use crate::clock::Millis;
use crate::indicator::{DEFAULT_DEBOUNCE_MS, MIN_DEBOUNCE_MS};
use crate::intersection::{self, ConfigurationError, Phase};
use crate::layouts;
use crate::signal::LightId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_INSIM_HOST: &str = "127.0.0.1";
pub const DEFAULT_INSIM_PORT: u16 = 29999;
pub const DEFAULT_OUTGAUGE_HOST: &str = "127.0.0.1";
pub const DEFAULT_OUTGAUGE_PORT: u16 = 29998;
pub const DEFAULT_INTERFACE_NAME: &str = "Driving InSim";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("intersection '{name}': {source}")]
    Intersection {
        name: String,
        #[source]
        source: ConfigurationError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InSimConfig {
    pub host: String,
    pub port: u16,
    pub admin: String,
    pub name: String,
}

impl Default for InSimConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_INSIM_HOST.to_string(),
            port: DEFAULT_INSIM_PORT,
            admin: String::new(),
            name: DEFAULT_INTERFACE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutGaugeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for OutGaugeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OUTGAUGE_HOST.to_string(),
            port: DEFAULT_OUTGAUGE_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub debounce_ms: Millis,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionConfig {
    #[serde(default)]
    pub name: String,
    pub lights: Vec<LightId>,
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub insim: InSimConfig,
    pub outgauge: OutGaugeConfig,
    pub indicators: IndicatorConfig,
    pub intersections: Vec<IntersectionConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            insim: InSimConfig::default(),
            outgauge: OutGaugeConfig::default(),
            indicators: IndicatorConfig::default(),
            intersections: vec![layouts::crossroads()],
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indicators.debounce_ms < MIN_DEBOUNCE_MS {
            return Err(ConfigError::InvalidValue {
                field: "indicators.debounce_ms",
                reason: format!("must be at least {MIN_DEBOUNCE_MS} ms, longer than one blink"),
            });
        }

        if self.insim.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "insim.host",
                reason: "must not be empty".to_string(),
            });
        }

        // ISI carries a 16 byte admin password and interface name, NUL included
        if self.insim.admin.len() > 15 {
            return Err(ConfigError::InvalidValue {
                field: "insim.admin",
                reason: "at most 15 bytes".to_string(),
            });
        }
        if self.insim.name.len() > 15 {
            return Err(ConfigError::InvalidValue {
                field: "insim.name",
                reason: "at most 15 bytes".to_string(),
            });
        }

        for intersection in &self.intersections {
            intersection::validate(&intersection.lights, &intersection.phases).map_err(|source| {
                ConfigError::Intersection {
                    name: intersection.name.clone(),
                    source,
                }
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::LogicalColor;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.insim.port, 29999);
        assert_eq!(config.outgauge.port, 29998);
        assert_eq!(config.indicators.debounce_ms, 1100);
        assert_eq!(config.intersections.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = AppConfig::from_json_str(r#"{ "insim": { "port": 30000 } }"#).unwrap();
        assert_eq!(config.insim.port, 30000);
        assert_eq!(config.insim.host, "127.0.0.1");
        assert_eq!(config.intersections.len(), 1);
    }

    #[test]
    fn test_intersections_from_json() {
        let json = r#"{
            "intersections": [
                { "name": "junction", "lights": [10, 11], "phases": [
                    { "duration_s": 4, "colors": ["GO", "STOP*"] },
                    { "duration_s": 1.5, "colors": ["GO_WAIT__"] }
                ] }
            ]
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();

        let junction = &config.intersections[0];
        assert_eq!(junction.lights, vec![10, 11]);
        assert_eq!(junction.phases[0].colors, vec![LogicalColor::Go, LogicalColor::StopTransitioning]);
        assert_eq!(junction.phases[1].duration_ms(), 1500);
    }

    #[test]
    fn test_invalid_intersection_is_named() {
        let json = r#"{ "intersections": [ { "name": "broken", "lights": [1], "phases": [] } ] }"#;
        let err = AppConfig::from_json_str(json).unwrap_err();
        match err {
            ConfigError::Intersection { name, source } => {
                assert_eq!(name, "broken");
                assert_eq!(source, ConfigurationError::NoPhases);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let err = AppConfig::from_json_str(r#"{ "indicators": { "debounce_ms": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "indicators.debounce_ms", .. }));
    }

    #[test]
    fn test_debounce_shorter_than_a_blink_rejected() {
        let mut config = AppConfig::default();

        config.indicators.debounce_ms = 50;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "indicators.debounce_ms", .. })
        ));

        config.indicators.debounce_ms = MIN_DEBOUNCE_MS - 1;
        assert!(config.validate().is_err());

        config.indicators.debounce_ms = MIN_DEBOUNCE_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_original_phase_field_names() {
        let json = r#"{
            "intersections": [
                { "name": "legacy", "lights": [1, 2], "phases": [
                    { "time": 5, "states": ["STOP_", "OFF__"] },
                    { "time": 2, "states": ["GO*__", "STOP*"] }
                ] }
            ]
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();

        let phases = &config.intersections[0].phases;
        assert_eq!(phases[0].duration_ms(), 5000);
        assert_eq!(phases[0].colors, vec![LogicalColor::Stop, LogicalColor::Off]);
        assert_eq!(
            phases[1].colors,
            vec![LogicalColor::GoTransitioning, LogicalColor::StopTransitioning]
        );
    }

    #[test]
    fn test_long_admin_rejected() {
        let mut config = AppConfig::default();
        config.insim.admin = "a-very-long-password".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(AppConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_round_trip_through_pretty_json() {
        let config = AppConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(AppConfig::from_json_str(&json).unwrap(), config);
    }
}
