use crate::config::Settings;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Probe run: a population of identical heavy quarks in a static medium.
///
/// Read from the optional top-level `"probe"` section of the settings
/// document. Times are in fm/c, energies in GeV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSettings {
    pub particles: usize,
    pub steps: usize,
    pub dt: f64,
    pub e0: f64,
    pub mass: f64,
    pub pid: i32,
    pub temperature: f64,
    /// Record a snapshot every `record_every` steps
    pub record_every: usize,
    pub seed: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            particles: 1000,
            steps: 500,
            dt: 0.01,
            e0: 10.0,
            mass: 1.3,
            pid: 4,
            temperature: 0.3,
            record_every: 10,
            seed: 1,
        }
    }
}

impl ProbeSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let probe: Self = match settings.document().get("probe") {
            None => Self::default(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| ConfigError::MalformedField {
                process: "probe".to_string(),
                field: "probe".to_string(),
                reason: e.to_string(),
            })?,
        };
        if !(probe.e0 > probe.mass && probe.temperature > 0.0 && probe.dt > 0.0) {
            return Err(ConfigError::MalformedField {
                process: "probe".to_string(),
                field: "e0".to_string(),
                reason: "requires e0 > mass, temperature > 0 and dt > 0".to_string(),
            });
        }
        Ok(probe)
    }
}
