// Settings document for models, processes and their tables
use crate::error::ConfigError;
use crate::matrix_elements::Qcd;
use crate::table::Grid;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parsed settings document.
///
/// The document is a JSON object keyed by model name (e.g. `"Boltzmann"`).
/// Each model holds optional `QCD` and `integration` sections plus one
/// section per process, so a process name `"Boltzmann/Qq2Qq"` resolves to
/// `document["Boltzmann"]["Qq2Qq"]`. Lookups are validated lazily: a
/// process is only checked when something is constructed from it.
#[derive(Debug, Clone)]
pub struct Settings {
    document: Value,
}

/// Everything a process needs from its settings section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSettings {
    pub model: String,
    pub process: String,
    pub mass: f64,
    pub degeneracy: f64,
    pub active: bool,
    pub rate_grid: Option<GridSettings>,
    pub xsection_grid: Option<GridSettings>,
}

/// Grid bounds and resolution as written in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSettings {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub shape: Vec<usize>,
}

/// Numerical knobs shared by every process of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntegrationSettings {
    /// Relative tolerance of the adaptive cubature
    pub rel_tol: f64,
    /// Integrand evaluations allowed per cubature call
    pub max_evals: usize,
    pub vegas_calls: usize,
    pub vegas_iterations: usize,
    /// Rejection-sampling trial cutoff
    pub max_trials: usize,
    /// Base seed for the Monte Carlo integrals used while filling tables
    pub seed: u64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            rel_tol: 1e-3,
            max_evals: 50_000,
            vegas_calls: 4000,
            vegas_iterations: 6,
            max_trials: 1_000_000,
            seed: 0,
        }
    }
}

/// Split `"<model>/<process>"`.
pub fn split_name(name: &str) -> Result<(&str, &str), ConfigError> {
    match name.split_once('/') {
        Some((model, process)) if !model.is_empty() && !process.is_empty() && !process.contains('/') => {
            Ok((model, process))
        }
        _ => Err(ConfigError::InvalidName(name.to_string())),
    }
}

impl Settings {
    pub fn from_value(document: Value) -> Self {
        Self { document }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_value(serde_json::from_str(text)?))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn model(&self, model: &str) -> Result<&Value, ConfigError> {
        self.document
            .get(model)
            .filter(|v| v.is_object())
            .ok_or_else(|| ConfigError::MissingSection(model.to_string()))
    }

    /// Optional typed section of a model; absent means default.
    fn optional_section<T: DeserializeOwned + Default>(&self, model: &str, key: &str) -> Result<T, ConfigError> {
        match self.model(model)?.get(key) {
            None => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| ConfigError::MalformedField {
                process: model.to_string(),
                field: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn qcd(&self, model: &str) -> Result<Qcd, ConfigError> {
        self.optional_section(model, "QCD")
    }

    pub fn integration(&self, model: &str) -> Result<IntegrationSettings, ConfigError> {
        self.optional_section(model, "integration")
    }

    /// Resolve and validate the section of `"<model>/<process>"`.
    pub fn process(&self, name: &str) -> Result<ProcessSettings, ConfigError> {
        let (model, process) = split_name(name)?;
        let section = self
            .model(model)?
            .get(process)
            .filter(|v| v.is_object())
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;

        let missing = |field: &str| ConfigError::MissingField {
            process: name.to_string(),
            field: field.to_string(),
        };
        let malformed = |field: &str, reason: String| ConfigError::MalformedField {
            process: name.to_string(),
            field: field.to_string(),
            reason,
        };
        let number = |field: &str| -> Result<f64, ConfigError> {
            let value = section.get(field).ok_or_else(|| missing(field))?;
            value
                .as_f64()
                .ok_or_else(|| malformed(field, format!("expected a number, found {}", value)))
        };

        let mass = number("mass")?;
        if !(mass.is_finite() && mass > 0.0) {
            return Err(malformed("mass", format!("must be positive, got {}", mass)));
        }
        let degeneracy = number("degeneracy")?;
        if !(degeneracy.is_finite() && degeneracy > 0.0) {
            return Err(malformed("degeneracy", format!("must be positive, got {}", degeneracy)));
        }
        let active = match section.get("status").ok_or_else(|| missing("status"))? {
            Value::String(s) if s == "active" => true,
            Value::String(s) if s == "inactive" => false,
            other => {
                return Err(malformed(
                    "status",
                    format!("expected \"active\" or \"inactive\", found {}", other),
                ))
            }
        };
        let grid = |field: &str| -> Result<Option<GridSettings>, ConfigError> {
            match section.get(field) {
                None => Ok(None),
                Some(value) => serde_json::from_value(value.clone())
                    .map(Some)
                    .map_err(|e| malformed(field, e.to_string())),
            }
        };

        Ok(ProcessSettings {
            model: model.to_string(),
            process: process.to_string(),
            mass,
            degeneracy,
            active,
            rate_grid: grid("rate_grid")?,
            xsection_grid: grid("xsection_grid")?,
        })
    }
}

impl ProcessSettings {
    pub fn name(&self) -> String {
        format!("{}/{}", self.model, self.process)
    }

    pub fn rate_grid<const N: usize>(&self, default: Grid<N>) -> Result<Grid<N>, ConfigError> {
        resolve_grid(self.rate_grid.as_ref(), default, &format!("{}/rate", self.name()))
    }

    pub fn xsection_grid<const N: usize>(&self, default: Grid<N>) -> Result<Grid<N>, ConfigError> {
        resolve_grid(
            self.xsection_grid.as_ref(),
            default,
            &format!("{}/xsection", self.name()),
        )
    }
}

fn resolve_grid<const N: usize>(
    configured: Option<&GridSettings>,
    default: Grid<N>,
    table: &str,
) -> Result<Grid<N>, ConfigError> {
    let Some(g) = configured else {
        return Ok(default);
    };
    let to_array = |v: &[f64], what: &str| -> Result<[f64; N], ConfigError> {
        v.try_into().map_err(|_| ConfigError::InvalidGrid {
            table: table.to_string(),
            reason: format!("'{}' has {} entries, expected {}", what, v.len(), N),
        })
    };
    let lower = to_array(&g.lower, "lower")?;
    let upper = to_array(&g.upper, "upper")?;
    let shape: [usize; N] = g.shape.as_slice().try_into().map_err(|_| ConfigError::InvalidGrid {
        table: table.to_string(),
        reason: format!("'shape' has {} entries, expected {}", g.shape.len(), N),
    })?;
    Grid::new(lower, upper, shape).map_err(|e| match e {
        ConfigError::InvalidGrid { reason, .. } => ConfigError::InvalidGrid {
            table: table.to_string(),
            reason,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::from_value(json!({
            "Boltzmann": {
                "QCD": { "mu": 1.5, "nf": 3 },
                "Qq2Qq": { "status": "active", "mass": 1.3, "degeneracy": 36,
                           "rate_grid": { "lower": [2.0, 0.2], "upper": [10.0, 0.4], "shape": [5, 3] } },
                "Qqg2Qq": { "status": "inactive", "mass": 1.3, "degeneracy": 96 },
                "NoMass": { "status": "active", "degeneracy": 16 },
                "BadStatus": { "status": "on", "mass": 1.3, "degeneracy": 16 },
                "BadMass": { "status": "active", "mass": "heavy", "degeneracy": 16 },
                "BadGrid": { "status": "active", "mass": 1.3, "degeneracy": 16,
                             "rate_grid": { "lower": [2.0], "upper": [10.0], "shape": [5] } }
            }
        }))
    }

    #[test]
    fn test_process_settings() {
        let p = settings().process("Boltzmann/Qq2Qq").unwrap();
        assert_eq!(p.mass, 1.3);
        assert_eq!(p.degeneracy, 36.0);
        assert!(p.active);
        let grid = p.rate_grid(Grid::new([0.0; 2], [1.0; 2], [2; 2]).unwrap()).unwrap();
        assert_eq!(grid.shape, [5, 3]);
        assert!(!settings().process("Boltzmann/Qqg2Qq").unwrap().active);
    }

    #[test]
    fn test_missing_and_malformed_fields() {
        let s = settings();
        assert!(matches!(
            s.process("Boltzmann/NoMass"),
            Err(ConfigError::MissingField { ref field, .. }) if field == "mass"
        ));
        assert!(matches!(
            s.process("Boltzmann/BadStatus"),
            Err(ConfigError::MalformedField { ref field, .. }) if field == "status"
        ));
        assert!(matches!(
            s.process("Boltzmann/BadMass"),
            Err(ConfigError::MalformedField { ref field, .. }) if field == "mass"
        ));
        assert!(matches!(s.process("Boltzmann/Nothing"), Err(ConfigError::MissingSection(_))));
        assert!(matches!(s.process("Other/Qq2Qq"), Err(ConfigError::MissingSection(_))));
        assert!(matches!(s.process("Qq2Qq"), Err(ConfigError::InvalidName(_))));
    }

    #[test]
    fn test_grid_dimension_mismatch() {
        let p = settings().process("Boltzmann/BadGrid").unwrap();
        let default = Grid::new([0.0; 2], [1.0; 2], [2; 2]).unwrap();
        assert!(matches!(p.rate_grid(default), Err(ConfigError::InvalidGrid { .. })));
    }

    #[test]
    fn test_optional_sections_default() {
        let s = settings();
        assert_eq!(s.integration("Boltzmann").unwrap(), IntegrationSettings::default());
        assert_eq!(s.qcd("Boltzmann").unwrap().mu, 1.5);
    }
}
