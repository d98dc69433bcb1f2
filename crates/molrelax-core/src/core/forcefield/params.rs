use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Force constants of the reference harmonic force field.
///
/// Energies are in kcal/mol, lengths in Angstroms and angles in radians.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ForceFieldParams {
    /// Bond stretch constant, kcal/(mol*A^2).
    pub bond_force_constant: f64,
    /// Angle bend constant, kcal/(mol*rad^2).
    pub angle_force_constant: f64,
    /// Non-bonded wall constant, kcal/(mol*A^2).
    pub repulsion_force_constant: f64,
    /// Fraction of the van der Waals radius sum below which non-bonded atoms repel.
    pub repulsion_scale: f64,
}

impl Default for ForceFieldParams {
    fn default() -> Self {
        Self {
            bond_force_constant: 300.0,
            angle_force_constant: 60.0,
            repulsion_force_constant: 10.0,
            repulsion_scale: 0.75,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

impl ForceFieldParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}
