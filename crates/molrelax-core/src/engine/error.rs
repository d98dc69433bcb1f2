use thiserror::Error;

use super::config::ConfigError;
use super::preoptimizer::PlacementError;
use super::utils::sampling::SamplingError;

/// Failures that abort a workflow. Energy evaluation failures are not among them: they
/// end up in the optimization result instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to construct initial geometry: {source}")]
    Placement {
        #[from]
        source: PlacementError,
    },

    #[error("Torsion sampling failed: {source}")]
    Sampling {
        #[from]
        source: SamplingError,
    },
}
