use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        parameter,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    #[default]
    Lbfgs,
    ConjugateGradient,
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lbfgs" | "l-bfgs" => Ok(Method::Lbfgs),
            "cg" | "conjugate-gradient" => Ok(Method::ConjugateGradient),
            _ => Err(ConfigError::UnknownVariant {
                kind: "optimization method",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Lbfgs => write!(f, "lbfgs"),
            Method::ConjugateGradient => write!(f, "conjugate-gradient"),
        }
    }
}

/// Bound on the number of `(s, y)` pairs kept by L-BFGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbfgsMemory {
    /// One pair per degree of freedom.
    DegreesOfFreedom,
    /// A fixed window, capped at the degree-of-freedom count.
    Window(usize),
}

impl Default for LbfgsMemory {
    fn default() -> Self {
        LbfgsMemory::Window(16)
    }
}

impl LbfgsMemory {
    pub fn resolve(self, dof: usize) -> usize {
        match self {
            LbfgsMemory::DegreesOfFreedom => dof.max(1),
            LbfgsMemory::Window(m) => m.min(dof).max(1),
        }
    }
}

/// Constants of the shared line search. Step bounds are in coordinate length units (Angstroms).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchConfig {
    pub step_min: f64,
    pub step_max: f64,
    /// Accept a step once `|slope / initial_slope|` drops to this value.
    pub curvature: f64,
    pub max_bracket_steps: usize,
    pub max_refine_steps: usize,
    /// Upper bound on how much one bracketing step may grow relative to the previous one.
    pub growth_limit: f64,
    pub reverse_probe: bool,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            step_min: 1e-6,
            step_max: 0.1,
            curvature: 0.9,
            max_bracket_steps: 10,
            max_refine_steps: 10,
            growth_limit: 10.0,
            reverse_probe: true,
        }
    }
}

impl LineSearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step_min > 0.0 && self.step_min <= self.step_max) {
            return Err(invalid("step_min", "must be positive and not exceed step_max"));
        }
        if !(self.curvature > 0.0 && self.curvature < 1.0) {
            return Err(invalid("curvature", "must lie in (0, 1)"));
        }
        if self.growth_limit < 1.0 {
            return Err(invalid("growth_limit", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub method: Method,
    pub max_iterations: usize,
    /// Wall-clock budget, checked at the top of each iteration.
    pub max_time: Option<Duration>,
    /// Convergence threshold on `sqrt(sum(g^2) / dof)`.
    pub min_rms: f64,
    pub line_search: LineSearchConfig,
    pub lbfgs_memory: LbfgsMemory,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            max_iterations: 1000,
            max_time: None,
            min_rms: 1e-3,
            line_search: LineSearchConfig::default(),
            lbfgs_memory: LbfgsMemory::default(),
        }
    }
}

#[derive(Default)]
pub struct OptimizerConfigBuilder {
    method: Option<Method>,
    max_iterations: Option<usize>,
    max_time: Option<Duration>,
    min_rms: Option<f64>,
    line_search: Option<LineSearchConfig>,
    lbfgs_memory: Option<LbfgsMemory>,
}

impl OptimizerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn max_time(mut self, duration: Duration) -> Self {
        self.max_time = Some(duration);
        self
    }
    pub fn min_rms(mut self, rms: f64) -> Self {
        self.min_rms = Some(rms);
        self
    }
    pub fn line_search(mut self, config: LineSearchConfig) -> Self {
        self.line_search = Some(config);
        self
    }
    pub fn lbfgs_memory(mut self, memory: LbfgsMemory) -> Self {
        self.lbfgs_memory = Some(memory);
        self
    }

    pub fn build(self) -> Result<OptimizerConfig, ConfigError> {
        let defaults = OptimizerConfig::default();
        let config = OptimizerConfig {
            method: self.method.unwrap_or(defaults.method),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_time: self.max_time.or(defaults.max_time),
            min_rms: self.min_rms.unwrap_or(defaults.min_rms),
            line_search: self.line_search.unwrap_or(defaults.line_search),
            lbfgs_memory: self.lbfgs_memory.unwrap_or(defaults.lbfgs_memory),
        };
        config.validate()?;
        Ok(config)
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_rms.is_finite() && self.min_rms >= 0.0) {
            return Err(invalid("min_rms", "must be a finite non-negative number"));
        }
        if let LbfgsMemory::Window(0) = self.lbfgs_memory {
            return Err(invalid("lbfgs_memory", "window must hold at least one pair"));
        }
        self.line_search.validate()
    }
}

/// Which coordinates the optimizer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Parameterization {
    /// Every movable atom, three coordinates each.
    #[default]
    Cartesian,
    /// Translation and rotation of each connected fragment.
    Rigid,
    /// One angle per rotatable bond.
    Torsional,
    /// Rotatable bonds plus a rigid-body motion per fragment.
    TorsionalRigid,
}

impl FromStr for Parameterization {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cartesian" => Ok(Parameterization::Cartesian),
            "rigid" => Ok(Parameterization::Rigid),
            "torsional" => Ok(Parameterization::Torsional),
            "torsional-rigid" => Ok(Parameterization::TorsionalRigid),
            _ => Err(ConfigError::UnknownVariant {
                kind: "parameterization",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Parameterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameterization::Cartesian => "cartesian",
            Parameterization::Rigid => "rigid",
            Parameterization::Torsional => "torsional",
            Parameterization::TorsionalRigid => "torsional-rigid",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreOptimizerConfig {
    /// Position of the first seeded atom. `None` picks the best random trial.
    pub origin: Option<Point3<f64>>,
    pub seed_trials: usize,
    /// Angular step of the placement grids, in radians.
    pub angular_resolution: f64,
    /// `None` draws the generator seed from entropy.
    pub seed: Option<u64>,
}

impl Default for PreOptimizerConfig {
    fn default() -> Self {
        Self {
            origin: None,
            seed_trials: 10,
            angular_resolution: PI / 64.0,
            seed: None,
        }
    }
}

impl PreOptimizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.angular_resolution > 0.0 && self.angular_resolution <= PI) {
            return Err(invalid("angular_resolution", "must lie in (0, PI]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaxConfig {
    pub optimizer: OptimizerConfig,
    pub parameterization: Parameterization,
    /// Run the pre-optimizer before minimization. Atoms still at the origin are placed.
    pub preoptimize: bool,
    pub preoptimizer: PreOptimizerConfig,
}

#[derive(Default)]
pub struct RelaxConfigBuilder {
    optimizer: Option<OptimizerConfig>,
    parameterization: Option<Parameterization>,
    preoptimize: Option<bool>,
    preoptimizer: Option<PreOptimizerConfig>,
}

impl RelaxConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimizer(mut self, config: OptimizerConfig) -> Self {
        self.optimizer = Some(config);
        self
    }
    pub fn parameterization(mut self, parameterization: Parameterization) -> Self {
        self.parameterization = Some(parameterization);
        self
    }
    pub fn preoptimize(mut self, enabled: bool) -> Self {
        self.preoptimize = Some(enabled);
        self
    }
    pub fn preoptimizer(mut self, config: PreOptimizerConfig) -> Self {
        self.preoptimizer = Some(config);
        self
    }

    pub fn build(self) -> Result<RelaxConfig, ConfigError> {
        let config = RelaxConfig {
            optimizer: self.optimizer.unwrap_or_default(),
            parameterization: self
                .parameterization
                .ok_or(ConfigError::MissingParameter("parameterization"))?,
            preoptimize: self.preoptimize.unwrap_or(false),
            preoptimizer: self.preoptimizer.unwrap_or_default(),
        };
        config.optimizer.validate()?;
        config.preoptimizer.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConformerSearchConfig {
    /// Number of distinct conformers requested.
    pub count: usize,
    /// Candidate budget per requested conformer.
    pub attempts_per_conformer: usize,
    /// Per-bond torsion tolerance in radians below which two conformers are duplicates.
    pub tolerance: f64,
    pub relax: RelaxConfig,
    pub seed: Option<u64>,
}

impl ConformerSearchConfig {
    pub fn max_attempts(&self) -> usize {
        self.count.saturating_mul(self.attempts_per_conformer)
    }
}

#[derive(Default)]
pub struct ConformerSearchConfigBuilder {
    count: Option<usize>,
    attempts_per_conformer: Option<usize>,
    tolerance: Option<f64>,
    relax: Option<RelaxConfig>,
    seed: Option<u64>,
}

impl ConformerSearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
    pub fn attempts_per_conformer(mut self, attempts: usize) -> Self {
        self.attempts_per_conformer = Some(attempts);
        self
    }
    pub fn tolerance(mut self, radians: f64) -> Self {
        self.tolerance = Some(radians);
        self
    }
    pub fn relax(mut self, config: RelaxConfig) -> Self {
        self.relax = Some(config);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<ConformerSearchConfig, ConfigError> {
        let count = self.count.ok_or(ConfigError::MissingParameter("count"))?;
        if count == 0 {
            return Err(invalid("count", "at least one conformer must be requested"));
        }
        let attempts_per_conformer = self.attempts_per_conformer.unwrap_or(10);
        if attempts_per_conformer == 0 {
            return Err(invalid("attempts_per_conformer", "must be positive"));
        }
        let tolerance = self.tolerance.unwrap_or(30f64.to_radians());
        if !(tolerance > 0.0 && tolerance < PI) {
            return Err(invalid("tolerance", "must lie in (0, PI)"));
        }
        let relax = match self.relax {
            Some(relax) => relax,
            None => RelaxConfigBuilder::new()
                .parameterization(Parameterization::Torsional)
                .build()?,
        };
        Ok(ConformerSearchConfig {
            count,
            attempts_per_conformer,
            tolerance,
            relax,
            seed: self.seed,
        })
    }
}
