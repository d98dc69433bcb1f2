use crate::cli::{ConformerArgs, OptimizerArgs, RelaxArgs};
use crate::error::{CliError, Result};
use molrelax::core::forcefield::params::ForceFieldParams;
use molrelax::engine::config::{
    self as core_config, ConformerSearchConfig, LbfgsMemory, LineSearchConfig, Method,
    OptimizerConfig, Parameterization, PreOptimizerConfig, RelaxConfig,
};
use nalgebra::Point3;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(untagged)]
enum PartialMemory {
    Window(usize),
    Keyword(MemoryKeyword),
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
enum MemoryKeyword {
    DegreesOfFreedom,
}

impl From<PartialMemory> for LbfgsMemory {
    fn from(p: PartialMemory) -> Self {
        match p {
            PartialMemory::Window(m) => LbfgsMemory::Window(m),
            PartialMemory::Keyword(MemoryKeyword::DegreesOfFreedom) => LbfgsMemory::DegreesOfFreedom,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLineSearchConfig {
    step_min: Option<f64>,
    step_max: Option<f64>,
    curvature: Option<f64>,
    max_bracket_steps: Option<usize>,
    max_refine_steps: Option<usize>,
    growth_limit: Option<f64>,
    reverse_probe: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialOptimizerConfig {
    method: Option<Method>,
    max_iterations: Option<usize>,
    max_time_seconds: Option<f64>,
    min_rms: Option<f64>,
    lbfgs_memory: Option<PartialMemory>,
    line_search: Option<PartialLineSearchConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRelaxConfig {
    parameterization: Option<Parameterization>,
    preoptimize: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialPreOptimizerConfig {
    origin: Option<[f64; 3]>,
    seed_trials: Option<usize>,
    angular_resolution_degrees: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialConformerConfig {
    count: Option<usize>,
    attempts_per_conformer: Option<usize>,
    tolerance_degrees: Option<f64>,
    seed: Option<u64>,
}

/// The configuration file as written by the user: every field optional, merged later with
/// command-line flags and built-in defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialConfig {
    optimizer: Option<PartialOptimizerConfig>,
    relax: Option<PartialRelaxConfig>,
    preoptimizer: Option<PartialPreOptimizerConfig>,
    conformers: Option<PartialConformerConfig>,
    forcefield: Option<ForceFieldParams>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Loads `path` when given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_relax(mut self, args: &RelaxArgs) -> Result<(RelaxConfig, ForceFieldParams)> {
        self.apply_set_values(&args.io.set_values)?;
        let forcefield = self.forcefield.take().unwrap_or_default();
        let relax = self.build_relax(&args.optimizer, Parameterization::Cartesian)?;
        Ok((relax, forcefield))
    }

    pub fn merge_conformers(
        mut self,
        args: &ConformerArgs,
    ) -> Result<(ConformerSearchConfig, ForceFieldParams)> {
        self.apply_set_values(&args.io.set_values)?;
        let forcefield = self.forcefield.take().unwrap_or_default();
        let file = self.conformers.take().unwrap_or_default();
        let relax = self.build_relax(&args.optimizer, Parameterization::Torsional)?;

        let count = args.count.or(file.count).ok_or_else(|| {
            CliError::Config(
                "The number of conformers is required, via `--count` or `conformers.count`."
                    .to_string(),
            )
        })?;
        let mut builder = core_config::ConformerSearchConfigBuilder::new()
            .count(count)
            .relax(relax);
        if let Some(attempts) = args.attempts_per_conformer.or(file.attempts_per_conformer) {
            builder = builder.attempts_per_conformer(attempts);
        }
        if let Some(degrees) = args.tolerance.or(file.tolerance_degrees) {
            builder = builder.tolerance(degrees.to_radians());
        }
        if let Some(seed) = args.optimizer.seed.or(file.seed) {
            builder = builder.seed(seed);
        }
        let config = builder.build().map_err(|e| CliError::Config(e.to_string()))?;
        Ok((config, forcefield))
    }

    fn build_relax(
        &mut self,
        args: &OptimizerArgs,
        default_parameterization: Parameterization,
    ) -> Result<RelaxConfig> {
        let optimizer = Self::merge_optimizer(self.optimizer.take().unwrap_or_default(), args)?;
        let relax_file = self.relax.take().unwrap_or_default();
        let preoptimizer =
            Self::merge_preoptimizer(self.preoptimizer.take().unwrap_or_default(), args.seed);

        core_config::RelaxConfigBuilder::new()
            .optimizer(optimizer)
            .parameterization(
                args.parameterization
                    .or(relax_file.parameterization)
                    .unwrap_or(default_parameterization),
            )
            .preoptimize(args.preoptimize || relax_file.preoptimize.unwrap_or(false))
            .preoptimizer(preoptimizer)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_optimizer(file: PartialOptimizerConfig, args: &OptimizerArgs) -> Result<OptimizerConfig> {
        let mut builder = core_config::OptimizerConfigBuilder::new()
            .method(args.method.or(file.method).unwrap_or_default());
        if let Some(iterations) = args.max_iterations.or(file.max_iterations) {
            builder = builder.max_iterations(iterations);
        }
        if let Some(rms) = args.min_rms.or(file.min_rms) {
            builder = builder.min_rms(rms);
        }
        if let Some(seconds) = file.max_time_seconds {
            let limit = Duration::try_from_secs_f64(seconds).map_err(|_| {
                CliError::Config(format!("`optimizer.max-time-seconds` is invalid: {seconds}"))
            })?;
            builder = builder.max_time(limit);
        }
        if let Some(memory) = file.lbfgs_memory {
            builder = builder.lbfgs_memory(memory.into());
        }
        if let Some(ls) = file.line_search {
            let defaults = LineSearchConfig::default();
            builder = builder.line_search(LineSearchConfig {
                step_min: ls.step_min.unwrap_or(defaults.step_min),
                step_max: ls.step_max.unwrap_or(defaults.step_max),
                curvature: ls.curvature.unwrap_or(defaults.curvature),
                max_bracket_steps: ls.max_bracket_steps.unwrap_or(defaults.max_bracket_steps),
                max_refine_steps: ls.max_refine_steps.unwrap_or(defaults.max_refine_steps),
                growth_limit: ls.growth_limit.unwrap_or(defaults.growth_limit),
                reverse_probe: ls.reverse_probe.unwrap_or(defaults.reverse_probe),
            });
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_preoptimizer(file: PartialPreOptimizerConfig, cli_seed: Option<u64>) -> PreOptimizerConfig {
        let defaults = PreOptimizerConfig::default();
        PreOptimizerConfig {
            origin: file.origin.map(|[x, y, z]| Point3::new(x, y, z)),
            seed_trials: file.seed_trials.unwrap_or(defaults.seed_trials),
            angular_resolution: file
                .angular_resolution_degrees
                .map_or(defaults.angular_resolution, f64::to_radians),
            seed: cli_seed.or(file.seed),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "optimizer.method" => {
                    self.optimizer_mut().method = Some(parse_value(key, value_str)?);
                }
                "optimizer.max-iterations" => {
                    self.optimizer_mut().max_iterations = Some(parse_value(key, value_str)?);
                }
                "optimizer.max-time-seconds" => {
                    self.optimizer_mut().max_time_seconds = Some(parse_value(key, value_str)?);
                }
                "optimizer.min-rms" => {
                    self.optimizer_mut().min_rms = Some(parse_value(key, value_str)?);
                }
                "optimizer.lbfgs-memory" => {
                    self.optimizer_mut().lbfgs_memory = Some(match value_str {
                        "degrees-of-freedom" => PartialMemory::Keyword(MemoryKeyword::DegreesOfFreedom),
                        _ => PartialMemory::Window(parse_value(key, value_str)?),
                    });
                }
                "optimizer.line-search.curvature" => {
                    self.optimizer_mut()
                        .line_search
                        .get_or_insert_with(Default::default)
                        .curvature = Some(parse_value(key, value_str)?);
                }
                "optimizer.line-search.step-max" => {
                    self.optimizer_mut()
                        .line_search
                        .get_or_insert_with(Default::default)
                        .step_max = Some(parse_value(key, value_str)?);
                }
                "relax.parameterization" => {
                    self.relax
                        .get_or_insert_with(Default::default)
                        .parameterization = Some(parse_value(key, value_str)?);
                }
                "relax.preoptimize" => {
                    self.relax.get_or_insert_with(Default::default).preoptimize =
                        Some(parse_value(key, value_str)?);
                }
                "preoptimizer.seed" => {
                    self.preoptimizer.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str)?);
                }
                "preoptimizer.seed-trials" => {
                    self.preoptimizer
                        .get_or_insert_with(Default::default)
                        .seed_trials = Some(parse_value(key, value_str)?);
                }
                "conformers.count" => {
                    self.conformers.get_or_insert_with(Default::default).count =
                        Some(parse_value(key, value_str)?);
                }
                "conformers.attempts-per-conformer" => {
                    self.conformers
                        .get_or_insert_with(Default::default)
                        .attempts_per_conformer = Some(parse_value(key, value_str)?);
                }
                "conformers.tolerance-degrees" => {
                    self.conformers
                        .get_or_insert_with(Default::default)
                        .tolerance_degrees = Some(parse_value(key, value_str)?);
                }
                "conformers.seed" => {
                    self.conformers.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str)?);
                }
                "forcefield.bond-force-constant" => {
                    self.forcefield_mut().bond_force_constant = parse_value(key, value_str)?;
                }
                "forcefield.angle-force-constant" => {
                    self.forcefield_mut().angle_force_constant = parse_value(key, value_str)?;
                }
                "forcefield.repulsion-force-constant" => {
                    self.forcefield_mut().repulsion_force_constant = parse_value(key, value_str)?;
                }
                "forcefield.repulsion-scale" => {
                    self.forcefield_mut().repulsion_scale = parse_value(key, value_str)?;
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn optimizer_mut(&mut self) -> &mut PartialOptimizerConfig {
        self.optimizer.get_or_insert_with(Default::default)
    }

    fn forcefield_mut(&mut self) -> &mut ForceFieldParams {
        self.forcefield.get_or_insert_with(Default::default)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {}: '{}' ({})", key, value, e)))
}
