use clap::{Args, Parser, Subcommand};
use molrelax::engine::config::{Method, Parameterization};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The molrelax developers",
    version,
    about = "molrelax CLI - Relax molecular geometries and search for distinct low-energy conformers.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Minimize the energy of a single molecule.
    Relax(RelaxArgs),
    /// Generate distinct low-energy conformers of a molecule.
    Conformers(ConformerArgs),
}

/// Input, output and configuration paths shared by every subcommand.
#[derive(Args, Debug)]
pub struct IoArgs {
    /// Path to the input molecule description (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output file (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimizer.max-iterations=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Minimizer overrides shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct OptimizerArgs {
    /// Override the minimization method ('lbfgs' or 'cg').
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<Method>,

    /// Override the coordinates being optimized
    /// ('cartesian', 'rigid', 'torsional' or 'torsional-rigid').
    #[arg(short, long, value_name = "KIND")]
    pub parameterization: Option<Parameterization>,

    /// Override the maximum number of optimizer iterations.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override the RMS gradient below which a run counts as converged.
    #[arg(long, value_name = "FLOAT")]
    pub min_rms: Option<f64>,

    /// Construct coordinates for atoms given without a position before minimizing.
    #[arg(long)]
    pub preoptimize: bool,

    /// Seed for every random choice, making the run reproducible.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}

/// Arguments for the `relax` subcommand.
#[derive(Args, Debug)]
pub struct RelaxArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub optimizer: OptimizerArgs,
}

/// Arguments for the `conformers` subcommand.
#[derive(Args, Debug)]
pub struct ConformerArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub optimizer: OptimizerArgs,

    /// Number of distinct conformers to generate.
    #[arg(short = 'n', long, value_name = "INT")]
    pub count: Option<usize>,

    /// Candidate budget per requested conformer.
    #[arg(long, value_name = "INT")]
    pub attempts_per_conformer: Option<usize>,

    /// Torsion difference, in degrees, below which two conformers are duplicates.
    #[arg(long, value_name = "DEGREES")]
    pub tolerance: Option<f64>,
}
