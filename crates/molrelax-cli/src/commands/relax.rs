use crate::cli::RelaxArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::molecule_file::{MoleculeFile, RelaxReport, write_report};
use crate::utils::progress::CliProgressHandler;
use molrelax::{
    core::forcefield::reference::HarmonicForceField, engine::progress::ProgressReporter, workflows,
};
use tracing::{info, warn};

pub async fn run(args: RelaxArgs) -> Result<()> {
    let partial_config = PartialConfig::load(args.io.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let (config, forcefield_params) = partial_config.merge_relax(&args)?;

    info!("Loading input molecule from {:?}", &args.io.input);
    let file = MoleculeFile::read(&args.io.input)?;
    let molecule = file.to_molecule()?;
    let forcefield = HarmonicForceField::new(&molecule, forcefield_params);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Relaxing {} atoms ({} coordinates, {})...",
        molecule.atom_count(),
        config.parameterization,
        config.optimizer.method
    );
    let result = tokio::task::block_in_place(|| {
        workflows::relax::run(molecule, &forcefield, &config, &reporter)
    })?;

    let optimization = &result.optimization;
    if optimization.failed() {
        warn!(reason = ?optimization.message, "Minimization failed; writing the starting geometry.");
        println!("Warning: minimization failed ({}).", optimization.stop_reason);
    } else {
        println!(
            "✓ E = {:.4} kcal/mol (from {:.4}) after {} iterations: {}",
            optimization.energy,
            optimization.initial_energy,
            optimization.iterations,
            optimization.stop_reason
        );
    }

    let report = RelaxReport::new(file.name.clone(), &result);
    write_report(&args.io.output, &report)?;
    info!("Relaxed molecule written to {:?}", &args.io.output);
    println!("Output written to: {}", args.io.output.display());
    Ok(())
}
