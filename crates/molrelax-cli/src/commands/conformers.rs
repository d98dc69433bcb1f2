use crate::cli::ConformerArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::molecule_file::{ConformerReport, MoleculeFile, write_report};
use crate::utils::progress::CliProgressHandler;
use molrelax::{
    core::forcefield::reference::HarmonicForceField,
    engine::{progress::ProgressReporter, utils::sampling::BoltzmannTorsionSampler},
    workflows,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

pub async fn run(args: ConformerArgs, cancel: Arc<AtomicBool>) -> Result<()> {
    let partial_config = PartialConfig::load(args.io.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let (config, forcefield_params) = partial_config.merge_conformers(&args)?;

    info!("Loading input molecule from {:?}", &args.io.input);
    let file = MoleculeFile::read(&args.io.input)?;
    let molecule = file.to_molecule()?;
    let forcefield = HarmonicForceField::new(&molecule, forcefield_params);
    let mut sampler = BoltzmannTorsionSampler::new(config.seed);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Searching for {} conformers (at most {} attempts)...",
        config.count,
        config.max_attempts()
    );
    let result = tokio::task::block_in_place(|| {
        workflows::conformers::run(
            &molecule,
            &forcefield,
            &mut sampler,
            &config,
            &cancel,
            &reporter,
        )
    })?;

    if result.cancelled {
        warn!("Conformer search was interrupted; writing the conformers found so far.");
        println!("Interrupted after {} attempts.", result.attempts);
    }
    if result.conformers.len() < config.count {
        println!(
            "Warning: found {} of {} requested conformers ({} duplicates, {} failures).",
            result.conformers.len(),
            config.count,
            result.duplicates,
            result.failures
        );
    } else {
        println!(
            "✓ Found {} conformers in {} attempts ({} duplicates rejected).",
            result.conformers.len(),
            result.attempts,
            result.duplicates
        );
    }
    if let Some(best) = result.conformers.first() {
        println!("  Lowest energy: {:.4} kcal/mol", best.energy());
    }

    let report = ConformerReport::new(file.name.clone(), &molecule, config.count, &result);
    write_report(&args.io.output, &report)?;
    info!("Conformers written to {:?}", &args.io.output);
    println!("Output written to: {}", args.io.output.display());
    Ok(())
}
