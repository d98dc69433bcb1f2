use crate::core::forcefield::oracle::EnergyOracle;
use crate::core::models::molecule::Molecule;
use crate::engine::config::{Parameterization, RelaxConfig};
use crate::engine::error::EngineError;
use crate::engine::evaluable::Evaluable;
use crate::engine::evaluable::molecule::MoleculeEvaluable;
use crate::engine::optimizer::{self, OptimizationResult};
use crate::engine::preoptimizer::PreOptimizer;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct RelaxResult {
    /// The molecule at the final geometry.
    pub molecule: Molecule,
    pub optimization: OptimizationResult,
}

impl RelaxResult {
    pub fn energy(&self) -> f64 {
        self.optimization.energy
    }

    pub fn converged(&self) -> bool {
        self.optimization.converged()
    }

    pub fn iterations(&self) -> usize {
        self.optimization.iterations
    }
}

/// Relaxes one molecule: optional initial-geometry construction, then minimization over
/// the configured parameterization.
///
/// Construction only places atoms whose [`is_placed`](crate::core::models::atom::Atom::is_placed)
/// flag is unset; given coordinates are kept even when they sit at the origin.
///
/// Oracle failures do not produce an `Err`; they are reported through the
/// optimization result with a NaN energy.
#[instrument(skip_all, name = "relax_workflow", fields(atoms = molecule.atom_count(), parameterization = %config.parameterization))]
pub fn run(
    mut molecule: Molecule,
    oracle: &dyn EnergyOracle,
    config: &RelaxConfig,
    reporter: &ProgressReporter,
) -> Result<RelaxResult, EngineError> {
    config.optimizer.validate()?;

    if config.preoptimize {
        config.preoptimizer.validate()?;
        let report = reporter.phase("Initial Geometry", || {
            let placed = molecule.placed_mask();
            PreOptimizer::new(oracle, config.preoptimizer.clone()).place(&mut molecule, Some(placed))
        })?;
        info!(
            placed = report.placed,
            rings = report.rings_instantiated,
            "Initial geometry constructed."
        );
    }

    let (optimization, molecule) = reporter.phase("Minimization", || {
        let mut evaluable = match config.parameterization {
            Parameterization::Cartesian => MoleculeEvaluable::cartesian(molecule, oracle),
            Parameterization::Rigid => MoleculeEvaluable::rigid_body(molecule, oracle),
            Parameterization::Torsional => MoleculeEvaluable::torsional(molecule, oracle),
            Parameterization::TorsionalRigid => MoleculeEvaluable::torsional_rigid(molecule, oracle),
        };
        info!(dof = evaluable.dof(), method = %config.optimizer.method, "Starting minimization.");

        let optimization = optimizer::minimize(&mut evaluable, &config.optimizer);
        reporter.report(Progress::Minimized {
            energy: optimization.energy,
            iterations: optimization.iterations,
            stop_reason: optimization.stop_reason,
        });
        (optimization, evaluable.into_molecule())
    });

    info!(
        energy = optimization.energy,
        initial_energy = optimization.initial_energy,
        iterations = optimization.iterations,
        stop_reason = %optimization.stop_reason,
        "Minimization complete."
    );
    Ok(RelaxResult {
        molecule,
        optimization,
    })
}
