use super::relax;
use crate::core::forcefield::oracle::EnergyOracle;
use crate::core::models::molecule::{Molecule, RotatableBond};
use crate::core::utils::geometry::{dihedral_angle, rotate_about_axis, wrap_angle};
use crate::engine::config::ConformerSearchConfig;
use crate::engine::conformer::{Admission, Conformer, ConformerSet};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::utils::sampling::{BoltzmannTorsionSampler, TorsionSampler};
use nalgebra::Unit;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const MIN_AXIS_LENGTH: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct ConformerSearchResult {
    /// Distinct conformers, lowest energy first.
    pub conformers: Vec<Conformer>,
    pub duplicates: usize,
    /// Candidates discarded because the energy evaluation failed.
    pub failures: usize,
    pub attempts: usize,
    pub cancelled: bool,
}

/// Searches for up to `config.count` distinct low-energy conformers of `molecule`.
///
/// Each attempt draws target torsions from `sampler`, relaxes the perturbed geometry and
/// offers the result to the redundancy filter. The loop ends once enough conformers were
/// accepted, the attempt budget is spent, or `cancel` is raised.
#[instrument(skip_all, name = "conformer_search", fields(atoms = molecule.atom_count(), requested = config.count))]
pub fn run(
    molecule: &Molecule,
    oracle: &dyn EnergyOracle,
    sampler: &mut dyn TorsionSampler,
    config: &ConformerSearchConfig,
    cancel: &AtomicBool,
    reporter: &ProgressReporter,
) -> Result<ConformerSearchResult, EngineError> {
    let bonds: Vec<RotatableBond> = molecule
        .rotatable_bonds()
        .into_iter()
        .filter(|b| !b.moving_atoms.iter().any(|&a| molecule.atoms()[a].is_rigid))
        .collect();
    let max_attempts = config.max_attempts();
    info!(
        rotatable_bonds = bonds.len(),
        max_attempts, "Starting conformer search."
    );

    let mut set = ConformerSet::new(config.tolerance);
    let mut attempts = 0;
    let mut failures = 0;
    let mut cancelled = false;
    let quiet = ProgressReporter::new();

    reporter.report(Progress::TaskStart {
        total_steps: max_attempts as u64,
    });
    while set.len() < config.count && attempts < max_attempts {
        if cancel.load(Ordering::Relaxed) {
            info!(attempts, "Conformer search cancelled.");
            cancelled = true;
            break;
        }
        // Without rotatable bonds every candidate is the same conformer.
        if bonds.is_empty() && !set.is_empty() {
            break;
        }
        attempts += 1;

        let targets = sampler.sample(&bonds)?;
        let mut candidate = molecule.clone();
        apply_torsions(&mut candidate, &bonds, &targets);
        let relaxed = relax::run(candidate, oracle, &config.relax, &quiet)?;
        reporter.report(Progress::TaskIncrement);

        if relaxed.optimization.failed() {
            failures += 1;
            warn!(
                attempt = attempts,
                reason = relaxed.optimization.message.as_deref().unwrap_or_default(),
                "Discarding candidate after failed energy evaluation"
            );
            continue;
        }

        let energy = relaxed.optimization.energy;
        let conformer = Conformer::from_geometry(&bonds, relaxed.molecule.positions(), energy);
        match set.admit(conformer) {
            Admission::Accepted(_) => {
                debug!(attempt = attempts, energy, "Accepted conformer");
                reporter.report(Progress::ConformerAccepted {
                    energy,
                    accepted: set.len(),
                });
            }
            Admission::Duplicate { .. } => {
                debug!(attempt = attempts, energy, "Rejected duplicate conformer");
            }
        }
    }
    reporter.report(Progress::TaskFinish);
    if cancelled {
        reporter.report(Progress::Message(format!(
            "Conformer search cancelled after {attempts} attempts"
        )));
    } else if set.len() < config.count {
        reporter.report(Progress::Message(format!(
            "Found {} of {} requested conformers in {attempts} attempts",
            set.len(),
            config.count
        )));
    }

    let duplicates = set.duplicates();
    let conformers = set.into_sorted();
    info!(
        accepted = conformers.len(),
        duplicates, failures, attempts, "Conformer search complete."
    );
    Ok(ConformerSearchResult {
        conformers,
        duplicates,
        failures,
        attempts,
        cancelled,
    })
}

/// Runs an independent conformer search per molecule.
///
/// Every request gets its own oracle from `oracle_factory` and its own sampler, seeded from
/// `config.seed` offset by the request index. Requests share nothing but `cancel`.
pub fn run_batch<O, F>(
    requests: &[Molecule],
    oracle_factory: F,
    config: &ConformerSearchConfig,
    cancel: &AtomicBool,
) -> Vec<Result<ConformerSearchResult, EngineError>>
where
    O: EnergyOracle,
    F: Fn(&Molecule) -> O + Sync,
{
    #[cfg(not(feature = "parallel"))]
    let iterator = requests.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = requests.par_iter().enumerate();

    iterator
        .map(|(index, molecule)| {
            let oracle = oracle_factory(molecule);
            let mut sampler =
                BoltzmannTorsionSampler::new(config.seed.map(|s| s.wrapping_add(index as u64)));
            run(
                molecule,
                &oracle,
                &mut sampler,
                config,
                cancel,
                &ProgressReporter::new(),
            )
        })
        .collect()
}

/// Rotates each bond's moving side so that its dihedral equals the matching target.
///
/// Bonds are processed in order; missing targets leave the remaining bonds untouched.
pub fn apply_torsions(molecule: &mut Molecule, bonds: &[RotatableBond], targets: &[f64]) {
    let mut positions = molecule.positions();
    for (bond, &target) in bonds.iter().zip(targets) {
        let [a, b, c, d] = bond.dihedral_atoms();
        let current = dihedral_angle(&positions[a], &positions[b], &positions[c], &positions[d]);
        let axis = positions[c] - positions[b];
        if axis.norm() < MIN_AXIS_LENGTH {
            continue;
        }
        let axis = Unit::new_normalize(axis);
        let origin = positions[b];
        let delta = wrap_angle(target - current);
        for &atom in &bond.moving_atoms {
            positions[atom] = rotate_about_axis(&positions[atom], &origin, &axis, delta);
        }
    }
    molecule.set_positions(&positions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::oracle::OracleError;
    use crate::core::forcefield::params::ForceFieldParams;
    use crate::core::forcefield::reference::HarmonicForceField;
    use crate::core::models::molecule::tests::{butane_skeleton, butane_with_methyl_hydrogens, cyclohexane_skeleton};
    use crate::engine::config::ConformerSearchConfigBuilder;
    use crate::engine::utils::sampling::SamplingError;
    use nalgebra::Point3;
    use std::f64::consts::PI;
    use std::sync::Mutex;

    struct FixedSampler(f64);

    impl TorsionSampler for FixedSampler {
        fn sample(&mut self, bonds: &[RotatableBond]) -> Result<Vec<f64>, SamplingError> {
            Ok(vec![self.0; bonds.len()])
        }
    }

    /// Cycles through `targets`, one per call, for every bond.
    struct SequenceSampler {
        targets: Vec<f64>,
        next: usize,
    }

    impl TorsionSampler for SequenceSampler {
        fn sample(&mut self, bonds: &[RotatableBond]) -> Result<Vec<f64>, SamplingError> {
            let target = self.targets[self.next % self.targets.len()];
            self.next += 1;
            Ok(vec![target; bonds.len()])
        }
    }

    /// Harmonic field plus a butane-like barrier on the 0-1-2-3 dihedral: minima at
    /// gauche (+-60 degrees) and anti, with anti the lowest.
    struct TorsionBarrier {
        inner: HarmonicForceField,
    }

    impl TorsionBarrier {
        const THREEFOLD: f64 = 2.0;
        const ONEFOLD: f64 = 0.5;

        fn new(molecule: &Molecule) -> Self {
            Self {
                inner: HarmonicForceField::new(molecule, ForceFieldParams::default()),
            }
        }

        fn barrier(coordinates: &[f64]) -> f64 {
            let p = |i: usize| Point3::new(coordinates[3 * i], coordinates[3 * i + 1], coordinates[3 * i + 2]);
            let phi = dihedral_angle(&p(0), &p(1), &p(2), &p(3));
            Self::THREEFOLD * (1.0 + (3.0 * phi).cos()) + Self::ONEFOLD * (1.0 + phi.cos())
        }
    }

    impl EnergyOracle for TorsionBarrier {
        fn evaluate(
            &self,
            coordinates: &[f64],
            mask: Option<&[bool]>,
            gradient: Option<&mut [f64]>,
        ) -> Result<f64, OracleError> {
            let mut gradient = gradient;
            let energy = self.inner.evaluate(coordinates, mask, gradient.as_deref_mut())?;
            if let Some(gradient) = gradient {
                let h = 1e-6;
                let mut shifted = coordinates.to_vec();
                for i in 0..12 {
                    shifted[i] = coordinates[i] + h;
                    let plus = Self::barrier(&shifted);
                    shifted[i] = coordinates[i] - h;
                    let minus = Self::barrier(&shifted);
                    shifted[i] = coordinates[i];
                    gradient[i] += (plus - minus) / (2.0 * h);
                }
            }
            Ok(energy + Self::barrier(coordinates))
        }
    }

    fn end_to_end_distance(conformer: &Conformer) -> f64 {
        let p = conformer.coordinates();
        (p[3] - p[0]).norm()
    }

    fn search_config(count: usize, attempts: usize) -> ConformerSearchConfig {
        ConformerSearchConfigBuilder::new()
            .count(count)
            .attempts_per_conformer(attempts)
            .seed(17)
            .build()
            .unwrap()
    }

    #[test]
    fn apply_torsions_sets_requested_dihedrals() {
        let mut mol = butane_with_methyl_hydrogens();
        let bonds = mol.rotatable_bonds();
        let targets: Vec<f64> = (0..bonds.len()).map(|i| 0.5 + i as f64).collect();
        apply_torsions(&mut mol, &bonds, &targets);

        let positions = mol.positions();
        for (bond, target) in bonds.iter().zip(&targets) {
            let [a, b, c, d] = bond.dihedral_atoms();
            let angle = dihedral_angle(&positions[a], &positions[b], &positions[c], &positions[d]);
            assert!(wrap_angle(angle - target).abs() < 1e-9);
        }
    }

    #[test]
    fn identical_requests_yield_one_conformer_and_duplicates() {
        let mol = butane_with_methyl_hydrogens();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let mut sampler = FixedSampler(PI);
        let config = search_config(5, 1);

        let result = run(
            &mol,
            &oracle,
            &mut sampler,
            &config,
            &AtomicBool::new(false),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.attempts, 5);
        assert_eq!(result.conformers.len(), 1);
        assert_eq!(result.duplicates, 4);
        assert_eq!(result.failures, 0);
        assert!(!result.cancelled);
    }

    #[test]
    fn shortfall_is_reported_as_a_message() {
        let mol = butane_with_methyl_hydrogens();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));

        run(
            &mol,
            &oracle,
            &mut FixedSampler(PI),
            &search_config(5, 1),
            &AtomicBool::new(false),
            &reporter,
        )
        .unwrap();
        drop(reporter);

        let events = events.into_inner().unwrap();
        assert!(matches!(
            events.last(),
            Some(Progress::Message(msg)) if msg.contains("1 of 5")
        ));
    }

    #[test]
    fn accepted_conformers_are_distinct_and_sorted() {
        let mol = butane_with_methyl_hydrogens();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let mut sampler = BoltzmannTorsionSampler::new(Some(3));
        let config = search_config(3, 5);

        let result = run(
            &mol,
            &oracle,
            &mut sampler,
            &config,
            &AtomicBool::new(false),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(!result.conformers.is_empty());
        assert!(result.attempts <= config.max_attempts());
        assert_eq!(
            result.conformers.len() + result.duplicates + result.failures,
            result.attempts
        );
        for pair in result.conformers.windows(2) {
            assert!(pair[0].energy() <= pair[1].energy());
            assert!(!pair[0].fingerprint().matches(pair[1].fingerprint(), config.tolerance));
        }
    }

    #[test]
    fn torsion_targets_change_geometry_and_energy() {
        let mol = butane_skeleton();
        assert_eq!(mol.rotatable_bonds().len(), 1);
        let oracle = TorsionBarrier::new(&mol);
        let mut sampler = SequenceSampler {
            targets: vec![PI / 3.0, PI, 5.0 * PI / 3.0],
            next: 0,
        };

        let result = run(
            &mol,
            &oracle,
            &mut sampler,
            &search_config(3, 1),
            &AtomicBool::new(false),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.duplicates, 0);
        assert_eq!(result.conformers.len(), 3);
        let [anti, gauche_a, gauche_b] = [&result.conformers[0], &result.conformers[1], &result.conformers[2]];

        assert_eq!(anti.fingerprint().len(), 1);
        assert!(wrap_angle(anti.fingerprint().angles()[0] - PI).abs() < 5f64.to_radians());
        for gauche in [gauche_a, gauche_b] {
            assert!((wrap_angle(gauche.fingerprint().angles()[0]).abs() - PI / 3.0).abs() < 5f64.to_radians());
            assert!(gauche.energy() > anti.energy() + 0.5);
            assert!(end_to_end_distance(anti) > end_to_end_distance(gauche) + 0.5);
        }
        assert!(gauche_a.fingerprint().angles()[0] * gauche_b.fingerprint().angles()[0] < 0.0);
    }

    #[test]
    fn single_rotatable_bond_search_finds_only_barrier_minima() {
        let mol = butane_skeleton();
        let oracle = TorsionBarrier::new(&mol);
        let mut sampler = BoltzmannTorsionSampler::new(Some(5));
        let config = search_config(3, 10);

        let result = run(
            &mol,
            &oracle,
            &mut sampler,
            &config,
            &AtomicBool::new(false),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(!result.conformers.is_empty() && result.conformers.len() <= 3);
        let minima = [PI / 3.0, PI, -PI / 3.0];
        for conformer in &result.conformers {
            assert_eq!(conformer.fingerprint().len(), 1);
            let angle = conformer.fingerprint().angles()[0];
            assert!(
                minima.iter().any(|m| wrap_angle(angle - m).abs() < 5f64.to_radians()),
                "relaxed torsion {} is not a minimum",
                angle.to_degrees()
            );
        }
    }

    #[test]
    fn oracle_failures_are_counted_and_skipped() {
        struct Broken;
        impl EnergyOracle for Broken {
            fn evaluate(&self, _: &[f64], _: Option<&[bool]>, _: Option<&mut [f64]>) -> Result<f64, OracleError> {
                Err(OracleError::new("missing parameters"))
            }
        }
        let mol = butane_with_methyl_hydrogens();
        let result = run(
            &mol,
            &Broken,
            &mut FixedSampler(1.0),
            &search_config(2, 2),
            &AtomicBool::new(false),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(result.conformers.is_empty());
        assert_eq!(result.failures, 4);
        assert_eq!(result.attempts, 4);
    }

    #[test]
    fn raised_cancel_flag_stops_before_the_first_attempt() {
        let mol = butane_with_methyl_hydrogens();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let result = run(
            &mol,
            &oracle,
            &mut FixedSampler(1.0),
            &search_config(3, 3),
            &AtomicBool::new(true),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(result.cancelled);
        assert_eq!(result.attempts, 0);
        assert!(result.conformers.is_empty());
    }

    #[test]
    fn batch_matches_sequential_searches() {
        let requests = vec![butane_with_methyl_hydrogens(), butane_skeleton()];
        let factory = |m: &Molecule| HarmonicForceField::new(m, ForceFieldParams::default());
        let config = search_config(2, 3);
        let cancel = AtomicBool::new(false);

        let batch = run_batch(&requests, factory, &config, &cancel);

        assert_eq!(batch.len(), requests.len());
        for (index, (molecule, batched)) in requests.iter().zip(batch).enumerate() {
            let batched = batched.unwrap();
            let oracle = factory(molecule);
            let mut sampler = BoltzmannTorsionSampler::new(Some(17 + index as u64));
            let sequential = run(
                molecule,
                &oracle,
                &mut sampler,
                &config,
                &cancel,
                &ProgressReporter::new(),
            )
            .unwrap();

            assert_eq!(batched.attempts, sequential.attempts);
            assert_eq!(batched.duplicates, sequential.duplicates);
            assert_eq!(batched.failures, sequential.failures);
            assert_eq!(batched.cancelled, sequential.cancelled);
            assert_eq!(batched.conformers.len(), sequential.conformers.len());
            for (a, b) in batched.conformers.iter().zip(&sequential.conformers) {
                assert_eq!(a.energy(), b.energy());
                assert_eq!(a.fingerprint().angles(), b.fingerprint().angles());
                assert_eq!(a.coordinates(), b.coordinates());
            }
        }
    }

    #[test]
    fn molecule_without_rotatable_bonds_yields_a_single_conformer() {
        let mut mol = cyclohexane_skeleton();
        let tetrahedral = 109.47f64.to_radians();
        let ring = crate::engine::preoptimizer::RingModel::new(6, 1.52, tetrahedral);
        let positions = ring.positions(
            &nalgebra::Point3::origin(),
            &nalgebra::Vector3::x_axis(),
            &nalgebra::Vector3::z_axis(),
        );
        mol.set_positions(&positions);
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());

        let result = run(
            &mol,
            &oracle,
            &mut FixedSampler(0.0),
            &search_config(4, 3),
            &AtomicBool::new(false),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(result.conformers.len(), 1);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn batch_runs_every_request_independently() {
        let requests = vec![butane_with_methyl_hydrogens(), butane_with_methyl_hydrogens()];
        let config = search_config(2, 3);
        let results = run_batch(
            &requests,
            |m| HarmonicForceField::new(m, ForceFieldParams::default()),
            &config,
            &AtomicBool::new(false),
        );
        assert_eq!(results.len(), 2);
        for result in results {
            let result = result.unwrap();
            assert!(!result.conformers.is_empty());
            assert!(result.attempts <= config.max_attempts());
        }
    }
}
