use crate::core::models::molecule::RotatableBond;
use rand::{distributions::WeightedIndex, prelude::*};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Input energies list is empty, cannot perform sampling")]
    EmptyEnergies,
    #[error(
        "All energies are too high or beta is zero, resulting in zero total weight for sampling"
    )]
    ZeroTotalWeight,
    #[error("Invalid beta value: {0}. Beta must be positive for Boltzmann sampling")]
    InvalidBeta(f64),
    #[error("Torsion states and energies differ in length ({states} vs {energies})")]
    MismatchedStates { states: usize, energies: usize },
    #[error("Failed to create weighted distribution: {source}")]
    DistributionError {
        #[from]
        source: rand::distributions::WeightedError,
    },
}

#[instrument(level = "trace", skip_all, fields(beta))]
pub fn boltzmann_sample(
    energies: &[f64],
    beta: f64,
    rng: &mut impl Rng,
) -> Result<usize, SamplingError> {
    if energies.is_empty() {
        return Err(SamplingError::EmptyEnergies);
    }
    if beta <= 0.0 {
        return Err(SamplingError::InvalidBeta(beta));
    }

    let min_energy = energies.iter().copied().fold(f64::INFINITY, f64::min);

    let weights: Vec<f64> = energies
        .iter()
        .map(|&e| (-(e - min_energy) * beta).exp())
        .collect();

    let total_weight: f64 = weights.iter().sum();
    if total_weight <= f64::EPSILON {
        tracing::warn!(
            "Total Boltzmann weight is near zero ({}). Returning the lowest-energy index as fallback.",
            total_weight
        );
        return energies
            .iter()
            .position(|&e| (e - min_energy).abs() < f64::EPSILON)
            .ok_or(SamplingError::ZeroTotalWeight);
    }

    let dist = WeightedIndex::new(&weights)?;
    Ok(dist.sample(rng))
}

/// Proposes starting torsion angles for a conformer search.
pub trait TorsionSampler {
    /// One target dihedral (radians) per bond, in the order given.
    fn sample(&mut self, bonds: &[RotatableBond]) -> Result<Vec<f64>, SamplingError>;
}

/// Samples each torsion from a small set of discrete states weighted by Boltzmann
/// factors, then perturbs it by a uniform jitter.
#[derive(Debug, Clone)]
pub struct BoltzmannTorsionSampler {
    rng: StdRng,
    states: Vec<f64>,
    energies: Vec<f64>,
    beta: f64,
    jitter: f64,
}

/// `1 / kT` at 298 K, in mol/kcal.
const ROOM_TEMPERATURE_BETA: f64 = 1.688;

impl BoltzmannTorsionSampler {
    /// Staggered states at 60, 180 and 300 degrees with the anti state favoured.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            states: [60.0f64, 180.0, 300.0].iter().map(|d| d.to_radians()).collect(),
            energies: vec![0.9, 0.0, 0.9],
            beta: ROOM_TEMPERATURE_BETA,
            jitter: 10f64.to_radians(),
        }
    }

    pub fn with_states(mut self, states: Vec<f64>, energies: Vec<f64>) -> Result<Self, SamplingError> {
        if states.len() != energies.len() {
            return Err(SamplingError::MismatchedStates {
                states: states.len(),
                energies: energies.len(),
            });
        }
        if states.is_empty() {
            return Err(SamplingError::EmptyEnergies);
        }
        self.states = states;
        self.energies = energies;
        Ok(self)
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_jitter(mut self, radians: f64) -> Self {
        self.jitter = radians.abs();
        self
    }
}

impl TorsionSampler for BoltzmannTorsionSampler {
    fn sample(&mut self, bonds: &[RotatableBond]) -> Result<Vec<f64>, SamplingError> {
        let mut angles = Vec::with_capacity(bonds.len());
        for _ in bonds {
            let index = boltzmann_sample(&self.energies, self.beta, &mut self.rng)?;
            let jitter = self.rng.gen_range(-self.jitter..=self.jitter);
            angles.push(self.states[index] + jitter);
        }
        Ok(angles)
    }
}
