//! # Engine Module
//!
//! This module implements the numerical machinery of molrelax: the mapping from a small
//! parameter vector onto molecular coordinates, the minimizers that drive that vector
//! downhill, and the geometric and stochastic helpers used to produce starting points.
//!
//! ## Overview
//!
//! Everything the minimizers touch goes through the [`evaluable::Evaluable`] contract: a
//! mutable state vector with a value and gradient. [`evaluable::molecule::MoleculeEvaluable`]
//! realizes it for a molecule by composing a transformation chain with an
//! [`EnergyOracle`](crate::core::forcefield::oracle::EnergyOracle), so the same
//! optimizers work over cartesian, rigid-body, torsional and mixed parameterizations.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Optimizer, line search, pre-optimizer and workflow settings
//! - **Evaluables** ([`evaluable`]) - The evaluable contract and the transformation chain
//! - **Line Search** ([`linesearch`]) - Bracketing plus cubic refinement along a direction
//! - **Optimizers** ([`optimizer`]) - Limited-memory BFGS and Polak-Ribiere conjugate gradient
//! - **Pre-optimizer** ([`preoptimizer`]) - Grid-scan construction of initial coordinates
//! - **Conformers** ([`conformer`]) - Torsion fingerprints and the redundancy filter
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Error Handling** ([`error`]) - Engine-level error type
//!
//! ## Key Capabilities
//!
//! - **Parameterization-agnostic minimization** with a shared safeguard that never returns a
//!   state worse than the starting one
//! - **Masked evaluation** so partially built geometries can be scored locally
//! - **Reproducible randomness** through seeded generators in the sampler and pre-optimizer

pub mod config;
pub mod conformer;
pub mod error;
pub mod evaluable;
pub mod linesearch;
pub mod optimizer;
pub mod preoptimizer;
pub mod progress;
pub mod utils;
