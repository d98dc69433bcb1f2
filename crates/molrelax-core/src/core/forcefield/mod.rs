//! # Force Field Module
//!
//! This module defines the contract between the optimization engine and whatever computes
//! molecular energies, together with a small reference implementation.
//!
//! ## Overview
//!
//! The engine never evaluates force-field terms itself. It consumes an [`oracle::EnergyOracle`]:
//! given a flat cartesian coordinate buffer, an optional atom mask and an optional gradient
//! buffer, the oracle returns the total energy or an [`oracle::OracleError`]. Rigid atoms
//! contribute energy but receive a zero gradient.
//!
//! ## Key Components
//!
//! - [`oracle`] - The `EnergyOracle` trait and its error type
//! - [`reference`] - `HarmonicForceField`, a bond/angle/repulsion oracle with analytic gradients
//! - [`params`] - Force constants of the reference oracle, loadable from TOML
//! - [`term`] - Energy decomposition reporting
//!
//! ## Usage
//!
//! ```ignore
//! use molrelax::core::forcefield::oracle::EnergyOracle;
//! use molrelax::core::forcefield::reference::HarmonicForceField;
//!
//! let oracle = HarmonicForceField::new(&molecule, ForceFieldParams::default());
//! let mut gradient = vec![0.0; molecule.atom_count() * 3];
//! let energy = oracle.evaluate(&molecule.flat_coordinates(), None, Some(&mut gradient))?;
//! ```

pub mod oracle;
pub mod params;
pub(crate) mod potentials;
pub mod reference;
pub mod term;
