//! # Core Module
//!
//! Stateless building blocks shared by the optimization engine: the molecule and topology
//! model, the energy-oracle contract and geometry helpers.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, rings and rotatable bonds
//! - **Energy Evaluation** ([`forcefield`]) - The oracle contract and a reference harmonic oracle
//! - **Geometry** ([`utils`]) - Rotations, dihedrals, centroids and RMSD
//!
//! Nothing in this layer owns optimization state; the [`crate::engine`] layer borrows or
//! takes ownership of these types for the duration of a run.

pub mod forcefield;
pub mod models;
pub mod utils;
