//! # molrelax Core Library
//!
//! A library for relaxing molecular geometries by gradient-based energy minimization, and for
//! generating sets of distinct low-energy conformers.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear separation of concerns,
//! making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Molecule`, rings, rotatable
//!   bonds), the energy-oracle contract with a reference harmonic force field, and geometry helpers.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer holds the optimization machinery: the
//!   `Evaluable` abstraction and its transformation chains, the shared line search, the L-BFGS
//!   and conjugate-gradient minimizers, the geometric pre-optimizer and the conformer
//!   redundancy filter.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer. It ties the
//!   `engine` and `core` together into complete procedures, such as relaxing a molecule or
//!   running a conformer search.

pub mod core;
pub mod engine;
pub mod workflows;
