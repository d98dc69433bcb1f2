//! # Workflows Module
//!
//! This module provides the high-level procedures that users of molrelax call: relaxing a
//! single molecule and searching for distinct low-energy conformers.
//!
//! ## Overview
//!
//! Workflows tie the [`engine`](crate::engine) and [`core`](crate::core) layers together.
//! Each one takes a molecule, an energy oracle and a validated configuration, reports its
//! progress through a [`ProgressReporter`](crate::engine::progress::ProgressReporter), and
//! returns a plain result record.
//!
//! ## Architecture
//!
//! - **Relaxation Workflow** ([`relax`]) - Optional initial-geometry construction followed by
//!   minimization over a cartesian, rigid-body or torsional parameterization.
//! - **Conformer Workflow** ([`conformers`]) - Torsion sampling, relaxation and redundancy
//!   filtering, for one molecule or a parallel batch.
//!
//! ## Key Capabilities
//!
//! - **Oracle failures as data**: failed evaluations yield NaN energies and are counted, not
//!   raised
//! - **Cooperative cancellation** through a shared flag polled between candidates
//! - **Batch parallelism** with rayon when the `parallel` feature is enabled

pub mod conformers;
pub mod relax;
