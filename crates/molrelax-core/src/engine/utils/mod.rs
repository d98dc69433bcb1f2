//! Helpers shared by the engine's search routines.

pub mod sampling;
