//! Geometric helpers shared by the models, the reference oracle and the engine.

pub mod geometry;
