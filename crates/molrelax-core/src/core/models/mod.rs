//! # Core Models Module
//!
//! This module contains the molecular data structures consumed by the optimization engine.
//!
//! ## Overview
//!
//! The engine only needs a thin view of a molecule: mutable atom coordinates, bond
//! connectivity, ring perception, rotatable-bond enumeration and an ideal-geometry lookup.
//! These models provide exactly that and nothing more:
//!
//! - **Represent molecular structure** - Atom positions, elements and bond orders
//! - **Expose topology queries** - Rings, fragments, rotatable bonds with torsion symmetry
//! - **Supply ideal geometry** - Bond lengths and angles used by the pre-optimizer
//!
//! ## Key Components
//!
//! - [`element`] - Chemical elements with covalent and van der Waals radii
//! - [`atom`] - Individual atom representation with coordinates and rigidity
//! - [`topology`] - Bonds, bond orders and topology errors
//! - [`rings`] - Minimal covering set of smallest rings
//! - [`molecule`] - The molecule container and its topology queries
//!
//! ## Usage
//!
//! ```ignore
//! use molrelax::core::models::{atom::Atom, element::Element, molecule::Molecule};
//! use molrelax::core::models::topology::BondOrder;
//!
//! let mut molecule = Molecule::new();
//! let c1 = molecule.add_atom(Atom::new(Element::C, Point3::new(0.0, 0.0, 0.0)));
//! let c2 = molecule.add_atom(Atom::new(Element::C, Point3::new(1.5, 0.0, 0.0)));
//! molecule.add_bond(c1, c2, BondOrder::Single)?;
//! ```

pub mod atom;
pub mod element;
pub mod molecule;
pub mod rings;
pub mod topology;
