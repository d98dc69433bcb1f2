use super::element::Element;
use nalgebra::Point3;

/// Represents an atom of a molecule together with its current cartesian position.
///
/// Atoms are addressed by their index inside the owning [`Molecule`](super::molecule::Molecule).
/// The position is the only mutable quantity the optimization engine touches; element
/// and rigidity are topology and stay fixed during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The chemical element of the atom.
    pub element: Element,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Rigid atoms are held fixed: they contribute to the energy but are excluded from
    /// the cartesian degrees of freedom and receive no gradient.
    pub is_rigid: bool,
    /// Whether `position` holds real coordinates. Unplaced atoms are built by the
    /// [`PreOptimizer`](crate::engine::preoptimizer::PreOptimizer).
    pub is_placed: bool,
}

impl Atom {
    /// Creates a new, movable `Atom` at the given position.
    ///
    /// # Arguments
    ///
    /// * `element` - The chemical element of the atom.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(element: Element, position: Point3<f64>) -> Self {
        Self {
            element,
            position,
            is_rigid: false,
            is_placed: true,
        }
    }

    /// Creates a new atom without coordinates. Its position is the origin until the
    /// [`PreOptimizer`](crate::engine::preoptimizer::PreOptimizer) places it.
    pub fn unplaced(element: Element) -> Self {
        Self {
            is_placed: false,
            ..Self::new(element, Point3::origin())
        }
    }

    /// Marks the atom as rigid, returning it for chaining.
    pub fn rigid(mut self) -> Self {
        self.is_rigid = true;
        self
    }
}
