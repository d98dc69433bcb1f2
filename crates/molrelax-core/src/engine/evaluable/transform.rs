use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::centroid;
use nalgebra::{Point3, Rotation3, Unit, Vector3};
use std::collections::HashSet;
use thiserror::Error;

const MIN_AXIS_LENGTH: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Atom index {index} is out of range for a molecule with {atom_count} atoms")]
    AtomOutOfRange { index: usize, atom_count: usize },
    #[error("Atom {0} is driven by a cartesian transform and by another transform")]
    OverlappingCartesian(usize),
    #[error("Torsion about {axis_atom}-{moving_side_atom} has an inconsistent moving set")]
    InvalidTorsion {
        axis_atom: usize,
        moving_side_atom: usize,
    },
    #[error("Torsion moving sets must be nested or disjoint (torsions {0} and {1})")]
    CrossingTorsions(usize, usize),
    #[error("Rigid body does not fully contain the torsion about {axis_atom}-{moving_side_atom}")]
    PartialRigidBody {
        axis_atom: usize,
        moving_side_atom: usize,
    },
    #[error("Atom {0} belongs to more than one rigid body")]
    OverlappingRigidBodies(usize),
    #[error("Parameter index {index} is out of range for a chain with {dof} parameters")]
    ParameterOutOfRange { index: usize, dof: usize },
    #[error("Expected {expected} values for '{what}', got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// One coordinate parameterization acting on a subset of atoms.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Identity parameterization: the parameters are the absolute coordinates of `atoms`.
    Cartesian { atoms: Vec<usize> },
    /// Rotation of `moving_atoms` about the `axis_atom -> moving_side_atom` bond. The
    /// parameter is the angle in radians relative to the reference geometry.
    Torsion {
        axis_atom: usize,
        moving_side_atom: usize,
        moving_atoms: Vec<usize>,
    },
    /// Translation `(tx, ty, tz)` and XYZ Euler rotation `(alpha, beta, gamma)` about
    /// `center`: `p = Rz(gamma) Ry(beta) Rx(alpha) (q - center) + center + t`.
    RigidBody {
        atoms: Vec<usize>,
        center: Point3<f64>,
    },
}

impl Transform {
    pub fn dof(&self) -> usize {
        match self {
            Transform::Cartesian { atoms } => 3 * atoms.len(),
            Transform::Torsion { .. } => 1,
            Transform::RigidBody { .. } => 6,
        }
    }

    /// Atoms whose position depends on this transform's parameters.
    pub fn atoms(&self) -> &[usize] {
        match self {
            Transform::Cartesian { atoms } | Transform::RigidBody { atoms, .. } => atoms,
            Transform::Torsion { moving_atoms, .. } => moving_atoms,
        }
    }

    fn application_rank(&self) -> u8 {
        match self {
            Transform::Cartesian { .. } => 0,
            Transform::Torsion { .. } => 1,
            Transform::RigidBody { .. } => 2,
        }
    }
}

/// An ordered composition of transforms sharing one state vector.
///
/// Transforms are applied cartesian first, then torsions, then rigid bodies, each one
/// owning a contiguous slice of the state. Coordinates are always rebuilt from the
/// reference geometry, so a state fully determines the coordinates.
///
/// Derivatives are evaluated on the final geometry. This is exact because torsion
/// moving sets are nested or disjoint and every rigid body carries whole torsion
/// subtrees along with their axes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformChain {
    transforms: Vec<Transform>,
    offsets: Vec<usize>,
    dof: usize,
    atom_count: usize,
}

impl TransformChain {
    pub fn new(mut transforms: Vec<Transform>, atom_count: usize) -> Result<Self, TransformError> {
        transforms.sort_by_key(Transform::application_rank);
        validate(&transforms, atom_count)?;

        let mut offsets = Vec::with_capacity(transforms.len());
        let mut dof = 0;
        for transform in &transforms {
            offsets.push(dof);
            dof += transform.dof();
        }
        Ok(Self {
            transforms,
            offsets,
            dof,
            atom_count,
        })
    }

    /// Every non-rigid atom moves freely.
    pub fn cartesian(molecule: &Molecule) -> Self {
        let atoms: Vec<usize> = (0..molecule.atom_count())
            .filter(|&i| !molecule.atoms()[i].is_rigid)
            .collect();
        let transforms = if atoms.is_empty() {
            Vec::new()
        } else {
            vec![Transform::Cartesian { atoms }]
        };
        Self::assemble(transforms, molecule.atom_count())
    }

    /// One rigid body per connected fragment that contains no rigid atom.
    pub fn rigid_body(molecule: &Molecule) -> Self {
        Self::assemble(rigid_bodies(molecule), molecule.atom_count())
    }

    /// One torsion per rotatable bond whose moving side contains no rigid atom.
    pub fn torsional(molecule: &Molecule) -> Self {
        Self::assemble(torsions(molecule), molecule.atom_count())
    }

    pub fn torsional_rigid(molecule: &Molecule) -> Self {
        let mut transforms = torsions(molecule);
        transforms.extend(rigid_bodies(molecule));
        Self::assemble(transforms, molecule.atom_count())
    }

    // Chains derived from a molecule's own topology satisfy every validation rule.
    fn assemble(mut transforms: Vec<Transform>, atom_count: usize) -> Self {
        transforms.sort_by_key(Transform::application_rank);
        let mut offsets = Vec::with_capacity(transforms.len());
        let mut dof = 0;
        for transform in &transforms {
            offsets.push(dof);
            dof += transform.dof();
        }
        Self {
            transforms,
            offsets,
            dof,
            atom_count,
        }
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// State that reproduces `reference` unchanged.
    pub fn initial_state(&self, reference: &[Point3<f64>]) -> Vec<f64> {
        let mut state = vec![0.0; self.dof];
        for (transform, &offset) in self.transforms.iter().zip(&self.offsets) {
            if let Transform::Cartesian { atoms } = transform {
                for (i, &atom) in atoms.iter().enumerate() {
                    let p = reference[atom];
                    state[offset + 3 * i..offset + 3 * i + 3].copy_from_slice(&[p.x, p.y, p.z]);
                }
            }
        }
        state
    }

    /// Rebuilds coordinates from `reference` under `state`.
    pub fn apply(
        &self,
        state: &[f64],
        reference: &[Point3<f64>],
        out: &mut [Point3<f64>],
    ) -> Result<(), TransformError> {
        self.check_len("state", self.dof, state.len())?;
        self.check_len("reference", self.atom_count, reference.len())?;
        self.check_len("coordinates", self.atom_count, out.len())?;
        out.copy_from_slice(reference);

        for (transform, &offset) in self.transforms.iter().zip(&self.offsets) {
            match transform {
                Transform::Cartesian { atoms } => {
                    for (i, &atom) in atoms.iter().enumerate() {
                        let s = &state[offset + 3 * i..offset + 3 * i + 3];
                        out[atom] = Point3::new(s[0], s[1], s[2]);
                    }
                }
                Transform::Torsion {
                    axis_atom,
                    moving_side_atom,
                    moving_atoms,
                } => {
                    let angle = state[offset];
                    if angle == 0.0 {
                        continue;
                    }
                    let origin = out[*axis_atom];
                    let axis = out[*moving_side_atom] - origin;
                    if axis.norm() < MIN_AXIS_LENGTH {
                        continue;
                    }
                    let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);
                    for &atom in moving_atoms {
                        out[atom] = origin + rotation * (out[atom] - origin);
                    }
                }
                Transform::RigidBody { atoms, center } => {
                    let s = &state[offset..offset + 6];
                    let translation = Vector3::new(s[0], s[1], s[2]);
                    let rotation = euler_rotation(s[3], s[4], s[5]);
                    for &atom in atoms {
                        out[atom] = *center + rotation * (out[atom] - *center) + translation;
                    }
                }
            }
        }
        Ok(())
    }

    /// Derivative of each affected atom's position with respect to state parameter `k`,
    /// evaluated at `coordinates` (the geometry produced by `state`).
    pub fn parameter_derivatives(
        &self,
        k: usize,
        state: &[f64],
        coordinates: &[Point3<f64>],
    ) -> Result<Vec<(usize, Vector3<f64>)>, TransformError> {
        self.check_len("state", self.dof, state.len())?;
        self.check_len("coordinates", self.atom_count, coordinates.len())?;
        if k >= self.dof {
            return Err(TransformError::ParameterOutOfRange {
                index: k,
                dof: self.dof,
            });
        }
        let index = self.offsets.partition_point(|&o| o <= k) - 1;
        let mut out = Vec::new();
        self.for_each_derivative(index, state, coordinates, |param, atom, derivative| {
            if param == k {
                out.push((atom, derivative));
            }
        });
        Ok(out)
    }

    /// Chain rule: `out[k] = sum over atoms of dE/dx_a . dx_a/dtheta_k`.
    pub fn project_gradient(
        &self,
        state: &[f64],
        coordinates: &[Point3<f64>],
        cartesian_gradient: &[f64],
        out: &mut [f64],
    ) -> Result<(), TransformError> {
        self.check_len("state", self.dof, state.len())?;
        self.check_len("coordinates", self.atom_count, coordinates.len())?;
        self.check_len("cartesian gradient", 3 * self.atom_count, cartesian_gradient.len())?;
        self.check_len("gradient", self.dof, out.len())?;
        out.fill(0.0);

        for index in 0..self.transforms.len() {
            self.for_each_derivative(index, state, coordinates, |param, atom, derivative| {
                let g = &cartesian_gradient[3 * atom..3 * atom + 3];
                out[param] += g[0] * derivative.x + g[1] * derivative.y + g[2] * derivative.z;
            });
        }
        Ok(())
    }

    fn for_each_derivative(
        &self,
        index: usize,
        state: &[f64],
        coordinates: &[Point3<f64>],
        mut visit: impl FnMut(usize, usize, Vector3<f64>),
    ) {
        let offset = self.offsets[index];
        match &self.transforms[index] {
            Transform::Cartesian { atoms } => {
                for (i, &atom) in atoms.iter().enumerate() {
                    for axis in 0..3 {
                        let mut unit = Vector3::zeros();
                        unit[axis] = 1.0;
                        visit(offset + 3 * i + axis, atom, unit);
                    }
                }
            }
            Transform::Torsion {
                axis_atom,
                moving_side_atom,
                moving_atoms,
            } => {
                let origin = coordinates[*axis_atom];
                let axis = coordinates[*moving_side_atom] - origin;
                let norm = axis.norm();
                if norm < MIN_AXIS_LENGTH {
                    return;
                }
                let axis = axis / norm;
                for &atom in moving_atoms {
                    visit(offset, atom, axis.cross(&(coordinates[atom] - origin)));
                }
            }
            Transform::RigidBody { atoms, center } => {
                let s = &state[offset..offset + 6];
                let translation = Vector3::new(s[0], s[1], s[2]);
                let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), s[3]);
                let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), s[4]);
                let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), s[5]);
                let rotation = rz * ry * rx;
                for &atom in atoms {
                    let w3 = coordinates[atom] - *center - translation;
                    let w0 = rotation.inverse() * w3;
                    let w1 = rx * w0;
                    let w2 = ry * w1;
                    visit(offset, atom, Vector3::x());
                    visit(offset + 1, atom, Vector3::y());
                    visit(offset + 2, atom, Vector3::z());
                    visit(offset + 3, atom, rz * (ry * Vector3::x().cross(&w1)));
                    visit(offset + 4, atom, rz * Vector3::y().cross(&w2));
                    visit(offset + 5, atom, Vector3::z().cross(&w3));
                }
            }
        }
    }

    fn check_len(
        &self,
        what: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), TransformError> {
        if expected != actual {
            return Err(TransformError::LengthMismatch {
                what,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

fn euler_rotation(alpha: f64, beta: f64, gamma: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), gamma)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), beta)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), alpha)
}

fn torsions(molecule: &Molecule) -> Vec<Transform> {
    let atoms = molecule.atoms();
    molecule
        .rotatable_bonds()
        .into_iter()
        .filter(|bond| bond.moving_atoms.iter().all(|&a| !atoms[a].is_rigid))
        .map(|bond| Transform::Torsion {
            axis_atom: bond.atom1,
            moving_side_atom: bond.atom2,
            moving_atoms: bond.moving_atoms,
        })
        .collect()
}

fn rigid_bodies(molecule: &Molecule) -> Vec<Transform> {
    let atoms = molecule.atoms();
    molecule
        .connected_components()
        .into_iter()
        .filter(|fragment| fragment.iter().all(|&a| !atoms[a].is_rigid))
        .filter_map(|fragment| {
            let positions: Vec<Point3<f64>> = fragment.iter().map(|&a| atoms[a].position).collect();
            centroid(&positions).map(|center| Transform::RigidBody {
                atoms: fragment,
                center,
            })
        })
        .collect()
}

fn validate(transforms: &[Transform], atom_count: usize) -> Result<(), TransformError> {
    let in_range = |index: usize| {
        if index < atom_count {
            Ok(())
        } else {
            Err(TransformError::AtomOutOfRange { index, atom_count })
        }
    };
    for transform in transforms {
        transform.atoms().iter().try_for_each(|&a| in_range(a))?;
        if let Transform::Torsion {
            axis_atom,
            moving_side_atom,
            moving_atoms,
        } = transform
        {
            in_range(*axis_atom)?;
            in_range(*moving_side_atom)?;
            if moving_atoms.contains(axis_atom) || !moving_atoms.contains(moving_side_atom) {
                return Err(TransformError::InvalidTorsion {
                    axis_atom: *axis_atom,
                    moving_side_atom: *moving_side_atom,
                });
            }
        }
    }

    let mut cartesian_atoms = HashSet::new();
    for transform in transforms {
        if let Transform::Cartesian { atoms } = transform {
            for &atom in atoms {
                if !cartesian_atoms.insert(atom) {
                    return Err(TransformError::OverlappingCartesian(atom));
                }
            }
        }
    }
    for transform in transforms {
        if matches!(transform, Transform::Cartesian { .. }) {
            continue;
        }
        if let Some(&atom) = transform.atoms().iter().find(|&&a| cartesian_atoms.contains(&a)) {
            return Err(TransformError::OverlappingCartesian(atom));
        }
    }

    let torsion_sets: Vec<(usize, HashSet<usize>, &Transform)> = transforms
        .iter()
        .enumerate()
        .filter(|(_, t)| matches!(t, Transform::Torsion { .. }))
        .map(|(i, t)| (i, t.atoms().iter().copied().collect(), t))
        .collect();
    for (a, (i, set_i, _)) in torsion_sets.iter().enumerate() {
        for (j, set_j, _) in &torsion_sets[a + 1..] {
            let shared = set_i.intersection(set_j).count();
            if shared != 0 && shared != set_i.len() && shared != set_j.len() {
                return Err(TransformError::CrossingTorsions(*i, *j));
            }
        }
    }

    let mut body_atoms = HashSet::new();
    for transform in transforms {
        let Transform::RigidBody { atoms, .. } = transform else {
            continue;
        };
        for &atom in atoms {
            if !body_atoms.insert(atom) {
                return Err(TransformError::OverlappingRigidBodies(atom));
            }
        }
        let body: HashSet<usize> = atoms.iter().copied().collect();
        for (_, set, torsion) in &torsion_sets {
            let Transform::Torsion {
                axis_atom,
                moving_side_atom,
                ..
            } = torsion
            else {
                continue;
            };
            let touches = set.iter().any(|a| body.contains(a)) || body.contains(axis_atom);
            if touches && !(set.is_subset(&body) && body.contains(axis_atom)) {
                return Err(TransformError::PartialRigidBody {
                    axis_atom: *axis_atom,
                    moving_side_atom: *moving_side_atom,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::butane_with_methyl_hydrogens;
    use crate::core::utils::geometry::dihedral_angle;

    fn bent_butane() -> Molecule {
        let mut mol = butane_with_methyl_hydrogens();
        let mut positions = mol.positions();
        positions[0] = Point3::new(0.0, 1.2, 0.3);
        positions[1] = Point3::new(0.2, 0.0, 0.0);
        positions[2] = Point3::new(1.6, -0.4, 0.1);
        positions[3] = Point3::new(2.1, -1.1, 1.3);
        mol.set_positions(&positions);
        mol
    }

    fn numeric_derivative(
        chain: &TransformChain,
        state: &[f64],
        reference: &[Point3<f64>],
        k: usize,
    ) -> Vec<Vector3<f64>> {
        let h = 1e-6;
        let n = reference.len();
        let mut plus = vec![Point3::origin(); n];
        let mut minus = vec![Point3::origin(); n];
        let mut s = state.to_vec();
        s[k] += h;
        chain.apply(&s, reference, &mut plus).unwrap();
        s[k] -= 2.0 * h;
        chain.apply(&s, reference, &mut minus).unwrap();
        plus.iter()
            .zip(&minus)
            .map(|(p, m)| (p - m) / (2.0 * h))
            .collect()
    }

    fn assert_derivatives_match(chain: &TransformChain, state: &[f64], reference: &[Point3<f64>]) {
        let mut coords = vec![Point3::origin(); reference.len()];
        chain.apply(state, reference, &mut coords).unwrap();
        for k in 0..chain.dof() {
            let numeric = numeric_derivative(chain, state, reference, k);
            let mut analytic = vec![Vector3::zeros(); reference.len()];
            for (atom, d) in chain.parameter_derivatives(k, state, &coords).unwrap() {
                analytic[atom] += d;
            }
            for (a, n) in analytic.iter().zip(&numeric) {
                assert!((a - n).norm() < 1e-5, "parameter {k}: {a:?} vs {n:?}");
            }
        }
    }

    #[test]
    fn dof_is_the_sum_of_transform_dofs() {
        let mol = butane_with_methyl_hydrogens();
        assert_eq!(TransformChain::cartesian(&mol).dof(), 3 * mol.atom_count());
        assert_eq!(TransformChain::rigid_body(&mol).dof(), 6);
        assert_eq!(TransformChain::torsional(&mol).dof(), 3);
        assert_eq!(TransformChain::torsional_rigid(&mol).dof(), 9);
    }

    #[test]
    fn chains_skip_rigid_atoms() {
        let mut mol = butane_with_methyl_hydrogens();
        mol.atom_mut(9).unwrap().is_rigid = true;
        assert_eq!(TransformChain::cartesian(&mol).dof(), 3 * (mol.atom_count() - 1));
        assert_eq!(TransformChain::rigid_body(&mol).dof(), 0);
        assert!(TransformChain::torsional(&mol).dof() < 3);
    }

    #[test]
    fn initial_state_reproduces_reference_geometry() {
        let mol = bent_butane();
        let reference = mol.positions();
        for chain in [
            TransformChain::cartesian(&mol),
            TransformChain::torsional_rigid(&mol),
        ] {
            let state = chain.initial_state(&reference);
            let mut out = vec![Point3::origin(); reference.len()];
            chain.apply(&state, &reference, &mut out).unwrap();
            for (atom, (a, b)) in out.iter().zip(&reference).enumerate() {
                assert!((a - b).norm() < 1e-12, "atom {atom} moved: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn torsion_parameter_shifts_dihedral_by_the_same_angle() {
        let mol = bent_butane();
        let reference = mol.positions();
        let chain = TransformChain::torsional(&mol);
        let central = mol
            .rotatable_bonds()
            .into_iter()
            .find(|b| b.atom1 == 1 && b.atom2 == 2)
            .unwrap();
        let k = chain
            .transforms()
            .iter()
            .position(|t| matches!(t, Transform::Torsion { axis_atom: 1, moving_side_atom: 2, .. }))
            .unwrap();

        let mut state = vec![0.0; chain.dof()];
        state[k] = 0.4;
        let mut out = vec![Point3::origin(); reference.len()];
        chain.apply(&state, &reference, &mut out).unwrap();

        let [a, b, c, d] = central.dihedral_atoms();
        let before = dihedral_angle(&reference[a], &reference[b], &reference[c], &reference[d]);
        let after = dihedral_angle(&out[a], &out[b], &out[c], &out[d]);
        assert!((after - before - 0.4).abs() < 1e-9);
        assert!(((out[1] - out[2]).norm() - (reference[1] - reference[2]).norm()).abs() < 1e-12);
    }

    #[test]
    fn torsion_derivatives_match_finite_differences() {
        let mol = bent_butane();
        let reference = mol.positions();
        let chain = TransformChain::torsional(&mol);
        assert_derivatives_match(&chain, &[0.3, -0.7, 1.1], &reference);
    }

    #[test]
    fn rigid_body_derivatives_match_finite_differences() {
        let mol = bent_butane();
        let reference = mol.positions();
        let chain = TransformChain::rigid_body(&mol);
        assert_derivatives_match(&chain, &[0.1, -0.2, 0.3, 0.4, -0.5, 0.6], &reference);
    }

    #[test]
    fn combined_torsion_and_rigid_derivatives_match_finite_differences() {
        let mol = bent_butane();
        let reference = mol.positions();
        let chain = TransformChain::torsional_rigid(&mol);
        let state = [0.5, -0.3, 0.9, 0.2, 0.1, -0.4, 0.7, -1.2, 0.35];
        assert_derivatives_match(&chain, &state, &reference);
    }

    #[test]
    fn identity_projection_reproduces_cartesian_gradient() {
        let mol = bent_butane();
        let reference = mol.positions();
        let chain = TransformChain::cartesian(&mol);
        let state = chain.initial_state(&reference);
        let gradient: Vec<f64> = (0..3 * mol.atom_count()).map(|i| i as f64 * 0.5 - 3.0).collect();
        let mut projected = vec![0.0; chain.dof()];
        chain
            .project_gradient(&state, &reference, &gradient, &mut projected)
            .unwrap();
        assert_eq!(projected, gradient);
    }

    #[test]
    fn projection_rejects_mismatched_buffers() {
        let mol = bent_butane();
        let reference = mol.positions();
        let chain = TransformChain::torsional(&mol);
        let mut out = vec![0.0; chain.dof() + 1];
        let err = chain
            .project_gradient(&[0.0; 3], &reference, &vec![0.0; 3 * reference.len()], &mut out)
            .unwrap_err();
        assert!(matches!(err, TransformError::LengthMismatch { what: "gradient", .. }));
    }

    #[test]
    fn new_orders_transforms_canonically_and_rejects_overlaps() {
        let chain = TransformChain::new(
            vec![
                Transform::RigidBody {
                    atoms: vec![2, 3],
                    center: Point3::origin(),
                },
                Transform::Cartesian { atoms: vec![0, 1] },
            ],
            4,
        )
        .unwrap();
        assert!(matches!(chain.transforms()[0], Transform::Cartesian { .. }));
        assert_eq!(chain.dof(), 12);

        let err = TransformChain::new(
            vec![
                Transform::Cartesian { atoms: vec![0, 1] },
                Transform::Torsion {
                    axis_atom: 2,
                    moving_side_atom: 1,
                    moving_atoms: vec![1],
                },
            ],
            3,
        )
        .unwrap_err();
        assert_eq!(err, TransformError::OverlappingCartesian(1));

        let err = TransformChain::new(vec![Transform::Cartesian { atoms: vec![7] }], 3).unwrap_err();
        assert_eq!(
            err,
            TransformError::AtomOutOfRange {
                index: 7,
                atom_count: 3
            }
        );
    }

    #[test]
    fn new_rejects_rigid_bodies_that_split_a_torsion() {
        let err = TransformChain::new(
            vec![
                Transform::Torsion {
                    axis_atom: 0,
                    moving_side_atom: 1,
                    moving_atoms: vec![1, 2],
                },
                Transform::RigidBody {
                    atoms: vec![1, 2],
                    center: Point3::origin(),
                },
            ],
            3,
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::PartialRigidBody { .. }));
    }
}
