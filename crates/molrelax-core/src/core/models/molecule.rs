use super::atom::Atom;
use super::rings::RingSet;
use super::topology::{Bond, BondOrder, TopologyError};
use nalgebra::Point3;
use std::collections::VecDeque;
use std::f64::consts::PI;

const TETRAHEDRAL_ANGLE_DEGREES: f64 = 109.471_220_634;

/// A bond around which free rotation defines a conformational degree of freedom.
///
/// The bond is oriented so that `atom2` lies on the moving side: rotating about the
/// `atom1 -> atom2` axis moves exactly `moving_atoms`. The moving side never contains
/// the lowest-index atom of the fragment, so the moving sets of any two rotatable
/// bonds of one fragment are either nested or disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatableBond {
    /// Index of the bond in [`Molecule::bonds`].
    pub bond: usize,
    /// Axis atom on the fixed side.
    pub atom1: usize,
    /// Axis atom on the moving side.
    pub atom2: usize,
    /// Neighbour of `atom1` used as the first dihedral reference.
    pub ref1: usize,
    /// Neighbour of `atom2` used as the last dihedral reference.
    pub ref2: usize,
    /// Atoms rotated by this torsion, `atom2` included.
    pub moving_atoms: Vec<usize>,
    /// Rotational periodicity from equivalent terminal substituents (1 = none).
    pub symmetry: u32,
}

impl RotatableBond {
    /// Atom quadruple defining the torsion angle.
    pub fn dihedral_atoms(&self) -> [usize; 4] {
        [self.ref1, self.atom1, self.atom2, self.ref2]
    }
}

/// A molecule: atoms with positions, bonds and a cached adjacency list.
///
/// This is the topology collaborator the optimization engine consumes. It deliberately
/// stays small: atom indices are dense `usize` values, which is what the flat
/// coordinate buffers of the optimizers require.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Adds a bond between two existing atoms and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] for out-of-range atoms, self bonds or duplicate bonds.
    pub fn add_bond(
        &mut self,
        atom1: usize,
        atom2: usize,
        order: BondOrder,
    ) -> Result<usize, TopologyError> {
        let atom_count = self.atoms.len();
        for index in [atom1, atom2] {
            if index >= atom_count {
                return Err(TopologyError::AtomOutOfRange { index, atom_count });
            }
        }
        if atom1 == atom2 {
            return Err(TopologyError::SelfBond(atom1));
        }
        if self.bond_between(atom1, atom2).is_some() {
            return Err(TopologyError::DuplicateBond(atom1, atom2));
        }
        self.bonds.push(Bond::new(atom1, atom2, order));
        self.adjacency[atom1].push(atom2);
        self.adjacency[atom2].push(atom1);
        Ok(self.bonds.len() - 1)
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of atoms that are not rigid.
    pub fn movable_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.is_rigid).count()
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map_or(&[], |v| v.as_slice())
    }

    pub fn adjacency(&self) -> &[Vec<usize>] {
        &self.adjacency
    }

    pub fn bond_between(&self, atom1: usize, atom2: usize) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|b| b.contains(atom1) && b.contains(atom2))
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Overwrites atom positions. Extra positions are ignored; missing ones leave atoms unchanged.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) {
        for (atom, position) in self.atoms.iter_mut().zip(positions) {
            atom.position = *position;
        }
    }

    /// Atom positions as a flat `[x0, y0, z0, x1, ...]` buffer.
    pub fn flat_coordinates(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.atoms.len() * 3);
        for atom in &self.atoms {
            flat.extend_from_slice(&[atom.position.x, atom.position.y, atom.position.z]);
        }
        flat
    }

    pub fn set_flat_coordinates(&mut self, flat: &[f64]) {
        for (atom, chunk) in self.atoms.iter_mut().zip(flat.chunks_exact(3)) {
            atom.position = Point3::new(chunk[0], chunk[1], chunk[2]);
        }
    }

    pub fn rigid_mask(&self) -> Vec<bool> {
        self.atoms.iter().map(|a| a.is_rigid).collect()
    }

    /// `true` for every atom whose position was given rather than left for construction.
    pub fn placed_mask(&self) -> Vec<bool> {
        self.atoms.iter().map(|a| a.is_placed).collect()
    }

    /// Connected fragments, each sorted ascending, ordered by their lowest atom index.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.atoms.len();
        let mut visited = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            visited[start] = true;
            while let Some(current) = queue.pop_front() {
                component.push(current);
                for &next in &self.adjacency[current] {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Atoms reachable from `start` without crossing the `start`-`excluded` bond.
    /// `start` itself is included.
    pub fn atoms_beyond(&self, start: usize, excluded: usize) -> Vec<usize> {
        let mut visited = vec![false; self.atoms.len()];
        let mut out = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        if excluded < visited.len() {
            visited[excluded] = true;
        }
        while let Some(current) = queue.pop_front() {
            out.push(current);
            for &next in &self.adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Perceives the minimal covering set of smallest rings.
    pub fn ring_set(&self) -> RingSet {
        RingSet::find(&self.adjacency)
    }

    /// Whether the `atom1`-`atom2` bond lies on a cycle of any size, i.e. `atom1` stays
    /// reachable from `atom2` once the bond itself is removed.
    pub fn is_cycle_bond(&self, atom1: usize, atom2: usize) -> bool {
        let n = self.atoms.len();
        if atom1 >= n || atom2 >= n {
            return false;
        }
        let mut visited = vec![false; n];
        let mut queue = VecDeque::from([atom2]);
        visited[atom2] = true;
        while let Some(current) = queue.pop_front() {
            for &next in &self.adjacency[current] {
                if current == atom2 && next == atom1 {
                    continue;
                }
                if next == atom1 {
                    return true;
                }
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Enumerates rotatable bonds: acyclic single bonds whose two ends both carry
    /// at least one further neighbour.
    pub fn rotatable_bonds(&self) -> Vec<RotatableBond> {
        let mut out = Vec::new();
        for (index, bond) in self.bonds.iter().enumerate() {
            if bond.order != BondOrder::Single || self.is_cycle_bond(bond.atom1, bond.atom2) {
                continue;
            }
            if self.adjacency[bond.atom1].len() < 2 || self.adjacency[bond.atom2].len() < 2 {
                continue;
            }

            let side2 = self.atoms_beyond(bond.atom2, bond.atom1);
            let side1 = self.atoms_beyond(bond.atom1, bond.atom2);
            let root = side1[0].min(side2[0]);
            let (atom1, atom2, moving_atoms) = if side2.contains(&root) {
                (bond.atom2, bond.atom1, side1)
            } else {
                (bond.atom1, bond.atom2, side2)
            };

            let ref1 = self.lowest_neighbor_except(atom1, atom2);
            let ref2 = self.lowest_neighbor_except(atom2, atom1);
            let (Some(ref1), Some(ref2)) = (ref1, ref2) else {
                continue;
            };

            let symmetry = lcm(
                self.terminal_symmetry(atom1, atom2),
                self.terminal_symmetry(atom2, atom1),
            );

            out.push(RotatableBond {
                bond: index,
                atom1,
                atom2,
                ref1,
                ref2,
                moving_atoms,
                symmetry,
            });
        }
        out
    }

    /// Ideal distance in Angstroms between two atoms, using their bond order when bonded.
    pub fn ideal_bond_length(&self, atom1: usize, atom2: usize) -> f64 {
        let (Some(a), Some(b)) = (self.atoms.get(atom1), self.atoms.get(atom2)) else {
            return 0.0;
        };
        let factor = self
            .bond_between(atom1, atom2)
            .map_or(1.0, |bond| bond.order.length_factor());
        (a.element.covalent_radius() + b.element.covalent_radius()) * factor
    }

    /// Ideal bond angle in radians around `center`, inferred from its bond orders.
    pub fn ideal_bond_angle(&self, center: usize) -> f64 {
        let mut doubles = 0;
        let mut triples = 0;
        let mut aromatic = 0;
        for bond in self.bonds.iter().filter(|b| b.contains(center)) {
            match bond.order {
                BondOrder::Double => doubles += 1,
                BondOrder::Triple => triples += 1,
                BondOrder::Aromatic => aromatic += 1,
                BondOrder::Single => {}
            }
        }
        if triples > 0 || doubles >= 2 {
            PI
        } else if doubles > 0 || aromatic > 0 {
            2.0 * PI / 3.0
        } else {
            TETRAHEDRAL_ANGLE_DEGREES.to_radians()
        }
    }

    fn lowest_neighbor_except(&self, atom: usize, except: usize) -> Option<usize> {
        self.adjacency[atom]
            .iter()
            .copied()
            .filter(|&n| n != except)
            .min()
    }

    // Number of equivalent terminal substituents on `atom` (ignoring `partner`), or 1
    // when the substituents are not all interchangeable.
    fn terminal_symmetry(&self, atom: usize, partner: usize) -> u32 {
        let others: Vec<usize> = self.adjacency[atom]
            .iter()
            .copied()
            .filter(|&n| n != partner)
            .collect();
        if others.len() < 2 {
            return 1;
        }
        let element = self.atoms[others[0]].element;
        let interchangeable = others.iter().all(|&n| {
            self.adjacency[n].len() == 1
                && self.atoms[n].element == element
                && self
                    .bond_between(atom, n)
                    .is_some_and(|b| b.order == BondOrder::Single)
        });
        if interchangeable {
            others.len() as u32
        } else {
            1
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: u32, b: u32) -> u32 {
    a / gcd(a, b) * b
}
