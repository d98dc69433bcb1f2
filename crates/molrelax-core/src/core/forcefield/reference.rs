use super::oracle::{EnergyOracle, OracleError};
use super::params::ForceFieldParams;
use super::potentials::{harmonic, soft_repulsion};
use super::term::EnergyTerm;
use crate::core::models::molecule::Molecule;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};
use std::collections::HashSet;

const MIN_SIN_THETA: f64 = 1e-8;
const MIN_DISTANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct BondTerm {
    i: usize,
    j: usize,
    r0: f64,
}

#[derive(Debug, Clone, Copy)]
struct AngleTerm {
    i: usize,
    center: usize,
    k: usize,
    theta0: f64,
}

#[derive(Debug, Clone, Copy)]
struct RepulsionTerm {
    i: usize,
    j: usize,
    d0: f64,
}

/// A small harmonic force field with analytic gradients.
///
/// It exists so the engine can be exercised end to end without an external
/// force-field package: bonds and angles are held near the ideal geometry of the
/// molecule, and atoms separated by more than two bonds are kept apart by a soft wall.
/// Terms are precomputed from the topology at construction time.
#[derive(Debug, Clone)]
pub struct HarmonicForceField {
    params: ForceFieldParams,
    atom_count: usize,
    rigid: Vec<bool>,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    repulsions: Vec<RepulsionTerm>,
}

impl HarmonicForceField {
    pub fn new(molecule: &Molecule, params: ForceFieldParams) -> Self {
        let bonds = molecule
            .bonds()
            .iter()
            .map(|b| BondTerm {
                i: b.atom1,
                j: b.atom2,
                r0: molecule.ideal_bond_length(b.atom1, b.atom2),
            })
            .collect();

        let mut angles = Vec::new();
        for center in 0..molecule.atom_count() {
            let neighbors = molecule.neighbors(center);
            let theta0 = molecule.ideal_bond_angle(center);
            angles.extend(neighbors.iter().tuple_combinations().map(|(&i, &k)| AngleTerm {
                i,
                center,
                k,
                theta0,
            }));
        }

        let mut excluded: HashSet<(usize, usize)> = HashSet::new();
        for center in 0..molecule.atom_count() {
            let neighbors = molecule.neighbors(center);
            for &n in neighbors {
                excluded.insert(ordered(center, n));
                for &m in neighbors {
                    if m != n {
                        excluded.insert(ordered(n, m));
                    }
                }
            }
        }

        let atoms = molecule.atoms();
        let repulsions = (0..atoms.len())
            .tuple_combinations()
            .filter(|pair| !excluded.contains(pair))
            .map(|(i, j)| RepulsionTerm {
                i,
                j,
                d0: params.repulsion_scale
                    * (atoms[i].element.vdw_radius() + atoms[j].element.vdw_radius()),
            })
            .collect();

        Self {
            params,
            atom_count: molecule.atom_count(),
            rigid: molecule.rigid_mask(),
            bonds,
            angles,
            repulsions,
        }
    }

    pub fn params(&self) -> &ForceFieldParams {
        &self.params
    }

    /// Energy split by term type, without gradient.
    pub fn energy_terms(&self, coordinates: &[f64]) -> Result<EnergyTerm, OracleError> {
        self.check_coordinates(coordinates)?;
        Ok(self.accumulate(coordinates, None, None))
    }

    fn check_coordinates(&self, coordinates: &[f64]) -> Result<(), OracleError> {
        if coordinates.len() != self.atom_count * 3 {
            return Err(OracleError::new(format!(
                "expected {} coordinates, got {}",
                self.atom_count * 3,
                coordinates.len()
            )));
        }
        if let Some(index) = coordinates.iter().position(|c| !c.is_finite()) {
            return Err(OracleError::new(format!(
                "non-finite coordinate for atom {}",
                index / 3
            )));
        }
        Ok(())
    }

    fn accumulate(
        &self,
        coordinates: &[f64],
        mask: Option<&[bool]>,
        mut gradient: Option<&mut [f64]>,
    ) -> EnergyTerm {
        let point = |i: usize| {
            Point3::new(
                coordinates[3 * i],
                coordinates[3 * i + 1],
                coordinates[3 * i + 2],
            )
        };
        let included = |atoms: &[usize]| match mask {
            Some(mask) => atoms.iter().all(|&a| mask.get(a).copied().unwrap_or(false)),
            None => true,
        };
        let mut terms = EnergyTerm::default();

        for bond in &self.bonds {
            if !included(&[bond.i, bond.j]) {
                continue;
            }
            let d = point(bond.i) - point(bond.j);
            let r = d.norm();
            let (e, de_dr) = harmonic(r, bond.r0, self.params.bond_force_constant);
            terms.bond += e;
            if let Some(g) = gradient.as_deref_mut() {
                if r > MIN_DISTANCE {
                    let f = d * (de_dr / r);
                    add_to(g, bond.i, &f);
                    add_to(g, bond.j, &-f);
                }
            }
        }

        for angle in &self.angles {
            if !included(&[angle.i, angle.center, angle.k]) {
                continue;
            }
            let u = point(angle.i) - point(angle.center);
            let v = point(angle.k) - point(angle.center);
            let (nu, nv) = (u.norm(), v.norm());
            if nu < MIN_DISTANCE || nv < MIN_DISTANCE {
                continue;
            }
            let cos_theta = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
            let theta = cos_theta.acos();
            let (e, de_dtheta) = harmonic(theta, angle.theta0, self.params.angle_force_constant);
            terms.angle += e;
            if let Some(g) = gradient.as_deref_mut() {
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt().max(MIN_SIN_THETA);
                let scale = -de_dtheta / sin_theta;
                let di = (v / (nu * nv) - u * (cos_theta / (nu * nu))) * scale;
                let dk = (u / (nu * nv) - v * (cos_theta / (nv * nv))) * scale;
                add_to(g, angle.i, &di);
                add_to(g, angle.k, &dk);
                add_to(g, angle.center, &-(di + dk));
            }
        }

        for pair in &self.repulsions {
            if !included(&[pair.i, pair.j]) {
                continue;
            }
            let d = point(pair.i) - point(pair.j);
            let r = d.norm();
            let (e, de_dr) = soft_repulsion(r, pair.d0, self.params.repulsion_force_constant);
            terms.repulsion += e;
            if let Some(g) = gradient.as_deref_mut() {
                if r > MIN_DISTANCE && de_dr != 0.0 {
                    let f = d * (de_dr / r);
                    add_to(g, pair.i, &f);
                    add_to(g, pair.j, &-f);
                }
            }
        }

        terms
    }
}

impl EnergyOracle for HarmonicForceField {
    fn evaluate(
        &self,
        coordinates: &[f64],
        mask: Option<&[bool]>,
        mut gradient: Option<&mut [f64]>,
    ) -> Result<f64, OracleError> {
        self.check_coordinates(coordinates)?;
        if let Some(g) = gradient.as_deref_mut() {
            if g.len() != coordinates.len() {
                return Err(OracleError::new(format!(
                    "gradient buffer has length {}, expected {}",
                    g.len(),
                    coordinates.len()
                )));
            }
            g.fill(0.0);
        }

        let energy = self.accumulate(coordinates, mask, gradient.as_deref_mut()).total();

        if let Some(g) = gradient {
            for (atom, _) in self.rigid.iter().enumerate().filter(|(_, rigid)| **rigid) {
                g[3 * atom..3 * atom + 3].fill(0.0);
            }
        }
        if !energy.is_finite() {
            return Err(OracleError::new("energy is not finite"));
        }
        Ok(energy)
    }
}

#[inline]
fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

#[inline]
fn add_to(gradient: &mut [f64], atom: usize, v: &Vector3<f64>) {
    gradient[3 * atom] += v.x;
    gradient[3 * atom + 1] += v.y;
    gradient[3 * atom + 2] += v.z;
}
