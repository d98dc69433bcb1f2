//! Geometric construction of starting coordinates.
//!
//! Atoms are placed breadth-first from already placed ones at their ideal bond length.
//! Each candidate position comes from a grid (a sphere around a lone placed neighbour,
//! or the cone of ideal bond angles when the neighbour has another placed partner) and
//! is scored by the energy of the terms whose atoms are all placed. Rings whose atoms
//! are all still free are built in one go from a [`RingModel`].

use super::config::PreOptimizerConfig;
use crate::core::forcefield::oracle::EnergyOracle;
use crate::core::models::molecule::Molecule;
use crate::core::models::rings::RingSet;
use crate::core::utils::geometry::{any_perpendicular, bounding_box, rotate_about_axis};
use nalgebra::{Point3, Unit, Vector3};
use rand::prelude::*;
use std::collections::VecDeque;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::{debug, instrument};

const MIN_SEPARATION: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Placement mask has {actual} entries but the molecule has {expected} atoms")]
    MaskLengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementReport {
    /// Atoms that received new coordinates.
    pub placed: usize,
    pub rings_instantiated: usize,
}

/// Idealized ring: a regular polygon with alternating (chair-like) pucker.
///
/// Even rings whose ideal angle cannot be met in a plane are puckered: atoms alternate
/// between the mean plane and `pucker_height` below it, with the radius chosen so that
/// both the bond length and the bond angle are ideal. Other rings are planar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingModel {
    pub size: usize,
    pub radius: f64,
    pub pucker_height: f64,
}

impl RingModel {
    pub fn new(size: usize, bond_length: f64, bond_angle: f64) -> Self {
        let n = size.max(3);
        let alpha = 2.0 * PI / n as f64;
        if n % 2 == 0 {
            let sin_alpha = alpha.sin();
            let radius2 =
                bond_length * bond_length * (1.0 - bond_angle.cos()) / (2.0 * sin_alpha * sin_alpha);
            let height2 = bond_length * bond_length - radius2 * (2.0 - 2.0 * alpha.cos());
            if height2 >= 0.0 && radius2.is_finite() {
                return Self {
                    size: n,
                    radius: radius2.sqrt(),
                    pucker_height: height2.sqrt(),
                };
            }
        }
        Self {
            size: n,
            radius: bond_length / (2.0 * (PI / n as f64).sin()),
            pucker_height: 0.0,
        }
    }

    /// Ring atom positions in cycle order, the first one at `anchor`. `outward` points from
    /// the ring centre towards the anchor and must be perpendicular to `normal`.
    pub fn positions(
        &self,
        anchor: &Point3<f64>,
        outward: &Unit<Vector3<f64>>,
        normal: &Unit<Vector3<f64>>,
    ) -> Vec<Point3<f64>> {
        let center = anchor - outward.into_inner() * self.radius;
        let e1 = outward.into_inner();
        let e2 = normal.cross(&e1);
        (0..self.size)
            .map(|k| {
                let phi = 2.0 * PI * k as f64 / self.size as f64;
                let drop = if k % 2 == 1 { self.pucker_height } else { 0.0 };
                center + (e1 * phi.cos() + e2 * phi.sin()) * self.radius - normal.into_inner() * drop
            })
            .collect()
    }
}

struct Workspace {
    coordinates: Vec<f64>,
    placed: Vec<bool>,
}

impl Workspace {
    fn position(&self, atom: usize) -> Point3<f64> {
        Point3::new(
            self.coordinates[3 * atom],
            self.coordinates[3 * atom + 1],
            self.coordinates[3 * atom + 2],
        )
    }

    fn write(&mut self, atom: usize, p: &Point3<f64>) {
        self.coordinates[3 * atom..3 * atom + 3].copy_from_slice(&[p.x, p.y, p.z]);
    }

    fn commit(&mut self, molecule: &mut Molecule, atom: usize, p: Point3<f64>) {
        self.write(atom, &p);
        self.placed[atom] = true;
        if let Some(a) = molecule.atom_mut(atom) {
            a.position = p;
            a.is_placed = true;
        }
    }
}

pub struct PreOptimizer<'o> {
    oracle: &'o dyn EnergyOracle,
    config: PreOptimizerConfig,
    rng: StdRng,
}

impl<'o> PreOptimizer<'o> {
    pub fn new(oracle: &'o dyn EnergyOracle, config: PreOptimizerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            oracle,
            config,
            rng,
        }
    }

    /// Places every atom not marked in `seen`, leaving marked atoms untouched.
    /// `None` treats all atoms as unplaced.
    #[instrument(level = "debug", skip_all, fields(atoms = molecule.atom_count()))]
    pub fn place(
        &mut self,
        molecule: &mut Molecule,
        seen: Option<Vec<bool>>,
    ) -> Result<PlacementReport, PlacementError> {
        let n = molecule.atom_count();
        let placed = match seen {
            Some(mask) if mask.len() != n => {
                return Err(PlacementError::MaskLengthMismatch {
                    expected: n,
                    actual: mask.len(),
                });
            }
            Some(mask) => mask,
            None => vec![false; n],
        };
        let rings = molecule.ring_set();
        let mut ws = Workspace {
            coordinates: molecule.flat_coordinates(),
            placed,
        };
        let mut report = PlacementReport::default();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| ws.placed[i]).collect();
        let mut first_seed = true;

        loop {
            while let Some(atom) = queue.pop_front() {
                let neighbors = molecule.neighbors(atom).to_vec();
                for next in neighbors {
                    if ws.placed[next] {
                        continue;
                    }
                    let position = self.place_from(molecule, &mut ws, atom, next);
                    ws.commit(molecule, next, position);
                    report.placed += 1;
                    queue.push_back(next);
                    self.instantiate_rings(molecule, &rings, &mut ws, next, Some(atom), &mut queue, &mut report);
                }
            }

            let Some(seed) = (0..n).find(|&i| !ws.placed[i]) else {
                break;
            };
            let position = self.seed_position(&mut ws, seed, first_seed);
            first_seed = false;
            ws.commit(molecule, seed, position);
            report.placed += 1;
            queue.push_back(seed);
            self.instantiate_rings(molecule, &rings, &mut ws, seed, None, &mut queue, &mut report);
        }

        debug!(
            placed = report.placed,
            rings = report.rings_instantiated,
            "Initial geometry constructed"
        );
        Ok(report)
    }

    /// Re-places hydrogens while holding every heavy atom fixed.
    pub fn place_hydrogens(&mut self, molecule: &mut Molecule) -> Result<PlacementReport, PlacementError> {
        let seen = molecule
            .atoms()
            .iter()
            .map(|a| !a.element.is_hydrogen())
            .collect();
        self.place(molecule, Some(seen))
    }

    fn local_energy(&self, ws: &mut Workspace, candidates: &[(usize, Point3<f64>)]) -> f64 {
        for (atom, p) in candidates {
            ws.write(*atom, p);
            ws.placed[*atom] = true;
        }
        let energy = self.oracle.evaluate(&ws.coordinates, Some(&ws.placed), None);
        for (atom, _) in candidates {
            ws.placed[*atom] = false;
        }
        match energy {
            Ok(e) if e.is_finite() => e,
            _ => f64::INFINITY,
        }
    }

    fn best_candidate(
        &self,
        ws: &mut Workspace,
        atom: usize,
        candidates: impl IntoIterator<Item = Point3<f64>>,
    ) -> Point3<f64> {
        let mut best: Option<(f64, Point3<f64>)> = None;
        for p in candidates {
            let energy = self.local_energy(ws, &[(atom, p)]);
            if best.is_none_or(|(e, _)| energy < e) {
                best = Some((energy, p));
            }
        }
        best.map_or_else(|| ws.position(atom), |(_, p)| p)
    }

    fn place_from(&self, molecule: &Molecule, ws: &mut Workspace, anchor: usize, atom: usize) -> Point3<f64> {
        let length = molecule.ideal_bond_length(anchor, atom);
        let origin = ws.position(anchor);
        let resolution = self.config.angular_resolution;

        let partner = molecule.neighbors(anchor).iter().copied().find(|&n| {
            n != atom && ws.placed[n] && (ws.position(n) - origin).norm() > MIN_SEPARATION
        });

        let candidates: Vec<Point3<f64>> = match partner {
            Some(partner) => {
                let axis = Unit::new_normalize(ws.position(partner) - origin);
                let theta = molecule.ideal_bond_angle(anchor);
                let e1 = any_perpendicular(&axis).into_inner();
                let e2 = axis.cross(&e1);
                let steps = ((2.0 * PI / resolution).round() as usize).max(1);
                (0..steps)
                    .map(|j| {
                        let psi = 2.0 * PI * j as f64 / steps as f64;
                        let direction = axis.into_inner() * theta.cos()
                            + (e1 * psi.cos() + e2 * psi.sin()) * theta.sin();
                        origin + direction * length
                    })
                    .collect()
            }
            None => sphere_directions(resolution)
                .into_iter()
                .map(|d| origin + d * length)
                .collect(),
        };
        self.best_candidate(ws, atom, candidates)
    }

    fn seed_position(&mut self, ws: &mut Workspace, atom: usize, first: bool) -> Point3<f64> {
        if first {
            if let Some(origin) = self.config.origin {
                return origin;
            }
        }
        let n = ws.placed.len();
        let placed: Vec<Point3<f64>> = (0..n).filter(|&i| ws.placed[i]).map(|i| ws.position(i)).collect();
        let points = if placed.is_empty() {
            (0..n).map(|i| ws.position(i)).collect()
        } else {
            placed
        };
        let Some((min, max)) = bounding_box(&points) else {
            return Point3::origin();
        };
        let trials: Vec<Point3<f64>> = (0..self.config.seed_trials.max(1))
            .map(|_| {
                Point3::new(
                    self.rng.gen_range(min.x..=max.x),
                    self.rng.gen_range(min.y..=max.y),
                    self.rng.gen_range(min.z..=max.z),
                )
            })
            .collect();
        self.best_candidate(ws, atom, trials)
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate_rings(
        &mut self,
        molecule: &mut Molecule,
        rings: &RingSet,
        ws: &mut Workspace,
        anchor: usize,
        exocyclic: Option<usize>,
        queue: &mut VecDeque<usize>,
        report: &mut PlacementReport,
    ) {
        for ring in rings.rings_containing(anchor) {
            if ring.atoms().iter().any(|&a| a != anchor && ws.placed[a]) {
                continue;
            }
            let Some(order) = ring.rotated_to(anchor) else {
                continue;
            };
            let positions = self.ring_positions(molecule, ws, &order, exocyclic);
            for (&atom, position) in order.iter().zip(positions).skip(1) {
                ws.commit(molecule, atom, position);
                report.placed += 1;
                queue.push_back(atom);
            }
            report.rings_instantiated += 1;
        }
    }

    fn ring_positions(
        &mut self,
        molecule: &Molecule,
        ws: &mut Workspace,
        order: &[usize],
        exocyclic: Option<usize>,
    ) -> Vec<Point3<f64>> {
        let n = order.len();
        let bond_length = (0..n)
            .map(|k| molecule.ideal_bond_length(order[k], order[(k + 1) % n]))
            .sum::<f64>()
            / n as f64;
        let bond_angle = order.iter().map(|&a| molecule.ideal_bond_angle(a)).sum::<f64>() / n as f64;
        let model = RingModel::new(n, bond_length, bond_angle);

        let anchor = ws.position(order[0]);
        let away = exocyclic
            .map(|e| anchor - ws.position(e))
            .filter(|v| v.norm() > MIN_SEPARATION)
            .unwrap_or_else(|| random_unit(&mut self.rng).into_inner());
        // The centre lies on the side away from the exocyclic neighbour.
        let inward = Unit::new_normalize(away);
        let outward = Unit::new_unchecked(-inward.into_inner());
        let base_normal = any_perpendicular(&inward);

        let steps = ((2.0 * PI / self.config.angular_resolution).round() as usize).max(1);
        let mut best: Option<(f64, Vec<Point3<f64>>)> = None;
        for j in 0..steps {
            let psi = 2.0 * PI * j as f64 / steps as f64;
            let normal = Unit::new_normalize(
                rotate_about_axis(&Point3::from(base_normal.into_inner()), &Point3::origin(), &inward, psi)
                    .coords,
            );
            let positions = model.positions(&anchor, &outward, &normal);
            let candidates: Vec<(usize, Point3<f64>)> =
                order.iter().copied().zip(positions.iter().copied()).skip(1).collect();
            let energy = self.local_energy(ws, &candidates);
            if best.as_ref().is_none_or(|(e, _)| energy < *e) {
                best = Some((energy, positions));
            }
        }
        best.map(|(_, p)| p)
            .unwrap_or_else(|| model.positions(&anchor, &outward, &base_normal))
    }
}

/// Roughly uniform unit vectors: latitude rings spaced by `resolution`, each holding a
/// number of points proportional to its circumference.
fn sphere_directions(resolution: f64) -> Vec<Vector3<f64>> {
    let rings = ((PI / resolution).round() as usize).max(1);
    let mut out = Vec::new();
    for i in 0..=rings {
        let theta = PI * i as f64 / rings as f64;
        let count = ((2.0 * PI * theta.sin() / resolution).round() as usize).max(1);
        for j in 0..count {
            let psi = 2.0 * PI * j as f64 / count as f64;
            out.push(Vector3::new(
                theta.sin() * psi.cos(),
                theta.sin() * psi.sin(),
                theta.cos(),
            ));
        }
    }
    out
}

fn random_unit(rng: &mut StdRng) -> Unit<Vector3<f64>> {
    let z: f64 = rng.gen_range(-1.0..=1.0);
    let phi: f64 = rng.gen_range(0.0..2.0 * PI);
    let s = (1.0 - z * z).max(0.0).sqrt();
    Unit::new_normalize(Vector3::new(s * phi.cos(), s * phi.sin(), z))
}
