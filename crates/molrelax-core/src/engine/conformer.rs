use crate::core::models::molecule::RotatableBond;
use crate::core::utils::geometry::{angular_difference, dihedral_angle};
use nalgebra::Point3;
use slotmap::{SlotMap, new_key_type};
use std::f64::consts::PI;

new_key_type! {
    pub struct ConformerId;
}

/// One dihedral angle per rotatable bond, with the period under which each angle is
/// indistinguishable (2*PI divided by the bond's terminal symmetry).
#[derive(Debug, Clone, PartialEq)]
pub struct TorsionFingerprint {
    angles: Vec<f64>,
    periods: Vec<f64>,
}

impl TorsionFingerprint {
    pub fn compute(bonds: &[RotatableBond], positions: &[Point3<f64>]) -> Self {
        let mut angles = Vec::with_capacity(bonds.len());
        let mut periods = Vec::with_capacity(bonds.len());
        for bond in bonds {
            let [a, b, c, d] = bond.dihedral_atoms();
            angles.push(dihedral_angle(
                &positions[a],
                &positions[b],
                &positions[c],
                &positions[d],
            ));
            periods.push(2.0 * PI / bond.symmetry.max(1) as f64);
        }
        Self { angles, periods }
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// True when every bond's angles agree within `tolerance` radians.
    pub fn matches(&self, other: &TorsionFingerprint, tolerance: f64) -> bool {
        self.angles.len() == other.angles.len()
            && self
                .angles
                .iter()
                .zip(&other.angles)
                .zip(&self.periods)
                .all(|((a, b), period)| angular_difference(*a, *b, *period) <= tolerance)
    }
}

/// An immutable snapshot of one minimized geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    coordinates: Vec<Point3<f64>>,
    energy: f64,
    fingerprint: TorsionFingerprint,
}

impl Conformer {
    pub fn new(coordinates: Vec<Point3<f64>>, energy: f64, fingerprint: TorsionFingerprint) -> Self {
        Self {
            coordinates,
            energy,
            fingerprint,
        }
    }

    pub fn from_geometry(bonds: &[RotatableBond], coordinates: Vec<Point3<f64>>, energy: f64) -> Self {
        let fingerprint = TorsionFingerprint::compute(bonds, &coordinates);
        Self::new(coordinates, energy, fingerprint)
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn fingerprint(&self) -> &TorsionFingerprint {
        &self.fingerprint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(ConformerId),
    Duplicate { of: ConformerId },
}

/// Accumulates conformers that are pairwise distinct under the torsion fingerprint.
#[derive(Debug, Clone)]
pub struct ConformerSet {
    conformers: SlotMap<ConformerId, Conformer>,
    order: Vec<ConformerId>,
    tolerance: f64,
    duplicates: usize,
}

impl ConformerSet {
    pub fn new(tolerance: f64) -> Self {
        Self {
            conformers: SlotMap::with_key(),
            order: Vec::new(),
            tolerance,
            duplicates: 0,
        }
    }

    /// Stores `conformer` unless an accepted one already matches its fingerprint.
    pub fn admit(&mut self, conformer: Conformer) -> Admission {
        if let Some(&of) = self.order.iter().find(|&&id| {
            self.conformers[id]
                .fingerprint
                .matches(&conformer.fingerprint, self.tolerance)
        }) {
            self.duplicates += 1;
            return Admission::Duplicate { of };
        }
        let id = self.conformers.insert(conformer);
        self.order.push(id);
        Admission::Accepted(id)
    }

    pub fn get(&self, id: ConformerId) -> Option<&Conformer> {
        self.conformers.get(id)
    }

    pub fn len(&self) -> usize {
        self.conformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformers.is_empty()
    }

    /// Number of rejected duplicates so far.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Accepted conformers in admission order.
    pub fn iter(&self) -> impl Iterator<Item = (ConformerId, &Conformer)> {
        self.order.iter().map(|&id| (id, &self.conformers[id]))
    }

    /// Accepted conformers, lowest energy first.
    pub fn into_sorted(mut self) -> Vec<Conformer> {
        let mut out: Vec<Conformer> = self
            .order
            .iter()
            .filter_map(|&id| self.conformers.remove(id))
            .collect();
        out.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(angles: &[f64], symmetry: &[u32]) -> TorsionFingerprint {
        TorsionFingerprint {
            angles: angles.to_vec(),
            periods: symmetry.iter().map(|&s| 2.0 * PI / s as f64).collect(),
        }
    }

    fn conformer(angles: &[f64], energy: f64) -> Conformer {
        Conformer::new(Vec::new(), energy, fingerprint(angles, &vec![1; angles.len()]))
    }

    #[test]
    fn fingerprint_match_respects_tolerance_and_wraparound() {
        let a = fingerprint(&[PI - 0.05, 1.0], &[1, 1]);
        let b = fingerprint(&[-PI + 0.05, 1.2], &[1, 1]);
        assert!(a.matches(&b, 0.25));
        assert!(!a.matches(&b, 0.15));
    }

    #[test]
    fn fingerprint_match_uses_rotor_symmetry() {
        let a = fingerprint(&[0.0], &[3]);
        let b = fingerprint(&[2.0 * PI / 3.0 + 0.01], &[3]);
        assert!(a.matches(&b, 0.05));
        let c = fingerprint(&[2.0 * PI / 3.0 + 0.01], &[1]);
        assert!(!fingerprint(&[0.0], &[1]).matches(&c, 0.05));
    }

    #[test]
    fn identical_torsions_requested_five_times_yield_one_conformer_and_four_duplicates() {
        let mut set = ConformerSet::new(30f64.to_radians());
        let mut first = None;
        for _ in 0..5 {
            match set.admit(conformer(&[1.0], -2.0)) {
                Admission::Accepted(id) => {
                    assert!(first.is_none());
                    first = Some(id);
                }
                Admission::Duplicate { of } => assert_eq!(Some(of), first),
            }
        }
        assert_eq!(set.len(), 1);
        assert_eq!(set.duplicates(), 4);
    }

    #[test]
    fn accepted_set_is_pairwise_distinct() {
        let tolerance = 0.3;
        let mut set = ConformerSet::new(tolerance);
        for (i, angle) in [0.0, 0.1, 1.0, 1.2, 2.5, -2.0, 0.95, 3.1].iter().enumerate() {
            set.admit(conformer(&[*angle, 0.5], i as f64));
        }
        let accepted: Vec<&Conformer> = set.iter().map(|(_, c)| c).collect();
        for (i, a) in accepted.iter().enumerate() {
            for b in &accepted[i + 1..] {
                assert!(!a.fingerprint().matches(b.fingerprint(), tolerance));
            }
        }
        assert_eq!(set.len() + set.duplicates(), 8);
    }

    #[test]
    fn into_sorted_orders_by_energy() {
        let mut set = ConformerSet::new(0.1);
        set.admit(conformer(&[0.0], 3.0));
        set.admit(conformer(&[1.0], -1.0));
        set.admit(conformer(&[2.0], 1.5));
        let energies: Vec<f64> = set.into_sorted().iter().map(Conformer::energy).collect();
        assert_eq!(energies, vec![-1.0, 1.5, 3.0]);
    }

    #[test]
    fn molecules_without_rotatable_bonds_have_a_single_conformer() {
        let mut set = ConformerSet::new(0.1);
        assert!(matches!(set.admit(conformer(&[], 0.0)), Admission::Accepted(_)));
        assert!(matches!(set.admit(conformer(&[], -1.0)), Admission::Duplicate { .. }));
    }
}
