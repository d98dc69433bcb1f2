use super::Evaluable;
use super::transform::{TransformChain, TransformError};
use crate::core::forcefield::oracle::{EnergyOracle, OracleError};
use crate::core::models::molecule::Molecule;
use nalgebra::Point3;
use tracing::warn;

/// A molecule whose coordinates are driven by a [`TransformChain`] and scored by an
/// [`EnergyOracle`].
///
/// The evaluable takes ownership of the molecule for the duration of a run: every
/// `set_state` writes the rebuilt coordinates straight into it, and
/// [`MoleculeEvaluable::into_molecule`] hands it back afterwards.
pub struct MoleculeEvaluable<'o> {
    molecule: Molecule,
    oracle: &'o dyn EnergyOracle,
    chain: TransformChain,
    reference: Vec<Point3<f64>>,
    positions: Vec<Point3<f64>>,
    state: Vec<f64>,
    cartesian_gradient: Vec<f64>,
}

impl<'o> MoleculeEvaluable<'o> {
    /// Wraps `molecule`, taking its current geometry as the reference of `chain`.
    pub fn new(
        molecule: Molecule,
        oracle: &'o dyn EnergyOracle,
        chain: TransformChain,
    ) -> Result<Self, TransformError> {
        if chain.atom_count() != molecule.atom_count() {
            return Err(TransformError::LengthMismatch {
                what: "molecule atoms",
                expected: chain.atom_count(),
                actual: molecule.atom_count(),
            });
        }
        Ok(Self::build(molecule, oracle, chain))
    }

    pub fn cartesian(molecule: Molecule, oracle: &'o dyn EnergyOracle) -> Self {
        let chain = TransformChain::cartesian(&molecule);
        Self::build(molecule, oracle, chain)
    }

    pub fn rigid_body(molecule: Molecule, oracle: &'o dyn EnergyOracle) -> Self {
        let chain = TransformChain::rigid_body(&molecule);
        Self::build(molecule, oracle, chain)
    }

    pub fn torsional(molecule: Molecule, oracle: &'o dyn EnergyOracle) -> Self {
        let chain = TransformChain::torsional(&molecule);
        Self::build(molecule, oracle, chain)
    }

    pub fn torsional_rigid(molecule: Molecule, oracle: &'o dyn EnergyOracle) -> Self {
        let chain = TransformChain::torsional_rigid(&molecule);
        Self::build(molecule, oracle, chain)
    }

    fn build(
        molecule: Molecule,
        oracle: &'o dyn EnergyOracle,
        chain: TransformChain,
    ) -> Self {
        let reference = molecule.positions();
        let state = chain.initial_state(&reference);
        let atom_count = molecule.atom_count();
        Self {
            positions: reference.clone(),
            reference,
            state,
            cartesian_gradient: vec![0.0; 3 * atom_count],
            molecule,
            oracle,
            chain,
        }
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn chain(&self) -> &TransformChain {
        &self.chain
    }

    /// Ends the run and returns the molecule at the last installed state.
    pub fn into_molecule(self) -> Molecule {
        self.molecule
    }
}

impl Evaluable for MoleculeEvaluable<'_> {
    fn dof(&self) -> usize {
        self.chain.dof()
    }

    fn state_into(&self, out: &mut [f64]) {
        out.copy_from_slice(&self.state);
    }

    fn set_state(&mut self, state: &[f64]) {
        if let Err(e) = self.chain.apply(state, &self.reference, &mut self.positions) {
            warn!(error = %e, "Rejected state; keeping the previous geometry");
            return;
        }
        self.state.copy_from_slice(state);
        self.molecule.set_positions(&self.positions);
    }

    fn value_and_gradient(&mut self, gradient: Option<&mut [f64]>) -> Result<f64, OracleError> {
        let coordinates = self.molecule.flat_coordinates();
        match gradient {
            None => self.oracle.evaluate(&coordinates, None, None),
            Some(gradient) => {
                let energy = self.oracle.evaluate(
                    &coordinates,
                    None,
                    Some(self.cartesian_gradient.as_mut_slice()),
                )?;
                self.chain
                    .project_gradient(
                        &self.state,
                        &self.positions,
                        &self.cartesian_gradient,
                        gradient,
                    )
                    .map_err(|e| OracleError::new(e.to_string()))?;
                Ok(energy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::ForceFieldParams;
    use crate::core::forcefield::reference::HarmonicForceField;
    use crate::core::models::molecule::tests::butane_with_methyl_hydrogens;

    fn bent_butane() -> Molecule {
        let mut mol = butane_with_methyl_hydrogens();
        let mut coords = mol.flat_coordinates();
        for (i, c) in coords.iter_mut().enumerate() {
            *c += 0.1 * ((i * 5 % 7) as f64 - 3.0);
        }
        mol.set_flat_coordinates(&coords);
        mol
    }

    fn finite_difference(evaluable: &mut MoleculeEvaluable<'_>, state: &[f64]) -> Vec<f64> {
        let h = 1e-6;
        let mut shifted = state.to_vec();
        let mut out = vec![0.0; state.len()];
        for k in 0..state.len() {
            shifted[k] = state[k] + h;
            evaluable.set_state(&shifted);
            let plus = evaluable.value_and_gradient(None).unwrap();
            shifted[k] = state[k] - h;
            evaluable.set_state(&shifted);
            let minus = evaluable.value_and_gradient(None).unwrap();
            shifted[k] = state[k];
            out[k] = (plus - minus) / (2.0 * h);
        }
        evaluable.set_state(state);
        out
    }

    #[test]
    fn round_trip_law_holds_for_every_parameterization() {
        let mol = bent_butane();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        for mut evaluable in [
            MoleculeEvaluable::cartesian(mol.clone(), &oracle),
            MoleculeEvaluable::rigid_body(mol.clone(), &oracle),
            MoleculeEvaluable::torsional(mol.clone(), &oracle),
            MoleculeEvaluable::torsional_rigid(mol.clone(), &oracle),
        ] {
            let mut state = evaluable.state();
            for (i, s) in state.iter_mut().enumerate() {
                *s += 0.05 * (i as f64 + 1.0);
            }
            evaluable.set_state(&state);
            let read = evaluable.state();
            evaluable.set_state(&read);
            assert_eq!(evaluable.state(), read);
            assert_eq!(read, state);
        }
    }

    #[test]
    fn gradient_has_dof_length_and_matches_finite_differences() {
        let mol = bent_butane();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        for mut evaluable in [
            MoleculeEvaluable::cartesian(mol.clone(), &oracle),
            MoleculeEvaluable::torsional_rigid(mol.clone(), &oracle),
        ] {
            let mut state = evaluable.state();
            for (i, s) in state.iter_mut().enumerate() {
                *s += 0.03 * ((i % 4) as f64 - 1.5);
            }
            evaluable.set_state(&state);
            let mut gradient = vec![0.0; evaluable.dof()];
            evaluable.value_and_gradient(Some(&mut gradient)).unwrap();
            let numeric = finite_difference(&mut evaluable, &state);
            assert_eq!(gradient.len(), evaluable.dof());
            for (a, n) in gradient.iter().zip(&numeric) {
                assert!((a - n).abs() < 1e-4 * (1.0 + n.abs()), "{a} vs {n}");
            }
        }
    }

    #[test]
    fn set_state_moves_the_owned_molecule() {
        let mol = bent_butane();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let mut evaluable = MoleculeEvaluable::rigid_body(mol.clone(), &oracle);
        evaluable.set_state(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let moved = evaluable.into_molecule();
        let dx = moved.atoms()[2].position.x - mol.atoms()[2].position.x;
        assert!((dx - 1.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_length_state_leaves_state_and_molecule_unchanged() {
        let mol = bent_butane();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let mut evaluable = MoleculeEvaluable::rigid_body(mol.clone(), &oracle);
        let before = evaluable.state();

        evaluable.set_state(&[1.0, 0.0, 0.0]);

        assert_eq!(evaluable.state(), before);
        assert_eq!(evaluable.molecule().positions(), mol.positions());
    }

    #[test]
    fn new_rejects_chains_built_for_another_molecule() {
        let mol = bent_butane();
        let oracle = HarmonicForceField::new(&mol, ForceFieldParams::default());
        let chain = TransformChain::new(Vec::new(), 3).unwrap();
        assert!(MoleculeEvaluable::new(mol, &oracle, chain).is_err());
    }
}
