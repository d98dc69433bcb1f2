//! TOML descriptions of molecules and of the results written back out.
//!
//! ```toml
//! name = "butane"
//!
//! [[atoms]]
//! element = "C"
//! position = [1.2, 0.4, 0.0]   # optional
//! rigid = false
//!
//! [[bonds]]
//! atoms = [0, 1]
//! order = "single"
//! ```
//!
//! An atom without a `position` is read as unplaced. With `--preoptimize`, exactly those
//! atoms get constructed coordinates; a position given as `[0.0, 0.0, 0.0]` is kept.

use crate::error::{CliError, Result};
use molrelax::core::models::atom::Atom;
use molrelax::core::models::element::Element;
use molrelax::core::models::molecule::Molecule;
use molrelax::core::models::topology::BondOrder;
use molrelax::engine::conformer::Conformer;
use molrelax::engine::optimizer::StopReason;
use molrelax::workflows::conformers::ConformerSearchResult;
use molrelax::workflows::relax::RelaxResult;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AtomRecord {
    pub element: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rigid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BondRecord {
    pub atoms: [usize; 2],
    #[serde(default = "default_order")]
    pub order: String,
}

fn default_order() -> String {
    "single".to_string()
}

fn order_name(order: BondOrder) -> &'static str {
    match order {
        BondOrder::Single => "single",
        BondOrder::Double => "double",
        BondOrder::Triple => "triple",
        BondOrder::Aromatic => "aromatic",
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MoleculeFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub atoms: Vec<AtomRecord>,
    #[serde(default)]
    pub bonds: Vec<BondRecord>,
}

impl MoleculeFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn to_molecule(&self) -> Result<Molecule> {
        let mut molecule = Molecule::new();
        for (index, record) in self.atoms.iter().enumerate() {
            let element: Element = record
                .element
                .parse()
                .map_err(|e| CliError::Molecule(format!("atom {index}: {e}")))?;
            let mut atom = match record.position {
                Some([x, y, z]) => Atom::new(element, Point3::new(x, y, z)),
                None => Atom::unplaced(element),
            };
            if record.rigid {
                atom = atom.rigid();
            }
            molecule.add_atom(atom);
        }
        for bond in &self.bonds {
            let order: BondOrder = bond.order.parse().map_err(|_| {
                CliError::Molecule(format!(
                    "unknown bond order '{}' for bond {}-{}",
                    bond.order, bond.atoms[0], bond.atoms[1]
                ))
            })?;
            molecule
                .add_bond(bond.atoms[0], bond.atoms[1], order)
                .map_err(|e| CliError::Molecule(e.to_string()))?;
        }
        Ok(molecule)
    }

    pub fn from_molecule(name: Option<String>, molecule: &Molecule) -> Self {
        Self::with_positions(name, molecule, &molecule.positions())
    }

    fn with_positions(name: Option<String>, molecule: &Molecule, positions: &[Point3<f64>]) -> Self {
        let atoms = molecule
            .atoms()
            .iter()
            .zip(positions)
            .map(|(atom, p)| AtomRecord {
                element: atom.element.symbol().to_string(),
                position: Some([p.x, p.y, p.z]),
                rigid: atom.is_rigid,
            })
            .collect();
        let bonds = molecule
            .bonds()
            .iter()
            .map(|b| BondRecord {
                atoms: [b.atom1, b.atom2],
                order: order_name(b.order).to_string(),
            })
            .collect();
        Self { name, atoms, bonds }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct RelaxReport {
    pub energy: f64,
    pub initial_energy: f64,
    pub iterations: usize,
    pub converged: bool,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub molecule: MoleculeFile,
}

impl RelaxReport {
    pub fn new(name: Option<String>, result: &RelaxResult) -> Self {
        Self {
            energy: result.optimization.energy,
            initial_energy: result.optimization.initial_energy,
            iterations: result.optimization.iterations,
            converged: result.converged(),
            stop_reason: result.optimization.stop_reason,
            message: result.optimization.message.clone(),
            molecule: MoleculeFile::from_molecule(name, &result.molecule),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct ConformerRecord {
    pub rank: usize,
    pub energy: f64,
    pub torsions_degrees: Vec<f64>,
    pub molecule: MoleculeFile,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct ConformerReport {
    pub requested: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub failures: usize,
    pub attempts: usize,
    pub cancelled: bool,
    pub conformers: Vec<ConformerRecord>,
}

impl ConformerReport {
    pub fn new(
        name: Option<String>,
        molecule: &Molecule,
        requested: usize,
        result: &ConformerSearchResult,
    ) -> Self {
        let conformers = result
            .conformers
            .iter()
            .enumerate()
            .map(|(i, c)| conformer_record(name.clone(), molecule, i + 1, c))
            .collect();
        Self {
            requested,
            accepted: result.conformers.len(),
            duplicates: result.duplicates,
            failures: result.failures,
            attempts: result.attempts,
            cancelled: result.cancelled,
            conformers,
        }
    }
}

fn conformer_record(name: Option<String>, molecule: &Molecule, rank: usize, conformer: &Conformer) -> ConformerRecord {
    ConformerRecord {
        rank,
        energy: conformer.energy(),
        torsions_degrees: conformer
            .fingerprint()
            .angles()
            .iter()
            .map(|a| a.to_degrees())
            .collect(),
        molecule: MoleculeFile::with_positions(name, molecule, conformer.coordinates()),
    }
}

/// Serializes `report` as TOML into `path`.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let content = toml::to_string(report).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const ETHANOL_SKELETON: &str = r#"
        name = "ethanol"

        [[atoms]]
        element = "C"
        position = [0.0, 0.0, 0.0]

        [[atoms]]
        element = "C"
        position = [1.52, 0.0, 0.0]
        rigid = true

        [[atoms]]
        element = "O"

        [[bonds]]
        atoms = [0, 1]

        [[bonds]]
        atoms = [1, 2]
        order = "single"
    "#;

    #[test]
    fn reads_atoms_bonds_and_unplaced_positions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ethanol.toml");
        fs::write(&path, ETHANOL_SKELETON).unwrap();

        let file = MoleculeFile::read(&path).unwrap();
        let molecule = file.to_molecule().unwrap();

        assert_eq!(file.name.as_deref(), Some("ethanol"));
        assert_eq!(molecule.atom_count(), 3);
        assert_eq!(molecule.bonds().len(), 2);
        assert!(molecule.atoms()[1].is_rigid);
        assert_eq!(molecule.atoms()[2].element, Element::O);
        assert_eq!(molecule.atoms()[2].position, Point3::origin());
        assert!(!molecule.atoms()[2].is_placed);
    }

    #[test]
    fn explicit_origin_position_is_placed() {
        let file: MoleculeFile = toml::from_str(ETHANOL_SKELETON).unwrap();
        let molecule = file.to_molecule().unwrap();

        assert_eq!(molecule.atoms()[0].position, Point3::origin());
        assert_eq!(molecule.placed_mask(), vec![true, true, false]);
    }

    #[test]
    fn rejects_unknown_elements_and_bad_bonds() {
        let unknown_element = MoleculeFile {
            name: None,
            atoms: vec![AtomRecord {
                element: "Zz".to_string(),
                position: None,
                rigid: false,
            }],
            bonds: vec![],
        };
        assert!(matches!(unknown_element.to_molecule(), Err(CliError::Molecule(msg)) if msg.contains("atom 0")));

        let mut self_bond: MoleculeFile = toml::from_str(ETHANOL_SKELETON).unwrap();
        self_bond.bonds.push(BondRecord {
            atoms: [2, 2],
            order: default_order(),
        });
        assert!(matches!(self_bond.to_molecule(), Err(CliError::Molecule(_))));

        let mut bad_order: MoleculeFile = toml::from_str(ETHANOL_SKELETON).unwrap();
        bad_order.bonds[0].order = "quintuple".to_string();
        assert!(matches!(bad_order.to_molecule(), Err(CliError::Molecule(msg)) if msg.contains("quintuple")));
    }

    #[test]
    fn written_molecule_can_be_read_back() {
        let file: MoleculeFile = toml::from_str(ETHANOL_SKELETON).unwrap();
        let molecule = file.to_molecule().unwrap();
        let written = MoleculeFile::from_molecule(file.name.clone(), &molecule);

        let reparsed: MoleculeFile = toml::from_str(&toml::to_string(&written).unwrap()).unwrap();
        let again = reparsed.to_molecule().unwrap();
        assert_eq!(again.positions(), molecule.positions());
        assert_eq!(again.bonds(), molecule.bonds());
        assert!(again.atoms()[1].is_rigid);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<MoleculeFile, _> =
            toml::from_str("[[atoms]]\nelement = \"C\"\ncharge = 1\n");
        assert!(result.is_err());
    }
}
