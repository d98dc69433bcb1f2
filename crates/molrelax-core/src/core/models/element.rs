use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical element of an atom.
///
/// Only the elements that commonly occur in organic molecules are named explicitly;
/// anything else is carried as [`Element::Other`] and receives generic radii.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Element {
    H,
    B,
    #[default]
    C,
    N,
    O,
    F,
    Si,
    P,
    S,
    Cl,
    Br,
    I,
    Other,
}

static ELEMENT_SYMBOLS: Map<&'static str, Element> = phf_map! {
    "H" => Element::H,
    "D" => Element::H,
    "B" => Element::B,
    "C" => Element::C,
    "N" => Element::N,
    "O" => Element::O,
    "F" => Element::F,
    "SI" => Element::Si,
    "P" => Element::P,
    "S" => Element::S,
    "CL" => Element::Cl,
    "BR" => Element::Br,
    "I" => Element::I,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol: '{0}'")]
pub struct ParseElementError(pub String);

impl Element {
    /// Single-bond covalent radius in Angstroms.
    pub fn covalent_radius(self) -> f64 {
        match self {
            Element::H => 0.31,
            Element::B => 0.84,
            Element::C => 0.76,
            Element::N => 0.71,
            Element::O => 0.66,
            Element::F => 0.57,
            Element::Si => 1.11,
            Element::P => 1.07,
            Element::S => 1.05,
            Element::Cl => 1.02,
            Element::Br => 1.20,
            Element::I => 1.39,
            Element::Other => 1.50,
        }
    }

    /// Van der Waals radius in Angstroms, used for non-bonded contact distances.
    pub fn vdw_radius(self) -> f64 {
        match self {
            Element::H => 1.10,
            Element::B => 1.92,
            Element::C => 1.70,
            Element::N => 1.55,
            Element::O => 1.52,
            Element::F => 1.47,
            Element::Si => 2.10,
            Element::P => 1.80,
            Element::S => 1.80,
            Element::Cl => 1.75,
            Element::Br => 1.85,
            Element::I => 1.98,
            Element::Other => 2.00,
        }
    }

    pub fn is_hydrogen(self) -> bool {
        self == Element::H
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Element::H => "H",
            Element::B => "B",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::F => "F",
            Element::Si => "Si",
            Element::P => "P",
            Element::S => "S",
            Element::Cl => "Cl",
            Element::Br => "Br",
            Element::I => "I",
            Element::Other => "X",
        }
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        if key == "X" {
            return Ok(Element::Other);
        }
        ELEMENT_SYMBOLS
            .get(key.as_str())
            .copied()
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_case_insensitively() {
        assert_eq!("C".parse::<Element>().unwrap(), Element::C);
        assert_eq!("cl".parse::<Element>().unwrap(), Element::Cl);
        assert_eq!("Br".parse::<Element>().unwrap(), Element::Br);
        assert_eq!(" si ".parse::<Element>().unwrap(), Element::Si);
    }

    #[test]
    fn deuterium_is_treated_as_hydrogen() {
        assert_eq!("D".parse::<Element>().unwrap(), Element::H);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        assert_eq!(
            "Xy".parse::<Element>(),
            Err(ParseElementError("Xy".to_string()))
        );
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for element in [Element::H, Element::C, Element::Cl, Element::Si] {
            assert_eq!(element.to_string().parse::<Element>().unwrap(), element);
        }
    }

    #[test]
    fn covalent_radii_sum_to_reasonable_carbon_carbon_bond() {
        let cc = Element::C.covalent_radius() * 2.0;
        assert!((cc - 1.52).abs() < 0.05);
    }
}
