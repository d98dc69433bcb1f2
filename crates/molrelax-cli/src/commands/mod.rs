pub mod conformers;
pub mod relax;
