//! Compute module - Grid model, transitions, bitset codec, stabilization.

mod bitset;
mod grid;
mod stabilization;
pub(crate) mod transition;

pub use bitset::*;
pub use grid::*;
pub use stabilization::*;
pub use transition::*;
