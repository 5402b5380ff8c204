//! Ray queries: two-level traversal, per-representation leaf
//! intersection and the trilinear surface solver.

pub mod preset;
pub mod solver;
pub mod traverse;
pub mod leaf;

pub use preset::{SolverKind, TracePreset};
pub use traverse::{Hit, INVALID_ID};
