//! Trace presets: which root finder runs inside SDF cells, and the
//! iteration caps and tolerances around it.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::Result;

/// Root finder used for the trilinear surface inside one cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Report the cell entry point, no surface refinement
    Bbox,
    /// Sphere tracing against the trilinear field
    SphereTracing,
    /// Interval tracing with a local Lipschitz bound on the cubic
    IntervalTracing,
    /// Closed-form cubic roots
    #[default]
    Analytic,
    /// Newton iteration bracketed by the cubic's critical points
    Newton,
}

const SOLVER_NAMES: &[(&str, SolverKind)] = &[
    ("bbox", SolverKind::Bbox),
    ("sphere_tracing", SolverKind::SphereTracing),
    ("interval_tracing", SolverKind::IntervalTracing),
    ("analytic", SolverKind::Analytic),
    ("newton", SolverKind::Newton),
];

impl SolverKind {
    /// Unrecognized names fall back to the default solver (`"analytic"`)
    pub fn from_name(name: &str) -> SolverKind {
        for (n, kind) in SOLVER_NAMES {
            if *n == name {
                return *kind;
            }
        }
        log::warn!("unknown solver '{name}', using default");
        SolverKind::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracePreset {
    pub solver: SolverKind,
    /// Zero-crossing tolerance inside a cell, in cell units
    pub sdf_eps: f32,
    /// World-space tolerance for sphere tracing whole fields
    pub field_eps: f32,
    pub st_max_iters: u32,
    pub it_max_iters: u32,
    pub newton_max_iters: u32,
    /// Interpolated density treated as a surface in radiance fields
    pub rf_density_threshold: f32,
}

impl Default for TracePreset {
    fn default() -> TracePreset {
        TracePreset {
            solver: SolverKind::default(),
            sdf_eps: 1e-6,
            field_eps: 1e-4,
            st_max_iters: 256,
            it_max_iters: 256,
            newton_max_iters: 10,
            rf_density_threshold: 0.5,
        }
    }
}

impl TracePreset {
    pub fn with_solver(solver: SolverKind) -> TracePreset {
        TracePreset { solver, ..Default::default() }
    }

    pub fn from_json(s: &str) -> Result<TracePreset> {
        serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }
}
