//! Error types for solver construction and time integration.
//!
//! Configuration problems are rejected when the runner is built; runtime
//! failures (a diverging pressure solve, a cooperative panic raised by a
//! worker) surface from `advance`. The library never tries to recover from
//! its own fatal conditions; they are returned to the driver, which owns
//! logging and process exit.

use thiserror::Error;

/// Rejected configuration, reported at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A grid dimension with fewer than one cell.
    #[error("bogus grid size: dimension {dim} has {size} cells")]
    BogusGridSize { dim: usize, size: usize },

    /// The solver needs at least one prognostic equation.
    #[error("at least one equation is required")]
    NoEquations,

    /// Fewer than one MPDATA pass makes no sense.
    #[error("n_iters must be >= 1, got {0}")]
    BogusIterCount(usize),

    /// Grid spacing must be non-negative, and strictly positive wherever
    /// the pressure solver divides by it.
    #[error("bogus grid spacing in dimension {dim}: {value}")]
    BogusSpacing { dim: usize, value: f64 },

    /// `dt == 0` selects adaptive stepping, which needs a Courant target.
    #[error("adaptive time stepping (dt = 0) requires max_courant > 0")]
    AdaptiveWithoutCourant,

    /// The pressure projection acts on the velocity-in-pressure subset;
    /// without those equation indices there is nothing to project.
    #[error("pressure solver configured without velocity-in-pressure indices")]
    PressureWithoutVip,

    /// A velocity-in-pressure index referring to a non-existent equation.
    #[error("velocity index {index} out of range for {n_eqns} equations")]
    BogusVipIndex { index: usize, n_eqns: usize },

    /// Every worker must own at least one column of the outermost dimension.
    #[error("{workers} workers cannot share {columns} grid columns")]
    TooManyWorkers { workers: usize, columns: usize },

    /// An auxiliary scalar array that was never declared in the parameters.
    #[error("unknown auxiliary array {0:?}")]
    UnknownArray(String),

    /// The velocity absorber needs both a coefficient field and a relaxed
    /// state, which are only allocated when it is enabled.
    #[error("velocity absorber accessed but not enabled")]
    AbsorberDisabled,

    /// The absorber relaxes the velocity-in-pressure components; without
    /// them there is nothing to relax.
    #[error("velocity absorber configured without velocity-in-pressure indices")]
    AbsorberWithoutVip,
}

/// Fatal runtime failure raised while advancing the solution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The elliptic solver exhausted its iteration cap without driving the
    /// residual below `prs_tol`. Continuing with an inaccurate pressure
    /// field would silently violate the divergence constraint.
    #[error("pressure solver failed to converge: |r| = {residual:.3e} after {iters} iterations")]
    PressureDiverged { iters: usize, residual: f64 },

    /// A worker raised the cooperative panic flag; all workers unwound at
    /// the next barrier.
    #[error("solver panicked: {0}")]
    Panicked(String),
}
