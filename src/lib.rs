//! # mpdata-rs
//!
//! Building blocks for solving advection-dominated PDEs on regular
//! Cartesian grids in 1–3 dimensions with the MPDATA family of schemes:
//!
//! - dense fields with halo-carrying (negative) index bases
//! - boundary conditions (cyclic, rigid, polar, open) with a common
//!   halo-filling protocol
//! - stateless numerical kernels (donor-cell, antidiffusive velocity,
//!   flux-corrected transport, centred nabla operators)
//! - a shared-memory substrate with barriers and deterministic
//!   cross-worker reductions
//! - the time-stepping engine: MPDATA advection, explicit/trapezoidal
//!   forcings, advector extrapolation from prognostic velocities, a
//!   velocity absorber, and an iterative elliptic pressure projection
//!   (minimum-residual, conjugate-residual or Richardson)
//!
//! The prognostic scalar fields are transported by a staggered advective
//! Courant field on an Arakawa-C mesh; slow forcings and the fast
//! pressure response are integrated in a time-split manner. Work is
//! partitioned into contiguous slabs of the outermost dimension across
//! worker threads.
//!
//! # Example
//!
//! ```
//! use mpdata_rs::{BcondKind, Runner, RtParams};
//!
//! // 1-D cyclic advection of a box signal at C = 0.5
//! let mut prm: RtParams<1> = RtParams::new([100]);
//! prm.dt = 1.0;
//! prm.n_iters = 2;
//! let mut run = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 1).unwrap();
//! run.advectee(0)
//!     .assign([mpdata_rs::grid::Rng::new(0, 99)], |ix| {
//!         if (40..=60).contains(&ix[0]) { 1.0 } else { 0.0 }
//!     });
//! run.advector(0).fill(0.5);
//! run.advance(10).unwrap();
//! // transport is conservative under periodic boundaries
//! let total = run.state(0).sum([mpdata_rs::grid::Rng::new(0, 99)]);
//! assert!((total - 21.0).abs() < 1e-9);
//! ```

pub mod arr;
pub mod bcond;
pub mod concurr;
pub mod error;
pub mod formulae;
pub mod grid;
pub mod solvers;

// Re-export the main types for convenience
pub use arr::{ArrMut, ArrRef, SharedArr};
pub use bcond::{Bcond, BcondKind};
pub use concurr::{Runner, ScratchKey, SharedMem};
pub use error::{ConfigError, SolverError};
pub use grid::{Grid, Region, Rng, Side};
pub use solvers::{
    Forcings, OutVar, PrsParams, PrsScheme, RhsScheme, RhsStage, RtParams, StepContext,
};
