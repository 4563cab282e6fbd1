//! Solver configuration and the forcings seam.
//!
//! [`RtParams`] collects every runtime option the engine recognises; the
//! runner validates it once at construction. The [`Forcings`] trait is the
//! extension point for problem-specific right-hand sides: implementations
//! receive a [`StepContext`] scoped to the calling worker's slab and apply
//! their increments in place.

pub(crate) mod pressure;
pub(crate) mod stepper;
pub(crate) mod vip;

use crate::arr::SharedArr;
use crate::concurr::SharedMem;
use crate::grid::{Grid, Region};

/// Pressure-projection iteration scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrsScheme {
    /// Minimum-residual: β chosen to minimise the next residual norm.
    MinRes,
    /// Conjugate-residual: keeps an A-conjugate search direction.
    ConjRes,
    /// Fixed β = 0.25; unconditionally convergent, slowest.
    Richardson,
}

/// Pressure-projection options.
#[derive(Clone, Copy, Debug)]
pub struct PrsParams {
    /// Iteration scheme.
    pub scheme: PrsScheme,
    /// Convergence threshold on `‖r‖∞`.
    pub tol: f64,
}

/// How the explicit forcings are split across the step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RhsScheme {
    /// One full-step application before advection.
    #[default]
    Euler,
    /// Half before advection, half after (trapezoidal).
    Trapez,
}

/// Description of one output variable, passed through to the output
/// collaborator untouched.
#[derive(Clone, Debug)]
pub struct OutVar {
    /// Equation index.
    pub eqn: usize,
    /// Variable name.
    pub name: String,
    /// Unit string.
    pub unit: String,
}

/// Runtime parameters (see the runner for validation rules).
#[derive(Clone, Debug)]
pub struct RtParams<const D: usize> {
    /// Interior cells per dimension; every entry must be at least 1.
    pub grid_size: [usize; D],
    /// Time step; `0` selects adaptive stepping driven by `max_courant`.
    pub dt: f64,
    /// Cell spacing per dimension.
    pub spacing: [f64; D],
    /// Number of prognostic equations.
    pub n_eqns: usize,
    /// Total MPDATA passes (1 = pure donor-cell).
    pub n_iters: usize,
    /// Clamp corrective passes with flux-corrected transport.
    pub fct: bool,
    /// Guard for degenerate denominators (antidiffusive ratios, β).
    pub max_abs_div_eps: f64,
    /// Courant target for adaptive stepping.
    pub max_courant: f64,
    /// Forcings split.
    pub rhs_scheme: RhsScheme,
    /// Pressure projection, if any (requires `vip`).
    pub prs: Option<PrsParams>,
    /// Equation indices of the velocity components coupled through
    /// pressure, one per dimension.
    pub vip: Option<[usize; D]>,
    /// Enable the velocity absorber (requires `vip`).
    pub vab: bool,
    /// Per-equation power-of-two scaling exponents.
    pub hint_scale: Vec<i32>,
    /// Names of auxiliary scalar arrays to allocate.
    pub sclr_arrays: Vec<String>,
    /// Output cadence, passed through to the output collaborator.
    pub outfreq: Option<u64>,
    /// Output window length, passed through.
    pub outwindow: u64,
    /// Output directory, passed through.
    pub outdir: Option<String>,
    /// Output variables, passed through.
    pub outvars: Vec<OutVar>,
}

impl<const D: usize> RtParams<D> {
    /// Parameters with library defaults for a given grid.
    ///
    /// # Arguments
    /// * `grid_size` - Interior cells per dimension
    pub fn new(grid_size: [usize; D]) -> Self {
        Self {
            grid_size,
            dt: 0.0,
            spacing: [1.0; D],
            n_eqns: 1,
            n_iters: 2,
            fct: false,
            max_abs_div_eps: f64::EPSILON * 44.0,
            max_courant: 0.5,
            rhs_scheme: RhsScheme::Euler,
            prs: None,
            vip: None,
            vab: false,
            hint_scale: Vec::new(),
            sclr_arrays: Vec::new(),
            outfreq: None,
            outwindow: 1,
            outdir: None,
            outvars: Vec::new(),
        }
    }

    /// Whether the run is driven by simulated time with adaptive `dt`.
    #[inline]
    pub fn var_dt(&self) -> bool {
        self.dt == 0.0
    }

    /// Halo width: the maximum any configured layer requires.
    pub fn halo(&self) -> usize {
        if self.fct {
            2
        } else {
            1
        }
    }

    /// Scaling exponent for equation `e`.
    ///
    /// # Returns
    /// The configured power-of-two exponent, or zero when unset
    #[inline]
    pub fn hint_scale(&self, e: usize) -> i32 {
        self.hint_scale.get(e).copied().unwrap_or(0)
    }
}

/// Which half of the step a forcing application belongs to.
///
/// The ante stage is the explicit pre-add of known forcings before
/// advection; the post stage completes the step after advection and may
/// treat stiff couplings implicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhsStage {
    /// Before advection, on the old state.
    Ante,
    /// After advection, on the provisional state.
    Post,
}

/// Problem-specific forcings applied by the RHS layer.
///
/// `apply` is called on every worker with a context scoped to that
/// worker's slab; implementations must only write cells inside
/// `ctx.ijk()`. With [`RhsScheme::Euler`] it runs once per step at the
/// ante stage with the full `dt`; with [`RhsScheme::Trapez`] it runs at
/// both stages with `dt/2` each.
pub trait Forcings<const D: usize>: Send + Sync {
    /// Apply forcing increments for part of a step.
    ///
    /// # Arguments
    /// * `ctx` - The calling worker's slab view of the solver state
    /// * `dt_part` - Time increment to integrate over
    /// * `stage` - Which half of the step this application belongs to
    fn apply(&self, ctx: &StepContext<'_, D>, dt_part: f64, stage: RhsStage);
}

/// Worker-slab view handed to [`Forcings::apply`].
pub struct StepContext<'a, const D: usize> {
    pub(crate) mem: &'a SharedMem<D>,
    pub(crate) n: &'a [i64],
    pub(crate) ijk: Region<D>,
    pub(crate) grid: &'a Grid<D>,
    pub(crate) time: f64,
    pub(crate) dt: f64,
}

impl<'a, const D: usize> StepContext<'a, D> {
    /// Current state of equation `e`.
    ///
    /// # Arguments
    /// * `e` - Equation index in `[0, n_eqns)`
    #[inline]
    pub fn state(&self, e: usize) -> &SharedArr<D> {
        self.mem.psi(e, self.n[e])
    }

    /// Named auxiliary array declared in the parameters.
    ///
    /// # Panics
    ///
    /// Panics on names that were never declared; the runner validated the
    /// declared set at construction.
    pub fn sclr_array(&self, name: &str) -> &SharedArr<D> {
        self.mem
            .sclr(name)
            .unwrap_or_else(|| panic!("auxiliary array {:?} was never declared", name))
    }

    /// This worker's slab (interior cells only; halo validity is not
    /// guaranteed inside forcings).
    #[inline]
    pub fn ijk(&self) -> Region<D> {
        self.ijk
    }

    /// The grid descriptor.
    #[inline]
    pub fn grid(&self) -> &Grid<D> {
        self.grid
    }

    /// Simulated time at the point of application.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The full step length (not the partial being applied).
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p: RtParams<2> = RtParams::new([10, 20]);
        assert_eq!(p.grid_size, [10, 20]);
        assert!(p.var_dt());
        assert_eq!(p.halo(), 1);
        assert_eq!(p.hint_scale(5), 0);
        assert_eq!(p.max_courant, 0.5);
    }

    #[test]
    fn test_fct_widens_halo() {
        let mut p: RtParams<1> = RtParams::new([10]);
        p.fct = true;
        assert_eq!(p.halo(), 2);
    }
}
