//! Concurrency front end: shared memory plus the worker runner.
//!
//! The scheduling model is static: `P` workers, each owning a contiguous
//! slab of the outermost dimension for the whole run. Workers are plain
//! scoped OS threads: they block on barriers, so a bounded task pool is
//! the wrong substrate. A single-worker runner degenerates to no-op
//! barriers without changing any solver code.
//!
//! Between `advance` calls the runner holds the shared memory exclusively
//! (`&mut self`), which is what makes the setup accessors safe; while an
//! advance is in flight the only coordination primitives are the barrier
//! and the collective reductions on [`SharedMem`].
//!
//! A worker that unwinds (a bug in driver forcings, say) aborts the whole
//! process state for this run: raise the cooperative panic flag via
//! [`SharedMem::raise_panic`] for orderly shutdown instead.

mod sharedmem;

pub use sharedmem::{ScratchKey, SharedMem, N_TLEV};

use std::thread;

use crate::arr::{ArrMut, ArrRef};
use crate::bcond::BcondKind;
use crate::error::{ConfigError, SolverError};
use crate::grid::Grid;
use crate::solvers::stepper::{Clock, Stepper, Target};
use crate::solvers::{Forcings, RtParams};

/// Owns the shared memory and drives the workers.
///
/// Construction validates the configuration and performs every
/// allocation; `advance` spawns the workers and blocks until they finish.
/// All setup accessors hand out exclusive views and are only usable
/// between advances.
pub struct Runner<const D: usize> {
    mem: SharedMem<D>,
    prm: RtParams<D>,
    grid: Grid<D>,
    bckinds: [[BcondKind; 2]; D],
    nranks: usize,
    forcings: Option<Box<dyn Forcings<D>>>,
    n: Vec<i64>,
    clock: Clock,
}

impl<const D: usize> Runner<D> {
    /// Validate `prm`, allocate shared memory and prepare the workers.
    ///
    /// # Arguments
    /// * `prm` - Runtime parameters (see [`RtParams`])
    /// * `bckinds` - Boundary policy per dimension and side
    /// * `nranks` - Number of workers; each must receive at least one
    ///   column of the outermost dimension
    ///
    /// # Returns
    /// The ready runner, or the first configuration error found
    pub fn new(
        prm: RtParams<D>,
        bckinds: [[BcondKind; 2]; D],
        nranks: usize,
    ) -> Result<Self, ConfigError> {
        for (dim, &size) in prm.grid_size.iter().enumerate() {
            if size < 1 {
                return Err(ConfigError::BogusGridSize { dim, size });
            }
        }
        if prm.n_eqns < 1 {
            return Err(ConfigError::NoEquations);
        }
        if prm.n_iters < 1 {
            return Err(ConfigError::BogusIterCount(prm.n_iters));
        }
        for (dim, &value) in prm.spacing.iter().enumerate() {
            if value < 0.0 || (prm.prs.is_some() && value == 0.0) {
                return Err(ConfigError::BogusSpacing { dim, value });
            }
        }
        if prm.var_dt() && prm.max_courant <= 0.0 {
            return Err(ConfigError::AdaptiveWithoutCourant);
        }
        if prm.prs.is_some() && prm.vip.is_none() {
            return Err(ConfigError::PressureWithoutVip);
        }
        if prm.vab && prm.vip.is_none() {
            return Err(ConfigError::AbsorberWithoutVip);
        }
        if let Some(vip) = &prm.vip {
            for &index in vip.iter() {
                if index >= prm.n_eqns {
                    return Err(ConfigError::BogusVipIndex {
                        index,
                        n_eqns: prm.n_eqns,
                    });
                }
            }
        }
        if nranks < 1 || nranks > prm.grid_size[0] {
            return Err(ConfigError::TooManyWorkers {
                workers: nranks,
                columns: prm.grid_size[0],
            });
        }

        let grid = Grid::new(prm.grid_size, prm.spacing, prm.halo());
        let mem = SharedMem::alloc(&grid, &prm, nranks);
        let n = vec![-(N_TLEV as i64); prm.n_eqns];
        // adaptive mode starts from a unit step and rescales to the
        // Courant target on the first iteration
        let dt = if prm.var_dt() { 1.0 } else { prm.dt };
        Ok(Self {
            mem,
            prm,
            grid,
            bckinds,
            nranks,
            forcings: None,
            n,
            clock: Clock {
                timestep: 0,
                time: 0.0,
                dt,
            },
        })
    }

    /// Attach problem-specific forcings.
    ///
    /// # Arguments
    /// * `forcings` - Implementation applied by the RHS layer every step
    pub fn with_forcings<F: Forcings<D> + 'static>(mut self, forcings: F) -> Self {
        self.forcings = Some(Box::new(forcings));
        self
    }

    // -- setup accessors --------------------------------------------------

    /// The transported field of equation `e` (current time level), for
    /// initial conditions and inspection.
    ///
    /// # Arguments
    /// * `e` - Equation index in `[0, n_eqns)`
    pub fn advectee(&mut self, e: usize) -> ArrMut<'_, D> {
        let n = self.n[e];
        self.mem.psi_mut(e, n).view_mut()
    }

    /// The `d`-th advector component: the Courant-number field
    /// (velocity × Δt/Δx), not the physical velocity. The view spans the
    /// full array, halo included.
    pub fn advector(&mut self, d: usize) -> ArrMut<'_, D> {
        self.mem.gc_mut(d).view_mut()
    }

    /// Alias for [`Runner::advector`], under the Courant-number name.
    pub fn courant(&mut self, d: usize) -> ArrMut<'_, D> {
        self.advector(d)
    }

    /// Read-only view of the current state of equation `e`.
    pub fn state(&self, e: usize) -> ArrRef<'_, D> {
        self.mem.psi(e, self.n[e]).view()
    }

    /// Named auxiliary array declared via `RtParams::sclr_arrays`.
    ///
    /// # Arguments
    /// * `name` - Array name as declared in the parameters
    ///
    /// # Returns
    /// The array's view, or [`ConfigError::UnknownArray`]
    pub fn sclr_array(&mut self, name: &str) -> Result<ArrMut<'_, D>, ConfigError> {
        self.mem
            .sclr_mut(name)
            .map(|a| a.view_mut())
            .ok_or_else(|| ConfigError::UnknownArray(name.into()))
    }

    /// The absorber coefficient field.
    pub fn vab_coefficient(&mut self) -> Result<ArrMut<'_, D>, ConfigError> {
        self.mem
            .vab_coeff_mut()
            .map(|a| a.view_mut())
            .ok_or(ConfigError::AbsorberDisabled)
    }

    /// The absorber relaxed-state component `d`.
    ///
    /// # Arguments
    /// * `d` - Velocity component index in `[0, D)`
    pub fn vab_relaxed_state(&mut self, d: usize) -> Result<ArrMut<'_, D>, ConfigError> {
        self.mem
            .vab_relax_mut(d)
            .map(|a| a.view_mut())
            .ok_or(ConfigError::AbsorberDisabled)
    }

    /// The grid descriptor.
    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    /// Read access to the shared memory, for output collaborators and
    /// diagnostics between advances.
    pub fn mem(&self) -> &SharedMem<D> {
        &self.mem
    }

    /// Steps taken so far.
    pub fn timestep(&self) -> u64 {
        self.clock.timestep
    }

    /// Simulated time reached so far.
    pub fn time(&self) -> f64 {
        self.clock.time
    }

    /// Current step length (rescaled over time in adaptive mode).
    pub fn dt(&self) -> f64 {
        self.clock.dt
    }

    /// Current time level of equation `e` (in `[-2, -1]`).
    pub fn level(&self, e: usize) -> i64 {
        self.n[e]
    }

    /// Cumulative pressure-solver iteration count across all steps.
    pub fn pressure_iterations(&self) -> u64 {
        self.mem.prs_iters()
    }

    // -- driving ----------------------------------------------------------

    /// Advance the solution by `nt` steps.
    ///
    /// # Arguments
    /// * `nt` - Number of additional steps to take
    ///
    /// # Returns
    /// `Ok(())` on completion, or the fatal error that stopped the run
    ///
    /// # Panics
    ///
    /// Panics if the runner is configured for adaptive stepping
    /// (`dt == 0`); use [`Runner::advance_until`] there.
    pub fn advance(&mut self, nt: u64) -> Result<(), SolverError> {
        assert!(
            !self.prm.var_dt(),
            "step-count driving needs a fixed dt; use advance_until"
        );
        self.drive(Target::Steps(self.clock.timestep + nt))
    }

    /// Advance the solution until `time >= t` under adaptive stepping.
    ///
    /// # Arguments
    /// * `t` - Simulated time to reach
    ///
    /// # Returns
    /// `Ok(())` on completion, or the fatal error that stopped the run
    ///
    /// # Panics
    ///
    /// Panics if the runner has a fixed `dt`; use [`Runner::advance`].
    pub fn advance_until(&mut self, t: f64) -> Result<(), SolverError> {
        assert!(
            self.prm.var_dt(),
            "time driving needs adaptive dt; use advance"
        );
        self.drive(Target::Time(t))
    }

    fn drive(&mut self, target: Target) -> Result<(), SolverError> {
        let mem = &self.mem;
        let prm = &self.prm;
        let grid = &self.grid;
        let bckinds = &self.bckinds;
        let forcings = self.forcings.as_deref();
        let clock = self.clock;
        let n0 = &self.n;
        let nranks = self.nranks;

        let results: Vec<(Result<(), SolverError>, (Clock, Vec<i64>))> = thread::scope(|s| {
            let handles: Vec<_> = (0..nranks)
                .map(|rank| {
                    s.spawn(move || {
                        let mut stepper = Stepper::new(
                            rank,
                            nranks,
                            mem,
                            prm,
                            grid,
                            bckinds,
                            forcings,
                            clock,
                            n0.clone(),
                        );
                        let outcome = stepper.run(target);
                        (outcome, stepper.into_parts())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });

        // every worker computes the identical clock; adopt rank 0's
        let mut outcome = Ok(());
        for (rank, (res, (clk, n))) in results.into_iter().enumerate() {
            if rank == 0 {
                self.clock = clk;
                self.n = n;
            }
            if outcome.is_ok() {
                if let Err(e) = res {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::{PrsParams, PrsScheme};

    #[test]
    fn test_rejects_bogus_grid() {
        let prm: RtParams<2> = RtParams::new([0, 5]);
        let got = Runner::new(prm, [[BcondKind::Cyclic; 2]; 2], 1);
        assert_eq!(
            got.err(),
            Some(ConfigError::BogusGridSize { dim: 0, size: 0 })
        );
    }

    #[test]
    fn test_rejects_pressure_without_vip() {
        let mut prm: RtParams<1> = RtParams::new([8]);
        prm.dt = 1.0;
        prm.prs = Some(PrsParams {
            scheme: PrsScheme::MinRes,
            tol: 1e-6,
        });
        let got = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 1);
        assert_eq!(got.err(), Some(ConfigError::PressureWithoutVip));
    }

    #[test]
    fn test_rejects_too_many_workers() {
        let mut prm: RtParams<1> = RtParams::new([4]);
        prm.dt = 1.0;
        let got = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 8);
        assert_eq!(
            got.err(),
            Some(ConfigError::TooManyWorkers {
                workers: 8,
                columns: 4
            })
        );
    }

    #[test]
    fn test_rejects_adaptive_without_courant() {
        let mut prm: RtParams<1> = RtParams::new([8]);
        prm.max_courant = 0.0;
        let got = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 1);
        assert_eq!(got.err(), Some(ConfigError::AdaptiveWithoutCourant));
    }

    #[test]
    fn test_unknown_sclr_array() {
        let mut prm: RtParams<1> = RtParams::new([8]);
        prm.dt = 1.0;
        let mut run = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 1).unwrap();
        assert!(matches!(
            run.sclr_array("missing"),
            Err(ConfigError::UnknownArray(_))
        ));
    }
}
