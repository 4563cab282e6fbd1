//! Per-worker time-step orchestrator.
//!
//! Each worker owns a contiguous slab of the outermost dimension and runs
//! this loop over it; all cross-slab coordination goes through the shared
//! memory's barrier and reductions. One outer iteration:
//!
//! 1. barrier, poll the cooperative panic flag;
//! 2. (adaptive only) rescale `dt` and the advector to the Courant target;
//! 3. ante-step hook: forcings (explicit part), advector extrapolation,
//!    accumulated pressure correction;
//! 4. per-equation scaling, halo exchanges, advection (barrier between
//!    consecutive advops), time-level cycling, unscaling;
//! 5. advance the clock;
//! 6. post-step hook: forcings, absorber, pressure update and correction.
//!
//! Hook witnesses assert in debug builds that every layered sub-hook ran.

use log::{debug, trace};

use crate::arr::SharedArr;
use crate::bcond::{Bcond, BcondKind};
use crate::concurr::{ScratchKey, SharedMem, N_TLEV};
use crate::error::SolverError;
use crate::formulae::{donorcell, fct, mpdata};
use crate::grid::{iter_region, shifted, widen_all, Grid, Region, Rng, Side};
use crate::solvers::{Forcings, RhsScheme, RhsStage, RtParams, StepContext};

/// What `run` drives toward: a step count or a simulated time.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Target {
    Steps(u64),
    Time(f64),
}

/// Debug-build witnesses of the hook contract.
#[derive(Default)]
struct Witness {
    ante_loop: bool,
    ante_step: bool,
    post_step: bool,
}

/// Clock state carried across `advance` calls.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Clock {
    pub timestep: u64,
    pub time: f64,
    pub dt: f64,
}

/// One worker's view of the solver.
pub(crate) struct Stepper<'a, const D: usize> {
    rank: usize,
    mem: &'a SharedMem<D>,
    prm: &'a RtParams<D>,
    grid: &'a Grid<D>,
    forcings: Option<&'a dyn Forcings<D>>,
    /// Slab interior: the outermost range restricted to this worker.
    ijk: Region<D>,
    /// This worker's write partition of the full (halo-inclusive) arrays.
    part: Region<D>,
    bcs: Vec<[Bcond<D>; 2]>,
    n: Vec<i64>,
    clock: Clock,
    witness: Witness,
}

impl<'a, const D: usize> Stepper<'a, D> {
    pub(crate) fn new(
        rank: usize,
        nranks: usize,
        mem: &'a SharedMem<D>,
        prm: &'a RtParams<D>,
        grid: &'a Grid<D>,
        bckinds: &[[BcondKind; 2]; D],
        forcings: Option<&'a dyn Forcings<D>>,
        clock: Clock,
        n: Vec<i64>,
    ) -> Self {
        let halo = grid.halo();
        let slab = grid.interior(0).slab(rank, nranks);
        let last = rank == nranks - 1;

        let mut ijk = grid.interior_region();
        ijk[0] = slab;

        let mut part = widen_all(grid.interior_region(), halo);
        part[0] = Rng::new(
            slab.first() - if rank == 0 { halo as i64 } else { 0 },
            slab.last() + if last { halo as i64 } else { 0 },
        );

        let bcs = (0..D)
            .map(|d| {
                let mk = |side: Side| {
                    // interior subdomain edges of the decomposed dimension
                    // are served by shared memory itself
                    let kind = if d == 0
                        && ((side == Side::Left && rank != 0) || (side == Side::Right && !last))
                    {
                        BcondKind::Shared
                    } else {
                        bckinds[d][side.as_usize()]
                    };
                    Bcond::new(kind, d, side, grid.size(d), halo, prm.grid_size)
                };
                [mk(Side::Left), mk(Side::Right)]
            })
            .collect();

        Self {
            rank,
            mem,
            prm,
            grid,
            forcings,
            ijk,
            part,
            bcs,
            n,
            clock,
            witness: Witness::default(),
        }
    }

    /// Slab interior region.
    #[inline]
    pub(crate) fn ijk(&self) -> Region<D> {
        self.ijk
    }

    /// Write partition of halo-inclusive arrays.
    #[inline]
    pub(crate) fn part(&self) -> Region<D> {
        self.part
    }

    #[inline]
    pub(crate) fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub(crate) fn mem(&self) -> &'a SharedMem<D> {
        self.mem
    }

    #[inline]
    pub(crate) fn prm(&self) -> &'a RtParams<D> {
        self.prm
    }

    #[inline]
    pub(crate) fn grid(&self) -> &'a Grid<D> {
        self.grid
    }

    #[inline]
    pub(crate) fn dt(&self) -> f64 {
        self.clock.dt
    }

    /// Current state of equation `e`.
    #[inline]
    pub(crate) fn state_arr(&self, e: usize) -> &SharedArr<D> {
        self.mem.psi(e, self.n[e])
    }

    /// Final clock and level indices, handed back to the runner.
    pub(crate) fn into_parts(self) -> (Clock, Vec<i64>) {
        (self.clock, self.n)
    }

    // -- the outer loop ---------------------------------------------------

    pub(crate) fn run(&mut self, target: Target) -> Result<(), SolverError> {
        if self.clock.timestep == 0 {
            self.mem.barrier();
            self.witness.ante_loop = false;
            self.hook_ante_loop();
            debug_assert!(
                self.witness.ante_loop,
                "hook_ante_loop must run every layered sub-hook"
            );
            self.mem.barrier();
        }

        loop {
            match target {
                Target::Steps(nt) => {
                    if self.clock.timestep >= nt {
                        break;
                    }
                }
                Target::Time(t) => {
                    if self.clock.time >= t {
                        break;
                    }
                }
            }

            self.mem.barrier();
            if self.mem.panicked() {
                return Err(self.mem.panic_reason());
            }
            trace!(
                "rank {} timestep {} t = {}",
                self.rank,
                self.clock.timestep,
                self.clock.time
            );

            if self.prm.var_dt() {
                self.adapt_dt();
            }

            self.witness.ante_step = false;
            self.witness.post_step = false;

            self.hook_ante_step();
            debug_assert!(
                self.witness.ante_step,
                "hook_ante_step must run every layered sub-hook"
            );

            let n_eqns = self.prm.n_eqns;
            for e in 0..n_eqns {
                self.scale(e, self.prm.hint_scale(e));
            }
            for e in 0..n_eqns {
                self.xchng(e);
            }
            for e in 0..n_eqns {
                self.advop(e);
                if e != n_eqns - 1 {
                    self.mem.barrier();
                }
            }
            for e in 0..n_eqns {
                self.cycle(e);
            }
            for e in 0..n_eqns {
                self.scale(e, -self.prm.hint_scale(e));
            }

            self.clock.timestep += 1;
            self.clock.time = if self.prm.var_dt() {
                self.clock.time + self.clock.dt
            } else {
                self.clock.timestep as f64 * self.clock.dt
            };

            self.hook_post_step()?;
            debug_assert!(
                self.witness.post_step,
                "hook_post_step must run every layered sub-hook"
            );
        }

        self.mem.barrier();
        Ok(())
    }

    // -- hooks ------------------------------------------------------------

    fn hook_ante_loop(&mut self) {
        self.witness.ante_loop = true;
        if self.prm.vip.is_some() {
            // the advector is derived from the initial velocities
            self.vip_ante_loop();
        } else {
            self.xchng_vctr(self.mem.gc());
        }
        if self.prm.prs.is_some() {
            self.pressure_ante_loop();
        }
    }

    fn hook_ante_step(&mut self) {
        self.witness.ante_step = true;
        match self.prm.rhs_scheme {
            RhsScheme::Euler => self.apply_forcings(self.clock.dt, RhsStage::Ante),
            RhsScheme::Trapez => self.apply_forcings(0.5 * self.clock.dt, RhsStage::Ante),
        }
        if self.prm.vip.is_some() {
            self.vip_extrapolate();
        }
        if self.prm.prs.is_some() {
            self.pressure_apply();
        }
    }

    fn hook_post_step(&mut self) -> Result<(), SolverError> {
        self.witness.post_step = true;
        if self.prm.rhs_scheme == RhsScheme::Trapez {
            self.apply_forcings(0.5 * self.clock.dt, RhsStage::Post);
        }
        if self.prm.vab {
            self.absorber();
        }
        if self.prm.prs.is_some() {
            // intentionally after the forcings: the projection must see
            // the provisional velocity with all known forcings applied
            let iters = self.pressure_update()?;
            debug!(
                "rank {} pressure converged in {} iterations",
                self.rank, iters
            );
            if self.rank == 0 {
                self.mem.bump_prs_iters(iters as u64);
            }
            self.pressure_apply();
        }
        Ok(())
    }

    fn apply_forcings(&self, dt_part: f64, stage: RhsStage) {
        if let Some(f) = self.forcings {
            let ctx = StepContext {
                mem: self.mem,
                n: &self.n,
                ijk: self.ijk,
                grid: self.grid,
                time: self.clock.time,
                dt: self.clock.dt,
            };
            f.apply(&ctx, dt_part, stage);
        }
    }

    // -- adaptive time stepping -------------------------------------------

    /// Collective Courant estimate: max |C| over the full advector,
    /// halo included.
    fn courant_number(&self) -> f64 {
        let mut local = 0.0f64;
        for d in 0..D {
            for ix in iter_region(self.part) {
                local = local.max(self.mem.gc()[d].get(ix).abs());
            }
        }
        self.mem.reduce(self.rank, local, f64::max)
    }

    fn adapt_dt(&mut self) {
        let cfl = self.courant_number();
        if cfl <= self.prm.max_abs_div_eps {
            return;
        }
        let ratio = self.prm.max_courant / cfl;
        self.clock.dt *= ratio;
        for d in 0..D {
            let gc = &self.mem.gc()[d];
            for ix in iter_region(self.part) {
                gc.set(ix, gc.get(ix) * ratio);
            }
        }
        self.mem.barrier();
        if (ratio - 1.0).abs() > 1e-12 {
            debug!("rank {} dt rescaled by {} to {}", self.rank, ratio, self.clock.dt);
        }
    }

    // -- per-equation operations ------------------------------------------

    /// Power-of-two scaling: positive exponents divide before advection,
    /// the negated call afterwards multiplies back.
    fn scale(&self, e: usize, exp: i32) {
        if exp == 0 {
            return;
        }
        let a = self.state_arr(e);
        let factor = (1u64 << exp.unsigned_abs()) as f64;
        if exp > 0 {
            for ix in iter_region(self.ijk) {
                a.set(ix, a.get(ix) / factor);
            }
        } else {
            for ix in iter_region(self.ijk) {
                a.set(ix, a.get(ix) * factor);
            }
        }
    }

    /// Rotate the time-level ring of equation `e`; the published levels
    /// are refreshed once per step, after the last equation cycles.
    fn cycle(&mut self, e: usize) {
        self.n[e] = (self.n[e] + 1).rem_euclid(N_TLEV as i64) - N_TLEV as i64;
        if e == self.prm.n_eqns - 1 && self.rank == 0 {
            for ee in 0..self.prm.n_eqns {
                self.mem.publish_level(ee, self.n[ee]);
            }
        }
    }

    // -- halo exchange drivers --------------------------------------------

    /// Exchange the scalar halos of equation `e`'s current level.
    fn xchng(&self, e: usize) {
        self.xchng_sclr(self.state_arr(e));
    }

    /// Scalar halo exchange on an arbitrary field. Dimensions are
    /// processed in ascending order with halo-widened perpendicular
    /// ranges, which populates corners without a dedicated pass.
    pub(crate) fn xchng_sclr(&self, a: &SharedArr<D>) {
        self.mem.barrier();
        for d in 0..D {
            for side in 0..2 {
                self.bcs[d][side].fill_halos_sclr(a, &self.part);
            }
        }
        self.mem.barrier();
    }

    /// Vector halo exchange: along-components first, then the normal
    /// components of every other dimension.
    pub(crate) fn xchng_vctr(&self, av: &[SharedArr<D>]) {
        self.mem.barrier();
        for d in 0..D {
            for side in 0..2 {
                self.bcs[d][side].fill_halos_vctr_alng(&av[d], &self.part);
            }
        }
        for d in 0..D {
            for side in 0..2 {
                for q in 0..D {
                    if q != d {
                        self.bcs[d][side].fill_halos_vctr_nrml(&av[q], &self.part);
                    }
                }
            }
        }
        self.mem.barrier();
    }

    /// Pressure halo exchange.
    pub(crate) fn xchng_pres(&self, a: &SharedArr<D>) {
        self.mem.barrier();
        for d in 0..D {
            for side in 0..2 {
                self.bcs[d][side].fill_halos_pres(a, &self.part);
            }
        }
        self.mem.barrier();
    }

    /// Stamp the rigid-wall edge values of per-dimension gradient arrays.
    pub(crate) fn set_edges(&self, grads: &[SharedArr<D>], vels: Option<[&SharedArr<D>; D]>) {
        for d in 0..D {
            for side in 0..2 {
                self.bcs[d][side].set_edge_pres(&grads[d], vels.map(|v| v[d]), &self.part);
            }
        }
        self.mem.barrier();
    }

    // -- MPDATA -----------------------------------------------------------

    /// One advection operator application on equation `e`: a donor-cell
    /// pass transporting `psi[n]` into `psi[n+1]`, then `n_iters - 1`
    /// corrective passes advecting the iterate with the antidiffusive
    /// velocity (optionally clamped by flux-corrected transport).
    fn advop(&self, e: usize) {
        let eps = self.prm.max_abs_div_eps;
        let psi_n = self.mem.psi(e, self.n[e]);
        let psi_np1 = self.mem.psi(e, self.n[e] + 1);

        donorcell::update(psi_n, psi_np1, self.mem.gc(), self.ijk);
        if self.prm.n_iters == 1 {
            return;
        }

        let star = &self.mem.tmp(ScratchKey::Mpdata, 0)[0];
        let mut cur = psi_np1;
        let mut alt = star;

        for k in 2..=self.prm.n_iters {
            let gc_in: &[SharedArr<D>] = if k == 2 {
                self.mem.gc()
            } else if k % 2 == 0 {
                self.mem.tmp(ScratchKey::Mpdata, 2)
            } else {
                self.mem.tmp(ScratchKey::Mpdata, 1)
            };
            let gc_out: &[SharedArr<D>] = if k % 2 == 0 {
                self.mem.tmp(ScratchKey::Mpdata, 1)
            } else {
                self.mem.tmp(ScratchKey::Mpdata, 2)
            };

            // the iterate's halos feed the next stencil
            self.xchng_sclr(cur);

            for d in 0..D {
                for f in iter_region(self.ijk) {
                    gc_out[d].set(f, mpdata::antidiff(cur, gc_in, d, f, eps));
                }
            }
            self.xchng_vctr(gc_out);

            if self.prm.fct {
                self.fct_limit(psi_n, cur, gc_out, k);
            }

            donorcell::update(cur, alt, gc_out, self.ijk);
            std::mem::swap(&mut cur, &mut alt);
        }

        if !std::ptr::eq(cur, psi_np1) {
            for ix in iter_region(self.ijk) {
                psi_np1.set(ix, cur.get(ix));
            }
        }
    }

    /// Clamp the corrective advector so the next pass preserves the local
    /// extrema of the pre-advection field.
    fn fct_limit(
        &self,
        psi_n: &SharedArr<D>,
        cur: &SharedArr<D>,
        gc_out: &[SharedArr<D>],
        k: usize,
    ) {
        let eps = self.prm.max_abs_div_eps;
        let t = self.mem.tmp(ScratchKey::Fct, 0);
        let (psi_min, psi_max, beta_up, beta_dn) = (&t[0], &t[1], &t[2], &t[3]);

        if k == 2 {
            fct::local_extrema(psi_n, self.ijk, psi_min, psi_max);
        }
        for ix in iter_region(self.ijk) {
            let (up, dn) = fct::beta_pair(cur, gc_out, psi_min, psi_max, ix, eps);
            beta_up.set(ix, up);
            beta_dn.set(ix, dn);
        }
        self.xchng_sclr(beta_up);
        self.xchng_sclr(beta_dn);

        for d in 0..D {
            for f in iter_region(self.ijk) {
                let r = shifted(f, d, 1);
                let c = gc_out[d].get(f);
                gc_out[d].set(
                    f,
                    fct::limit(c, beta_up.get(f), beta_dn.get(f), beta_up.get(r), beta_dn.get(r)),
                );
            }
        }
        self.xchng_vctr(gc_out);
    }
}
