//! Shared memory: fields, scratch pool, barrier and reductions.
//!
//! One [`SharedMem`] is shared by all workers of a solver instance. It
//! owns the prognostic time-level ring `psi[e][t]`, the staggered
//! advector, the per-layer scratch pool, named auxiliary arrays and the
//! absorber fields, and provides the two coordination primitives of the
//! concurrency model:
//!
//! - **barrier**: a full memory barrier across all workers. Every read
//!   of data written by another worker must be preceded by a barrier
//!   issued after the producing writes.
//! - **reductions**: collective operations entered by every worker with
//!   its own slab region. Per-rank partials are folded in ascending rank
//!   order, and each partial scans its region in row-major order, so every
//!   worker returns the same value bit-for-bit and reruns reproduce it.
//!
//! The cooperative `panic` flag is polled by the time loop after each
//! barrier; any worker may raise it to unwind all workers cleanly.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Barrier;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::arr::SharedArr;
use crate::error::SolverError;
use crate::grid::{iter_region, Grid, Region};
use crate::solvers::{PrsScheme, RtParams};

/// Number of time levels kept per equation.
pub const N_TLEV: usize = 2;

/// Identifies the layer that reserved a scratch group. Layer ids replace
/// path-dependent keys so that scratch addressing is stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScratchKey {
    /// MPDATA corrective passes: the iterate buffer and two advector sets.
    Mpdata,
    /// Flux-corrected transport: extrema and monotonicity ratios.
    Fct,
    /// Advector extrapolation: previous-step velocities.
    Vip,
    /// Pressure projection: potential, residual and work arrays.
    Prs,
    /// Driver-defined scratch.
    User(&'static str),
}

/// Per-rank reduction slots (`Cell` storage promoted to `Sync`; the
/// reduction protocol brackets every access with barriers).
struct SyncSlots(Box<[Cell<f64>]>);

unsafe impl Sync for SyncSlots {}
unsafe impl Send for SyncSlots {}

/// Shared state of one solver instance.
pub struct SharedMem<const D: usize> {
    psi: Vec<Vec<SharedArr<D>>>,
    gc: Vec<SharedArr<D>>,
    tmp: IndexMap<ScratchKey, Vec<Vec<SharedArr<D>>>>,
    sclr: IndexMap<String, SharedArr<D>>,
    vab_coeff: Option<SharedArr<D>>,
    vab_relax: Vec<SharedArr<D>>,
    levels: Vec<AtomicI64>,
    prs_iters: AtomicU64,
    barrier: Barrier,
    nranks: usize,
    red: SyncSlots,
    panic: AtomicBool,
    panic_reason: Mutex<Option<SolverError>>,
}

impl<const D: usize> SharedMem<D> {
    /// Allocate every field the configured layers need. Allocation is
    /// layered bottom-up: prognostics and the advector first, then each
    /// enabled layer registers its scratch group under its own key. All
    /// arrays share the halo-inclusive extents (the face-coordinate
    /// convention gives staggered components the same bounds as scalars).
    ///
    /// # Arguments
    /// * `grid` - Grid descriptor fixing extents and halo width
    /// * `prm` - Validated runtime parameters selecting the layers
    /// * `nranks` - Number of workers the barrier must admit
    pub fn alloc(grid: &Grid<D>, prm: &RtParams<D>, nranks: usize) -> Self {
        let region = grid.alloc_region();
        let zeros = || SharedArr::<D>::zeros(region);
        let group = |count: usize| -> Vec<SharedArr<D>> { (0..count).map(|_| zeros()).collect() };

        let psi = (0..prm.n_eqns)
            .map(|_| (0..N_TLEV).map(|_| zeros()).collect())
            .collect();
        let gc = group(D);

        let mut tmp: IndexMap<ScratchKey, Vec<Vec<SharedArr<D>>>> = IndexMap::new();
        if prm.n_iters > 1 {
            // iterate buffer + two corrective-advector sets
            tmp.insert(ScratchKey::Mpdata, vec![group(1), group(D), group(D)]);
        }
        if prm.fct {
            // psi_min, psi_max, beta_up, beta_dn
            tmp.insert(ScratchKey::Fct, vec![group(4)]);
        }
        if prm.vip.is_some() {
            tmp.insert(ScratchKey::Vip, vec![group(D)]);
        }
        if let Some(prs) = &prm.prs {
            let extra = match prs.scheme {
                PrsScheme::ConjRes => 2,
                _ => 0,
            };
            tmp.insert(ScratchKey::Prs, vec![group(3 + 2 * D + extra)]);
        }

        let sclr = prm
            .sclr_arrays
            .iter()
            .map(|name| (name.clone(), zeros()))
            .collect();

        let (vab_coeff, vab_relax) = if prm.vab {
            (Some(zeros()), group(D))
        } else {
            (None, Vec::new())
        };

        Self {
            psi,
            gc,
            tmp,
            sclr,
            vab_coeff,
            vab_relax,
            levels: (0..prm.n_eqns)
                .map(|_| AtomicI64::new(-(N_TLEV as i64)))
                .collect(),
            prs_iters: AtomicU64::new(0),
            barrier: Barrier::new(nranks),
            nranks,
            red: SyncSlots((0..nranks).map(|_| Cell::new(0.0)).collect()),
            panic: AtomicBool::new(false),
            panic_reason: Mutex::new(None),
        }
    }

    /// Number of collaborating workers.
    #[inline]
    pub fn nranks(&self) -> usize {
        self.nranks
    }

    /// Map a time-level index `t` (kept in `[-N_TLEV, 0]`) onto its ring
    /// slot.
    ///
    /// # Returns
    /// The slot index; `n + 1` wraps onto the slot holding the oldest
    /// level
    #[inline]
    pub fn slot(t: i64) -> usize {
        (t + N_TLEV as i64).rem_euclid(N_TLEV as i64) as usize
    }

    /// Prognostic field of equation `e` at time level `t`.
    #[inline]
    pub fn psi(&self, e: usize, t: i64) -> &SharedArr<D> {
        &self.psi[e][Self::slot(t)]
    }

    /// Mutable access for the driver (initial conditions, inspection).
    pub fn psi_mut(&mut self, e: usize, t: i64) -> &mut SharedArr<D> {
        &mut self.psi[e][Self::slot(t)]
    }

    /// The advector components (Courant-number fields).
    #[inline]
    pub fn gc(&self) -> &[SharedArr<D>] {
        &self.gc
    }

    /// Mutable advector component `d` for the driver.
    pub fn gc_mut(&mut self, d: usize) -> &mut SharedArr<D> {
        &mut self.gc[d]
    }

    /// Scratch group `g` registered under `key`.
    ///
    /// # Arguments
    /// * `key` - Layer that reserved the scratch
    /// * `g` - Group index within that layer's allocation
    #[inline]
    pub fn tmp(&self, key: ScratchKey, g: usize) -> &[SharedArr<D>] {
        &self.tmp[&key][g]
    }

    /// Named auxiliary array, if declared in the parameters.
    pub fn sclr(&self, name: &str) -> Option<&SharedArr<D>> {
        self.sclr.get(name)
    }

    /// Mutable named auxiliary array.
    pub fn sclr_mut(&mut self, name: &str) -> Option<&mut SharedArr<D>> {
        self.sclr.get_mut(name)
    }

    /// Absorber coefficient field, if the absorber is enabled.
    pub fn vab_coeff(&self) -> Option<&SharedArr<D>> {
        self.vab_coeff.as_ref()
    }

    /// Mutable absorber coefficient field.
    pub fn vab_coeff_mut(&mut self) -> Option<&mut SharedArr<D>> {
        self.vab_coeff.as_mut()
    }

    /// Absorber relaxed-state component `d`.
    pub fn vab_relax(&self, d: usize) -> &SharedArr<D> {
        &self.vab_relax[d]
    }

    /// Mutable absorber relaxed-state component `d`.
    pub fn vab_relax_mut(&mut self, d: usize) -> Option<&mut SharedArr<D>> {
        self.vab_relax.get_mut(d)
    }

    /// Published current time level of equation `e` (driver-side view).
    pub fn level(&self, e: usize) -> i64 {
        self.levels[e].load(Ordering::Relaxed)
    }

    /// Publish the current time level of equation `e` (rank 0 only).
    pub(crate) fn publish_level(&self, e: usize, n: i64) {
        self.levels[e].store(n, Ordering::Relaxed);
    }

    /// Cumulative pressure-solver iteration count (diagnostic).
    pub fn prs_iters(&self) -> u64 {
        self.prs_iters.load(Ordering::Relaxed)
    }

    /// Account pressure iterations (rank 0 only; every rank counts the
    /// same number).
    pub(crate) fn bump_prs_iters(&self, iters: u64) {
        self.prs_iters.fetch_add(iters, Ordering::Relaxed);
    }

    // -- coordination -----------------------------------------------------

    /// Full memory barrier across all workers.
    #[inline]
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Raise the cooperative panic flag; the first reason wins.
    pub fn raise_panic(&self, why: SolverError) {
        let mut slot = self.panic_reason.lock();
        if slot.is_none() {
            *slot = Some(why);
        }
        self.panic.store(true, Ordering::Release);
    }

    /// Whether any worker has raised the panic flag.
    #[inline]
    pub fn panicked(&self) -> bool {
        self.panic.load(Ordering::Acquire)
    }

    /// The recorded panic reason.
    pub fn panic_reason(&self) -> SolverError {
        self.panic_reason
            .lock()
            .clone()
            .unwrap_or_else(|| SolverError::Panicked("unknown".into()))
    }

    // -- collective reductions --------------------------------------------

    /// Collective fold of per-rank partials in ascending rank order.
    ///
    /// # Arguments
    /// * `rank` - The calling worker's rank; every worker must enter
    ///   with its own
    /// * `partial` - This worker's contribution
    /// * `fold` - Associative combiner applied in rank order
    ///
    /// # Returns
    /// The folded value, identical bit-for-bit on every worker
    pub fn reduce(&self, rank: usize, partial: f64, fold: impl Fn(f64, f64) -> f64) -> f64 {
        self.red.0[rank].set(partial);
        self.barrier();
        let mut acc = self.red.0[0].get();
        for r in 1..self.nranks {
            acc = fold(acc, self.red.0[r].get());
        }
        // keep slots stable until every rank has folded
        self.barrier();
        acc
    }

    /// Collective sum of `a` over the union of the workers' regions.
    ///
    /// # Arguments
    /// * `rank` - The calling worker's rank
    /// * `a` - Field to reduce
    /// * `region` - The calling worker's slab portion
    ///
    /// # Returns
    /// The global sum, identical on every worker
    pub fn sum(&self, rank: usize, a: &SharedArr<D>, region: Region<D>) -> f64 {
        let partial: f64 = iter_region(region).map(|ix| a.get(ix)).sum();
        self.reduce(rank, partial, |x, y| x + y)
    }

    /// Collective sum of the pointwise product `a·b`.
    ///
    /// # Arguments
    /// * `rank` - The calling worker's rank
    /// * `a`, `b` - Factor fields
    /// * `region` - The calling worker's slab portion
    ///
    /// # Returns
    /// The global inner product, identical on every worker
    pub fn sum_prod(
        &self,
        rank: usize,
        a: &SharedArr<D>,
        b: &SharedArr<D>,
        region: Region<D>,
    ) -> f64 {
        let partial: f64 = iter_region(region).map(|ix| a.get(ix) * b.get(ix)).sum();
        self.reduce(rank, partial, |x, y| x + y)
    }

    /// Collective minimum of `a`.
    pub fn min(&self, rank: usize, a: &SharedArr<D>, region: Region<D>) -> f64 {
        let partial = iter_region(region)
            .map(|ix| a.get(ix))
            .fold(f64::INFINITY, f64::min);
        self.reduce(rank, partial, f64::min)
    }

    /// Collective maximum of `a`.
    pub fn max(&self, rank: usize, a: &SharedArr<D>, region: Region<D>) -> f64 {
        let partial = iter_region(region)
            .map(|ix| a.get(ix))
            .fold(f64::NEG_INFINITY, f64::max);
        self.reduce(rank, partial, f64::max)
    }

    /// Collective maximum of `|a|`.
    ///
    /// # Returns
    /// The global infinity norm over the union of the workers' regions
    pub fn max_abs(&self, rank: usize, a: &SharedArr<D>, region: Region<D>) -> f64 {
        let partial = iter_region(region).map(|ix| a.get(ix).abs()).fold(0.0, f64::max);
        self.reduce(rank, partial, f64::max)
    }
}
