//! Elliptic pressure projection.
//!
//! The provisional velocity `û` left by advection and forcings is
//! projected onto the divergence-free manifold by solving
//! `∇²Φ = ∇·û` for the pressure perturbation `Φ` and correcting
//! `u ← û − ∇Φ`. The elliptic problem is relaxed in pseudo-time on the
//! residual `r = ∇²Φ − ∇·û`:
//!
//! Φ ← Φ + β·r,  r ← r + β·∇²r
//!
//! with β minimising `⟨(r + β∇²r)²⟩` at each step,
//! `β = −⟨r·∇²r⟩ / ⟨∇²r·∇²r⟩` (minimum residual). The conjugate-residual
//! variant keeps a search direction `p` and its image `∇²p`, updating the
//! direction A-conjugately; Richardson fixes β = 0.25.
//!
//! Iterations stop when `‖r‖∞ ≤ prs_tol`. A degenerate β denominator
//! falls back to the Richardson step; exhausting the iteration cap is a
//! fatal error, since continuing with an inaccurate Φ would silently
//! violate the divergence constraint.
//!
//! Because Φ carries the `dt/2` factor of the trapezoidal split, the
//! stored correction `−∇Φ` is applied twice per step: once right after
//! the update (post-step) and once at the start of the next step
//! (ante-step).

use log::{error, warn};

use crate::arr::SharedArr;
use crate::concurr::ScratchKey;
use crate::error::SolverError;
use crate::formulae::nabla;
use crate::grid::iter_region;
use crate::solvers::stepper::Stepper;
use crate::solvers::PrsScheme;

/// Livelock guard on the pseudo-time loop.
const MAX_ITERS: usize = 10_000;

// scratch slots within the pressure group: Φ, r, ∇²r, then D velocity
// corrections, then D gradient work arrays, then (conjugate-residual
// only) p and ∇²p
const PHI: usize = 0;
const ERR: usize = 1;
const LAP_ERR: usize = 2;

impl<'a, const D: usize> Stepper<'a, D> {
    #[inline]
    fn vel_slot(d: usize) -> usize {
        3 + d
    }

    #[inline]
    fn grad_slot(d: usize) -> usize {
        3 + D + d
    }

    /// Zero the pressure perturbation and the accumulated correction, and
    /// give Φ valid halos, so the first ante-step application is a no-op.
    pub(crate) fn pressure_ante_loop(&self) {
        let t = self.mem().tmp(ScratchKey::Prs, 0);
        for ix in iter_region(self.part()) {
            t[PHI].set(ix, 0.0);
            for d in 0..D {
                t[Self::vel_slot(d)].set(ix, 0.0);
            }
        }
        self.xchng_pres(&t[PHI]);
    }

    /// Add the stored correction to the velocities (half of the
    /// trapezoidal correction; called once post-step and once ante-step).
    pub(crate) fn pressure_apply(&self) {
        let vip = self.prm().vip.expect("pressure solver without vip indices");
        let t = self.mem().tmp(ScratchKey::Prs, 0);
        for d in 0..D {
            let u = self.state_arr(vip[d]);
            let corr = &t[Self::vel_slot(d)];
            for ix in iter_region(self.ijk()) {
                u.add(ix, corr.get(ix));
            }
        }
    }

    /// Run the pseudo-time iteration and refresh the stored correction.
    /// Returns the iteration count.
    pub(crate) fn pressure_update(&self) -> Result<usize, SolverError> {
        let prs = self.prm().prs.expect("pressure update without parameters");
        let vip = self.prm().vip.expect("pressure solver without vip indices");
        let eps = self.prm().max_abs_div_eps;
        let rank = self.rank();
        let t = self.mem().tmp(ScratchKey::Prs, 0);
        let (phi, err, lap_err) = (&t[PHI], &t[ERR], &t[LAP_ERR]);
        let ijk = self.ijk();

        // snapshot the provisional velocity
        for d in 0..D {
            let u = self.state_arr(vip[d]);
            let tmp = &t[Self::vel_slot(d)];
            for ix in iter_region(ijk) {
                tmp.set(ix, u.get(ix));
            }
        }

        self.residual_init();

        if prs.scheme == PrsScheme::ConjRes {
            let p = &t[3 + 2 * D];
            let lap_p = &t[4 + 2 * D];
            for ix in iter_region(ijk) {
                p.set(ix, err.get(ix));
            }
            self.laplacian(p, lap_p);
        }

        let mut iters = 0usize;
        loop {
            match prs.scheme {
                PrsScheme::MinRes | PrsScheme::Richardson => {
                    self.laplacian(err, lap_err);
                    let beta = if prs.scheme == PrsScheme::Richardson {
                        0.25
                    } else {
                        let num = self.mem().sum_prod(rank, err, lap_err, ijk);
                        let den = self.mem().sum_prod(rank, lap_err, lap_err, ijk);
                        if den.abs() <= eps {
                            warn!("degenerate beta denominator, Richardson fallback");
                            0.25
                        } else {
                            -num / den
                        }
                    };
                    for ix in iter_region(ijk) {
                        phi.add(ix, beta * err.get(ix));
                        err.add(ix, beta * lap_err.get(ix));
                    }
                }
                PrsScheme::ConjRes => {
                    let p = &t[3 + 2 * D];
                    let lap_p = &t[4 + 2 * D];
                    let den = self.mem().sum_prod(rank, lap_p, lap_p, ijk);
                    let degenerate = den.abs() <= eps;
                    let beta = if degenerate {
                        warn!("degenerate beta denominator, Richardson fallback");
                        0.25
                    } else {
                        -self.mem().sum_prod(rank, err, lap_p, ijk) / den
                    };
                    for ix in iter_region(ijk) {
                        phi.add(ix, beta * p.get(ix));
                        err.add(ix, beta * lap_p.get(ix));
                    }
                    self.laplacian(err, lap_err);
                    let alpha = if degenerate {
                        0.0
                    } else {
                        -self.mem().sum_prod(rank, lap_err, lap_p, ijk) / den
                    };
                    for ix in iter_region(ijk) {
                        p.set(ix, err.get(ix) + alpha * p.get(ix));
                        lap_p.set(ix, lap_err.get(ix) + alpha * lap_p.get(ix));
                    }
                }
            }

            iters += 1;
            let residual = self.mem().max_abs(rank, err, ijk);
            if residual <= prs.tol {
                break;
            }
            if iters >= MAX_ITERS {
                error!(
                    "pressure solver stalled: |r| = {:.3e} after {} iterations",
                    residual, iters
                );
                let e = SolverError::PressureDiverged { iters, residual };
                self.mem().raise_panic(e.clone());
                return Err(e);
            }
        }

        // refresh the stored correction: −∇Φ, with rigid-wall edges
        // stamped so the corrected wall-normal velocity vanishes
        self.xchng_pres(phi);
        for d in 0..D {
            let tmp = &t[Self::vel_slot(d)];
            let dx = self.grid().spacing(d);
            for ix in iter_region(ijk) {
                tmp.set(ix, -nabla::grad(phi, ix, d, dx));
            }
        }
        let vels: [&SharedArr<D>; D] = std::array::from_fn(|d| self.state_arr(vip[d]));
        self.set_edges(&t[3..3 + D], Some(vels));

        Ok(iters)
    }

    /// `r = ∇·(∇Φ − û)`, materialised through halo-exchanged gradient
    /// arrays with wall edges zeroed.
    fn residual_init(&self) {
        let t = self.mem().tmp(ScratchKey::Prs, 0);
        let phi = &t[PHI];
        let err = &t[ERR];
        let ijk = self.ijk();

        self.xchng_pres(phi);
        for d in 0..D {
            let g = &t[Self::grad_slot(d)];
            let v = &t[Self::vel_slot(d)];
            let dx = self.grid().spacing(d);
            for ix in iter_region(ijk) {
                g.set(ix, nabla::grad(phi, ix, d, dx) - v.get(ix));
            }
        }
        self.set_edges(&t[3 + D..3 + 2 * D], None);
        for d in 0..D {
            self.xchng_pres(&t[Self::grad_slot(d)]);
        }
        for ix in iter_region(ijk) {
            let mut acc = 0.0;
            for d in 0..D {
                acc += nabla::grad(&t[Self::grad_slot(d)], ix, d, self.grid().spacing(d));
            }
            err.set(ix, acc);
        }
    }

    /// `out = ∇²a` through the same materialised-gradient route.
    fn laplacian(&self, a: &SharedArr<D>, out: &SharedArr<D>) {
        let t = self.mem().tmp(ScratchKey::Prs, 0);
        let ijk = self.ijk();

        self.xchng_pres(a);
        for d in 0..D {
            let g = &t[Self::grad_slot(d)];
            let dx = self.grid().spacing(d);
            for ix in iter_region(ijk) {
                g.set(ix, nabla::grad(a, ix, d, dx));
            }
        }
        self.set_edges(&t[3 + D..3 + 2 * D], None);
        for d in 0..D {
            self.xchng_pres(&t[Self::grad_slot(d)]);
        }
        for ix in iter_region(ijk) {
            let mut acc = 0.0;
            for d in 0..D {
                acc += nabla::grad(&t[Self::grad_slot(d)], ix, d, self.grid().spacing(d));
            }
            out.set(ix, acc);
        }
    }
}
