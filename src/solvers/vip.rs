//! Velocity-in-pressure layer: advector extrapolation and the absorber.
//!
//! The advective Courant field is not prognostic; it is derived from the
//! velocity components named by the `vip` indices. At each step the cell
//! velocities are extrapolated half a step forward in time,
//! `û = 1.5 u^n − 0.5 u^{n−1}`, interpolated to the staggered faces and
//! scaled by `dt/Δx`. Before the first step the initial velocities are
//! used as-is.
//!
//! The optional velocity absorber relaxes the velocities toward a
//! prescribed state with a spatially varying rate:
//! `u ← u + dt·α(x)·(u_rel − u)`.

use crate::concurr::ScratchKey;
use crate::grid::{iter_region, shifted};
use crate::solvers::stepper::Stepper;

impl<'a, const D: usize> Stepper<'a, D> {
    /// Derive the initial advector from the initial velocities.
    pub(crate) fn vip_ante_loop(&self) {
        let vip = self.prm().vip.expect("vip layer without indices");
        let stash = self.mem().tmp(ScratchKey::Vip, 0);
        for d in 0..D {
            self.xchng_sclr(self.state_arr(vip[d]));
        }
        for d in 0..D {
            let u = self.state_arr(vip[d]);
            for ix in iter_region(self.part()) {
                stash[d].set(ix, u.get(ix));
            }
        }
        // neighbours read our stash when interpolating to shared faces
        self.mem().barrier();
        self.advector_from_velocities(1.0, 0.0);
        self.xchng_vctr(self.mem().gc());
    }

    /// Recompute the advector at `t + dt/2` from the current and previous
    /// velocities, then stash the current ones for the next step.
    pub(crate) fn vip_extrapolate(&self) {
        let vip = self.prm().vip.expect("vip layer without indices");
        for d in 0..D {
            self.xchng_sclr(self.state_arr(vip[d]));
        }
        self.advector_from_velocities(1.5, -0.5);
        // every rank must finish reading stashes before they are refreshed
        self.mem().barrier();
        let stash = self.mem().tmp(ScratchKey::Vip, 0);
        for d in 0..D {
            let u = self.state_arr(vip[d]);
            for ix in iter_region(self.part()) {
                stash[d].set(ix, u.get(ix));
            }
        }
        self.xchng_vctr(self.mem().gc());
    }

    /// `GC_d(f) = dt/Δ_d · ½(û(f) + û(f+e_d))` with `û = a·u + b·stash`.
    fn advector_from_velocities(&self, a: f64, b: f64) {
        let vip = self.prm().vip.expect("vip layer without indices");
        let stash = self.mem().tmp(ScratchKey::Vip, 0);
        let dt = self.dt();
        for d in 0..D {
            let u = self.state_arr(vip[d]);
            let st = &stash[d];
            let gc = &self.mem().gc()[d];
            let cdt = dt / self.grid().spacing(d);
            for f in iter_region(self.ijk()) {
                let r = shifted(f, d, 1);
                let ul = a * u.get(f) + b * st.get(f);
                let ur = a * u.get(r) + b * st.get(r);
                gc.set(f, cdt * 0.5 * (ul + ur));
            }
        }
    }

    /// Relax the velocities toward the absorber's reference state.
    pub(crate) fn absorber(&self) {
        let vip = self.prm().vip.expect("absorber without vip indices");
        let coeff = self
            .mem()
            .vab_coeff()
            .expect("absorber without coefficient field");
        let dt = self.dt();
        for d in 0..D {
            let u = self.state_arr(vip[d]);
            let rel = self.mem().vab_relax(d);
            for ix in iter_region(self.ijk()) {
                u.add(ix, dt * coeff.get(ix) * (rel.get(ix) - u.get(ix)));
            }
        }
    }
}
