//! Antidiffusive velocity of the MPDATA corrective passes.
//!
//! The donor-cell pass is over-diffusive; its leading truncation error is
//! a diffusion term that can itself be written as advection by an
//! "antidiffusive" velocity. Each corrective pass advects the current
//! iterate with that velocity, reversing most of the implicit diffusion
//! while keeping the scheme sign-preserving.
//!
//! On the face `i+½` of dimension `d`:
//!
//! C* = (|C| − C²) · (ψᵢ₊₁ − ψᵢ)/(ψᵢ₊₁ + ψᵢ)
//!      − Σ_{q≠d} C · C̄_q · ½(ψ⁺⁺ + ψ⁻⁺ − ψ⁺⁻ − ψ⁻⁻)/(ψ⁺⁺ + ψ⁻⁺ + ψ⁺⁻ + ψ⁻⁻)
//!
//! where C̄_q averages the `q`-component over the four faces adjacent to
//! this one and ψ^{±±} are the corner neighbours in the (d, q) plane.
//! Ratios with degenerate denominators are zeroed (guard `max_abs_div_eps`).
//!
//! The ratios are evaluated on |ψ|, the variable-sign form: identical to
//! the plain form wherever the field is single-signed (in particular for
//! non-negative advectees), and bounded to [−1, 1] across sign changes,
//! so velocity components advect themselves through zero crossings
//! without the ratio degenerating.

use super::frac;
use crate::arr::SharedArr;
use crate::grid::shifted;

/// Antidiffusive Courant number on face `f+½` of dimension `d`.
///
/// # Arguments
/// * `psi` - Current iterate (halos must be valid)
/// * `gc` - Advector used by the previous pass, one component per
///   dimension
/// * `d` - Dimension of the face
/// * `f` - Face index (the face between cells `f` and `f + e_d`)
/// * `eps` - Guard below which a ratio denominator counts as degenerate
///
/// # Returns
/// The corrective Courant number C* for this face
#[inline]
pub fn antidiff<const D: usize>(
    psi: &SharedArr<D>,
    gc: &[SharedArr<D>],
    d: usize,
    f: [i64; D],
    eps: f64,
) -> f64 {
    let l = f;
    let r = shifted(f, d, 1);
    let cd = gc[d].get(f);
    let (al, ar) = (psi.get(l).abs(), psi.get(r).abs());

    let mut cs = (cd.abs() - cd * cd) * frac(ar - al, ar + al, eps);

    for q in 0..D {
        if q == d {
            continue;
        }
        // q-component averaged over the four faces around this d-face
        let gq = 0.25
            * (gc[q].get(l)
                + gc[q].get(shifted(l, q, -1))
                + gc[q].get(r)
                + gc[q].get(shifted(r, q, -1)));
        let lp = psi.get(shifted(l, q, 1)).abs();
        let rp = psi.get(shifted(r, q, 1)).abs();
        let lm = psi.get(shifted(l, q, -1)).abs();
        let rm = psi.get(shifted(r, q, -1)).abs();
        cs -= 0.5 * cd * gq * frac(rp + lp - rm - lm, rp + lp + rm + lm, eps);
    }
    cs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{widen_all, Rng};

    const EPS: f64 = 1e-14;
    const TOL: f64 = 1e-12;

    fn uniform_gc_1d(c: f64) -> Vec<SharedArr<1>> {
        let mut gc: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 8)]);
        gc.view_mut().fill(c);
        vec![gc]
    }

    #[test]
    fn test_uniform_field_needs_no_correction() {
        let mut psi: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 8)]);
        psi.view_mut().fill(3.0);
        let gc = uniform_gc_1d(0.5);
        assert!(antidiff(&psi, &gc, 0, [3], EPS).abs() < TOL);
    }

    #[test]
    fn test_extreme_courant_needs_no_correction() {
        // at |C| = 1 donor-cell is exact, so |C| - C^2 = 0
        let mut psi: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 8)]);
        psi.view_mut().assign([Rng::new(-1, 8)], |ix| (ix[0] + 2) as f64);
        let gc = uniform_gc_1d(1.0);
        assert!(antidiff(&psi, &gc, 0, [3], EPS).abs() < TOL);
    }

    #[test]
    fn test_gradient_drives_correction() {
        // C = 0.5, psi = (1, 3) across the face:
        // C* = (0.5 - 0.25) * (3 - 1)/(3 + 1) = 0.125
        let psi: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 8)]);
        psi.set([3], 1.0);
        psi.set([4], 3.0);
        let gc = uniform_gc_1d(0.5);
        assert!((antidiff(&psi, &gc, 0, [3], EPS) - 0.125).abs() < TOL);
    }

    #[test]
    fn test_sign_change_needs_no_correction() {
        // across a zero crossing |psi| is symmetric and the ratio vanishes
        let psi: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 8)]);
        psi.set([3], 1.0);
        psi.set([4], -1.0);
        let gc = uniform_gc_1d(0.5);
        assert_eq!(antidiff(&psi, &gc, 0, [3], EPS), 0.0);
    }

    #[test]
    fn test_zero_denominator_is_guarded() {
        // an isolated spike against a zero background
        let psi: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 8)]);
        let gc = uniform_gc_1d(0.5);
        assert_eq!(antidiff(&psi, &gc, 0, [5], EPS), 0.0);
    }

    #[test]
    fn test_cross_term_vanishes_without_perpendicular_flow() {
        let interior = [Rng::new(0, 7), Rng::new(0, 7)];
        let mut psi: SharedArr<2> = SharedArr::zeros(widen_all(interior, 1));
        psi.view_mut()
            .assign(widen_all(interior, 1), |ix| 1.0 + 0.1 * ix[0] as f64);
        let mut gcx: SharedArr<2> = SharedArr::zeros(widen_all(interior, 1));
        gcx.view_mut().fill(0.4);
        let gcy: SharedArr<2> = SharedArr::zeros(widen_all(interior, 1));
        let gc = vec![gcx, gcy];
        // psi varies in x only and GC_y = 0, so the 2-D value matches 1-D
        let c = 0.4f64;
        let l = psi.get([3, 3]);
        let r = psi.get([4, 3]);
        let expect = (c.abs() - c * c) * (r - l) / (r + l);
        assert!((antidiff(&psi, &gc, 0, [3, 3], EPS) - expect).abs() < TOL);
    }
}
