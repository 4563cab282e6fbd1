//! Flux-corrected transport: the non-oscillatory option.
//!
//! Before each corrective pass the antidiffusive velocity is clamped so
//! that the next donor-cell update cannot create a new extremum. The
//! allowed rise of a cell is measured against the running extrema of the
//! pre-advection field over the donor-cell stencil; the ratios β↑ (room to
//! grow over incoming flux) and β↓ (room to fall over outgoing flux)
//! scale the face velocities down wherever they would overshoot.
//!
//! This is the positive-definite form: fields are assumed non-negative.

use crate::arr::SharedArr;
use crate::grid::{iter_region, shifted, Region};

/// Local extrema of `psi` over the donor-cell stencil (the cell and its
/// face neighbours in every dimension).
///
/// # Arguments
/// * `psi` - Field whose extrema are measured (halos must be valid)
/// * `region` - Cells to evaluate
/// * `out_min` - Receives the stencil minimum per cell
/// * `out_max` - Receives the stencil maximum per cell
pub fn local_extrema<const D: usize>(
    psi: &SharedArr<D>,
    region: Region<D>,
    out_min: &SharedArr<D>,
    out_max: &SharedArr<D>,
) {
    for ix in iter_region(region) {
        let mut mn = psi.get(ix);
        let mut mx = mn;
        for d in 0..D {
            for s in [-1, 1] {
                let v = psi.get(shifted(ix, d, s));
                mn = mn.min(v);
                mx = mx.max(v);
            }
        }
        out_min.set(ix, mn);
        out_max.set(ix, mx);
    }
}

/// Monotonicity ratios for one cell: `(beta_up, beta_dn)`.
///
/// `beta_up` bounds the total incoming flux by the distance to the local
/// maximum; `beta_dn` bounds the outgoing flux by the distance to the
/// local minimum. Degenerate denominators make the ratio huge, i.e. no
/// limit (a cell nothing flows into cannot overshoot).
///
/// # Arguments
/// * `cur` - Current iterate (halos must be valid)
/// * `gc` - Antidiffusive advector being limited (halos must be valid)
/// * `psi_min` - Stencil minima from [`local_extrema`]
/// * `psi_max` - Stencil maxima from [`local_extrema`]
/// * `ix` - Cell to evaluate
/// * `eps` - Denominator guard
///
/// # Returns
/// The pair `(beta_up, beta_dn)` for this cell
#[inline]
pub fn beta_pair<const D: usize>(
    cur: &SharedArr<D>,
    gc: &[SharedArr<D>],
    psi_min: &SharedArr<D>,
    psi_max: &SharedArr<D>,
    ix: [i64; D],
    eps: f64,
) -> (f64, f64) {
    let s = cur.get(ix);
    let mut influx = 0.0;
    let mut outflux = 0.0;
    for d in 0..D {
        let cl = gc[d].get(shifted(ix, d, -1));
        let cr = gc[d].get(ix);
        influx += cl.max(0.0) * cur.get(shifted(ix, d, -1)) - cr.min(0.0) * cur.get(shifted(ix, d, 1));
        outflux += cr.max(0.0) * s - cl.min(0.0) * s;
    }
    (
        (psi_max.get(ix) - s) / (influx + eps),
        (s - psi_min.get(ix)) / (outflux + eps),
    )
}

/// Clamp the antidiffusive Courant number `c` on the face between cells
/// `l` and `r = l + e_d`, given each side's monotonicity ratios.
///
/// # Arguments
/// * `c` - Unlimited antidiffusive Courant number on the face
/// * `beta_up_l`, `beta_dn_l` - Ratios of the left cell
/// * `beta_up_r`, `beta_dn_r` - Ratios of the right cell
///
/// # Returns
/// The limited Courant number (unchanged when no bound is active)
#[inline]
pub fn limit(c: f64, beta_up_l: f64, beta_dn_l: f64, beta_up_r: f64, beta_dn_r: f64) -> f64 {
    if c > 0.0 {
        // donor is the left cell, receiver the right
        c * beta_dn_l.min(beta_up_r).min(1.0)
    } else {
        c * beta_up_l.min(beta_dn_r).min(1.0)
    }
}
