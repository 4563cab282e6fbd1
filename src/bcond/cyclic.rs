//! Periodic boundaries: halos copy the opposite interior.
//!
//! In face coordinates the interior faces `0 ..= n-1` are exactly the
//! distinct physical faces of a periodic dimension, so both scalar and
//! face halos are plain shifts by the period.

use super::Bcond;
use crate::arr::SharedArr;
use crate::grid::{shifted, Region, Side};

#[inline]
fn period<const D: usize>(bc: &Bcond<D>) -> i64 {
    match bc.side {
        Side::Left => bc.n,
        Side::Right => -bc.n,
    }
}

pub(super) fn fill_sclr<const D: usize>(bc: &Bcond<D>, a: &SharedArr<D>, perp: &Region<D>) {
    let shift = period(bc);
    bc.for_each_halo_sclr(perp, |ix| {
        a.set(ix, a.get(shifted(ix, bc.dim, shift)));
    });
}

pub(super) fn fill_vctr_alng<const D: usize>(bc: &Bcond<D>, av: &SharedArr<D>, perp: &Region<D>) {
    let shift = period(bc);
    bc.for_each_halo_vctr(perp, |ix| {
        av.set(ix, av.get(shifted(ix, bc.dim, shift)));
    });
}
