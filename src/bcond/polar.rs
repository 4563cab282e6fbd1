//! Polar boundaries: hemispheres swap across the pole.
//!
//! A halo cell beyond the pole is the interior cell mirrored across the
//! pole face in this dimension and shifted by half the period in the
//! first perpendicular dimension. Components normal to the pole flip
//! sign, because the coordinate direction reverses on the far hemisphere.
//! The advector component along this dimension carries no transport
//! through the pole face itself.

use super::Bcond;
use crate::arr::SharedArr;
use crate::grid::{Region, Side};

#[inline]
fn mirror_sclr<const D: usize>(bc: &Bcond<D>, i: i64) -> i64 {
    match bc.side {
        Side::Left => -1 - i,
        Side::Right => 2 * bc.n - 1 - i,
    }
}

#[inline]
fn permute<const D: usize>(bc: &Bcond<D>, mut ix: [i64; D]) -> [i64; D] {
    ix[bc.perm_dim] = (ix[bc.perm_dim] + bc.perm_n / 2).rem_euclid(bc.perm_n);
    ix
}

pub(super) fn fill_sclr<const D: usize>(bc: &Bcond<D>, a: &SharedArr<D>, perp: &Region<D>) {
    bc.for_each_halo_sclr(perp, |ix| {
        let mut src = ix;
        src[bc.dim] = mirror_sclr(bc, ix[bc.dim]);
        a.set(ix, a.get(permute(bc, src)));
    });
}

pub(super) fn fill_vctr_nrml<const D: usize>(bc: &Bcond<D>, a: &SharedArr<D>, perp: &Region<D>) {
    bc.for_each_halo_sclr(perp, |ix| {
        let mut src = ix;
        src[bc.dim] = mirror_sclr(bc, ix[bc.dim]);
        a.set(ix, -a.get(permute(bc, src)));
    });
}

pub(super) fn fill_vctr_alng<const D: usize>(bc: &Bcond<D>, av: &SharedArr<D>, perp: &Region<D>) {
    let wall = bc.wall_vctr;
    let mut wall_region = *perp;
    wall_region[bc.dim] = crate::grid::Rng::new(wall, wall);
    for ix in crate::grid::iter_region(wall_region) {
        av.set(ix, 0.0);
    }
    let mirror = |f: i64| match bc.side {
        Side::Left => -2 - f,
        Side::Right => 2 * bc.n - 2 - f,
    };
    bc.for_each_halo_vctr(perp, |ix| {
        let f = ix[bc.dim];
        if f == wall {
            return;
        }
        let mut src = ix;
        src[bc.dim] = mirror(f);
        av.set(ix, -av.get(permute(bc, src)));
    });
}

#[cfg(test)]
mod tests {
    use super::super::{Bcond, BcondKind};
    use crate::arr::SharedArr;
    use crate::grid::{widen_all, Rng, Side};

    #[test]
    fn test_sclr_swaps_hemispheres() {
        // 4 x 3 grid, pole on the bottom of dimension 1
        let interior = [Rng::new(0, 3), Rng::new(0, 2)];
        let mut a: SharedArr<2> = SharedArr::zeros(widen_all(interior, 1));
        a.view_mut()
            .assign(interior, |ix| (10 * ix[0] + ix[1]) as f64);
        let bc: Bcond<2> = Bcond::new(BcondKind::Polar, 1, Side::Left, 3, 1, [4, 3]);
        bc.fill_halos_sclr(&a, &[Rng::new(0, 3), Rng::new(0, 2)]);
        // halo (i, -1) mirrors (i + 2 mod 4, 0)
        assert_eq!(a.get([0, -1]), a.get([2, 0]));
        assert_eq!(a.get([3, -1]), a.get([1, 0]));
    }

    #[test]
    fn test_nrml_flips_sign() {
        let interior = [Rng::new(0, 3), Rng::new(0, 2)];
        let mut a: SharedArr<2> = SharedArr::zeros(widen_all(interior, 1));
        a.view_mut().assign(interior, |ix| 1.0 + ix[0] as f64);
        let bc: Bcond<2> = Bcond::new(BcondKind::Polar, 1, Side::Left, 3, 1, [4, 3]);
        bc.fill_halos_vctr_nrml(&a, &[Rng::new(0, 3), Rng::new(0, 2)]);
        assert_eq!(a.get([0, -1]), -a.get([2, 0]));
    }
}
