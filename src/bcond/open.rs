//! Open boundaries: zero-gradient extrapolation.
//!
//! Halo cells copy the outermost interior value, letting disturbances
//! leave the domain without reflecting (to first order). All four fills
//! use the same extrapolation; the edge stamp is a no-op.

use super::Bcond;
use crate::arr::SharedArr;
use crate::grid::{Region, Side};

pub(super) fn fill_sclr<const D: usize>(bc: &Bcond<D>, a: &SharedArr<D>, perp: &Region<D>) {
    let edge = match bc.side {
        Side::Left => 0,
        Side::Right => bc.n - 1,
    };
    bc.for_each_halo_sclr(perp, |ix| {
        let mut src = ix;
        src[bc.dim] = edge;
        a.set(ix, a.get(src));
    });
}

pub(super) fn fill_vctr_alng<const D: usize>(bc: &Bcond<D>, av: &SharedArr<D>, perp: &Region<D>) {
    let edge = match bc.side {
        Side::Left => 0,
        Side::Right => bc.n - 1,
    };
    bc.for_each_halo_vctr(perp, |ix| {
        let mut src = ix;
        src[bc.dim] = edge;
        av.set(ix, av.get(src));
    });
}

#[cfg(test)]
mod tests {
    use super::super::{Bcond, BcondKind};
    use crate::arr::SharedArr;
    use crate::grid::{Rng, Side};

    #[test]
    fn test_sclr_copies_outermost_interior() {
        let mut a: SharedArr<1> = SharedArr::zeros([Rng::new(-2, 7)]);
        a.view_mut().assign([Rng::new(0, 5)], |ix| ix[0] as f64);
        let left: Bcond<1> = Bcond::new(BcondKind::Open, 0, Side::Left, 6, 2, [6]);
        let right: Bcond<1> = Bcond::new(BcondKind::Open, 0, Side::Right, 6, 2, [6]);
        let perp = [Rng::new(0, 5)];
        left.fill_halos_sclr(&a, &perp);
        right.fill_halos_sclr(&a, &perp);
        assert_eq!(a.get([-1]), 0.0);
        assert_eq!(a.get([-2]), 0.0);
        assert_eq!(a.get([6]), 5.0);
        assert_eq!(a.get([7]), 5.0);
    }

    #[test]
    fn test_vctr_alng_copies_edge_face() {
        let mut av: SharedArr<1> = SharedArr::zeros([Rng::new(-1, 6)]);
        av.view_mut().assign([Rng::new(0, 5)], |ix| ix[0] as f64 + 0.5);
        let left: Bcond<1> = Bcond::new(BcondKind::Open, 0, Side::Left, 6, 1, [6]);
        left.fill_halos_vctr_alng(&av, &[Rng::new(0, 5)]);
        assert_eq!(av.get([-1]), 0.5);
    }
}
