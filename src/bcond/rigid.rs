//! Rigid (impermeable, free-slip) walls.
//!
//! Scalars and tangential velocity components reflect across the wall
//! face, which also gives the pressure perturbation its zero normal
//! derivative. The wall-normal advector component is zeroed on the wall
//! face itself and reflected with a sign flip into deeper halo faces, so
//! no mass crosses the wall. Edge stamping substitutes the boundary value
//! used when the pressure gradient is projected at the wall: zero for the
//! Laplacian's inner gradients, `-v` for the final velocity correction
//! (so that `v + correction = 0` on the wall).

use super::Bcond;
use crate::arr::SharedArr;
use crate::grid::{Region, Side};

/// Mirror image of a scalar halo index across the wall.
#[inline]
fn mirror_sclr<const D: usize>(bc: &Bcond<D>, i: i64) -> i64 {
    match bc.side {
        Side::Left => -1 - i,
        Side::Right => 2 * bc.n - 1 - i,
    }
}

/// Mirror image of a halo face across the wall face.
#[inline]
fn mirror_vctr<const D: usize>(bc: &Bcond<D>, f: i64) -> i64 {
    match bc.side {
        Side::Left => -2 - f,
        Side::Right => 2 * bc.n - 2 - f,
    }
}

pub(super) fn fill_sclr<const D: usize>(bc: &Bcond<D>, a: &SharedArr<D>, perp: &Region<D>) {
    bc.for_each_halo_sclr(perp, |ix| {
        let mut src = ix;
        src[bc.dim] = mirror_sclr(bc, ix[bc.dim]);
        a.set(ix, a.get(src));
    });
}

pub(super) fn fill_vctr_alng<const D: usize>(bc: &Bcond<D>, av: &SharedArr<D>, perp: &Region<D>) {
    // wall face: no flux through the wall
    let wall = bc.wall_vctr;
    let mut wall_region = *perp;
    wall_region[bc.dim] = crate::grid::Rng::new(wall, wall);
    for ix in crate::grid::iter_region(wall_region) {
        av.set(ix, 0.0);
    }
    // deeper halo faces: antisymmetric reflection
    bc.for_each_halo_vctr(perp, |ix| {
        let f = ix[bc.dim];
        if f == wall {
            return;
        }
        let mut src = ix;
        src[bc.dim] = mirror_vctr(bc, f);
        av.set(ix, -av.get(src));
    });
}

pub(super) fn set_edge_pres<const D: usize>(
    bc: &Bcond<D>,
    a: &SharedArr<D>,
    v: Option<&SharedArr<D>>,
    perp: &Region<D>,
) {
    match v {
        None => bc.for_each_edge(perp, |ix| a.set(ix, 0.0)),
        Some(vel) => bc.for_each_edge(perp, |ix| a.set(ix, -vel.get(ix))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Bcond, BcondKind};
    use crate::arr::SharedArr;
    use crate::grid::{Rng, Side};

    const TOL: f64 = 1e-14;

    fn arr(n: i64, h: usize) -> SharedArr<1> {
        SharedArr::zeros([Rng::new(-(h as i64), n - 1 + h as i64)])
    }

    #[test]
    fn test_sclr_mirrors_across_wall() {
        let mut a = arr(6, 2);
        a.view_mut().assign([Rng::new(0, 5)], |ix| ix[0] as f64 + 1.0);
        let left: Bcond<1> = Bcond::new(BcondKind::Rigid, 0, Side::Left, 6, 2, [6]);
        let right: Bcond<1> = Bcond::new(BcondKind::Rigid, 0, Side::Right, 6, 2, [6]);
        let perp = [Rng::new(0, 5)];
        left.fill_halos_sclr(&a, &perp);
        right.fill_halos_sclr(&a, &perp);
        assert!((a.get([-1]) - 1.0).abs() < TOL); // mirror of cell 0
        assert!((a.get([-2]) - 2.0).abs() < TOL); // mirror of cell 1
        assert!((a.get([6]) - 6.0).abs() < TOL); // mirror of cell 5
        assert!((a.get([7]) - 5.0).abs() < TOL); // mirror of cell 4
    }

    #[test]
    fn test_vctr_alng_zero_through_wall() {
        let mut av = arr(6, 2);
        av.view_mut().assign([Rng::new(0, 5)], |ix| ix[0] as f64 + 1.0);
        let left: Bcond<1> = Bcond::new(BcondKind::Rigid, 0, Side::Left, 6, 2, [6]);
        let right: Bcond<1> = Bcond::new(BcondKind::Rigid, 0, Side::Right, 6, 2, [6]);
        let perp = [Rng::new(0, 5)];
        left.fill_halos_vctr_alng(&av, &perp);
        right.fill_halos_vctr_alng(&av, &perp);
        // wall faces carry no flux
        assert!(av.get([-1]).abs() < TOL);
        assert!(av.get([5]).abs() < TOL);
        // deeper halo faces are antisymmetric images
        assert!((av.get([-2]) - -av.get([0])).abs() < TOL);
        assert!((av.get([6]) - -av.get([4])).abs() < TOL);
    }

    #[test]
    fn test_set_edge_pres_zero_and_velocity() {
        let a = arr(6, 1);
        let mut vel = arr(6, 1);
        vel.view_mut().assign([Rng::new(0, 5)], |_| 3.0);
        let left: Bcond<1> = Bcond::new(BcondKind::Rigid, 0, Side::Left, 6, 1, [6]);
        let perp = [Rng::new(0, 5)];
        left.set_edge_pres(&a, None, &perp);
        assert!(a.get([0]).abs() < TOL);
        left.set_edge_pres(&a, Some(&vel), &perp);
        assert!((a.get([0]) - -3.0).abs() < TOL);
    }

    #[test]
    fn test_cyclic_edge_stamp_is_noop() {
        let a = arr(6, 1);
        a.set([0], 7.0);
        let bc: Bcond<1> = Bcond::new(BcondKind::Cyclic, 0, Side::Left, 6, 1, [6]);
        bc.set_edge_pres(&a, None, &[Rng::new(0, 5)]);
        assert!((a.get([0]) - 7.0).abs() < TOL);
    }
}
