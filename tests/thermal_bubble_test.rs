//! Two-dimensional thermal bubble.
//!
//! A warm anomaly in a neutrally stratified, initially quiescent domain
//! accelerates upward under buoyancy; the pressure projection keeps the
//! velocity divergence-free while the bubble rises. The test tracks the
//! anomaly's vertical centroid and checks that it climbs monotonically
//! once the updraft is established.

use mpdata_rs::grid::{iter_region, Rng};
use mpdata_rs::{
    BcondKind, Forcings, PrsParams, PrsScheme, RhsScheme, RhsStage, Runner, RtParams, StepContext,
};

const U: usize = 0;
const W: usize = 1;
const THT: usize = 2;
const PRS: usize = 3;

const NX: usize = 50;
const NY: usize = 50;
const G: f64 = 9.81;
const THT_AMB: f64 = 287.0;
const PRS_AMB: f64 = 101_300.0;
const PRS_TOL: f64 = 1e-5;

struct Buoyancy;

impl Forcings<2> for Buoyancy {
    fn apply(&self, ctx: &StepContext<'_, 2>, dt_part: f64, _stage: RhsStage) {
        let w = ctx.state(W);
        let tht = ctx.state(THT);
        for ix in iter_region(ctx.ijk()) {
            w.add(ix, dt_part * G * (tht.get(ix) - THT_AMB) / THT_AMB);
        }
    }
}

fn interior() -> [Rng; 2] {
    [Rng::new(0, NX as i64 - 1), Rng::new(0, NY as i64 - 1)]
}

fn bubble_runner() -> Runner<2> {
    let mut prm: RtParams<2> = RtParams::new([NX, NY]);
    prm.dt = 0.1;
    prm.n_eqns = 4;
    prm.n_iters = 2;
    prm.rhs_scheme = RhsScheme::Trapez;
    prm.vip = Some([U, W]);
    prm.prs = Some(PrsParams {
        scheme: PrsScheme::MinRes,
        tol: PRS_TOL,
    });
    let mut run = Runner::new(prm, [[BcondKind::Cyclic; 2]; 2], 2)
        .unwrap()
        .with_forcings(Buoyancy);

    let sigma2 = 2.0 * (NX as f64 / 10.0).powi(2);
    run.advectee(THT).assign(interior(), |ix| {
        let dx = ix[0] as f64 - NX as f64 / 2.0;
        let dy = ix[1] as f64 - NY as f64 / 3.0;
        THT_AMB + 2.0 * (-dx * dx / sigma2 - dy * dy / sigma2).exp()
    });
    run.advectee(PRS).fill(PRS_AMB);
    run.advectee(U).fill(0.0);
    run.advectee(W).fill(0.0);
    run
}

/// Vertical centroid of the temperature anomaly.
fn centroid(run: &Runner<2>) -> f64 {
    let tht = run.state(THT);
    let mut weight = 0.0;
    let mut moment = 0.0;
    for ix in iter_region(interior()) {
        let anomaly = tht.at(ix) - THT_AMB;
        weight += anomaly;
        moment += anomaly * ix[1] as f64;
    }
    moment / weight
}

#[test]
fn test_bubble_rises_monotonically() {
    let mut run = bubble_runner();
    let z0 = centroid(&run);

    run.advance(20).unwrap();
    let z20 = centroid(&run);
    assert!(
        z20 > z0 + 0.005,
        "no rise in the first 20 steps: {} -> {}",
        z0,
        z20
    );

    run.advance(20).unwrap();
    let z40 = centroid(&run);
    assert!(
        z40 > z20 + 0.01,
        "rise stalled between steps 20 and 40: {} -> {}",
        z20,
        z40
    );

    // an updraft has formed under the bubble
    let w = run.state(W);
    assert!(w.max(interior()) > 0.01);

    // the projection held the divergence constraint
    let n = (NX as i64, NY as i64);
    let u = run.state(U);
    let mut worst = 0.0f64;
    for ix in iter_region(interior()) {
        let (i, j) = (ix[0], ix[1]);
        let dudx = (u.at([(i + 1).rem_euclid(n.0), j]) - u.at([(i - 1).rem_euclid(n.0), j])) * 0.5;
        let dwdz = (w.at([i, (j + 1).rem_euclid(n.1)]) - w.at([i, (j - 1).rem_euclid(n.1)])) * 0.5;
        worst = worst.max((dudx + dwdz).abs());
    }
    assert!(worst <= 1.1 * PRS_TOL, "divergence left: {}", worst);

    // the passive pressure field is transported, not interpreted
    let prs = run.state(PRS);
    assert!((prs.at([25, 25]) - PRS_AMB).abs() < 1e-3 * PRS_AMB);
}
