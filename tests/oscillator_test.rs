//! Coupled harmonic oscillator: two advected scalars exchanging
//! amplitude through a rotation forcing.
//!
//! ∂ψ/∂t + ∇·(uψ) =  ωφ
//! ∂φ/∂t + ∇·(uφ) = −ωψ
//!
//! The forcing is integrated trapezoidally: an explicit half-rotation
//! before advection and an implicit half-rotation after it, which makes
//! the rotation exactly energy-conserving. The pointwise energy
//! ψ² + φ² is then simply the advected initial profile, so after a whole
//! number of revolutions at an integer displacement it must reproduce
//! the initial ψ² field.

use std::f64::consts::PI;

use mpdata_rs::grid::{iter_region, Rng};
use mpdata_rs::{BcondKind, Forcings, RhsScheme, RhsStage, Runner, RtParams, StepContext};

const PSI: usize = 0;
const PHI: usize = 1;

struct CoupledOscillator {
    omega: f64,
}

impl Forcings<1> for CoupledOscillator {
    fn apply(&self, ctx: &StepContext<'_, 1>, dt_part: f64, stage: RhsStage) {
        let psi = ctx.state(PSI);
        let phi = ctx.state(PHI);
        let b = self.omega * dt_part;
        match stage {
            // explicit half-rotation on the old pair
            RhsStage::Ante => {
                for ix in iter_region(ctx.ijk()) {
                    let p = psi.get(ix);
                    let q = phi.get(ix);
                    psi.set(ix, p + b * q);
                    phi.set(ix, q - b * p);
                }
            }
            // implicit half-rotation: solve the coupled 2x2 system
            RhsStage::Post => {
                let det = 1.0 + b * b;
                for ix in iter_region(ctx.ijk()) {
                    let p = psi.get(ix);
                    let q = phi.get(ix);
                    psi.set(ix, (p + b * q) / det);
                    phi.set(ix, (q - b * p) / det);
                }
            }
        }
    }
}

#[test]
fn test_oscillation_preserves_pointwise_energy() {
    let nx: usize = 1000;
    let nt: u64 = 400; // one full revolution at omega = 2π/400
    let c = 0.5;
    let omega = 2.0 * PI / 400.0;

    let mut prm: RtParams<1> = RtParams::new([nx]);
    prm.dt = 1.0;
    prm.n_eqns = 2;
    prm.n_iters = 3;
    prm.rhs_scheme = RhsScheme::Trapez;
    let mut run = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 2)
        .unwrap()
        .with_forcings(CoupledOscillator { omega });

    let interior = [Rng::new(0, nx as i64 - 1)];
    let psi0 = |i: i64| (PI * i as f64 / nx as f64).sin().powi(300);
    run.advectee(PSI).assign(interior, |ix| psi0(ix[0]));
    run.advectee(PHI).fill(0.0);
    run.advector(0).fill(c);

    run.advance(nt).unwrap();

    // displacement after 400 steps at C = 0.5 is exactly 200 cells
    let shift = (c * nt as f64) as i64;
    let (psi, phi) = (run.state(PSI), run.state(PHI));
    let mut max_err = 0.0f64;
    let mut peak = 0.0f64;
    for ix in iter_region(interior) {
        let e = psi.at(ix).powi(2) + phi.at(ix).powi(2);
        let src = (ix[0] - shift).rem_euclid(nx as i64);
        max_err = max_err.max((e - psi0(src).powi(2)).abs());
        peak = peak.max(e);
    }
    assert!(
        max_err < 0.01,
        "pointwise energy drifted by {} from the advected profile",
        max_err
    );
    assert!((peak - 1.0).abs() < 0.01, "energy peak decayed to {}", peak);
}

#[test]
fn test_rotation_alone_is_energy_neutral() {
    // with a quiescent advector the trapezoidal rotation is exact
    let nx: usize = 16;
    let omega = 2.0 * PI / 50.0;
    let mut prm: RtParams<1> = RtParams::new([nx]);
    prm.dt = 1.0;
    prm.n_eqns = 2;
    prm.n_iters = 2;
    prm.rhs_scheme = RhsScheme::Trapez;
    let mut run = Runner::new(prm, [[BcondKind::Cyclic; 2]; 1], 1)
        .unwrap()
        .with_forcings(CoupledOscillator { omega });

    let interior = [Rng::new(0, nx as i64 - 1)];
    run.advectee(PSI).assign(interior, |ix| (ix[0] % 5) as f64 * 0.2);
    run.advectee(PHI).fill(0.0);
    run.advector(0).fill(0.0);

    let e0: Vec<f64> = iter_region(interior)
        .map(|ix| run.state(PSI).at(ix).powi(2) + run.state(PHI).at(ix).powi(2))
        .collect();
    run.advance(500).unwrap();
    for (k, ix) in iter_region(interior).enumerate() {
        let e = run.state(PSI).at(ix).powi(2) + run.state(PHI).at(ix).powi(2);
        assert!(
            (e - e0[k]).abs() < 1e-9,
            "energy drifted at {:?}: {} vs {}",
            ix,
            e,
            e0[k]
        );
    }
}
