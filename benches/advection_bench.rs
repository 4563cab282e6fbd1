//! Benchmarks for the advection path.
//!
//! Run with: `cargo bench --bench advection_bench`
//!
//! Compares donor-cell against full MPDATA (with and without the
//! flux-corrected limiter) across grid sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mpdata_rs::grid::Rng;
use mpdata_rs::{BcondKind, Runner, RtParams};

fn advection_runner(n: usize, n_iters: usize, fct: bool) -> Runner<2> {
    let mut prm: RtParams<2> = RtParams::new([n, n]);
    prm.dt = 1.0;
    prm.n_iters = n_iters;
    prm.fct = fct;
    let mut run = Runner::new(prm, [[BcondKind::Cyclic; 2]; 2], 1).unwrap();
    let interior = [Rng::new(0, n as i64 - 1), Rng::new(0, n as i64 - 1)];
    run.advectee(0).assign(interior, |ix| {
        let dx = ix[0] as f64 - n as f64 / 2.0;
        let dy = ix[1] as f64 - n as f64 / 2.0;
        (-(dx * dx + dy * dy) / (n as f64)).exp()
    });
    run.advector(0).fill(0.35);
    run.advector(1).fill(-0.25);
    run
}

fn bench_advop(c: &mut Criterion) {
    let mut group = c.benchmark_group("advop");
    for &n in &[32usize, 64] {
        group.bench_with_input(BenchmarkId::new("donorcell", n), &n, |b, &n| {
            let mut run = advection_runner(n, 1, false);
            b.iter(|| black_box(&mut run).advance(1).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("mpdata3", n), &n, |b, &n| {
            let mut run = advection_runner(n, 3, false);
            b.iter(|| black_box(&mut run).advance(1).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("mpdata3_fct", n), &n, |b, &n| {
            let mut run = advection_runner(n, 3, true);
            b.iter(|| black_box(&mut run).advance(1).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_advop);
criterion_main!(benches);
