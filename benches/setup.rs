use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use silent_threshold::{generate_key, setup::LagrangePowers, Params};
use ark_ec::pairing::Pairing;
use ark_std::UniformRand;

type E = ark_bls12_381::Bls12_381;
type Fr = <E as Pairing>::ScalarField;

fn bench_lagrange_powers(c: &mut Criterion) {
    let mut rng = ark_std::test_rng();
    let mut group = c.benchmark_group("lagrange_powers");
    group.sample_size(10);

    for size in 3..=7 {
        let n = 1 << size;
        let tau = Fr::rand(&mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(tau, n), |b, inp| {
            b.iter(|| LagrangePowers::<E>::new(inp.0, inp.1));
        });
    }

    group.finish();
}

fn bench_keygen(c: &mut Criterion) {
    let mut rng = ark_std::test_rng();
    let mut group = c.benchmark_group("keygen");

    for size in 3..=8 {
        let n = (1 << size) - 1;
        let params = Params::<E>::new(n, &mut rng).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &params, |b, params| {
            let mut rng = ark_std::test_rng();
            b.iter(|| generate_key(params, n - 1, &mut rng));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lagrange_powers, bench_keygen);
criterion_main!(benches);
