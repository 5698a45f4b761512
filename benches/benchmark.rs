#[macro_use]
extern crate criterion;

extern crate rand;
extern crate recokit;

use criterion::Criterion;
use rand::distributions::{Distribution, Uniform};
use rand::{SeedableRng, XorShiftRng};

use recokit::data::ConsumedSet;
use recokit::topn;

fn catalog(num_items: usize, num_consumed: usize) -> (Vec<f32>, ConsumedSet) {
    let mut rng = XorShiftRng::from_seed([42; 16]);
    let scores = Uniform::new(0.0, 1.0);
    let items = Uniform::new(0, num_items);

    let scores: Vec<f32> = (0..num_items).map(|_| scores.sample(&mut rng)).collect();
    let consumed: Vec<usize> = (0..num_consumed).map(|_| items.sample(&mut rng)).collect();

    (scores, ConsumedSet::from(consumed))
}

fn bench_topn(c: &mut Criterion) {
    let (scores, consumed) = catalog(100_000, 200);

    c.bench_function("topn_select", |b| {
        b.iter(|| topn::select(&scores, &consumed, 10))
    });

    c.bench_function("full_sort", |b| {
        b.iter(|| {
            let mut ranked: Vec<(usize, f32)> = scores.iter().cloned().enumerate().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
            ranked
                .into_iter()
                .filter(|&(item_id, _)| !consumed.contains(item_id))
                .take(10)
                .collect::<Vec<_>>()
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_topn
}
criterion_main!(benches);
