use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use imsim::model::{FeatureVector, MimeType, NewImage};
use imsim::ranking::Ranker;
use imsim::similarity::cosine_similarity;
use imsim::store::{ImageStore, MemoryStore};
use rand::prelude::*;

const DIM: usize = 128;
const N: usize = 10_000;

fn random_vector(rng: &mut impl Rng) -> Vec<f32> {
    (0..DIM).map(|_| rng.random::<f32>()).collect()
}

fn bench_cosine(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cosine");
    let mut rng = rand::rng();
    let src = random_vector(&mut rng);
    let dst = (0..N).map(|_| random_vector(&mut rng)).collect::<Vec<_>>();

    group.throughput(Throughput::Elements(N as u64));
    group.bench_function("cosine_similarity", |b| {
        b.iter(|| dst.iter().map(|v| cosine_similarity(&src, black_box(v)).unwrap()).sum::<f64>())
    });
    group.finish();
}

fn bench_find_similar(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut rng = rand::rng();

    let store = Arc::new(MemoryStore::new());
    runtime.block_on(async {
        for i in 0..N {
            let image = NewImage {
                filename: format!("{i}.jpg"),
                mime_type: MimeType::Jpeg,
                width: 224,
                height: 224,
                size: 1,
                source: None,
                feature_vector: FeatureVector::new(random_vector(&mut rng)).unwrap(),
                image_data: vec![],
            };
            store.save(image).await.unwrap();
        }
    });
    let ranker = Ranker::new(store.clone(), store);

    let mut group = c.benchmark_group("Ranking");
    group.throughput(Throughput::Elements(N as u64));
    for limit in [10, 1000] {
        group.bench_function(format!("find_similar_{limit}"), |b| {
            b.iter(|| runtime.block_on(ranker.find_similar(black_box(1), Some(limit))).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cosine, bench_find_similar);
criterion_main!(benches);
