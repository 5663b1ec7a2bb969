use criterion::{black_box, criterion_group, criterion_main, Criterion};
use drivacy::field::FieldElement;
use drivacy::protocol::QueryState;
use drivacy::shuffle::Shuffler;

fn bench_initialize(c: &mut Criterion, parallelism: u32, batch_size: usize) {
    c.bench_function(&format!("shuffle_initialize/m={parallelism}/b={batch_size}"), |b| {
        b.iter(|| {
            let mut shuffler = Shuffler::new(1, 1, parallelism);
            shuffler.initialize(black_box(batch_size), black_box(42));
        })
    });
}

fn initialize_small(c: &mut Criterion) {
    bench_initialize(c, 4, 32);
}

fn initialize_large(c: &mut Criterion) {
    bench_initialize(c, 16, 256);
}

fn bench_full_shard_cycle(c: &mut Criterion) {
    let modulus = (1u64 << 61) - 1;
    c.bench_function("shuffle_full_single_shard_cycle/b=128", |b| {
        b.iter(|| {
            let mut shuffler = Shuffler::new(1, 1, 1);
            shuffler.initialize(128, 42);
            for i in 0..128 {
                let state = QueryState(FieldElement::new(i as u64, modulus));
                let dest = shuffler.machine_of_next_query(i, vec![i as u8], state);
                black_box(dest);
            }
            while let Some((dest, bytes)) = shuffler.next_query() {
                shuffler.shuffle_query(dest, bytes).unwrap();
            }
            for _ in 0..128 {
                let (_, bytes) = shuffler.next_received_query().unwrap();
                black_box(bytes);
                let relay_to = shuffler.machine_of_next_response();
                black_box(relay_to);
            }
        })
    });
}

criterion_group!(benches, initialize_small, initialize_large, bench_full_shard_cycle);
criterion_main!(benches);
