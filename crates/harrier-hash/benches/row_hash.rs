//! Row-hash throughput over int and string key columns.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use harrier_hash::{hash_rows, BloomFilter};
use harrier_types::{Batch, ColumnSpec, ColumnType, ScalarValue};

fn key_batch(rows: usize) -> Batch {
    let specs = vec![
        ColumnSpec::new("id", ColumnType::Int64),
        ColumnSpec::new("name", ColumnType::Utf8),
    ];
    let rows: Vec<Vec<ScalarValue>> = (0..rows)
        .map(|i| {
            vec![
                ScalarValue::Int64(i as i64 * 2_654_435_761),
                ScalarValue::Utf8(format!("customer-{i:08}")),
            ]
        })
        .collect();
    Batch::from_rows(&rows, &specs).unwrap()
}

fn bench_hash_rows(c: &mut Criterion) {
    let batch = key_batch(65_536);
    let columns = vec!["id".to_owned(), "name".to_owned()];

    let mut group = c.benchmark_group("row_hash");
    group.throughput(Throughput::Elements(batch.row_count() as u64));
    group.bench_function("int_and_string_keys", |b| {
        b.iter(|| hash_rows(&batch, &columns).unwrap());
    });
    group.finish();
}

fn bench_bloom_build(c: &mut Criterion) {
    let batch = key_batch(50_000);
    let columns = vec!["id".to_owned()];

    let mut group = c.benchmark_group("bloom");
    group.throughput(Throughput::Elements(batch.row_count() as u64));
    group.bench_function("build_512kbit", |b| {
        b.iter_batched(
            || (),
            |()| BloomFilter::create(&batch, &columns).unwrap().unwrap(),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_hash_rows, bench_bloom_build);
criterion_main!(benches);
