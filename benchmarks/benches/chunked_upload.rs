//! Benchmarks for chunked block uploads through the adapter

use adapter_core::AdapterConfig;
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use storage::{BlobAdapter, MemoryBlobClient, WriteOptions};

fn adapter(chunk_size: usize) -> BlobAdapter {
    let client = Arc::new(MemoryBlobClient::new());
    let config = AdapterConfig::new("bench")
        .with_prefix("uploads")
        .with_chunk_size(chunk_size);
    BlobAdapter::new(client, config).unwrap()
}

fn upload_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("upload_throughput");

    for size in [1_000_000, 10_000_000, 50_000_000].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        let data = Bytes::from(vec![0u8; *size]);
        let adapter = adapter(4 * 1024 * 1024);

        group.bench_function(format!("{}MB", size / 1_000_000), |b| {
            b.to_async(&rt).iter(|| async {
                adapter
                    .write("bench/object.bin", data.clone(), WriteOptions::private())
                    .await
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn upload_chunk_sizes(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("upload_chunk_size");
    let data = Bytes::from(vec![0u8; 8_000_000]);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk_size in [64 * 1024, 512 * 1024, 4 * 1024 * 1024].iter() {
        let adapter = adapter(*chunk_size);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}KiB", chunk_size / 1024)),
            chunk_size,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    adapter
                        .write("bench/chunked.bin", data.clone(), WriteOptions::default())
                        .await
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, upload_throughput, upload_chunk_sizes);
criterion_main!(benches);
