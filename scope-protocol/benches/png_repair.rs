use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use scope_protocol::{BlockHeader, png};

fn chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    out.extend_from_slice(&0u32.to_be_bytes());
}

/// Roughly the size of a compressed 800x480 screenshot, split like an encoder would.
fn screenshot() -> Vec<u8> {
    let mut out = png::SIGNATURE.to_vec();
    chunk(&mut out, b"IHDR", &[0, 0, 3, 32, 0, 0, 1, 224, 8, 2, 0, 0, 0]);
    for _ in 0..16 {
        chunk(&mut out, b"IDAT", &[0x5A; 8192]);
    }
    chunk(&mut out, b"IEND", &[]);
    out
}

fn bench_repair(c: &mut Criterion) {
    let image = screenshot();
    let mut group = c.benchmark_group("png");
    group.throughput(Throughput::Bytes(image.len() as u64));
    group.bench_function("repair", |b| {
        b.iter(|| png::repair(black_box(&image)).unwrap())
    });
    group.finish();
}

fn bench_header(c: &mut Criterion) {
    c.bench_function("block_header_parse", |b| {
        b.iter(|| BlockHeader::parse(black_box(b"#900001152054\x89PNG")).unwrap())
    });
}

criterion_group!(benches, bench_repair, bench_header);
criterion_main!(benches);
