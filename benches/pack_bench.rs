use beampack::block::{decode_records, BlockWriter};
use beampack::integrity::Validator;
use beampack::packer::{pack, FileDescriptor};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;
use std::io::Cursor;

fn fixture(dir: &std::path::Path, count: usize, size: usize) -> Vec<FileDescriptor> {
    (0..count)
        .map(|i| {
            let source = dir.join(format!("file_{i}.bin"));
            fs::write(&source, vec![(i % 251) as u8; size]).unwrap();
            FileDescriptor {
                source,
                path:  format!("file_{i}.bin"),
                size:  size as u64,
                mtime: 0,
                mode:  0o644,
            }
        })
        .collect()
}

fn bench_placement(c: &mut Criterion) {
    let descs: Vec<FileDescriptor> = (0..10_000u64)
        .map(|i| FileDescriptor {
            source: format!("f{i}").into(),
            path:   format!("f{i}"),
            size:   (i * 7919) % 65_536,
            mtime:  0,
            mode:   0o644,
        })
        .collect();

    c.bench_function("place_10k_descriptors", |b| {
        b.iter(|| pack(black_box(descs.clone()), 1 << 20).unwrap())
    });
}

fn bench_encode_decode(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let blocks = pack(fixture(dir.path(), 64, 16 * 1024), 1 << 20).unwrap();
    let writer = BlockWriter::new(32 * 1024);

    c.bench_function("encode_1mb_block", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(1 << 20);
            writer.encode(black_box(&blocks[0]), &mut out).unwrap();
            out
        })
    });

    let mut encoded = Vec::new();
    writer.encode(&blocks[0], &mut encoded).unwrap();

    c.bench_function("decode_64_records", |b| {
        b.iter(|| decode_records(&mut Cursor::new(black_box(&encoded))).unwrap())
    });

    let path = dir.path().join("block-1.beam");
    fs::write(&path, &encoded).unwrap();
    let validator = Validator::new(32 * 1024);
    c.bench_function("validate_1mb_block", |b| {
        b.iter(|| validator.validate_block(black_box(&path)).unwrap())
    });
}

criterion_group!(benches, bench_placement, bench_encode_decode);
criterion_main!(benches);
