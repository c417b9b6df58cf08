use criterion::{black_box, criterion_group, criterion_main, Criterion};
use minicand::codec::{float16_to32, float32_to16};
use minicand::record::{Point, PolarLorentzVector, TrackAtVertex};
use minicand::{Candidate, PackedCandidate};

fn codec_performance(c: &mut Criterion) {
    c.bench_function("minifloat_encode", |b| b.iter(|| float32_to16(black_box(10.37f32))));
    c.bench_function("minifloat_decode", |b| b.iter(|| float16_to32(black_box(0x4930u16))));
}

fn unpack_performance(c: &mut Criterion) {
    let p4 = PolarLorentzVector::new(10.0, 1.0, 0.3, 0.13957);
    let cand = PackedCandidate::new(
        &p4,
        &Point::new(0.01, 0.02, 0.5),
        &TrackAtVertex::from_p4(&p4),
        211,
        None,
    );
    let fields = *cand.fields();

    c.bench_function("cold_unpack_p4_vertex", |b| {
        b.iter(|| {
            let cand = PackedCandidate::from_packed(black_box(fields), None);
            cand.vz() + cand.pt()
        })
    });

    c.bench_function("warm_p4_access", |b| b.iter(|| black_box(&cand).pt()));
}

criterion_group!(benches, codec_performance, unpack_performance);
criterion_main!(benches);
