use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use ngxgen_config::{generate, lint, parse, tokenize, validate};
use ngxgen_core::config::presets;

fn bench_engine(c: &mut Criterion) {
    let config = presets::wordpress();
    let source = generate(&config).text;

    c.bench_function("tokenize", |b| {
        b.iter(|| black_box(tokenize(black_box(&source))))
    });

    c.bench_function("parse", |b| {
        b.iter(|| black_box(parse(black_box(&source))))
    });

    c.bench_function("generate", |b| {
        b.iter(|| black_box(generate(black_box(&config))))
    });

    c.bench_function("validate", |b| {
        b.iter(|| black_box(validate(black_box(&config))))
    });

    c.bench_function("lint", |b| b.iter(|| black_box(lint(black_box(&config)))));
}

criterion_group!(engine, bench_engine);
criterion_main!(engine);
