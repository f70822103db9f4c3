//! Front-end throughput benchmarks.
//!
//! These benchmarks measure lexing, reading, and full parsing of WAT
//! sources of increasing size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use watparse::wat::{sexpr, Lexer, DEFAULT_MAX_DEPTH};

const KITCHEN_SINK: &str = include_str!("../tests/modules/kitchen_sink.wat");

/// A module with `funcs` copies of a small function mixing flat and folded
/// instructions.
fn synthetic_module(funcs: usize) -> String {
    let mut source = String::from("(module\n  (memory 1)\n");
    for i in 0..funcs {
        source.push_str(&format!(
            "  (func $f{i} (export \"f{i}\") (param $n i32) (result i32) (local $acc i32)\n\
             \x20   block $done\n\
             \x20     loop $top\n\
             \x20       (br_if $done (i32.eqz (local.get $n)))\n\
             \x20       (local.set $acc (i32.add (local.get $acc) (i32.load offset=4 (local.get $n))))\n\
             \x20       (local.set $n (i32.sub (local.get $n) (i32.const 1)))\n\
             \x20       br $top\n\
             \x20     end\n\
             \x20   end\n\
             \x20   local.get $acc)\n",
            i = i
        ));
    }
    source.push_str(")\n");
    source
}

/// Verify the inputs are well-formed before measuring them
fn verify_sources(sources: &[(usize, String)]) {
    assert!(watparse::parse(KITCHEN_SINK).unwrap().is_clean());
    for (funcs, source) in sources {
        let parse = watparse::parse(source).unwrap();
        assert!(parse.is_clean(), "synthetic module with {} funcs has errors", funcs);
    }
}

fn bench_front_end(c: &mut Criterion) {
    let sources: Vec<_> = [10, 100, 1000].iter().map(|&n| (n, synthetic_module(n))).collect();
    verify_sources(&sources);

    let mut group = c.benchmark_group("lex");
    for (funcs, source) in &sources {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("synthetic", funcs), source, |b, source| {
            b.iter(|| Lexer::new(black_box(source)).count())
        });
    }
    group.finish();

    let mut group = c.benchmark_group("read");
    for (funcs, source) in &sources {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("synthetic", funcs), source, |b, source| {
            b.iter(|| sexpr::read(black_box(source), DEFAULT_MAX_DEPTH))
        });
    }
    group.finish();

    let mut group = c.benchmark_group("parse");
    group.bench_function("kitchen_sink", |b| b.iter(|| watparse::parse(black_box(KITCHEN_SINK))));
    for (funcs, source) in &sources {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("synthetic", funcs), source, |b, source| {
            b.iter(|| watparse::parse(black_box(source)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_front_end);
criterion_main!(benches);
