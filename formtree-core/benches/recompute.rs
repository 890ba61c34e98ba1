//! Benchmarks for root-ward recomputation.
//!
//! Run with: `cargo bench --package formtree-core --bench recompute`
//!
//! Measures the cost of one field mutation (change rollup) and one validity
//! update (error replication) as the form tree gets deeper.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use formtree_core::{EngineConfig, FieldId, FieldOptions, FormEngine, LoadingGate, MapScope};
use std::hint::black_box;

/// A chain of `depth` nested forms with one tracked field in the innermost.
fn nested_engine(depth: usize) -> (FormEngine, FieldId) {
    let mut engine =
        FormEngine::with_gate(MapScope::new(), EngineConfig::default(), LoadingGate::new());
    let mut parent = None;
    for level in 0..depth {
        let form = engine
            .register_form(&format!("level{level}"), parent)
            .expect("register form");
        parent = Some(form);
    }
    let innermost = parent.expect("at least one form");
    let field = engine
        .bind_field(innermost, "x", FieldOptions::new().label("X").initial(0))
        .expect("bind field");
    engine.tick();
    (engine, field)
}

fn bench_change_rollup(c: &mut Criterion) {
    let mut group = c.benchmark_group("change_rollup");
    for depth in [1, 4, 16, 64] {
        let (mut engine, field) = nested_engine(depth);
        let mut next = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                next = (next + 1) % 2;
                engine
                    .set_field_value(black_box(field), next)
                    .expect("set value");
            })
        });
    }
    group.finish();
}

fn bench_error_replication(c: &mut Criterion) {
    let mut group = c.benchmark_group("error_replication");
    for depth in [1, 4, 16, 64] {
        let (mut engine, field) = nested_engine(depth);
        let mut active = false;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                active = !active;
                engine
                    .set_validity(black_box(field), [("required", active), ("minlength", active)])
                    .expect("set validity");
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_change_rollup, bench_error_replication);
criterion_main!(benches);
