use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;
use taxgraph_engine::{
    context::FilingStatus, definition::NodeDefinition, identity::InstanceId, identity::Owner,
    input_event::InputEvent, registry::RegistryBuilder, session::Session, status::Source,
    value::Value, value::ValueType, SessionContext,
};

fn id(s: &str) -> InstanceId {
    InstanceId::new(s).unwrap()
}

/// A synthetic registry of `width` independent input chains, each
/// `depth` COMPUTED nodes deep, standing in for a form's worth of
/// worksheet lines.
fn synthetic_registry(width: usize, depth: usize) -> Arc<taxgraph_engine::Registry> {
    let mut builder = RegistryBuilder::new();
    for w in 0..width {
        builder.register(vec![NodeDefinition::input(
            id(&format!("bench.primary.chain{w}.line0")),
            ValueType::Currency {
                allow_negative: false,
            },
            Owner::Primary,
        )]);
        for d in 1..=depth {
            let this_id = id(&format!("bench.primary.chain{w}.line{d}"));
            let dep_id = id(&format!("bench.primary.chain{w}.line{}", d - 1));
            builder.register(vec![NodeDefinition::computed(
                this_id,
                ValueType::Currency {
                    allow_negative: false,
                },
                Owner::Primary,
                vec![dep_id.clone()],
                Box::new(move |ctx| {
                    Ok(Value::Currency(
                        Value::safe_num(ctx.get(&dep_id)) + dec!(1.00),
                    ))
                }),
            )]);
        }
    }
    Arc::new(builder.build().expect("synthetic registry is acyclic by construction"))
}

fn bench_initialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("initialize_session");
    for &(width, depth) in &[(4usize, 8usize), (16, 16), (64, 8)] {
        let registry = synthetic_registry(width, depth);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{depth}")),
            &registry,
            |b, registry| {
                b.iter(|| {
                    let context =
                        SessionContext::new("2025", FilingStatus::Single, false, "bench");
                    black_box(Session::initialize(registry.clone(), context).unwrap());
                });
            },
        );
    }
    group.finish();
}

fn bench_single_event_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_single_event");
    for &(width, depth) in &[(4usize, 8usize), (16, 16), (64, 8)] {
        let registry = synthetic_registry(width, depth);
        let context = SessionContext::new("2025", FilingStatus::Single, false, "bench");
        let session = Session::initialize(registry, context).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{depth}")),
            &session,
            |b, _| {
                b.iter_batched(
                    || session.snapshot().clone(),
                    |_snapshot| {
                        let mut fresh = Session::initialize(
                            session.registry().clone(),
                            session.context().clone(),
                        )
                        .unwrap();
                        let event = InputEvent::new(
                            id("bench.primary.chain0.line0"),
                            Some(Value::Currency(dec!(42.00))),
                            Source::Preparer,
                            "2025-04-01T00:00:00Z".parse().unwrap(),
                        );
                        black_box(fresh.process(&event));
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_initialize, bench_single_event_process);
criterion_main!(benches);
