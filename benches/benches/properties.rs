// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_properties`: path access, visitation and copies.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::collections::HashMap;

use understory_properties::{
    Adapters, PropertyContainer, PropertyPath, PropertyVisitor, Reflect, TypeDescriptor,
    TypeTraits, Typed, VisitContext, VisitStatus,
};

#[derive(Clone, Default)]
struct Transform {
    x: f32,
    y: f32,
    scale: f64,
}

impl Typed for Transform {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("X", |t| &t.x, |t| &mut t.x)
                .field("Y", |t| &t.y, |t| &mut t.y)
                .field("Scale", |t| &t.scale, |t| &mut t.scale),
        )
    }
}

#[derive(Clone, Default)]
struct Entity {
    name: String,
    transform: Transform,
    tags: Vec<String>,
    stats: HashMap<String, i32>,
}

impl Typed for Entity {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Name", |e| &e.name, |e| &mut e.name)
                .field("Transform", |e| &e.transform, |e| &mut e.transform)
                .field("Tags", |e| &e.tags, |e| &mut e.tags)
                .field("Stats", |e| &e.stats, |e| &mut e.stats),
        )
    }
}

#[derive(Clone, Default)]
struct World {
    entities: Vec<Entity>,
}

impl Typed for World {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(TypeDescriptor::<Self>::new().field("Entities", |w| &w.entities, |w| &mut w.entities))
    }
}

fn world(len: usize) -> World {
    World {
        entities: (0..len)
            .map(|i| Entity {
                name: format!("entity-{i}"),
                transform: Transform {
                    x: i as f32,
                    y: 1.0,
                    scale: 1.0,
                },
                tags: vec!["a".into(), "b".into()],
                stats: HashMap::from([("hp".into(), 10), ("mp".into(), 5)]),
            })
            .collect(),
    }
}

#[derive(Default)]
struct CountLeaves(usize);

impl PropertyVisitor for CountLeaves {
    fn visit_leaf(&mut self, _cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) {
        self.0 += 1;
    }
}

struct WithAdapters(Adapters);

impl PropertyVisitor for WithAdapters {
    fn adapters(&self) -> Option<&Adapters> {
        Some(&self.0)
    }
}

fn bench_paths(c: &mut Criterion) {
    let container = PropertyContainer::new();
    let mut world = world(64);
    let deep = PropertyPath::parse("Entities[32].Transform.Scale").unwrap();
    let keyed = PropertyPath::parse("Entities[5].Stats[\"hp\"]").unwrap();

    let mut group = c.benchmark_group("properties/path");

    group.bench_function("parse", |b| {
        b.iter(|| black_box(PropertyPath::parse(black_box("Entities[32].Transform.Scale"))))
    });

    group.bench_function("get/same_type", |b| {
        b.iter(|| black_box(container.get_value_at_path::<f64>(&world, &deep)))
    });

    group.bench_function("get/converted", |b| {
        b.iter(|| black_box(container.get_value_at_path::<String>(&world, &deep)))
    });

    group.bench_function("get/keyed", |b| {
        b.iter(|| black_box(container.get_value_at_path::<i64>(&world, &keyed)))
    });

    group.bench_function("set/converted", |b| {
        b.iter(|| black_box(container.set_value_at_path(&mut world, &deep, 2_i32)))
    });

    group.bench_function("is_valid", |b| {
        b.iter(|| black_box(container.is_path_valid(&world, &deep)))
    });

    group.finish();
}

fn bench_visit(c: &mut Criterion) {
    let container = PropertyContainer::new();
    let mut group = c.benchmark_group("properties/visit");

    for len in [16_usize, 256] {
        let mut world = world(len);
        group.bench_function(BenchmarkId::new("leaves", len), |b| {
            b.iter(|| {
                let mut visitor = CountLeaves::default();
                let _ = container.accept(&mut visitor, &mut world);
                black_box(visitor.0)
            })
        });

        let mut adapters = Adapters::new();
        adapters.add_fn::<f32>(|cx, value| {
            *value += 1.0;
            cx.mark_changed();
            VisitStatus::Override
        });
        let mut visitor = WithAdapters(adapters);
        group.bench_function(BenchmarkId::new("adapters", len), |b| {
            b.iter(|| black_box(container.accept(&mut visitor, &mut world)))
        });
    }

    group.finish();
}

fn bench_copy(c: &mut Criterion) {
    let container = PropertyContainer::new();
    let source = world(64);
    let mut group = c.benchmark_group("properties/copy");

    group.bench_function("construct/empty", |b| {
        b.iter_batched(
            World::default,
            |mut dst| {
                let _ = container.construct(&mut dst, &source);
                black_box(dst)
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("transfer/populated", |b| {
        b.iter_batched(
            || world(64),
            |mut dst| {
                let _ = container.transfer(&mut dst, &source);
                black_box(dst)
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_paths, bench_visit, bench_copy);
criterion_main!(benches);
