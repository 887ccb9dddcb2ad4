extern crate weavescope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use weavescope::{
    classfile::builder::ClassBuilder,
    project::{MemorySource, Weaver},
    weaver::{self, TypeIndex, WeaverConfig, COMPONENT, PACKED_MARKER, POOLED_MARKER},
    ClassFile,
};

fn packed_unit(name: &str) -> Vec<u8> {
    let mut builder = ClassBuilder::new(name)
        .super_class(COMPONENT)
        .annotation(PACKED_MARKER, false)
        .default_constructor();
    for (i, descriptor) in ["F", "F", "F", "D", "I", "Z", "J", "S"].iter().enumerate() {
        let field = format!("f{i}");
        builder = builder
            .field(&field, descriptor)
            .getter(&format!("get{i}"), &field, descriptor)
            .setter(&format!("set{i}"), &field, descriptor);
    }
    builder.to_bytes().unwrap()
}

fn pooled_unit(name: &str) -> Vec<u8> {
    ClassBuilder::new(name)
        .super_class(COMPONENT)
        .annotation(POOLED_MARKER, false)
        .field("hp", "I")
        .field("speed", "F")
        .field("target", "Ljava/lang/Object;")
        .default_constructor()
        .getter("getHp", "hp", "I")
        .to_bytes()
        .unwrap()
}

/// Read, weave and serialize one packed class with eight fields and accessors.
fn bench_weave_unit(c: &mut Criterion) {
    let data = packed_unit("bench/Packed");
    let unit = ClassFile::read(&data).unwrap();
    let index = TypeIndex::from_units([&unit]).unwrap();
    let config = WeaverConfig::default();

    let mut group = c.benchmark_group("weave_unit");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("read", |b| {
        b.iter(|| black_box(ClassFile::read(black_box(&data)).unwrap()));
    });
    group.bench_function("packed", |b| {
        b.iter(|| {
            let unit = ClassFile::read(black_box(&data)).unwrap();
            black_box(weaver::weave(unit, &index, &config).unwrap())
        });
    });
    group.finish();
}

/// Weave a set of 512 classes through the coordinator.
fn bench_weave_set(c: &mut Criterion) {
    let units: Vec<(String, Vec<u8>)> = (0..512)
        .map(|i| {
            let name = format!("bench/C{i}");
            let data = if i % 2 == 0 {
                packed_unit(&name)
            } else {
                pooled_unit(&name)
            };
            (name, data)
        })
        .collect();
    let weaver = Weaver::new(WeaverConfig::default().with_write_output(false));

    let mut group = c.benchmark_group("weave_set");
    group.throughput(Throughput::Elements(units.len() as u64));
    group.sample_size(20);
    group.bench_function("512_units", |b| {
        b.iter(|| {
            let source = MemorySource::new();
            for (name, data) in &units {
                source.insert(name.clone(), data.clone());
            }
            black_box(weaver.run(&source).unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_weave_unit, bench_weave_set);
criterion_main!(benches);
