use std::ffi::c_void;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_core::{Bridge, BridgeOptions, LayoutCheck};
use tether_sdk::{Assembly, TypeBuilder, Value};

#[derive(Default)]
struct Adder;

fn bridge(layout_check: LayoutCheck) -> (Bridge, i32) {
    let mut assembly = Assembly::new("Bench", "1.0.0");
    assembly.add_type(
        TypeBuilder::<Adder>::new("Bench.Adder")
            .default_constructor()
            .method2("Add", |_this: &mut Adder, a: i32, b: i32| a.wrapping_add(b))
            .build(),
    );

    let mut bridge = Bridge::new(BridgeOptions {
        name: "bench".to_string(),
        layout_check,
    });
    bridge.initialize(None).unwrap();
    bridge.load_assembly(assembly).unwrap();
    bridge.register_signature(10, "int", &["int", "int"]).unwrap();
    let adder = bridge.create_instance("Adder").unwrap();
    let add = bridge.bind_instance_method(adder, "Add", 10).unwrap();
    (bridge, add)
}

fn bench_invoke_raw(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke_raw");

    for (label, check) in [("validate", LayoutCheck::Validate), ("trust", LayoutCheck::Trust)] {
        let (mut bridge, add) = bridge(check);
        group.bench_with_input(BenchmarkId::new("add", label), &add, |b, &add| {
            let (x, y) = (2i32, 3i32);
            let args = [
                &x as *const i32 as *const c_void,
                &y as *const i32 as *const c_void,
            ];
            let mut ret = 0i32;
            b.iter(|| unsafe {
                bridge
                    .invoke_raw(
                        black_box(add),
                        args.as_ptr(),
                        2,
                        &mut ret as *mut i32 as *mut c_void,
                    )
                    .unwrap();
                black_box(ret)
            });
        });
    }

    group.finish();
}

fn bench_invoke_owned(c: &mut Criterion) {
    let (mut bridge, add) = bridge(LayoutCheck::Validate);
    let args = [Value::I32(2), Value::I32(3)];

    c.bench_function("invoke_owned_add", |b| {
        b.iter(|| bridge.invoke(black_box(add), black_box(&args)).unwrap());
    });
}

fn bench_bind_cached(c: &mut Criterion) {
    let (mut bridge, _) = bridge(LayoutCheck::Validate);

    c.bench_function("bind_cached", |b| {
        b.iter(|| bridge.bind_instance_method(black_box(1), "Add", 10).unwrap());
    });
}

criterion_group!(benches, bench_invoke_raw, bench_invoke_owned, bench_bind_cached);
criterion_main!(benches);
