//! Sample `Scripts` assembly, loaded by the host tests through `dlopen`
//!
//! Build with `cargo build -p tether-sample`.

use tether_sdk::{declare_assembly, Assembly, TypeBuilder};

#[derive(Default)]
struct Counter {
    count: i32,
}

#[derive(Default)]
struct Calc;

fn build() -> Assembly {
    let mut scripts = Assembly::new("Scripts", "1.0.0");
    scripts.add_type(
        TypeBuilder::<Counter>::new("Scripts.Counter")
            .default_constructor()
            .method1("Add", |c: &mut Counter, n: i32| {
                c.count += n;
                c.count
            })
            .build(),
    );
    scripts.add_type(
        TypeBuilder::<Calc>::new("Scripts.Calc")
            .static2("Add", |a: i32, b: i32| a + b)
            .build(),
    );
    scripts
}

declare_assembly!(build);
