//! Second build of the sample `Scripts` assembly, where `Calc.Add` is offset
//! by 100 so a reload is observable

use tether_sdk::{declare_assembly, Assembly, TypeBuilder};

#[derive(Default)]
struct Calc;

fn build() -> Assembly {
    let mut scripts = Assembly::new("Scripts", "2.0.0");
    scripts.add_type(
        TypeBuilder::<Calc>::new("Scripts.Calc")
            .static2("Add", |a: i32, b: i32| a + b + 100)
            .build(),
    );
    scripts
}

declare_assembly!(build);
