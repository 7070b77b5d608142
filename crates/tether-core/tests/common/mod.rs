//! Shared fixtures for bridge integration tests

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use tether_core::{Bridge, BridgeOptions, LayoutCheck};
use tether_sdk::{
    managed_struct, Assembly, Blittable, ManagedError, MethodDef, MethodThunk, SdkResult,
    TypeBuilder, Value, ValueType,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

unsafe impl Blittable for Vector3 {
    const TYPE_NAME: &'static str = "Game.Vector3";
}
managed_struct!(Vector3);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vector3,
    pub rotation: Vector3,
    pub scale: Vector3,
}

unsafe impl Blittable for Transform {
    const TYPE_NAME: &'static str = "Game.Transform";
}
managed_struct!(Transform);

#[derive(Default)]
pub struct Adder;

#[derive(Default)]
pub struct Player {
    pub position: Vector3,
    pub health: i32,
    pub elapsed: f32,
}

#[derive(Default)]
pub struct Faulty;

fn lying_thunk() -> MethodThunk {
    Arc::new(
        |_recv: Option<&mut (dyn Any + Send + 'static)>, _args: &[Value]| -> SdkResult<Value> {
            Ok(Value::F32(1.0))
        },
    )
}

fn throwing_thunk() -> MethodThunk {
    Arc::new(
        |_recv: Option<&mut (dyn Any + Send + 'static)>, _args: &[Value]| -> SdkResult<Value> {
            Err(ManagedError::Exception("InvalidOperationException".to_string()))
        },
    )
}

/// Assembly `Game` exporting the types the tests exercise
pub fn game_assembly() -> Assembly {
    let mut game = Assembly::new("Game", "1.0.0");
    game.add_value_type::<Vector3>();
    game.add_value_type::<Transform>();

    game.add_type(
        TypeBuilder::<Adder>::new("Game.Adder")
            .default_constructor()
            .method2("Add", |_this: &mut Adder, a: i32, b: i32| a + b)
            .build(),
    );

    game.add_type(
        TypeBuilder::<Player>::new("Game.Player")
            .constructor(|| {
                Ok(Player {
                    health: 100,
                    ..Default::default()
                })
            })
            .method1("Update", |p: &mut Player, dt: f32| p.elapsed += dt)
            .method0("Elapsed", |p: &mut Player| p.elapsed)
            .method0("Position", |p: &mut Player| p.position)
            .method1("SetPosition", |p: &mut Player, v: Vector3| p.position = v)
            .method1("Damage", |p: &mut Player, amount: i32| {
                p.health -= amount;
                p.health > 0
            })
            .method0("Health", |p: &mut Player| p.health)
            .build(),
    );

    game.add_type(
        TypeBuilder::<Adder>::new("Game.MathUtil")
            .static2("Sum", |a: i32, b: i32| a + b)
            .static2("Scale", |v: Vector3, k: f32| Vector3 {
                x: v.x * k,
                y: v.y * k,
                z: v.z * k,
            })
            .static1("Translate", |t: Transform| Transform {
                position: Vector3 {
                    x: t.position.x + 1.0,
                    ..t.position
                },
                ..t
            })
            .static1("Not", |b: bool| !b)
            .build(),
    );

    game.add_type(
        TypeBuilder::<Faulty>::new("Game.Faulty")
            .default_constructor()
            .method0("Boom", |_f: &mut Faulty| -> i32 { panic!("managed panic") })
            .raw_method(MethodDef::new(
                "Throw",
                false,
                vec![],
                ValueType::Void,
                throwing_thunk(),
            ))
            .raw_method(MethodDef::new(
                "Lie",
                false,
                vec![],
                ValueType::I32,
                lying_thunk(),
            ))
            .build(),
    );

    game.add_type(
        TypeBuilder::<Faulty>::new("Game.Exploding")
            .constructor(|| -> SdkResult<Faulty> { panic!("constructor panic") })
            .build(),
    );

    game
}

/// Assembly `Tools`, which also exports a `Player`
pub fn tools_assembly() -> Assembly {
    let mut tools = Assembly::new("Tools", "0.3.0");
    tools.add_type(
        TypeBuilder::<Adder>::new("Tools.Player")
            .default_constructor()
            .method2("Add", |_this: &mut Adder, a: i32, b: i32| a * b)
            .build(),
    );
    tools
}

/// Bridge with the `Game` assembly loaded
pub fn loaded_bridge() -> Bridge {
    loaded_bridge_with(LayoutCheck::Validate)
}

pub fn loaded_bridge_with(layout_check: LayoutCheck) -> Bridge {
    let mut bridge = Bridge::new(BridgeOptions {
        name: "test".to_string(),
        layout_check,
    });
    bridge.initialize(None).unwrap();
    bridge.load_assembly(game_assembly()).unwrap();
    bridge
}
