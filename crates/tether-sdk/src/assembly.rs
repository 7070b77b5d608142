//! Managed assemblies: the type catalog the bridge reflects over.
//!
//! An [`Assembly`] is a named set of [`TypeDef`]s. Class types carry an
//! optional default constructor and a list of [`MethodDef`]s, each with its
//! declared parameter and return types and a type-erased [`MethodThunk`].
//! Value types carry only their [`StructLayout`] so that signatures can name
//! them.
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{Assembly, TypeBuilder};
//!
//! #[derive(Default)]
//! struct Adder;
//!
//! let mut assembly = Assembly::new("Game", "1.0.0");
//! assembly.add_type(
//!     TypeBuilder::<Adder>::new("Game.Adder")
//!         .default_constructor()
//!         .method2("Add", |_this, a: i32, b: i32| a + b)
//!         .build(),
//! );
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::convert::{Blittable, ManagedValue};
use crate::error::{ManagedError, SdkResult};
use crate::value::{StructLayout, Value, ValueType};

/// A live managed object
pub type ManagedObject = Box<dyn Any + Send>;

/// Default constructor of a class type
pub type Constructor = Arc<dyn Fn() -> SdkResult<ManagedObject> + Send + Sync>;

/// Type-erased method body.
///
/// Instance methods receive `Some(receiver)`; static methods receive `None`.
pub type MethodThunk =
    Arc<dyn Fn(Option<&mut (dyn Any + Send + 'static)>, &[Value]) -> SdkResult<Value> + Send + Sync>;

/// Symbol a shared library exports to hand its assembly to the host
pub const ASSEMBLY_INIT_SYMBOL: &str = "tether_assembly_init";

/// Symbol a shared library exports to free an assembly it created
pub const ASSEMBLY_CLEANUP_SYMBOL: &str = "tether_assembly_cleanup";

// ============================================================================
// Methods
// ============================================================================

/// A method declared on a managed type.
#[derive(Clone)]
pub struct MethodDef {
    name: String,
    is_static: bool,
    params: Vec<ValueType>,
    ret: ValueType,
    thunk: MethodThunk,
}

impl MethodDef {
    /// Declare a method from its parts
    pub fn new(
        name: impl Into<String>,
        is_static: bool,
        params: Vec<ValueType>,
        ret: ValueType,
        thunk: MethodThunk,
    ) -> Self {
        Self {
            name: name.into(),
            is_static,
            params,
            ret,
            thunk,
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the method takes no receiver
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Declared parameter types, in order
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    /// Declared return type
    pub fn return_type(&self) -> &ValueType {
        &self.ret
    }

    /// Shared handle to the method body
    pub fn thunk(&self) -> MethodThunk {
        Arc::clone(&self.thunk)
    }

    /// Exact signature match by type identity (no assignability)
    pub fn matches(&self, params: &[ValueType], ret: &ValueType) -> bool {
        self.params == params && &self.ret == ret
    }
}

impl std::fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish()
    }
}

// ============================================================================
// Types
// ============================================================================

/// What kind of type a [`TypeDef`] describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Reference type with methods and an optional default constructor
    Class,
    /// Blittable value type usable in signatures
    Value(StructLayout),
}

/// A type exported by an assembly.
#[derive(Clone)]
pub struct TypeDef {
    full_name: String,
    kind: TypeKind,
    constructor: Option<Constructor>,
    methods: Vec<MethodDef>,
}

impl TypeDef {
    /// Declare a value type for a blittable struct
    pub fn value_type<T: Blittable>() -> Self {
        Self {
            full_name: T::TYPE_NAME.to_string(),
            kind: TypeKind::Value(T::layout()),
            constructor: None,
            methods: Vec::new(),
        }
    }

    /// Full name, e.g. `Game.Player`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Name without its namespace, e.g. `Player`
    pub fn simple_name(&self) -> &str {
        self.full_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.full_name)
    }

    /// Kind of the type
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// The declared [`ValueType`], if this is a value type
    pub fn as_value_type(&self) -> Option<ValueType> {
        match &self.kind {
            TypeKind::Value(layout) => Some(ValueType::Struct(layout.clone())),
            TypeKind::Class => None,
        }
    }

    /// Default constructor, if any
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// All declared methods
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    /// Find a method by name, static-ness and exact signature
    pub fn find_method(
        &self,
        name: &str,
        is_static: bool,
        params: &[ValueType],
        ret: &ValueType,
    ) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.is_static == is_static && m.matches(params, ret))
    }
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind)
            .field("has_constructor", &self.constructor.is_some())
            .field("methods", &self.methods)
            .finish()
    }
}

// ============================================================================
// Type Builder
// ============================================================================

fn check_arity(args: &[Value], expected: usize) -> SdkResult<()> {
    if args.len() != expected {
        return Err(ManagedError::ArgumentCount {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn receiver<'r, T: Any>(
    name: &str,
    receiver: Option<&'r mut (dyn Any + Send + 'static)>,
) -> SdkResult<&'r mut T> {
    receiver
        .and_then(|r| r.downcast_mut::<T>())
        .ok_or_else(|| ManagedError::InvalidReceiver(name.to_string()))
}

/// Builder for class types backed by a Rust struct `T`.
pub struct TypeBuilder<T> {
    def: TypeDef,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! instance_method {
    ($fn_name:ident; $($arg:ident : $ty:ident = $idx:tt),*) => {
        /// Register an instance method with typed parameters.
        pub fn $fn_name<$($ty: ManagedValue,)* R: ManagedValue>(
            mut self,
            name: impl Into<String>,
            f: impl Fn(&mut T, $($ty),*) -> R + Send + Sync + 'static,
        ) -> Self {
            let name = name.into();
            let label = format!("{}.{}", self.def.full_name, name);
            let params = vec![$($ty::value_type()),*];
            let arity = params.len();
            let thunk: MethodThunk = Arc::new(
                move |recv: Option<&mut (dyn Any + Send + 'static)>, args: &[Value]| -> SdkResult<Value> {
                    check_arity(args, arity)?;
                    let this = receiver::<T>(&label, recv)?;
                    $(let $arg = $ty::from_value(&args[$idx])?;)*
                    Ok(f(this, $($arg),*).into_value())
                },
            );
            self.def
                .methods
                .push(MethodDef::new(name, false, params, R::value_type(), thunk));
            self
        }
    };
}

macro_rules! static_method {
    ($fn_name:ident; $($arg:ident : $ty:ident = $idx:tt),*) => {
        /// Register a static method with typed parameters.
        pub fn $fn_name<$($ty: ManagedValue,)* R: ManagedValue>(
            mut self,
            name: impl Into<String>,
            f: impl Fn($($ty),*) -> R + Send + Sync + 'static,
        ) -> Self {
            let name = name.into();
            let params = vec![$($ty::value_type()),*];
            let arity = params.len();
            let thunk: MethodThunk = Arc::new(
                move |_recv: Option<&mut (dyn Any + Send + 'static)>, args: &[Value]| -> SdkResult<Value> {
                    check_arity(args, arity)?;
                    $(let $arg = $ty::from_value(&args[$idx])?;)*
                    Ok(f($($arg),*).into_value())
                },
            );
            self.def
                .methods
                .push(MethodDef::new(name, true, params, R::value_type(), thunk));
            self
        }
    };
}

impl<T: Any + Send> TypeBuilder<T> {
    /// Start declaring a class type under its full name
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            def: TypeDef {
                full_name: full_name.into(),
                kind: TypeKind::Class,
                constructor: None,
                methods: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Use `T::default()` as the default constructor
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(|| Ok(T::default()))
    }

    /// Use a fallible factory as the default constructor
    pub fn constructor(
        mut self,
        factory: impl Fn() -> SdkResult<T> + Send + Sync + 'static,
    ) -> Self {
        self.def.constructor = Some(Arc::new(move || {
            factory().map(|obj| Box::new(obj) as ManagedObject)
        }));
        self
    }

    /// Register a method from an already type-erased definition
    pub fn raw_method(mut self, method: MethodDef) -> Self {
        self.def.methods.push(method);
        self
    }

    instance_method!(method0;);
    instance_method!(method1; a: A = 0);
    instance_method!(method2; a: A = 0, b: B = 1);
    instance_method!(method3; a: A = 0, b: B = 1, c: C = 2);

    static_method!(static0;);
    static_method!(static1; a: A = 0);
    static_method!(static2; a: A = 0, b: B = 1);
    static_method!(static3; a: A = 0, b: B = 1, c: C = 2);

    /// Finish the declaration
    pub fn build(self) -> TypeDef {
        self.def
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// A named, versioned set of managed types.
#[derive(Debug, Clone)]
pub struct Assembly {
    name: String,
    version: String,
    types: Vec<TypeDef>,
    by_name: FxHashMap<String, usize>,
}

impl Assembly {
    /// Create an empty assembly
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            types: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Add a type. A later type with the same full name replaces the earlier one.
    pub fn add_type(&mut self, def: TypeDef) -> &mut Self {
        match self.by_name.get(&def.full_name) {
            Some(&idx) => self.types[idx] = def,
            None => {
                self.by_name.insert(def.full_name.clone(), self.types.len());
                self.types.push(def);
            }
        }
        self
    }

    /// Add a blittable value type
    pub fn add_value_type<T: Blittable>(&mut self) -> &mut Self {
        self.add_type(TypeDef::value_type::<T>())
    }

    /// Assembly name (the module name in assembly-qualified type names)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assembly version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a type by full name
    pub fn get_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.by_name.get(full_name).map(|&idx| &self.types[idx])
    }

    /// Look up a type by full name, falling back to the first type whose
    /// simple name matches
    pub fn find_type(&self, name: &str) -> Option<&TypeDef> {
        self.get_type(name)
            .or_else(|| self.types.iter().find(|t| t.simple_name() == name))
    }

    /// All exported types, in declaration order
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// Number of exported types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// Export an assembly factory from a shared library.
///
/// Generates `tether_assembly_init`, which the host calls after opening the
/// library, and `tether_assembly_cleanup`.
///
/// ```ignore
/// fn build() -> tether_sdk::Assembly { /* ... */ }
/// tether_sdk::declare_assembly!(build);
/// ```
#[macro_export]
macro_rules! declare_assembly {
    ($init:path) => {
        /// Entry point called by the host after loading this library.
        #[no_mangle]
        pub extern "C" fn tether_assembly_init() -> *mut $crate::Assembly {
            let assembly: $crate::Assembly = $init();
            Box::into_raw(Box::new(assembly))
        }

        /// Free an assembly returned by `tether_assembly_init`.
        ///
        /// # Safety
        /// The pointer must come from `tether_assembly_init` and not be used afterwards.
        #[no_mangle]
        pub unsafe extern "C" fn tether_assembly_cleanup(assembly: *mut $crate::Assembly) {
            if !assembly.is_null() {
                drop(Box::from_raw(assembly));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        count: i32,
    }

    fn counter_type() -> TypeDef {
        TypeBuilder::<Counter>::new("Test.Counter")
            .default_constructor()
            .method1("Bump", |c: &mut Counter, by: i32| {
                c.count += by;
                c.count
            })
            .static2("Mul", |a: i32, b: i32| a * b)
            .build()
    }

    #[test]
    fn test_type_builder_declares_methods() {
        let def = counter_type();
        assert_eq!(def.full_name(), "Test.Counter");
        assert_eq!(def.simple_name(), "Counter");
        assert!(def.constructor().is_some());

        let bump = def
            .find_method("Bump", false, &[ValueType::I32], &ValueType::I32)
            .unwrap();
        assert!(!bump.is_static());
        assert!(def
            .find_method("Bump", true, &[ValueType::I32], &ValueType::I32)
            .is_none());
        assert!(def
            .find_method("Bump", false, &[ValueType::F32], &ValueType::I32)
            .is_none());
    }

    #[test]
    fn test_instance_thunk_uses_receiver() {
        let def = counter_type();
        let mut obj = (def.constructor().unwrap())().unwrap();
        let bump = def
            .find_method("Bump", false, &[ValueType::I32], &ValueType::I32)
            .unwrap()
            .thunk();

        assert_eq!(bump(Some(obj.as_mut()), &[Value::I32(2)]).unwrap(), Value::I32(2));
        assert_eq!(bump(Some(obj.as_mut()), &[Value::I32(3)]).unwrap(), Value::I32(5));
        assert!(matches!(
            bump(None, &[Value::I32(1)]),
            Err(ManagedError::InvalidReceiver(_))
        ));
    }

    #[test]
    fn test_static_thunk_checks_arguments() {
        let def = counter_type();
        let mul = def
            .find_method("Mul", true, &[ValueType::I32, ValueType::I32], &ValueType::I32)
            .unwrap()
            .thunk();

        assert_eq!(mul(None, &[Value::I32(6), Value::I32(7)]).unwrap(), Value::I32(42));
        assert!(matches!(
            mul(None, &[Value::I32(6)]),
            Err(ManagedError::ArgumentCount { expected: 2, got: 1 })
        ));
        assert!(matches!(
            mul(None, &[Value::I32(6), Value::Bool(true)]),
            Err(ManagedError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_assembly_lookup() {
        let mut assembly = Assembly::new("Test", "1.0.0");
        assembly.add_type(counter_type());

        assert_eq!(assembly.type_count(), 1);
        assert!(assembly.get_type("Test.Counter").is_some());
        assert!(assembly.get_type("Counter").is_none());
        assert!(assembly.find_type("Counter").is_some());
        assert!(assembly.find_type("Missing").is_none());
    }
}
