//! Scalar function registry and primitive-op emission helpers.
//!
//! Named scalar functions are data, not code: the region body builder
//! dispatches applications through this injected mapping, so adding a
//! function is a registration, not a code change.

use std::collections::HashMap;
use std::sync::Arc;

use tessel_ir::{BlockBuilder, Context, DType, OpBuilder, Value};

/// Concrete element types bound to the descriptor's type variables for one
/// operation instance.
pub type TypeBindings = HashMap<String, DType>;

/// Emitter for one named scalar function: given already-emitted operand
/// values, append one primitive operation and return its result.
pub type ScalarFn = Arc<dyn Fn(&Context, &mut BlockBuilder, &[Value]) -> Value + Send + Sync>;

/// Injected name-to-emitter mapping.
#[derive(Clone, Default)]
pub struct ScalarFnRegistry {
    fns: HashMap<String, ScalarFn>,
}

/// Result element type of an elementwise primitive: the promoted operand
/// type, falling back to the first operand.
fn promoted_type(ctx: &Context, args: &[Value]) -> tessel_ir::Type {
    let dtypes: Vec<DType> = args.iter().filter_map(|v| v.ty().element().cloned()).collect();
    match DType::least_upper_dtype(&dtypes) {
        Some(dt) => ctx.scalar_type(dt),
        None => args[0].ty(),
    }
}

fn elementwise(name: &'static str) -> ScalarFn {
    Arc::new(move |ctx, builder, args| {
        let result = promoted_type(ctx, args);
        builder.insert(OpBuilder::new(name).operands(args.iter().cloned()).result(result).build()).result(0)
    })
}

impl ScalarFnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard arithmetic set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("add", elementwise("arith.add"));
        registry.register("sub", elementwise("arith.sub"));
        registry.register("mul", elementwise("arith.mul"));
        registry.register("div", elementwise("arith.div"));
        registry.register("max", elementwise("arith.max"));
        registry.register("min", elementwise("arith.min"));
        registry.register("exp", elementwise("arith.exp"));
        registry.register("log", elementwise("arith.log"));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, f: ScalarFn) {
        self.fns.insert(name.into(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ScalarFn> {
        self.fns.get(name)
    }
}

impl std::fmt::Debug for ScalarFnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.fns.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_tuple("ScalarFnRegistry").field(&names).finish()
    }
}
