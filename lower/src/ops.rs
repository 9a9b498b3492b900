//! Constructors for the abstract `mma` dialect operations.

use std::sync::Arc;

use tessel_ir::{Context, OpBuilder, Operation, Type, Value};

/// `mma.load_matrix`: load a fragment from `src[i, j]` with the given
/// leading dimension.
pub fn load_matrix(ctx: &Context, src: Value, i: Value, j: Value, lead_dimension: i64, result: Type) -> Arc<Operation> {
    OpBuilder::new("mma.load_matrix")
        .operands([src, i, j])
        .attr("lead_dimension", ctx.int_attr(lead_dimension))
        .result(result)
        .build()
}

/// `mma.store_matrix`: store a fragment to `dst[i, j]`.
pub fn store_matrix(ctx: &Context, value: Value, dst: Value, i: Value, j: Value, lead_dimension: i64) -> Arc<Operation> {
    OpBuilder::new("mma.store_matrix")
        .operands([value, dst, i, j])
        .attr("lead_dimension", ctx.int_attr(lead_dimension))
        .build()
}

/// `mma.compute`: `acc = a * b + acc` over fragments.
pub fn compute(a: Value, b: Value, acc: Value) -> Arc<Operation> {
    let result = acc.ty();
    OpBuilder::new("mma.compute").operands([a, b, acc]).result(result).build()
}

/// `mma.constant_matrix`: broadcast a scalar into every fragment element.
pub fn constant_matrix(scalar: Value, result: Type) -> Arc<Operation> {
    OpBuilder::new("mma.constant_matrix").operand(scalar).result(result).build()
}
