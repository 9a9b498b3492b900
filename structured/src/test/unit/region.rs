use std::collections::HashMap;

use tessel_ir::{AffineMap, ConstValue, ConstructionError, Context, DType};

use super::matmul_descriptor;
use crate::descriptor::{Assignment, IteratorType, OperandDef, OperandRole, ScalarExpr, StructuredOpDescriptor};
use crate::generate::generate;
use crate::region::{ScalarFnRegistry, TypeBindings};

/// `O = add(cast(T, const(42)), cast(T, index(1)))` over a 2-d space.
fn cast_and_index_descriptor() -> StructuredOpDescriptor {
    StructuredOpDescriptor::builder()
        .name("fill_indexed")
        .class_name("FillIndexedOp")
        .operands(vec![OperandDef::builder().name("O").role(OperandRole::Output).element_type_var("T").build()])
        .indexing_maps(vec![AffineMap::identity(2)])
        .iterator_types(vec![IteratorType::Parallel, IteratorType::Parallel])
        .assignments(vec![Assignment::new(
            "O",
            ScalarExpr::apply(
                "add",
                [
                    ScalarExpr::cast_signed("T", ScalarExpr::constant(ConstValue::Int(42))),
                    ScalarExpr::cast_signed("T", ScalarExpr::index(1)),
                ],
            ),
        )])
        .build()
}

#[test]
fn test_region_builder_determinism() {
    let ctx = Context::new();
    let registry = ScalarFnRegistry::standard();
    let generated = generate(cast_and_index_descriptor(), &registry).unwrap();

    let bindings: TypeBindings = HashMap::from([("T".to_string(), DType::Int32)]);
    let block = generated.build_region(&ctx, &bindings, &registry).unwrap();

    // One block argument per operand, whatever its element count.
    assert_eq!(block.num_args(), 1);
    assert_eq!(block.arg(0).ty(), ctx.scalar_type(DType::Int32));

    // Fixed post-order: the constant, its cast, the index, its cast, the
    // combining add, then the terminator.
    let names: Vec<&str> = block.operations.iter().map(|op| op.name().as_str()).collect();
    assert_eq!(
        names,
        vec!["arith.const", "arith.cast_signed", "structured.index", "arith.cast_signed", "arith.add", "structured.yield"]
    );

    assert_eq!(block.operations[0].int_attr("value"), Some(42));
    assert_eq!(block.operations[2].int_attr("dim"), Some(1));

    // Casts convert to the bound target element type.
    let i32_ty = ctx.scalar_type(DType::Int32);
    assert_eq!(block.operations[1].result_types(), &[i32_ty.clone()]);
    assert_eq!(block.operations[3].result_types(), &[i32_ty.clone()]);

    // The yield carries exactly one value per output operand: here, the add.
    let yield_op = block.operations.last().unwrap();
    assert_eq!(yield_op.num_operands(), 1);
    assert_eq!(yield_op.operand(0).defining_op().unwrap().name().as_str(), "arith.add");
}

#[test]
fn test_region_builder_resolves_arguments_in_declaration_order() {
    let ctx = Context::new();
    let registry = ScalarFnRegistry::standard();
    let generated = generate(matmul_descriptor(), &registry).unwrap();

    let bindings: TypeBindings = HashMap::from([
        ("T1".to_string(), DType::Float16),
        ("T2".to_string(), DType::Float16),
        ("U".to_string(), DType::Float32),
    ]);
    let block = generated.build_region(&ctx, &bindings, &registry).unwrap();

    // Inputs then outputs, declaration order: A, B, C.
    assert_eq!(block.num_args(), 3);
    assert_eq!(block.arg(0).ty(), ctx.scalar_type(DType::Float16));
    assert_eq!(block.arg(2).ty(), ctx.scalar_type(DType::Float32));

    // C = add(C, mul(cast(A), cast(B))): post-order puts the argument
    // reference C first in the add's operand list.
    let names: Vec<&str> = block.operations.iter().map(|op| op.name().as_str()).collect();
    assert_eq!(
        names,
        vec!["arith.cast_signed", "arith.cast_signed", "arith.mul", "arith.add", "structured.yield"]
    );

    let add = &block.operations[3];
    assert_eq!(add.operand(0), &block.arg(2), "first add operand is the C block argument");
}

#[test]
fn test_region_builder_requires_type_bindings() {
    let ctx = Context::new();
    let registry = ScalarFnRegistry::standard();
    let generated = generate(cast_and_index_descriptor(), &registry).unwrap();

    let err = generated.build_region(&ctx, &HashMap::new(), &registry).unwrap_err();
    assert!(matches!(&err, ConstructionError::MissingTypeBinding { var } if var == "T"), "{err}");
}

#[test]
fn test_custom_scalar_function_is_data_not_code() {
    use std::sync::Arc;
    use tessel_ir::OpBuilder;

    let ctx = Context::new();
    let mut registry = ScalarFnRegistry::standard();
    registry.register(
        "clamp01",
        Arc::new(|_ctx: &Context, builder: &mut tessel_ir::BlockBuilder, args: &[tessel_ir::Value]| {
            let result = args[0].ty();
            builder
                .insert(OpBuilder::new("arith.clamp01").operands(args.iter().cloned()).result(result).build())
                .result(0)
        }),
    );

    let descriptor = StructuredOpDescriptor::builder()
        .name("saturate")
        .class_name("SaturateOp")
        .operands(vec![
            OperandDef::builder().name("I").role(OperandRole::Input).element_type_var("T").build(),
            OperandDef::builder().name("O").role(OperandRole::Output).element_type_var("T").build(),
        ])
        .indexing_maps(vec![AffineMap::identity(1), AffineMap::identity(1)])
        .iterator_types(vec![IteratorType::Parallel])
        .assignments(vec![Assignment::new("O", ScalarExpr::apply("clamp01", [ScalarExpr::arg("I")]))])
        .build();

    let generated = generate(descriptor, &registry).unwrap();
    let bindings: TypeBindings = HashMap::from([("T".to_string(), DType::Float32)]);
    let block = generated.build_region(&ctx, &bindings, &registry).unwrap();

    let names: Vec<&str> = block.operations.iter().map(|op| op.name().as_str()).collect();
    assert_eq!(names, vec!["arith.clamp01", "structured.yield"]);
}
