use tessel_ir::{Block, ConstructionError, Context, DType};

use super::{matmul_descriptor, scaled_copy_descriptor};
use crate::generate::generate;
use crate::region::ScalarFnRegistry;

#[test]
fn test_builder_wires_segments() {
    let ctx = Context::new();
    let generated = generate(matmul_descriptor(), &ScalarFnRegistry::standard()).unwrap();

    let f32_tensor = ctx.shaped_type(&[4, 4], DType::Float32);
    let block = Block::new(vec![f32_tensor.clone(), f32_tensor.clone(), f32_tensor.clone()]);

    let op = generated
        .build(
            &ctx,
            vec![f32_tensor.clone()],
            vec![block.arg(0), block.arg(1)],
            vec![block.arg(2)],
            vec![],
        )
        .unwrap();

    assert_eq!(op.name().as_str(), "structured.matmul");
    assert_eq!(op.int_array_attr(crate::generate::OPERAND_SEGMENT_SIZES), Some(&[2i64, 1][..]));

    // The variadic groups are recoverable generically.
    let segments = op.operand_segments().unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0], &[block.arg(0), block.arg(1)][..]);
    assert_eq!(segments[1], &[block.arg(2)][..]);
}

#[test]
fn test_builder_rejects_wrong_group_sizes() {
    let ctx = Context::new();
    let generated = generate(matmul_descriptor(), &ScalarFnRegistry::standard()).unwrap();

    let f32_tensor = ctx.shaped_type(&[4, 4], DType::Float32);
    let block = Block::new(vec![f32_tensor.clone(), f32_tensor.clone()]);

    let err = generated
        .build(&ctx, vec![f32_tensor], vec![block.arg(0)], vec![block.arg(1)], vec![])
        .unwrap_err();
    assert!(matches!(err, ConstructionError::ParameterArityMismatch { expected: 2, got: 1, .. }), "{err}");
}

#[test]
fn test_builder_attaches_index_attributes() {
    let ctx = Context::new();
    let generated = generate(scaled_copy_descriptor(), &ScalarFnRegistry::standard()).unwrap();

    let tensor = ctx.shaped_type(&[8, 8], DType::Float32);
    let block = Block::new(vec![tensor.clone(), tensor.clone()]);

    let op = generated
        .build(
            &ctx,
            vec![tensor],
            vec![block.arg(0)],
            vec![block.arg(1)],
            vec![("strides".into(), ctx.dense_i64_attr(&[2, 3]))],
        )
        .unwrap();

    assert_eq!(op.int_array_attr("strides"), Some(&[2i64, 3][..]));
    generated.verify(&ctx, &op).unwrap();
    assert!(ctx.diagnostics().is_empty());
}
