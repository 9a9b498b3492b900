use tessel_ir::{AffineExpr, AffineMap, Block, Context, DType, VerificationError};

use super::{matmul_descriptor, scaled_copy_descriptor};
use crate::generate::{GeneratedOp, generate};
use crate::region::ScalarFnRegistry;

fn build_scaled_copy(ctx: &Context, generated: &GeneratedOp, strides: Option<&[i64]>) -> std::sync::Arc<tessel_ir::Operation> {
    let tensor = ctx.shaped_type(&[8, 8], DType::Float32);
    let block = Block::new(vec![tensor.clone(), tensor.clone()]);
    let attrs = strides.map(|s| vec![("strides".to_string(), ctx.dense_i64_attr(s))]).unwrap_or_default();
    generated.build(ctx, vec![tensor], vec![block.arg(0)], vec![block.arg(1)], attrs).unwrap()
}

#[test]
fn test_static_maps_returned_verbatim() {
    let ctx = Context::new();
    let descriptor = matmul_descriptor();
    let declared = descriptor.indexing_maps.clone();
    let generated = generate(descriptor, &ScalarFnRegistry::standard()).unwrap();
    assert!(!generated.has_dynamic_indexing_maps());

    let tensor = ctx.shaped_type(&[4, 4], DType::Float32);
    let block = Block::new(vec![tensor.clone(), tensor.clone(), tensor.clone()]);
    let op = generated
        .build(&ctx, vec![tensor], vec![block.arg(0), block.arg(1)], vec![block.arg(2)], vec![])
        .unwrap();

    let maps = generated.indexing_maps(&op).unwrap();
    assert_eq!(maps, declared, "static maps come back verbatim");
}

#[test]
fn test_dynamic_maps_substitute_attribute_values() {
    let ctx = Context::new();
    let generated = generate(scaled_copy_descriptor(), &ScalarFnRegistry::standard()).unwrap();
    assert!(generated.has_dynamic_indexing_maps());

    let op = build_scaled_copy(&ctx, &generated, Some(&[2, 3]));
    let maps = generated.indexing_maps(&op).unwrap();

    // (d0, d1)[s0, s1, s2, s3] -> (d1 * s2, d0 * s3) with strides = [2, 3]
    // becomes (d0, d1) -> (d1 * 2, d0 * 3); the output map is untouched.
    let d = AffineExpr::dim;
    let expected_input = AffineMap::new(2, 0, vec![d(1) * AffineExpr::constant(2), d(0) * AffineExpr::constant(3)]);
    let expected_output = AffineMap::new(2, 0, vec![d(0), d(1)]);
    assert_eq!(maps, vec![expected_input, expected_output]);
}

#[test]
fn test_missing_index_attribute_fails_verification() {
    let ctx = Context::new();
    let generated = generate(scaled_copy_descriptor(), &ScalarFnRegistry::standard()).unwrap();

    let bad = build_scaled_copy(&ctx, &generated, None);
    let err = generated.verify(&ctx, &bad).unwrap_err();
    assert!(
        matches!(&err, VerificationError::MissingIndexAttribute { attr_name, .. } if attr_name == "strides"),
        "{err}"
    );
    // The failure names the attribute and went through the diagnostic
    // channel instead of aborting anything.
    assert!(err.to_string().contains("strides"));
    assert_eq!(ctx.diagnostics().len(), 1);

    // A sibling, correctly-formed instance of the same operation type
    // still verifies.
    let good = build_scaled_copy(&ctx, &generated, Some(&[2, 3]));
    generated.verify(&ctx, &good).unwrap();

    // Dynamic map access performs the same check.
    let err = generated.indexing_maps(&bad).unwrap_err();
    assert!(matches!(err, VerificationError::MissingIndexAttribute { .. }));
}

#[test]
fn test_misshapen_index_attribute_fails_verification() {
    let ctx = Context::new();
    let generated = generate(scaled_copy_descriptor(), &ScalarFnRegistry::standard()).unwrap();

    let bad = build_scaled_copy(&ctx, &generated, Some(&[2, 3, 4]));
    let err = generated.verify(&ctx, &bad).unwrap_err();
    assert!(
        matches!(
            &err,
            VerificationError::MisshapenIndexAttribute { attr_name, expected: 2, got: 3, .. }
                if attr_name == "strides"
        ),
        "{err}"
    );
}
