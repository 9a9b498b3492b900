use std::sync::Arc;

use crate::context::Context;
use crate::op::{Block, OpBuilder, Operation, Value};
use crate::pattern::{MatchFailure, PatternSet, Rewrite, pattern};
use crate::rewrite::apply_patterns;
use tessel_dtype::DType;

fn const_op(ctx: &Context, value: i64) -> Arc<Operation> {
    OpBuilder::new("arith.const").attr("value", ctx.int_attr(value)).result(ctx.scalar_type(DType::Int64)).build()
}

fn const_value(op: &Arc<Operation>) -> Option<i64> {
    (op.name().as_str() == "arith.const").then(|| op.int_attr("value")).flatten()
}

/// Fold `add(const, const)` into a constant.
fn fold_add(patterns: &mut PatternSet) {
    patterns.add(pattern("arith.add", |ctx, _op, adaptor| {
        let (Some(lhs), Some(rhs)) = (adaptor[0].defining_op(), adaptor[1].defining_op()) else {
            return Err(MatchFailure::NoMatch);
        };
        let (Some(a), Some(b)) = (const_value(lhs), const_value(rhs)) else {
            return Err(MatchFailure::NoMatch);
        };
        Ok(Rewrite::with_final(vec![const_op(ctx, a + b)]))
    }));
}

#[test]
fn test_fixed_point_folding() {
    let ctx = Context::new();
    let mut patterns = PatternSet::new();
    fold_add(&mut patterns);

    // add(add(1, 2), 3): the outer add only folds after the inner one did.
    let i64_ty = ctx.scalar_type(DType::Int64);
    let one = const_op(&ctx, 1);
    let two = const_op(&ctx, 2);
    let three = const_op(&ctx, 3);
    let inner = OpBuilder::new("arith.add").operands([one.result(0), two.result(0)]).result(i64_ty.clone()).build();
    let outer =
        OpBuilder::new("arith.add").operands([inner.result(0), three.result(0)]).result(i64_ty.clone()).build();

    let mut block = Block::new(vec![]);
    for op in [one, two, three, inner, outer] {
        block.push(op);
    }

    let outcome = apply_patterns(&ctx, &mut block, &patterns);
    assert!(outcome.changed);

    // Every add is gone and a constant 6 was produced.
    assert!(block.operations.iter().all(|op| op.name().as_str() == "arith.const"));
    assert!(block.operations.iter().any(|op| op.int_attr("value") == Some(6)));
}

#[test]
fn test_not_yet_converted_retries_after_dependency_conversion() {
    let ctx = Context::new();
    let shaped = ctx.shaped_type(&[4], DType::Float32);
    let lowered = ctx.ptr_type(DType::Float32, tessel_dtype::AddrSpace::Global);

    let mut patterns = PatternSet::new();
    // Wrapper expands to a high-level producer; the producer lowers one
    // sweep later, and only then may the consumer fire.
    patterns.add(pattern("hl.wrap", {
        let shaped = shaped.clone();
        move |_ctx, _op, _adaptor| {
            Ok(Rewrite::with_final(vec![OpBuilder::new("hl.produce").result(shaped.clone()).build()]))
        }
    }));
    patterns.add(pattern("hl.produce", {
        let lowered = lowered.clone();
        move |_ctx, _op, _adaptor| {
            Ok(Rewrite::with_final(vec![OpBuilder::new("ll.produce").result(lowered.clone()).build()]))
        }
    }));
    patterns.add(pattern("hl.consume", |_ctx, _op, adaptor: &[Value]| {
        if !adaptor[0].ty().is_lowered() {
            return Err(MatchFailure::NotYetConverted { operand: 0 });
        }
        Ok(Rewrite::with_final(vec![
            OpBuilder::new("ll.consume").operand(adaptor[0].clone()).result(adaptor[0].ty()).build(),
        ]))
    }));

    let wrap = OpBuilder::new("hl.wrap").result(shaped.clone()).build();
    let consume = OpBuilder::new("hl.consume").operand(wrap.result(0)).result(shaped.clone()).build();

    let mut block = Block::new(vec![]);
    block.push(wrap);
    block.push(consume);

    let outcome = apply_patterns(&ctx, &mut block, &patterns);
    assert!(outcome.changed);
    assert!(outcome.sweeps > 2, "the consumer needs a later sweep than the wrapper");

    let names: Vec<&str> = block.operations.iter().map(|op| op.name().as_str()).collect();
    assert_eq!(names, vec!["ll.produce", "ll.consume"]);

    // The consumer's operand was remapped to the lowered producer.
    let consume = &block.operations[1];
    assert_eq!(consume.operand(0).ty(), lowered);
}

#[test]
fn test_soft_failure_leaves_block_untouched() {
    let ctx = Context::new();
    let mut patterns = PatternSet::new();
    patterns.add(pattern("mma.compute", |_ctx, _op, _adaptor| {
        Err(MatchFailure::UnsupportedVariant { variant: "m7n7k7".into() })
    }));

    let op = OpBuilder::new("mma.compute").result(ctx.unit_type()).build();
    let id = op.id();
    let mut block = Block::new(vec![]);
    block.push(op);

    let outcome = apply_patterns(&ctx, &mut block, &patterns);
    assert!(!outcome.changed);
    assert_eq!(block.operations.len(), 1);
    assert_eq!(block.operations[0].id(), id, "declined operations are not rebuilt");
}

#[test]
fn test_materialization_of_unmatched_consumers() {
    let ctx = Context::new();
    let mut patterns = PatternSet::new();
    fold_add(&mut patterns);

    let i64_ty = ctx.scalar_type(DType::Int64);
    let one = const_op(&ctx, 1);
    let two = const_op(&ctx, 2);
    let add = OpBuilder::new("arith.add").operands([one.result(0), two.result(0)]).result(i64_ty.clone()).build();
    // No pattern handles "other.use"; it must still see the folded value.
    let user = OpBuilder::new("other.use").operand(add.result(0)).result(ctx.unit_type()).build();

    let mut block = Block::new(vec![]);
    for op in [one, two, add, user] {
        block.push(op);
    }

    apply_patterns(&ctx, &mut block, &patterns);

    let user = block.operations.iter().find(|op| op.name().as_str() == "other.use").unwrap();
    let folded = user.operand(0).defining_op().unwrap();
    assert_eq!(const_value(folded), Some(3));
}
