use tessel_dtype::{AddrSpace, DType};
use tessel_ir::{Block, Context, FragmentKind, OpBuilder, PatternSet, TypeKind, apply_patterns};

use crate::ops;
use crate::patterns::register_mma_lowering;

fn mma_patterns() -> PatternSet {
    let mut patterns = PatternSet::new();
    register_mma_lowering(&mut patterns);
    patterns
}

/// Block with arguments: A pointer, B pointer, C pointer, i, j.
fn gemm_block(ctx: &Context) -> Block {
    Block::new(vec![
        ctx.ptr_type(DType::Float16, AddrSpace::Global),
        ctx.ptr_type(DType::Float16, AddrSpace::Global),
        ctx.ptr_type(DType::Float32, AddrSpace::Global),
        ctx.scalar_type(DType::Index),
        ctx.scalar_type(DType::Index),
    ])
}

fn op_names(block: &Block) -> Vec<&str> {
    block.operations.iter().map(|op| op.name().as_str()).collect()
}

#[test]
fn test_load_lowering_emits_address_prefix() {
    let ctx = Context::new();
    let block_args = gemm_block(&ctx);
    let frag = ctx.fragment_type(16, 16, DType::Float16, FragmentKind::A);

    let mut block = Block::new(vec![]);
    block.push(ops::load_matrix(&ctx, block_args.arg(0), block_args.arg(3), block_args.arg(4), 32, frag));

    let outcome = apply_patterns(&ctx, &mut block, &mma_patterns());
    assert!(outcome.changed);

    // The explicit, side-effecting prefix: leading-dimension constant,
    // offset arithmetic, pointer index, 32-bit reinterpret cast.
    assert_eq!(
        op_names(&block),
        vec!["arith.const", "arith.mul", "arith.add", "intrin.ptr_index", "intrin.ptr_cast", "intrin.wmma_load"]
    );

    let cast = &block.operations[4];
    assert_eq!(*cast.result_types()[0].kind(), TypeKind::Ptr { pointee: DType::Int32, addrspace: AddrSpace::Global });

    // A fragment of shape 16x16 fixes (m, k); n is inferred from the catalog.
    let load = &block.operations[5];
    assert_eq!(load.int_attr("m"), Some(16));
    assert_eq!(load.int_attr("n"), Some(16));
    assert_eq!(load.int_attr("k"), Some(16));
    assert_eq!(load.str_attr("layout"), Some("row"));
    assert_eq!(load.str_attr("eltype"), Some("f16"));
    assert_eq!(load.str_attr("frag"), Some("a"));
    assert_eq!(*load.result_types()[0].kind(), TypeKind::Packed { count: 8, register: DType::Float16.vec(2) });
}

#[test]
fn test_full_gemm_lowering() {
    let ctx = Context::new();
    let args = gemm_block(&ctx);
    let a_ty = ctx.fragment_type(16, 16, DType::Float16, FragmentKind::A);
    let b_ty = ctx.fragment_type(16, 16, DType::Float16, FragmentKind::B);
    let c_ty = ctx.fragment_type(16, 16, DType::Float32, FragmentKind::Acc);

    let la = ops::load_matrix(&ctx, args.arg(0), args.arg(3), args.arg(4), 32, a_ty);
    let lb = ops::load_matrix(&ctx, args.arg(1), args.arg(3), args.arg(4), 32, b_ty);
    let lc = ops::load_matrix(&ctx, args.arg(2), args.arg(3), args.arg(4), 32, c_ty);
    let mm = ops::compute(la.result(0), lb.result(0), lc.result(0));
    let st = ops::store_matrix(&ctx, mm.result(0), args.arg(2), args.arg(3), args.arg(4), 32);

    let mut block = Block::new(vec![]);
    for op in [la, lb, lc, mm, st] {
        block.push(op);
    }

    let outcome = apply_patterns(&ctx, &mut block, &mma_patterns());
    assert!(outcome.changed);

    let names = op_names(&block);
    assert!(!names.iter().any(|n| n.starts_with("mma.")), "all abstract ops lowered: {names:?}");
    assert_eq!(names.iter().filter(|n| **n == "intrin.wmma_load").count(), 3);
    assert_eq!(names.iter().filter(|n| **n == "intrin.wmma_mma").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "intrin.wmma_store").count(), 1);

    // The compute intrinsic takes the fragments as unpacked registers:
    // 8 for A, 8 for B, 8 for the f32 accumulator.
    let mma = block.operations.iter().find(|op| op.name().as_str() == "intrin.wmma_mma").unwrap();
    assert_eq!(mma.num_operands(), 24);
    assert_eq!(mma.int_attr("k"), Some(16));
    assert_eq!(mma.str_attr("eltype_a"), Some("f16"));
    assert_eq!(mma.str_attr("eltype_acc"), Some("f32"));

    // The store unpacks the accumulator: cast pointer + 8 registers + lead.
    let store = block.operations.iter().find(|op| op.name().as_str() == "intrin.wmma_store").unwrap();
    assert_eq!(store.num_operands(), 10);
    assert_eq!(store.int_attr("m"), Some(16));

    // Operand order survives: the store consumes the mma's packed result
    // through the extracts that precede it.
    let first_register = store.operand(1).defining_op().unwrap();
    assert_eq!(first_register.name().as_str(), "intrin.extract");
}

#[test]
fn test_consumers_wait_for_dependency_conversion() {
    let ctx = Context::new();
    let args = gemm_block(&ctx);
    let a_ty = ctx.fragment_type(16, 16, DType::Float16, FragmentKind::A);
    let b_ty = ctx.fragment_type(16, 16, DType::Float16, FragmentKind::B);
    let c_ty = ctx.fragment_type(16, 16, DType::Float32, FragmentKind::Acc);

    let la = ops::load_matrix(&ctx, args.arg(0), args.arg(3), args.arg(4), 32, a_ty);
    let lb = ops::load_matrix(&ctx, args.arg(1), args.arg(3), args.arg(4), 32, b_ty);
    let lc = ops::load_matrix(&ctx, args.arg(2), args.arg(3), args.arg(4), 32, c_ty);
    let mm = ops::compute(la.result(0), lb.result(0), lc.result(0));

    // The consumer sits ahead of its producers in the list: its first
    // sweep sees unconverted fragment operands and must decline softly.
    let mut block = Block::new(vec![]);
    for op in [mm, la, lb, lc] {
        block.push(op);
    }

    let outcome = apply_patterns(&ctx, &mut block, &mma_patterns());
    assert!(outcome.changed);
    assert!(outcome.sweeps > 2, "the compute only fires after its loads convert");
    assert!(!op_names(&block).iter().any(|n| n.starts_with("mma.")));
}

#[test]
fn test_unsupported_variant_declines_without_mutation() {
    let ctx = Context::new();
    let args = gemm_block(&ctx);
    // No intrinsic handles a 7x7 fragment.
    let frag = ctx.fragment_type(7, 7, DType::Float16, FragmentKind::A);

    let mut block = Block::new(vec![]);
    block.push(ops::load_matrix(&ctx, args.arg(0), args.arg(3), args.arg(4), 32, frag));

    let outcome = apply_patterns(&ctx, &mut block, &mma_patterns());
    assert!(!outcome.changed);
    assert_eq!(op_names(&block), vec!["mma.load_matrix"], "failed matches leave the IR untouched");
}

#[test]
fn test_constant_matrix_splat_chain() {
    let ctx = Context::new();
    let scalar = OpBuilder::new("arith.const")
        .attr("value", ctx.float_attr(0.0))
        .result(ctx.scalar_type(DType::Float16))
        .build();
    let frag = ctx.fragment_type(16, 16, DType::Float16, FragmentKind::Acc);
    let cst = ops::constant_matrix(scalar.result(0), frag);

    let mut block = Block::new(vec![]);
    block.push(scalar);
    block.push(cst);

    apply_patterns(&ctx, &mut block, &mma_patterns());

    // f16 accumulators pack pairs into vector registers: one splat, then
    // an undef filled by one insert per register slot.
    let names = op_names(&block);
    assert_eq!(
        names,
        vec!["arith.const", "intrin.splat", "intrin.undef", "intrin.insert", "intrin.insert", "intrin.insert", "intrin.insert"]
    );

    let last = block.operations.last().unwrap();
    assert_eq!(last.int_attr("index"), Some(3));
    assert_eq!(*last.result_types()[0].kind(), TypeKind::Packed { count: 4, register: DType::Float16.vec(2) });
}

#[test]
fn test_scalar_constant_acc_without_splat() {
    let ctx = Context::new();
    let scalar = OpBuilder::new("arith.const")
        .attr("value", ctx.float_attr(1.0))
        .result(ctx.scalar_type(DType::Float32))
        .build();
    let frag = ctx.fragment_type(16, 16, DType::Float32, FragmentKind::Acc);
    let cst = ops::constant_matrix(scalar.result(0), frag);

    let mut block = Block::new(vec![]);
    block.push(scalar);
    block.push(cst);

    apply_patterns(&ctx, &mut block, &mma_patterns());

    // f32 accumulators use scalar registers: no splat, 8 inserts.
    let names = op_names(&block);
    assert_eq!(names[1], "intrin.undef");
    assert_eq!(names.iter().filter(|n| **n == "intrin.insert").count(), 8);
    assert!(!names.contains(&"intrin.splat"));
}
