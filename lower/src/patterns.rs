//! Rewrite rules translating `mma` fragment operations into `intrin` calls.
//!
//! Every rule follows the same discipline: gate on already-converted
//! operand types, compute the full `m x n x k` geometry from the fragment
//! shapes (inferring the dimension the shape cannot determine), check the
//! intrinsic catalog, and only then emit the replacement sequence. The
//! address arithmetic and the 32-bit pointer reinterpretation the target
//! intrinsics expect are emitted as an explicit prefix before the call.

use std::sync::Arc;

use tessel_dtype::DType;
use tessel_ir::{
    Context, FragmentKind, MatchFailure, MatchResult, OpBuilder, OpName, Operation, PatternSet, Rewrite,
    RewritePattern, Type, TypeKind, Value,
};

use crate::intrinsics::{
    MmaElementType, MmaLayout, fragment_registers, infer_k_dimension, infer_m_dimension, infer_n_dimension,
    load_intrinsic_exists, mma_intrinsic_exists, store_intrinsic_exists,
};

/// All operand types must already be converted to a lowered form before a
/// rule may fire; the rewrite driver retries after dependency conversion.
fn require_lowered(adaptor: &[Value]) -> Result<(), MatchFailure> {
    match adaptor.iter().position(|v| !v.ty().is_lowered()) {
        Some(operand) => Err(MatchFailure::NotYetConverted { operand }),
        None => Ok(()),
    }
}

fn fragment_info(ty: &Type) -> Option<(i64, i64, DType, FragmentKind)> {
    match ty.kind() {
        TypeKind::Fragment { rows, cols, element, operand } => Some((*rows, *cols, element.clone(), *operand)),
        _ => None,
    }
}

fn unsupported(m: i64, n: i64, k: i64, elem: MmaElementType) -> MatchFailure {
    tracing::debug!(m, n, k, eltype = elem.as_ref(), "no intrinsic for fragment configuration");
    MatchFailure::UnsupportedVariant { variant: format!("m{m}n{n}k{k} {}", elem.as_ref()) }
}

/// Emit the load/store offset arithmetic: the effective address is
/// `base + lead_dimension * i + j`, reinterpreted as a pointer to 32-bit
/// chunks so the value layout matches what the intrinsics expect.
///
/// Returns the cast pointer and the leading-dimension constant (the latter
/// is also an intrinsic operand).
fn address_prefix(
    ctx: &Context,
    ops: &mut Vec<Arc<Operation>>,
    ptr: Value,
    i: Value,
    j: Value,
    lead_dimension: i64,
) -> Option<(Value, Value)> {
    let TypeKind::Ptr { addrspace, .. } = ptr.ty().kind().clone() else {
        return None;
    };
    let index = ctx.scalar_type(DType::Index);

    let lead = OpBuilder::new("arith.const")
        .attr("value", ctx.int_attr(lead_dimension))
        .result(index.clone())
        .build();
    let scaled = OpBuilder::new("arith.mul").operands([lead.result(0), i]).result(index.clone()).build();
    let offset = OpBuilder::new("arith.add").operands([scaled.result(0), j]).result(index.clone()).build();
    let addr = OpBuilder::new("intrin.ptr_index").operands([ptr.clone(), offset.result(0)]).result(ptr.ty()).build();
    let cast = OpBuilder::new("intrin.ptr_cast")
        .operand(addr.result(0))
        .result(ctx.ptr_type(DType::Int32, addrspace))
        .build();

    let (lead_value, cast_value) = (lead.result(0), cast.result(0));
    ops.extend([lead, scaled, offset, addr, cast]);
    Some((cast_value, lead_value))
}

/// Unpack a lowered fragment into its individual registers.
fn unpack_registers(ctx: &Context, ops: &mut Vec<Arc<Operation>>, packed: &Value) -> Vec<Value> {
    let TypeKind::Packed { count, register } = packed.ty().kind().clone() else {
        return vec![packed.clone()];
    };
    (0..count)
        .map(|index| {
            let extract = OpBuilder::new("intrin.extract")
                .operand(packed.clone())
                .attr("index", ctx.int_attr(index as i64))
                .result(ctx.scalar_type(register.clone()))
                .build();
            ops.push(extract.clone());
            extract.result(0)
        })
        .collect()
}

/// `mma.load_matrix` to `intrin.wmma_load`.
pub struct LoadMatrixLowering;

impl RewritePattern for LoadMatrixLowering {
    fn root(&self) -> Option<OpName> {
        Some("mma.load_matrix".into())
    }

    fn match_and_rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult {
        require_lowered(adaptor)?;
        let Some((rows, cols, element, operand_kind)) = op.result_types().first().and_then(fragment_info) else {
            return Err(MatchFailure::NoMatch);
        };
        let Some(lead_dimension) = op.int_attr("lead_dimension") else {
            return Err(MatchFailure::NoMatch);
        };
        let Some(elem) = MmaElementType::of_fragment(&element, operand_kind) else {
            return Err(MatchFailure::UnsupportedVariant { variant: format!("{element:?} fragment element") });
        };

        // The shape fixes two of the three geometry dimensions; the
        // remaining one comes from the catalog, per fragment kind.
        let (m, n, k) = match operand_kind {
            FragmentKind::A => {
                let (m, k) = (rows, cols);
                (m, infer_n_dimension(m, k, elem).ok_or_else(|| unsupported(m, 0, k, elem))?, k)
            }
            FragmentKind::B => {
                let (k, n) = (rows, cols);
                (infer_m_dimension(k, n, elem).ok_or_else(|| unsupported(0, n, k, elem))?, n, k)
            }
            FragmentKind::Acc => {
                let (m, n) = (rows, cols);
                (m, n, infer_k_dimension(m, n, elem).ok_or_else(|| unsupported(m, n, 0, elem))?)
            }
        };
        if !load_intrinsic_exists(m, n, k, MmaLayout::Row, elem, operand_kind) {
            return Err(unsupported(m, n, k, elem));
        }

        let mut ops = Vec::new();
        let (cast, lead) =
            address_prefix(ctx, &mut ops, adaptor[0].clone(), adaptor[1].clone(), adaptor[2].clone(), lead_dimension)
                .ok_or(MatchFailure::NoMatch)?;

        let (count, register) = fragment_registers(elem, operand_kind);
        let load = OpBuilder::new("intrin.wmma_load")
            .operands([cast, lead])
            .attr("m", ctx.int_attr(m))
            .attr("n", ctx.int_attr(n))
            .attr("k", ctx.int_attr(k))
            .attr("layout", ctx.str_attr(MmaLayout::Row.as_ref()))
            .attr("eltype", ctx.str_attr(elem.as_ref()))
            .attr("frag", ctx.str_attr(operand_kind.as_ref()))
            .result(ctx.packed_type(count, register))
            .build();
        ops.push(load);
        Ok(Rewrite::with_final(ops))
    }
}

/// `mma.store_matrix` to `intrin.wmma_store`.
pub struct StoreMatrixLowering;

impl RewritePattern for StoreMatrixLowering {
    fn root(&self) -> Option<OpName> {
        Some("mma.store_matrix".into())
    }

    fn match_and_rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult {
        require_lowered(adaptor)?;
        // The original operand still carries the fragment geometry.
        let Some((m, n, element, operand_kind)) = fragment_info(&op.operand(0).ty()) else {
            return Err(MatchFailure::NoMatch);
        };
        let Some(lead_dimension) = op.int_attr("lead_dimension") else {
            return Err(MatchFailure::NoMatch);
        };
        let Some(elem) = MmaElementType::of_fragment(&element, operand_kind) else {
            return Err(MatchFailure::UnsupportedVariant { variant: format!("{element:?} fragment element") });
        };
        let k = infer_k_dimension(m, n, elem).ok_or_else(|| unsupported(m, n, 0, elem))?;
        if !store_intrinsic_exists(m, n, k, MmaLayout::Row, elem) {
            return Err(unsupported(m, n, k, elem));
        }

        let mut ops = Vec::new();
        let (cast, lead) =
            address_prefix(ctx, &mut ops, adaptor[1].clone(), adaptor[2].clone(), adaptor[3].clone(), lead_dimension)
                .ok_or(MatchFailure::NoMatch)?;
        let registers = unpack_registers(ctx, &mut ops, &adaptor[0]);

        let store = OpBuilder::new("intrin.wmma_store")
            .operand(cast)
            .operands(registers)
            .operand(lead)
            .attr("m", ctx.int_attr(m))
            .attr("n", ctx.int_attr(n))
            .attr("k", ctx.int_attr(k))
            .attr("layout", ctx.str_attr(MmaLayout::Row.as_ref()))
            .attr("eltype", ctx.str_attr(elem.as_ref()))
            .build();
        ops.push(store);
        Ok(Rewrite::erase(ops))
    }
}

/// `mma.compute` to `intrin.wmma_mma`.
pub struct ComputeLowering;

impl RewritePattern for ComputeLowering {
    fn root(&self) -> Option<OpName> {
        Some("mma.compute".into())
    }

    fn match_and_rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult {
        require_lowered(adaptor)?;
        let (Some((_, a_cols, a_element, a_kind)), Some((c_rows, c_cols, c_element, c_kind))) =
            (fragment_info(&op.operand(0).ty()), fragment_info(&op.operand(2).ty()))
        else {
            return Err(MatchFailure::NoMatch);
        };

        // m and n come from the accumulator shape, k from A's columns.
        let (m, n, k) = (c_rows, c_cols, a_cols);
        let (Some(src), Some(acc)) =
            (MmaElementType::of_fragment(&a_element, a_kind), MmaElementType::of_fragment(&c_element, c_kind))
        else {
            return Err(MatchFailure::UnsupportedVariant { variant: "fragment element".into() });
        };
        if !mma_intrinsic_exists(m, n, k, MmaLayout::Row, MmaLayout::Row, src, acc) {
            return Err(unsupported(m, n, k, src));
        }

        // The intrinsic takes the fragments as individual register values.
        let mut ops = Vec::new();
        let mut registers = Vec::new();
        for operand in adaptor {
            registers.extend(unpack_registers(ctx, &mut ops, operand));
        }

        let mma = OpBuilder::new("intrin.wmma_mma")
            .operands(registers)
            .attr("m", ctx.int_attr(m))
            .attr("n", ctx.int_attr(n))
            .attr("k", ctx.int_attr(k))
            .attr("layout_a", ctx.str_attr(MmaLayout::Row.as_ref()))
            .attr("layout_b", ctx.str_attr(MmaLayout::Row.as_ref()))
            .attr("eltype_a", ctx.str_attr(src.as_ref()))
            .attr("eltype_acc", ctx.str_attr(acc.as_ref()))
            .result(adaptor[2].ty())
            .build();
        ops.push(mma);
        Ok(Rewrite::with_final(ops))
    }
}

/// `mma.constant_matrix` to a splat-and-insert chain.
pub struct ConstantMatrixLowering;

impl RewritePattern for ConstantMatrixLowering {
    fn root(&self) -> Option<OpName> {
        Some("mma.constant_matrix".into())
    }

    fn match_and_rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult {
        require_lowered(adaptor)?;
        let Some((_, _, element, operand_kind)) = op.result_types().first().and_then(fragment_info) else {
            return Err(MatchFailure::NoMatch);
        };
        let Some(elem) = MmaElementType::of_fragment(&element, operand_kind) else {
            return Err(MatchFailure::UnsupportedVariant { variant: format!("{element:?} fragment element") });
        };

        let (count, register) = fragment_registers(elem, operand_kind);
        let packed = ctx.packed_type(count, register.clone());
        let mut ops = Vec::new();

        // Vector registers are filled from a splat of the scalar first.
        let fill = if register.count() > 1 {
            let splat = OpBuilder::new("intrin.splat")
                .operand(adaptor[0].clone())
                .result(ctx.scalar_type(register.clone()))
                .build();
            ops.push(splat.clone());
            splat.result(0)
        } else {
            adaptor[0].clone()
        };

        let mut current = OpBuilder::new("intrin.undef").result(packed.clone()).build();
        ops.push(current.clone());
        for index in 0..count {
            current = OpBuilder::new("intrin.insert")
                .operands([current.result(0), fill.clone()])
                .attr("index", ctx.int_attr(index as i64))
                .result(packed.clone())
                .build();
            ops.push(current.clone());
        }

        Ok(Rewrite::with_final(ops))
    }
}

/// Register the four fragment-lowering rules with a pattern set.
pub fn register_mma_lowering(patterns: &mut PatternSet) {
    patterns.add(Box::new(LoadMatrixLowering));
    patterns.add(Box::new(ComputeLowering));
    patterns.add(Box::new(StoreMatrixLowering));
    patterns.add(Box::new(ConstantMatrixLowering));
}
