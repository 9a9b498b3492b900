//! The structured-op code generator.
//!
//! [`generate`] consumes a [`StructuredOpDescriptor`] and deterministically
//! produces a [`GeneratedOp`]: the declared-arguments contract, builder
//! logic wiring the input/output operand segments, indexing-map accessors
//! (static or attribute-derived), the per-instance verifier for dynamic
//! index attributes, and the region body builder that lowers the scalar
//! expression trees into primitive operations.

use std::collections::HashSet;
use std::sync::Arc;

use snafu::ensure;

use tessel_ir::error::{
    IndexOutOfRangeSnafu, IndexingMapCountMismatchSnafu, MalformedAttributeMapSnafu, MissingAssignmentSnafu,
    MissingIndexAttributeSnafu, MissingTypeBindingSnafu, MisshapenIndexAttributeSnafu, ParameterArityMismatchSnafu,
    RankMismatchSnafu, SymbolBoundTwiceSnafu, UnboundScalarArgumentSnafu, UnboundSymbolSnafu, UnboundTypeVarSnafu,
    UnknownAssignmentTargetSnafu, UnknownScalarFunctionSnafu,
};
use tessel_ir::{
    AffineExpr, AffineMap, AttrRef, Block, BlockBuilder, ConstructionError, Context, DType, DefinitionError,
    OpBuilder, Operation, Type, Value, VerificationError,
};

use crate::descriptor::{OperandRole, ScalarExpr, StructuredOpDescriptor};
use crate::region::{ScalarFnRegistry, TypeBindings};

pub use tessel_ir::op::OPERAND_SEGMENT_SIZES;

/// One fixed attribute slot of the argument contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexAttrDecl {
    pub name: String,
    /// Declared rank of the rectangular integer-array attribute.
    pub element_count: usize,
}

/// Declared-arguments contract: two variadic operand segments plus one
/// fixed attribute slot per index attribute.
#[derive(Debug, Clone, Default)]
pub struct ArgumentContract {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub index_attrs: Vec<IndexAttrDecl>,
}

/// Binding of one symbol to one element of one index attribute.
#[derive(Debug, Clone)]
struct SymbolBinding {
    symbol: usize,
    attr_name: String,
    element: usize,
}

/// Runtime behavior generated from one descriptor.
#[derive(Debug, Clone)]
pub struct GeneratedOp {
    descriptor: StructuredOpDescriptor,
    contract: ArgumentContract,
    num_symbols: usize,
    /// Symbol bindings in binding order: index-attribute operands in
    /// declaration order, then symbol order within each attribute map.
    symbol_bindings: Vec<SymbolBinding>,
}

/// Validate every definition-time invariant and produce the generated
/// behavior. Pure and deterministic.
pub fn generate(
    descriptor: StructuredOpDescriptor,
    registry: &ScalarFnRegistry,
) -> Result<GeneratedOp, DefinitionError> {
    ensure!(
        descriptor.indexing_maps.len() == descriptor.operands.len(),
        IndexingMapCountMismatchSnafu { expected: descriptor.operands.len(), got: descriptor.indexing_maps.len() }
    );

    // Shared iteration space: every map agrees on the dimension vector,
    // and there is one iterator tag per dimension.
    let rank = descriptor.indexing_maps.first().map(AffineMap::num_dims).unwrap_or(descriptor.iterator_types.len());
    for map in &descriptor.indexing_maps {
        ensure!(map.num_dims() == rank, RankMismatchSnafu { expected: rank, got: map.num_dims() });
    }
    ensure!(
        descriptor.iterator_types.len() == rank,
        RankMismatchSnafu { expected: rank, got: descriptor.iterator_types.len() }
    );

    // Bind symbols from index-attribute operands: operand declaration
    // order first, then symbol order within that operand's map.
    let mut symbol_bindings = Vec::new();
    let mut bound = HashSet::new();
    let mut index_attrs = Vec::new();
    for (position, operand) in descriptor.index_attributes() {
        let map = &descriptor.indexing_maps[position];
        let mut count = 0;
        for (element, result) in map.results().iter().enumerate() {
            let AffineExpr::Symbol(symbol) = result else {
                return MalformedAttributeMapSnafu { operand: operand.name.clone() }.fail();
            };
            ensure!(bound.insert(*symbol), SymbolBoundTwiceSnafu { symbol: *symbol });
            symbol_bindings.push(SymbolBinding { symbol: *symbol, attr_name: operand.name.clone(), element });
            count += 1;
        }
        index_attrs.push(IndexAttrDecl { name: operand.name.clone(), element_count: count });
    }

    // Every symbol a value operand's map references must be resolvable
    // from some index attribute at verification time.
    for (position, _) in descriptor.value_operands() {
        for symbol in descriptor.indexing_maps[position].symbols_used() {
            ensure!(bound.contains(&symbol), UnboundSymbolSnafu { symbol: format!("s{symbol}") });
        }
    }

    // One assignment per output, each targeting a declared output.
    for assignment in &descriptor.assignments {
        let target = descriptor.operand_named(&assignment.output);
        ensure!(
            target.is_some_and(|(_, o)| o.role == OperandRole::Output),
            UnknownAssignmentTargetSnafu { name: assignment.output.clone() }
        );
    }
    for (_, output) in descriptor.outputs() {
        ensure!(
            descriptor.assignments.iter().any(|a| a.output == output.name),
            MissingAssignmentSnafu { output: output.name.clone() }
        );
    }

    // Scalar expression trees reference only known operands, functions,
    // iteration dimensions and type variables.
    let type_vars: HashSet<&str> =
        descriptor.operands.iter().filter_map(|o| o.element_type_var.as_deref()).collect();
    for assignment in &descriptor.assignments {
        validate_expr(&descriptor, registry, &type_vars, rank, &assignment.value)?;
    }

    let num_symbols = descriptor.indexing_maps.iter().map(AffineMap::num_symbols).max().unwrap_or(0);
    let contract = ArgumentContract {
        inputs: descriptor.inputs().map(|(_, o)| o.name.clone()).collect(),
        outputs: descriptor.outputs().map(|(_, o)| o.name.clone()).collect(),
        index_attrs,
    };

    tracing::debug!(op = %descriptor.op_name(), dynamic = !contract.index_attrs.is_empty(), "generated structured op");
    Ok(GeneratedOp { descriptor, contract, num_symbols, symbol_bindings })
}

fn validate_expr(
    descriptor: &StructuredOpDescriptor,
    registry: &ScalarFnRegistry,
    type_vars: &HashSet<&str>,
    rank: usize,
    expr: &ScalarExpr,
) -> Result<(), DefinitionError> {
    match expr {
        ScalarExpr::Const(_) => Ok(()),
        ScalarExpr::Arg(name) => {
            let is_value_operand =
                descriptor.operand_named(name).is_some_and(|(_, o)| o.role != OperandRole::IndexAttribute);
            ensure!(is_value_operand, UnboundSymbolSnafu { symbol: name.clone() });
            Ok(())
        }
        ScalarExpr::Index(dim) => {
            ensure!(*dim < rank, IndexOutOfRangeSnafu { dim: *dim, rank });
            Ok(())
        }
        ScalarExpr::Cast { type_var, operand, .. } => {
            ensure!(type_vars.contains(type_var.as_str()), UnboundTypeVarSnafu { var: type_var.clone() });
            validate_expr(descriptor, registry, type_vars, rank, operand)
        }
        ScalarExpr::Apply { func, operands } => {
            ensure!(registry.contains(func), UnknownScalarFunctionSnafu { func: func.clone() });
            for operand in operands {
                validate_expr(descriptor, registry, type_vars, rank, operand)?;
            }
            Ok(())
        }
    }
}

impl GeneratedOp {
    pub fn descriptor(&self) -> &StructuredOpDescriptor {
        &self.descriptor
    }

    /// The declared-arguments contract.
    pub fn contract(&self) -> &ArgumentContract {
        &self.contract
    }

    /// Whether the indexing maps depend on runtime attribute values.
    pub fn has_dynamic_indexing_maps(&self) -> bool {
        !self.contract.index_attrs.is_empty()
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Construct an operation instance.
    ///
    /// Inputs come first, outputs second; the `(inputs, outputs)` segment
    /// split is recorded in the segment-size bookkeeping attribute so the
    /// variadic groups can be recovered generically later.
    pub fn build(
        &self,
        ctx: &Context,
        result_types: Vec<Type>,
        inputs: Vec<Value>,
        outputs: Vec<Value>,
        attrs: Vec<(String, AttrRef)>,
    ) -> Result<Arc<Operation>, ConstructionError> {
        ensure!(
            inputs.len() == self.contract.inputs.len(),
            ParameterArityMismatchSnafu {
                mnemonic: self.descriptor.op_name(),
                expected: self.contract.inputs.len(),
                got: inputs.len(),
            }
        );
        ensure!(
            outputs.len() == self.contract.outputs.len(),
            ParameterArityMismatchSnafu {
                mnemonic: self.descriptor.op_name(),
                expected: self.contract.outputs.len(),
                got: outputs.len(),
            }
        );

        let segments = [inputs.len() as i64, outputs.len() as i64];
        let mut builder = OpBuilder::new(self.descriptor.op_name())
            .operands(inputs)
            .operands(outputs)
            .results(result_types)
            .attr(OPERAND_SEGMENT_SIZES, ctx.dense_i64_attr(&segments));
        for (name, attr) in attrs {
            builder = builder.attr(name, attr);
        }
        Ok(builder.build())
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Confirm every declared index attribute is present with exactly the
    /// declared element count.
    fn check_index_attrs(&self, op: &Operation) -> Result<(), VerificationError> {
        for decl in &self.contract.index_attrs {
            let Some(attr) = op.attr(&decl.name) else {
                return MissingIndexAttributeSnafu { op: op.name().as_str(), attr_name: decl.name.clone() }.fail();
            };
            let got = attr.as_i64_slice().map(<[i64]>::len).unwrap_or(0);
            ensure!(
                got == decl.element_count,
                MisshapenIndexAttributeSnafu {
                    op: op.name().as_str(),
                    attr_name: decl.name.clone(),
                    expected: decl.element_count,
                    got,
                }
            );
        }
        Ok(())
    }

    /// Per-instance verification; failures are reported through the
    /// context's diagnostic channel and mark the instance invalid without
    /// affecting sibling instances.
    pub fn verify(&self, ctx: &Context, op: &Operation) -> Result<(), VerificationError> {
        match self.check_index_attrs(op) {
            Ok(()) => Ok(()),
            Err(err) => {
                ctx.diagnostics().error(Some(op.name()), err.to_string());
                Err(err)
            }
        }
    }

    // =========================================================================
    // Indexing-map accessor
    // =========================================================================

    /// Indexing maps of the value operands, in declaration order.
    ///
    /// Static case: the declared maps, verbatim. Dynamic case: the bound
    /// index attributes are read off the instance, their elements become
    /// affine constants, and those constants replace the corresponding
    /// symbols in every map.
    pub fn indexing_maps(&self, op: &Operation) -> Result<Vec<AffineMap>, VerificationError> {
        let value_maps = self.descriptor.value_operands().map(|(position, _)| &self.descriptor.indexing_maps[position]);

        if !self.has_dynamic_indexing_maps() {
            return Ok(value_maps.cloned().collect());
        }

        self.check_index_attrs(op)?;

        let mut symbols = vec![None; self.num_symbols];
        for binding in &self.symbol_bindings {
            // check_index_attrs guarantees presence and shape.
            let values = op.int_array_attr(&binding.attr_name).unwrap_or_default();
            symbols[binding.symbol] = values.get(binding.element).copied();
        }

        Ok(value_maps.map(|map| map.replace_symbols(&symbols)).collect())
    }

    // =========================================================================
    // Region body builder
    // =========================================================================

    /// Build the region body: one block argument per value operand (inputs
    /// then outputs, declaration order), one primitive operation per scalar
    /// expression node in post-order, and a final yield of one value per
    /// output operand in declaration order.
    pub fn build_region(
        &self,
        ctx: &Context,
        bindings: &TypeBindings,
        registry: &ScalarFnRegistry,
    ) -> Result<Block, ConstructionError> {
        let mut arg_names = Vec::new();
        let mut arg_types = Vec::new();
        for (_, operand) in self.descriptor.inputs().chain(self.descriptor.outputs()) {
            arg_names.push(operand.name.clone());
            arg_types.push(ctx.scalar_type(self.resolve_type_var_of(operand, bindings)?));
        }

        let mut builder = BlockBuilder::new(arg_types);
        let mut emitter = RegionEmitter { ctx, registry, bindings, arg_names: &arg_names, builder: &mut builder };

        let mut yielded = Vec::new();
        for (_, output) in self.descriptor.outputs() {
            // Validated at generation time: exactly one assignment per output.
            let assignment = self
                .descriptor
                .assignments
                .iter()
                .find(|a| a.output == output.name)
                .expect("assignment presence is validated at definition time");
            yielded.push(emitter.emit(&assignment.value)?);
        }

        builder.insert(OpBuilder::new("structured.yield").operands(yielded).build());
        Ok(builder.finish())
    }

    fn resolve_type_var_of(
        &self,
        operand: &crate::descriptor::OperandDef,
        bindings: &TypeBindings,
    ) -> Result<DType, ConstructionError> {
        let var = operand.element_type_var.as_deref().unwrap_or(operand.name.as_str());
        bindings.get(var).cloned().ok_or_else(|| MissingTypeBindingSnafu { var }.build())
    }
}

struct RegionEmitter<'a> {
    ctx: &'a Context,
    registry: &'a ScalarFnRegistry,
    bindings: &'a TypeBindings,
    arg_names: &'a [String],
    builder: &'a mut BlockBuilder,
}

impl RegionEmitter<'_> {
    /// Post-order emission: operands are evaluated before the cast or
    /// function application that consumes them.
    fn emit(&mut self, expr: &ScalarExpr) -> Result<Value, ConstructionError> {
        match expr {
            ScalarExpr::Arg(name) => {
                let index = self
                    .arg_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| UnboundScalarArgumentSnafu { name: name.as_str() }.build())?;
                Ok(self.builder.arg(index))
            }
            ScalarExpr::Const(value) => {
                use tessel_ir::ConstValue;
                let (attr, dtype) = match value {
                    ConstValue::Int(v) => (self.ctx.int_attr(*v), DType::Int64),
                    ConstValue::UInt(v) => (self.ctx.int_attr(*v as i64), DType::UInt64),
                    ConstValue::Float(v) => (self.ctx.float_attr(*v), DType::Float64),
                    ConstValue::Bool(v) => (self.ctx.int_attr(*v as i64), DType::Bool),
                };
                let op = OpBuilder::new("arith.const").attr("value", attr).result(self.ctx.scalar_type(dtype)).build();
                Ok(self.builder.insert(op).result(0))
            }
            ScalarExpr::Index(dim) => {
                let op = OpBuilder::new("structured.index")
                    .attr("dim", self.ctx.int_attr(*dim as i64))
                    .result(self.ctx.scalar_type(DType::Index))
                    .build();
                Ok(self.builder.insert(op).result(0))
            }
            ScalarExpr::Cast { signed, type_var, operand } => {
                let value = self.emit(operand)?;
                let target = self
                    .bindings
                    .get(type_var)
                    .cloned()
                    .ok_or_else(|| MissingTypeBindingSnafu { var: type_var.as_str() }.build())?;
                let name = if *signed { "arith.cast_signed" } else { "arith.cast_unsigned" };
                let op = OpBuilder::new(name).operand(value).result(self.ctx.scalar_type(target)).build();
                Ok(self.builder.insert(op).result(0))
            }
            ScalarExpr::Apply { func, operands } => {
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(self.emit(operand)?);
                }
                // Validated at generation time against the same registry.
                let emit = self
                    .registry
                    .get(func)
                    .expect("scalar function presence is validated at definition time")
                    .clone();
                Ok(emit(self.ctx, self.builder, &values))
            }
        }
    }
}
