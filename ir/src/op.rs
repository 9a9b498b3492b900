//! Generic operation container.
//!
//! An [`Operation`] is an immutable node: name, operand [`Value`]s, an
//! attribute dictionary, result types and optional regions. Operations are
//! shared as `Arc<Operation>`; rewrites never mutate a node, they build a
//! replacement and remap its uses.

use std::sync::Arc;

use smallvec::SmallVec;
use snafu::ensure;

use crate::attr::AttrRef;
use crate::context::next_entity_id;
use crate::error::{ConstructionError, SegmentMismatchSnafu};
use crate::types::Type;

/// Attribute name recording the `(inputs, outputs)` variadic segment split.
pub const OPERAND_SEGMENT_SIZES: &str = "operand_segment_sizes";

/// Interned-ish operation name, cheap to clone and hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpName(Arc<str>);

impl OpName {
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OpName {
    fn from(name: String) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for OpName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for OpName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpName({})", self.0)
    }
}

/// SSA value: the result of an operation or a block argument.
#[derive(Clone)]
pub enum Value {
    Result { op: Arc<Operation>, index: usize },
    BlockArg { block: u64, index: usize, ty: Type },
}

/// Identity key of a value, usable as a HashMap key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueKey {
    Result(u64, usize),
    BlockArg(u64, usize),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Self::Result { op, index } => op.result_types[*index].clone(),
            Self::BlockArg { ty, .. } => ty.clone(),
        }
    }

    pub fn key(&self) -> ValueKey {
        match self {
            Self::Result { op, index } => ValueKey::Result(op.id, *index),
            Self::BlockArg { block, index, .. } => ValueKey::BlockArg(*block, *index),
        }
    }

    /// Defining operation, if this value is an operation result.
    pub fn defining_op(&self) -> Option<&Arc<Operation>> {
        match self {
            Self::Result { op, .. } => Some(op),
            Self::BlockArg { .. } => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Result { op, index } => write!(f, "%{}#{index} ({})", op.id, op.name),
            Self::BlockArg { block, index, ty } => write!(f, "%arg{index}@{block} : {ty}"),
        }
    }
}

/// A region: a list of blocks owned by an operation.
#[derive(Debug, Clone, Default)]
pub struct Region {
    pub blocks: Vec<Block>,
}

impl Region {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }
}

/// A basic block: typed arguments plus an ordered operation list.
///
/// Cloning shares the block identity: block arguments of the clone resolve
/// against the same id.
#[derive(Debug, Clone)]
pub struct Block {
    id: u64,
    arg_types: Vec<Type>,
    pub operations: Vec<Arc<Operation>>,
}

impl Block {
    pub fn new(arg_types: Vec<Type>) -> Self {
        Self { id: next_entity_id(), arg_types, operations: Vec::new() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn num_args(&self) -> usize {
        self.arg_types.len()
    }

    pub fn arg(&self, index: usize) -> Value {
        Value::BlockArg { block: self.id, index, ty: self.arg_types[index].clone() }
    }

    pub fn push(&mut self, op: Arc<Operation>) {
        self.operations.push(op);
    }
}

/// Append-only block construction helper.
///
/// Region body builders emit primitive operations through this; each
/// insertion returns the operation back so its results can feed later ones.
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    pub fn new(arg_types: Vec<Type>) -> Self {
        Self { block: Block::new(arg_types) }
    }

    pub fn arg(&self, index: usize) -> Value {
        self.block.arg(index)
    }

    pub fn num_args(&self) -> usize {
        self.block.num_args()
    }

    pub fn insert(&mut self, op: Arc<Operation>) -> Arc<Operation> {
        self.block.push(op.clone());
        op
    }

    pub fn finish(self) -> Block {
        self.block
    }
}

/// Immutable, generic operation node.
pub struct Operation {
    pub(crate) id: u64,
    name: OpName,
    operands: SmallVec<[Value; 4]>,
    /// Sorted by attribute name.
    attributes: Vec<(String, AttrRef)>,
    result_types: SmallVec<[Type; 2]>,
    regions: Vec<Region>,
}

impl Operation {
    /// Stable identifier of this node.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &OpName {
        &self.name
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> &Value {
        &self.operands[index]
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    pub fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    pub fn num_results(&self) -> usize {
        self.result_types.len()
    }

    pub fn result(self: &Arc<Self>, index: usize) -> Value {
        debug_assert!(index < self.result_types.len());
        Value::Result { op: self.clone(), index }
    }

    pub fn results(self: &Arc<Self>) -> Vec<Value> {
        (0..self.result_types.len()).map(|index| self.result(index)).collect()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    // =========================================================================
    // Typed attribute accessors
    // =========================================================================

    pub fn attributes(&self) -> &[(String, AttrRef)] {
        &self.attributes
    }

    pub fn attr(&self, name: &str) -> Option<&AttrRef> {
        self.attributes.binary_search_by(|(n, _)| n.as_str().cmp(name)).ok().map(|i| &self.attributes[i].1)
    }

    pub fn int_attr(&self, name: &str) -> Option<i64> {
        self.attr(name)?.int()
    }

    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attr(name)?.str()
    }

    pub fn int_array_attr(&self, name: &str) -> Option<&[i64]> {
        self.attr(name)?.as_i64_slice()
    }

    /// Recover the variadic operand groups recorded by the segment-size
    /// bookkeeping attribute.
    pub fn operand_segments(&self) -> Result<Vec<&[Value]>, ConstructionError> {
        let Some(sizes) = self.int_array_attr(OPERAND_SEGMENT_SIZES) else {
            // No segments declared: one group holding everything.
            return Ok(vec![&self.operands]);
        };
        let total: i64 = sizes.iter().sum();
        ensure!(
            total == self.operands.len() as i64,
            SegmentMismatchSnafu { op: self.name.as_str(), expected: total as usize, got: self.operands.len() }
        );
        let mut segments = Vec::with_capacity(sizes.len());
        let mut start = 0usize;
        for &size in sizes {
            let end = start + size as usize;
            segments.push(&self.operands[start..end]);
            start = end;
        }
        Ok(segments)
    }

    /// Rebuild this operation with different operands (same name,
    /// attributes, result types; fresh identity).
    pub fn with_operands(self: &Arc<Self>, operands: impl IntoIterator<Item = Value>) -> Arc<Self> {
        let operands: SmallVec<[Value; 4]> = operands.into_iter().collect();
        debug_assert_eq!(operands.len(), self.operands.len());
        Arc::new(Self {
            id: next_entity_id(),
            name: self.name.clone(),
            operands,
            attributes: self.attributes.clone(),
            result_types: self.result_types.clone(),
            regions: self.regions.clone(),
        })
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{} = {}(", self.id, self.name)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match operand {
                Value::Result { op, index } => write!(f, "%{}#{index}", op.id)?,
                Value::BlockArg { block, index, .. } => write!(f, "%arg{index}@{block}")?,
            }
        }
        write!(f, ")")?;
        if !self.attributes.is_empty() {
            write!(f, " {{")?;
            for (i, (name, attr)) in self.attributes.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name} = {attr:?}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

/// Assembles an [`Operation`].
pub struct OpBuilder {
    name: OpName,
    operands: SmallVec<[Value; 4]>,
    attributes: Vec<(String, AttrRef)>,
    result_types: SmallVec<[Type; 2]>,
    regions: Vec<Region>,
}

impl OpBuilder {
    pub fn new(name: impl Into<OpName>) -> Self {
        Self {
            name: name.into(),
            operands: SmallVec::new(),
            attributes: Vec::new(),
            result_types: SmallVec::new(),
            regions: Vec::new(),
        }
    }

    pub fn operand(mut self, value: Value) -> Self {
        self.operands.push(value);
        self
    }

    pub fn operands(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.operands.extend(values);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, attr: AttrRef) -> Self {
        self.attributes.push((name.into(), attr));
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.result_types.push(ty);
        self
    }

    pub fn results(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.result_types.extend(types);
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    pub fn build(mut self) -> Arc<Operation> {
        self.attributes.sort_by(|(a, _), (b, _)| a.cmp(b));
        Arc::new(Operation {
            id: next_entity_id(),
            name: self.name,
            operands: self.operands,
            attributes: self.attributes,
            result_types: self.result_types,
            regions: self.regions,
        })
    }
}
