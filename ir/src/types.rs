//! Interned IR value types and compile-time constant values.
//!
//! [`Type`] is a thin wrapper around a canonical, context-owned storage
//! allocation: two structurally equal kinds interned in the same [`Context`]
//! compare equal by pointer identity.
//!
//! [`Context`]: crate::context::Context

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

use tessel_dtype::{AddrSpace, DType};

/// Compile-time constant value carried by attributes and constant ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Wrapper for ConstValue that implements Eq and Hash.
///
/// Floats don't implement Eq/Hash due to IEEE 754 NaN semantics (NaN != NaN).
/// This wrapper uses bitwise comparison: two floats are equal if their bit
/// patterns match, which is what interning keys need.
#[derive(Debug, Clone, Copy)]
pub struct ConstValueHash(pub ConstValue);

impl PartialEq for ConstValueHash {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (ConstValue::Int(a), ConstValue::Int(b)) => a == b,
            (ConstValue::UInt(a), ConstValue::UInt(b)) => a == b,
            (ConstValue::Float(a), ConstValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::Bool(a), ConstValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValueHash {}

impl Hash for ConstValueHash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match self.0 {
            ConstValue::Int(v) => v.hash(state),
            ConstValue::UInt(v) => v.hash(state),
            ConstValue::Float(v) => v.to_bits().hash(state),
            ConstValue::Bool(v) => v.hash(state),
        }
    }
}

/// Matrix fragment operand role (MMA context).
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::AsRefStr, strum::EnumIter)]
#[derive(enumset::EnumSetType)]
#[strum(serialize_all = "snake_case")]
pub enum FragmentKind {
    /// Left-hand matrix operand.
    A,
    /// Right-hand matrix operand.
    B,
    /// Accumulator operand.
    Acc,
}

/// Structural type kind.
///
/// Kinds only reference element-level [`DType`]s, never other interned
/// types, so they hash and compare structurally without recursion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No-information type; default result type of attributes.
    Unit,
    /// Scalar or vector element type.
    Scalar(DType),
    /// Tensor-like shaped type over an element type.
    Shaped { shape: SmallVec<[i64; 4]>, element: DType },
    /// Hardware-register-resident tile of a matrix operand.
    Fragment { rows: i64, cols: i64, element: DType, operand: FragmentKind },
    /// Pointer into linear memory.
    Ptr { pointee: DType, addrspace: AddrSpace },
    /// Fixed-size aggregate of identical registers, produced by intrinsic
    /// lowering.
    Packed { count: usize, register: DType },
}

impl TypeKind {
    /// Whether values of this type are already in a lowered,
    /// hardware-representable form.
    ///
    /// Shaped and fragment types still need a type conversion before any
    /// intrinsic lowering rule may fire on them.
    pub fn is_lowered(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Ptr { .. } | Self::Packed { .. })
    }
}

pub(crate) struct TypeStorage {
    pub(crate) id: u64,
    pub(crate) kind: TypeKind,
}

/// Canonical, interned IR type.
///
/// Cheap to clone; equality is key identity (two types interned from equal
/// kinds in the same context are the same allocation).
#[derive(Clone)]
pub struct Type(pub(crate) Arc<TypeStorage>);

impl Type {
    /// Stable identifier of the canonical instance.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn is_lowered(&self) -> bool {
        self.0.kind.is_lowered()
    }

    /// Element dtype for scalar, shaped, fragment, pointer and packed kinds.
    pub fn element(&self) -> Option<&DType> {
        match self.kind() {
            TypeKind::Unit => None,
            TypeKind::Scalar(dt) => Some(dt),
            TypeKind::Shaped { element, .. } => Some(element),
            TypeKind::Fragment { element, .. } => Some(element),
            TypeKind::Ptr { pointee, .. } => Some(pointee),
            TypeKind::Packed { register, .. } => Some(register),
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0.kind)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            TypeKind::Unit => write!(f, "unit"),
            TypeKind::Scalar(dt) => write!(f, "{dt:?}"),
            TypeKind::Shaped { shape, element } => {
                write!(f, "shaped<")?;
                for dim in shape {
                    write!(f, "{dim}x")?;
                }
                write!(f, "{element:?}>")
            }
            TypeKind::Fragment { rows, cols, element, operand } => {
                write!(f, "fragment<{rows}x{cols}x{element:?}, {}>", operand.as_ref())
            }
            TypeKind::Ptr { pointee, addrspace } => write!(f, "ptr<{pointee:?}, {addrspace:?}>"),
            TypeKind::Packed { count, register } => write!(f, "packed<{count}x{register:?}>"),
        }
    }
}
