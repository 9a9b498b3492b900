//! Interning context: the attribute instance store and the type store.
//!
//! The context is explicit, caller-owned state: everything that needs a
//! canonical instance takes a `&Context`. There is no hidden global store.
//!
//! # Thread Safety
//!
//! Both interning tables are lock-free concurrent HashMaps (papaya).
//! Constructing the same attribute from different threads returns the same
//! `Arc<AttrInstance>`, so `Arc::ptr_eq` works across thread boundaries.
//! First-time construction uses double-checked insertion: the losing side of
//! a race drops its candidate and adopts the winner's instance.
//!
//! # Memory Management
//!
//! Interning tables are append-only and hold strong references: an instance
//! lives at least as long as the owning context and is never individually
//! destroyed. This is amortized for compiler-process lifetime; dropping the
//! context drops the arena.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use papaya::{Compute, HashMap as ConcurrentMap, Operation};
use parking_lot::RwLock;
use smallvec::SmallVec;
use snafu::ensure;

use crate::attr::{AttrDescriptor, AttrDescriptorRef, AttrInstance, AttrRef, AttrValue, ElementRepr, ParamType};
use crate::diagnostics::Diagnostics;
use crate::error::{
    ConstructionError, DefinitionError, DuplicateMnemonicSnafu, MissingResultTypeSnafu, MultipleSelfTypeParamsSnafu,
    ParameterArityMismatchSnafu, ParameterTypeMismatchSnafu, UnsupportedIterableReprSnafu, VerificationFailedSnafu,
};
use crate::types::{Type, TypeKind, TypeStorage};
use tessel_dtype::{AddrSpace, DType};

// Global atomic counter for stable entity identifiers (types, attributes,
// operations, blocks). Monotonic and never reused; Relaxed is sufficient
// since only uniqueness matters, not synchronization.
static ENTITY_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_entity_id() -> u64 {
    ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Interning key for attribute instances.
///
/// The result type participates in the key: the same parameter tuple under
/// two different result types yields two distinct instances.
#[derive(Clone, PartialEq, Eq, Hash)]
struct AttrKey {
    descriptor: u64,
    values: Box<[AttrValue]>,
    ty: Type,
}

/// Descriptors of the always-present `builtin` dialect.
struct BuiltinAttrs {
    int: AttrDescriptorRef,
    float: AttrDescriptorRef,
    str: AttrDescriptorRef,
    dense_i64: AttrDescriptorRef,
}

impl BuiltinAttrs {
    fn register(ctx: &Context) -> Self {
        let int = AttrDescriptor::new("IntAttr", "int")
            .param("value", ParamType::Int)
            .type_builder(|ctx, _| ctx.scalar_type(DType::Int64));
        let float = AttrDescriptor::new("FloatAttr", "float")
            .param("value", ParamType::Float)
            .type_builder(|ctx, _| ctx.scalar_type(DType::Float64));
        let str = AttrDescriptor::new("StrAttr", "str").param("value", ParamType::Str);
        let dense_i64 = AttrDescriptor::new("DenseI64ArrayAttr", "dense_i64")
            .param("values", ParamType::IntArray)
            .iterable(0, ElementRepr::Raw | ElementRepr::Value | ElementRepr::Wide);

        // The builtin dialect is registered exactly once, before any user
        // dialect can collide with it.
        let define = |d| ctx.define("builtin", d).expect("builtin dialect registers once");
        Self { int: define(int), float: define(float), str: define(str), dense_i64: define(dense_i64) }
    }
}

/// Process-wide (per-pipeline) interning context.
pub struct Context {
    types: ConcurrentMap<TypeKind, Type>,
    attrs: ConcurrentMap<AttrKey, AttrRef>,
    dialects: RwLock<HashMap<String, HashMap<String, AttrDescriptorRef>>>,
    diagnostics: Diagnostics,
    builtin: OnceLock<BuiltinAttrs>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            types: ConcurrentMap::new(),
            attrs: ConcurrentMap::new(),
            dialects: RwLock::new(HashMap::new()),
            diagnostics: Diagnostics::default(),
            builtin: OnceLock::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn builtin(&self) -> &BuiltinAttrs {
        self.builtin.get_or_init(|| BuiltinAttrs::register(self))
    }

    // =========================================================================
    // Dialect registry
    // =========================================================================

    /// Register an attribute descriptor under a dialect namespace.
    ///
    /// Fails with [`DefinitionError::DuplicateMnemonic`] if the mnemonic is
    /// already taken in that dialect. Trait declarations are validated here
    /// so that unsupported views fail at definition time, never at runtime.
    pub fn define(&self, dialect: &str, descriptor: AttrDescriptor) -> Result<AttrDescriptorRef, DefinitionError> {
        ensure!(
            descriptor.params.iter().filter(|p| p.self_type).count() <= 1,
            MultipleSelfTypeParamsSnafu { mnemonic: descriptor.mnemonic.clone() }
        );
        if let Some(spec) = &descriptor.traits.element_iterable {
            let backing = descriptor.params.get(spec.param);
            ensure!(
                !spec.reprs.is_empty() && backing.is_some_and(|p| p.ty == ParamType::IntArray),
                UnsupportedIterableReprSnafu { mnemonic: descriptor.mnemonic.clone(), param: spec.param }
            );
        }

        let mut dialects = self.dialects.write();
        let namespace = dialects.entry(dialect.to_owned()).or_default();
        ensure!(
            !namespace.contains_key(&descriptor.mnemonic),
            DuplicateMnemonicSnafu { dialect, mnemonic: descriptor.mnemonic.clone() }
        );

        let registered = AttrDescriptorRef { id: next_entity_id(), inner: descriptor.into() };
        namespace.insert(registered.mnemonic.clone(), registered.clone());
        tracing::debug!(dialect, mnemonic = %registered.mnemonic, "registered attribute descriptor");
        Ok(registered)
    }

    /// Look up a registered descriptor by dialect and mnemonic.
    pub fn lookup(&self, dialect: &str, mnemonic: &str) -> Option<AttrDescriptorRef> {
        self.dialects.read().get(dialect)?.get(mnemonic).cloned()
    }

    // =========================================================================
    // Attribute instance store
    // =========================================================================

    /// Return the canonical instance for `(descriptor, values)`.
    ///
    /// Two constructions with structurally equal parameter tuples yield the
    /// same instance. If the descriptor declares a self-type parameter its
    /// value is spliced in from `result_type` rather than drawn from
    /// `values`; a custom type builder otherwise overrides the default
    /// result-type derivation.
    pub fn attr(
        &self,
        descriptor: &AttrDescriptorRef,
        values: Vec<AttrValue>,
        result_type: Option<Type>,
    ) -> Result<AttrRef, ConstructionError> {
        ensure!(
            values.len() == descriptor.supplied_arity(),
            ParameterArityMismatchSnafu {
                mnemonic: descriptor.mnemonic.clone(),
                expected: descriptor.supplied_arity(),
                got: values.len(),
            }
        );

        let ty = match result_type {
            Some(ty) => ty,
            None => match &descriptor.type_builder {
                Some(build) => build(self, &values),
                None if descriptor.self_type_position().is_some() => {
                    return MissingResultTypeSnafu { mnemonic: descriptor.mnemonic.clone() }.fail();
                }
                None => self.unit_type(),
            },
        };

        let mut full_values = values;
        if let Some(position) = descriptor.self_type_position() {
            full_values.insert(position, AttrValue::Type(ty.clone()));
        }

        self.intern_attr(descriptor, full_values, ty)
    }

    /// Intern a fully-populated parameter tuple (self-type already spliced).
    ///
    /// Runs the per-parameter type checks and, for a previously unseen key,
    /// the custom verification hook. Verification failure aborts the
    /// construction before anything is inserted: no partially-constructed
    /// instance is ever observable.
    pub(crate) fn intern_attr(
        &self,
        descriptor: &AttrDescriptorRef,
        full_values: Vec<AttrValue>,
        ty: Type,
    ) -> Result<AttrRef, ConstructionError> {
        for (param, value) in descriptor.params.iter().zip(&full_values) {
            ensure!(
                value.param_type() == param.ty,
                ParameterTypeMismatchSnafu {
                    mnemonic: descriptor.mnemonic.clone(),
                    param: param.name.clone(),
                    expected: param.ty,
                    got: value.param_type(),
                }
            );
        }

        let key = AttrKey { descriptor: descriptor.id, values: full_values.into(), ty: ty.clone() };
        let guard = self.attrs.guard();

        // Fast path: the key has been constructed (and verified) before.
        if let Some(existing) = self.attrs.get(&key, &guard) {
            return Ok(existing.clone());
        }

        // First construction of this key: run the verification hook before
        // anything becomes observable.
        if let Some(verify) = &descriptor.verifier {
            verify(&key.values).map_err(|reason| {
                VerificationFailedSnafu { mnemonic: descriptor.mnemonic.clone(), reason }.build()
            })?;
        }

        let candidate = AttrRef::new(AttrInstance {
            id: next_entity_id(),
            descriptor: descriptor.clone(),
            values: key.values.clone(),
            ty,
        });

        // Double-checked insertion: insert our instance, unless another
        // thread won the race, in which case adopt its canonical one.
        let result = self.attrs.compute(
            key,
            |entry| match entry {
                Some((_, existing)) => Operation::Abort(existing.clone()),
                None => Operation::Insert(candidate.clone()),
            },
            &guard,
        );

        Ok(match result {
            Compute::Aborted(existing) => existing,
            _ => candidate,
        })
    }

    // =========================================================================
    // Builtin attribute shorthands
    // =========================================================================

    pub fn int_attr(&self, value: i64) -> AttrRef {
        self.attr(&self.builtin().int, vec![value.into()], None)
            .expect("builtin int attribute parameters are well-typed")
    }

    pub fn float_attr(&self, value: f64) -> AttrRef {
        self.attr(&self.builtin().float, vec![value.into()], None)
            .expect("builtin float attribute parameters are well-typed")
    }

    pub fn str_attr(&self, value: &str) -> AttrRef {
        self.attr(&self.builtin().str, vec![value.into()], None)
            .expect("builtin str attribute parameters are well-typed")
    }

    /// Rectangular integer-array attribute (segment sizes, index attributes).
    pub fn dense_i64_attr(&self, values: &[i64]) -> AttrRef {
        self.attr(&self.builtin().dense_i64, vec![AttrValue::int_array(values)], None)
            .expect("builtin dense array attribute parameters are well-typed")
    }

    // =========================================================================
    // Type store
    // =========================================================================

    /// Return the canonical type for `kind`.
    pub fn ty(&self, kind: TypeKind) -> Type {
        let guard = self.types.guard();
        if let Some(existing) = self.types.get(&kind, &guard) {
            return existing.clone();
        }

        let candidate = Type(TypeStorage { id: next_entity_id(), kind: kind.clone() }.into());
        let result = self.types.compute(
            kind,
            |entry| match entry {
                Some((_, existing)) => Operation::Abort(existing.clone()),
                None => Operation::Insert(candidate.clone()),
            },
            &guard,
        );

        match result {
            Compute::Aborted(existing) => existing,
            _ => candidate,
        }
    }

    pub fn unit_type(&self) -> Type {
        self.ty(TypeKind::Unit)
    }

    pub fn scalar_type(&self, dtype: DType) -> Type {
        self.ty(TypeKind::Scalar(dtype))
    }

    pub fn shaped_type(&self, shape: &[i64], element: DType) -> Type {
        self.ty(TypeKind::Shaped { shape: SmallVec::from_slice(shape), element })
    }

    pub fn fragment_type(&self, rows: i64, cols: i64, element: DType, operand: crate::types::FragmentKind) -> Type {
        self.ty(TypeKind::Fragment { rows, cols, element, operand })
    }

    pub fn ptr_type(&self, pointee: DType, addrspace: AddrSpace) -> Type {
        self.ty(TypeKind::Ptr { pointee, addrspace })
    }

    pub fn packed_type(&self, count: usize, register: DType) -> Type {
        self.ty(TypeKind::Packed { count, register })
    }
}
