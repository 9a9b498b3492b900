//! Canonical attribute instances and their typed views.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::attr::descriptor::{AttrDescriptorRef, ElementRepr, ParamType};
use crate::context::Context;
use crate::error::{ConstructionError, SubElementIndexOutOfRangeSnafu, SubElementsNotSupportedSnafu};
use crate::types::{ConstValue, Type};

/// Runtime value of one attribute parameter.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    IntArray(Arc<[i64]>),
    Str(String),
    Type(Type),
    Attr(AttrRef),
}

impl AttrValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::IntArray(_) => ParamType::IntArray,
            Self::Str(_) => ParamType::Str,
            Self::Type(_) => ParamType::Type,
            Self::Attr(_) => ParamType::Attr,
        }
    }

    pub fn int_array(values: &[i64]) -> Self {
        Self::IntArray(values.into())
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<Type> for AttrValue {
    fn from(v: Type) -> Self {
        Self::Type(v)
    }
}

impl From<AttrRef> for AttrValue {
    fn from(v: AttrRef) -> Self {
        Self::Attr(v)
    }
}

// Equality and hashing key the interning table. Interned children (types,
// attributes) compare by stable id: id equality implies structural equality
// once everything flows through one context. Floats compare bitwise, the
// same convention ConstValueHash uses.
impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::IntArray(a), Self::IntArray(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Attr(a), Self::Attr(b)) => a.id == b.id,
            _ => false,
        }
    }
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::IntArray(v) => v.hash(state),
            Self::Str(v) => v.hash(state),
            Self::Type(v) => v.hash(state),
            Self::Attr(v) => v.id.hash(state),
        }
    }
}

/// Canonical attribute instance, owned by the context's instance store.
///
/// Never constructed directly: obtained through
/// [`Context::attr`](crate::context::Context::attr), which interns by
/// `(descriptor, parameter tuple, result type)`. Equality is key identity
/// (`Arc::ptr_eq` or [`AttrInstance::id`]), not deep comparison.
pub struct AttrInstance {
    pub(crate) id: u64,
    pub(crate) descriptor: AttrDescriptorRef,
    pub(crate) values: Box<[AttrValue]>,
    pub(crate) ty: Type,
}

pub type AttrRef = Arc<AttrInstance>;

impl AttrInstance {
    /// Stable identifier of the canonical instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn descriptor(&self) -> &AttrDescriptorRef {
        &self.descriptor
    }

    pub fn mnemonic(&self) -> &str {
        &self.descriptor.mnemonic
    }

    /// The attribute's own result type.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// All parameter values in declaration order (self-type included).
    pub fn values(&self) -> &[AttrValue] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&AttrValue> {
        self.values.get(index)
    }

    pub fn value_named(&self, name: &str) -> Option<&AttrValue> {
        let index = self.descriptor.params.iter().position(|p| p.name == name)?;
        self.values.get(index)
    }

    /// First integer parameter, if any.
    pub fn int(&self) -> Option<i64> {
        self.values.iter().find_map(|v| match v {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        })
    }

    /// First string parameter, if any.
    pub fn str(&self) -> Option<&str> {
        self.values.iter().find_map(|v| match v {
            AttrValue::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// First integer-array parameter, if any.
    pub fn as_i64_slice(&self) -> Option<&[i64]> {
        self.values.iter().find_map(|v| match v {
            AttrValue::IntArray(a) => Some(&a[..]),
            _ => None,
        })
    }

    // =========================================================================
    // Element iteration (element-iterable trait)
    // =========================================================================

    fn iterable_buffer(&self, repr: ElementRepr) -> &[i64] {
        let spec = self
            .descriptor
            .traits
            .element_iterable
            .as_ref()
            .unwrap_or_else(|| panic!("attribute '{}' is not element-iterable", self.mnemonic()));
        debug_assert!(spec.reprs.contains(repr), "representation {repr:?} not declared for '{}'", self.mnemonic());
        match &self.values[spec.param] {
            AttrValue::IntArray(a) => a,
            // define() rejects iterable specs over non-array parameters
            _ => unreachable!("iterable parameter is validated to be an integer array at definition time"),
        }
    }

    /// Borrowed view of the raw element buffer.
    pub fn raw_elements(&self) -> &[i64] {
        self.iterable_buffer(ElementRepr::Raw)
    }

    /// Lazy [`ConstValue`] view over the same backing buffer.
    pub fn element_values(&self) -> impl Iterator<Item = ConstValue> + '_ {
        self.iterable_buffer(ElementRepr::Value).iter().map(|&v| ConstValue::Int(v))
    }

    /// Lazy widened view over the same backing buffer.
    pub fn elements_wide(&self) -> impl Iterator<Item = i128> + '_ {
        self.iterable_buffer(ElementRepr::Wide).iter().map(|&v| v as i128)
    }

    // =========================================================================
    // Sub-elements (sub-element trait)
    // =========================================================================

    /// Positions of the immediate attribute/type children among the
    /// parameter values.
    fn sub_element_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| matches!(v, AttrValue::Attr(_) | AttrValue::Type(_)))
            .map(|(i, _)| i)
    }

    pub fn sub_element_count(&self) -> usize {
        self.sub_element_positions().count()
    }

    /// Visit the immediate attribute/type children in parameter order.
    pub fn visit_sub_elements(&self, mut visitor: impl FnMut(usize, &AttrValue)) {
        for (index, position) in self.sub_element_positions().enumerate() {
            visitor(index, &self.values[position]);
        }
    }

    /// Rebuild this attribute with its `index`-th immediate child replaced.
    ///
    /// Copy-on-write: the original instance is untouched, the result is
    /// re-interned (and re-verified) through the context.
    pub fn with_replaced_sub_element(
        &self,
        ctx: &Context,
        index: usize,
        new_value: AttrValue,
    ) -> Result<AttrRef, ConstructionError> {
        snafu::ensure!(
            self.descriptor.traits.sub_elements,
            SubElementsNotSupportedSnafu { mnemonic: self.mnemonic() }
        );
        let count = self.sub_element_count();
        let Some(position) = self.sub_element_positions().nth(index) else {
            return SubElementIndexOutOfRangeSnafu { mnemonic: self.mnemonic(), index, count }.fail();
        };

        let mut values = self.values.to_vec();
        values[position] = new_value;

        // Replacing the self-type parameter changes the result type as well.
        let ty = match (self.descriptor.self_type_position(), &values[position]) {
            (Some(p), AttrValue::Type(t)) if p == position => t.clone(),
            _ => self.ty.clone(),
        };

        ctx.intern_attr(&self.descriptor, values, ty)
    }
}

impl std::fmt::Debug for AttrInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}<", self.mnemonic())?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match v {
                AttrValue::Attr(a) => write!(f, "#{}[id={}]", a.mnemonic(), a.id)?,
                other => write!(f, "{other:?}")?,
            }
        }
        write!(f, ">")
    }
}
