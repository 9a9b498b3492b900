//! Attribute descriptors: the declarative schema of an attribute kind.

use std::sync::Arc;

use enumset::{EnumSet, EnumSetType};

use crate::attr::instance::AttrValue;
use crate::context::Context;
use crate::types::Type;

/// Semantic type of one attribute parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum ParamType {
    Int,
    Float,
    IntArray,
    Str,
    Type,
    Attr,
}

/// One declared parameter of an attribute.
///
/// Parameter order is significant and fixed at definition time: it
/// determines both construction-call order and printed form.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    /// Derive this parameter's value from the attribute's own result type
    /// instead of taking it from the supplied value tuple.
    pub self_type: bool,
}

/// Representations an element-iterable attribute can be viewed through.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(EnumSetType)]
pub enum ElementRepr {
    /// The backing `i64` buffer itself.
    Raw,
    /// Elements wrapped as [`ConstValue`]s.
    ///
    /// [`ConstValue`]: crate::types::ConstValue
    Value,
    /// Widened `i128` view.
    Wide,
}

/// Element-iteration extension block.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    /// Index of the integer-array parameter that backs the views.
    pub param: usize,
    pub reprs: EnumSet<ElementRepr>,
}

/// Capability flags plus optional extension blocks.
///
/// Unsupported operations are rejected when the descriptor is defined, not
/// when an instance is used.
#[derive(Debug, Clone, Default)]
pub struct AttrTraitSet {
    pub element_iterable: Option<ElementSpec>,
    pub sub_elements: bool,
}

/// Custom verification hook, run once before the first interning of a key.
pub type VerifyFn = Arc<dyn Fn(&[AttrValue]) -> Result<(), String> + Send + Sync>;

/// Override for the default result-type derivation.
pub type TypeBuilderFn = Arc<dyn Fn(&Context, &[AttrValue]) -> Type + Send + Sync>;

/// Declarative schema of an attribute kind.
#[derive(derive_more::Debug, Clone)]
pub struct AttrDescriptor {
    pub name: String,
    pub mnemonic: String,
    pub params: Vec<ParamSpec>,
    pub traits: AttrTraitSet,
    #[debug(skip)]
    pub type_builder: Option<TypeBuilderFn>,
    #[debug(skip)]
    pub verifier: Option<VerifyFn>,
}

impl AttrDescriptor {
    pub fn new(name: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mnemonic: mnemonic.into(),
            params: Vec::new(),
            traits: AttrTraitSet::default(),
            type_builder: None,
            verifier: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec { name: name.into(), ty, self_type: false });
        self
    }

    /// Declare a parameter whose value is the attribute's own result type.
    pub fn self_type_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec { name: name.into(), ty: ParamType::Type, self_type: true });
        self
    }

    pub fn iterable(mut self, param: usize, reprs: EnumSet<ElementRepr>) -> Self {
        self.traits.element_iterable = Some(ElementSpec { param, reprs });
        self
    }

    pub fn sub_elements(mut self) -> Self {
        self.traits.sub_elements = true;
        self
    }

    pub fn type_builder(mut self, f: impl Fn(&Context, &[AttrValue]) -> Type + Send + Sync + 'static) -> Self {
        self.type_builder = Some(Arc::new(f));
        self
    }

    pub fn verifier(mut self, f: impl Fn(&[AttrValue]) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.verifier = Some(Arc::new(f));
        self
    }

    pub fn has_custom_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    /// Position of the self-type parameter, if declared.
    pub fn self_type_position(&self) -> Option<usize> {
        self.params.iter().position(|p| p.self_type)
    }

    /// Number of values the caller supplies (self-type excluded).
    pub fn supplied_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.self_type).count()
    }
}

/// A descriptor registered with a context.
///
/// The id keys the interning table; it is assigned by
/// [`Context::define`](crate::context::Context::define).
#[derive(Debug, Clone)]
pub struct AttrDescriptorRef {
    pub(crate) id: u64,
    pub(crate) inner: Arc<AttrDescriptor>,
}

impl AttrDescriptorRef {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::ops::Deref for AttrDescriptorRef {
    type Target = AttrDescriptor;

    fn deref(&self) -> &AttrDescriptor {
        &self.inner
    }
}
