//! Declarative attribute model.
//!
//! An [`AttrDescriptor`] is the static schema of an attribute kind: its
//! mnemonic, ordered parameter list, trait set and optional verification
//! hook. [`AttrInstance`]s are the canonical, interned values the
//! [`Context`] hands out for a `(descriptor, parameter tuple)` key.
//!
//! [`Context`]: crate::context::Context

pub mod descriptor;
pub mod instance;

pub use descriptor::{
    AttrDescriptor, AttrDescriptorRef, AttrTraitSet, ElementRepr, ElementSpec, ParamSpec, ParamType, TypeBuilderFn,
    VerifyFn,
};
pub use instance::{AttrInstance, AttrRef, AttrValue};
