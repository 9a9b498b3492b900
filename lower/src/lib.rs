//! Lowering of abstract matrix-fragment operations to target intrinsics.
//!
//! The `mma` dialect models hardware-agnostic fragment loads, stores,
//! multiply-accumulates and constant materializations over [`Fragment`]
//! types. The rewrite rules in this crate translate them into `intrin`
//! dialect calls, inferring the matrix dimension a two-dimensional fragment
//! shape cannot determine and validating the result against the intrinsic
//! catalog. Rules decline softly: operands that have not been type-converted
//! yet report "not yet converted" and the driver retries them on a later
//! sweep; configurations without a matching intrinsic report "unsupported
//! variant".
//!
//! [`Fragment`]: tessel_ir::TypeKind::Fragment

pub mod intrinsics;
pub mod ops;
pub mod patterns;

#[cfg(test)]
mod test;

pub use intrinsics::{MmaElementType, MmaLayout};
pub use patterns::register_mma_lowering;
