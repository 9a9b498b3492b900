//! Proptest strategies shared by this crate and downstream crates.

use proptest::prelude::*;

/// Integer arrays of the sizes index attributes realistically carry.
pub fn int_array() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(-1024i64..1024, 0..16)
}

/// Small iteration-space ranks.
pub fn rank() -> impl Strategy<Value = usize> {
    1usize..5
}
