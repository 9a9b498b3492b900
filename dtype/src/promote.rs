//! Type promotion lattice.
//!
//! Used by the structured-op region builder to pick the result type of a
//! binary scalar function when its operands disagree.

use enumset::EnumSet;

use super::*;

impl ScalarDType {
    const fn promotion_lattice(self) -> &'static [Self] {
        use ScalarDType::*;
        match self {
            Bool => &[Int8, UInt8],
            Int8 => &[Int16],
            Int16 => &[Int32],
            Int32 => &[Int64],
            Int64 => &[Float16, BFloat16],
            UInt8 => &[Int16, UInt16],
            UInt16 => &[Int32, UInt32],
            UInt32 => &[Int64, UInt64],
            UInt64 => &[Float16, BFloat16],
            Float16 => &[Float32],
            BFloat16 => &[Float32],
            Float32 => &[Float64],
            Float64 | Void | Index => &[],
        }
    }

    fn recursive_parents(self) -> EnumSet<Self> {
        self.promotion_lattice()
            .iter()
            .fold(EnumSet::only(self), |dtypes, &parent| dtypes.union(parent.recursive_parents()))
    }

    /// Check if casting `self` to `to` preserves every value.
    pub fn can_safe_cast(self, to: Self) -> bool {
        // Same type, or from Bool (Bool can cast to anything)
        if self == to || matches!(self, Self::Bool) {
            return true;
        }

        // Any integer widens to Index
        if matches!(to, Self::Index) {
            return self.is_int();
        }

        let from_bytes = self.bytes();
        let to_bytes = to.bytes();
        match (self.is_unsigned(), self.is_signed(), self.is_float(), to.is_unsigned(), to.is_signed(), to.is_float())
        {
            // Unsigned -> Unsigned: only if target is larger
            (true, _, _, true, _, _) => from_bytes < to_bytes,
            // Signed -> Signed: only if target is same size or larger
            (_, true, _, _, true, _) => from_bytes <= to_bytes,
            // Unsigned -> Signed: only if target is strictly larger
            (true, _, _, _, true, _) => from_bytes < to_bytes,
            // Integer -> Float: safe if integer is Int32 or smaller
            (_, _, false, _, _, true) => from_bytes <= Self::Int32.bytes(),
            // Float -> Float: only if target is larger
            (_, _, true, _, _, true) => from_bytes < to_bytes,
            _ => false,
        }
    }
}

impl DType {
    /// Find the least upper bound type for a set of dtypes.
    ///
    /// Returns the smallest type that all input types can be safely cast to.
    pub fn least_upper_dtype(dtypes: &[Self]) -> Option<Self> {
        if dtypes.is_empty() {
            return None;
        }

        // Identical Ptr types promote to themselves
        let first = &dtypes[0];
        if matches!(first, DType::Ptr { .. }) && dtypes.iter().all(|d| d == first) {
            return Some(first.clone());
        }

        // Common scalar type via promotion lattice intersection.
        // min by discriminant (= priority: lower = more specific).
        let scalar = dtypes
            .iter()
            .map(|d| d.base())
            .map(|s| s.recursive_parents())
            .reduce(|lhs, rhs| lhs.intersection(rhs))?
            .iter()
            .min()?;

        Some(DType::Scalar(scalar))
    }
}
