//! Target intrinsic catalog.
//!
//! A representative table of the warp-level matrix intrinsics the target
//! exposes, keyed by `(m, n, k, element type, layout, fragment)`. The
//! `infer_*_dimension` lookups answer the question a two-dimensional
//! fragment shape leaves open: which full `m x n x k` geometry a fragment
//! of that shape participates in.

use tessel_dtype::{DType, ScalarDType};
use tessel_ir::FragmentKind;

/// Element type as the intrinsic set distinguishes it.
///
/// `f32` on an A or B operand selects the reduced-precision `tf32` compute
/// path; `f32` on an accumulator stays `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MmaElementType {
    F16,
    F32,
    Tf32,
}

/// Fragment storage layout. Only row-major variants are cataloged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MmaLayout {
    Row,
    Col,
}

impl MmaElementType {
    /// Classify a fragment's element dtype for intrinsic selection.
    pub fn of_fragment(element: &DType, operand: FragmentKind) -> Option<Self> {
        match (element.scalar()?, operand) {
            (ScalarDType::Float16, _) => Some(Self::F16),
            (ScalarDType::Float32, FragmentKind::A | FragmentKind::B) => Some(Self::Tf32),
            (ScalarDType::Float32, FragmentKind::Acc) => Some(Self::F32),
            _ => None,
        }
    }
}

/// One load/store entry: a fragment of `frag` kind with element `elem`
/// participating in an `m x n x k` multiply-accumulate.
struct FragmentVariant {
    m: i64,
    n: i64,
    k: i64,
    elem: MmaElementType,
    frag: FragmentKind,
}

const fn v(m: i64, n: i64, k: i64, elem: MmaElementType, frag: FragmentKind) -> FragmentVariant {
    FragmentVariant { m, n, k, elem, frag }
}

/// Fragments the load intrinsics accept (row layout).
#[rustfmt::skip]
static LOAD_VARIANTS: &[FragmentVariant] = &[
    // f16 geometries
    v(16, 16, 16, MmaElementType::F16, FragmentKind::A),
    v(16, 16, 16, MmaElementType::F16, FragmentKind::B),
    v(16, 16, 16, MmaElementType::F16, FragmentKind::Acc),
    v(32, 8, 16, MmaElementType::F16, FragmentKind::A),
    v(32, 8, 16, MmaElementType::F16, FragmentKind::B),
    v(32, 8, 16, MmaElementType::F16, FragmentKind::Acc),
    v(8, 32, 16, MmaElementType::F16, FragmentKind::A),
    v(8, 32, 16, MmaElementType::F16, FragmentKind::B),
    v(8, 32, 16, MmaElementType::F16, FragmentKind::Acc),
    // f32 accumulators for the f16 geometries
    v(16, 16, 16, MmaElementType::F32, FragmentKind::Acc),
    v(32, 8, 16, MmaElementType::F32, FragmentKind::Acc),
    v(8, 32, 16, MmaElementType::F32, FragmentKind::Acc),
    // tf32 compute path
    v(16, 16, 8, MmaElementType::Tf32, FragmentKind::A),
    v(16, 16, 8, MmaElementType::Tf32, FragmentKind::B),
    v(16, 16, 8, MmaElementType::F32, FragmentKind::Acc),
];

/// `(m, n, k, element)` tuples the store intrinsics accept (row layout,
/// accumulator fragments only).
#[rustfmt::skip]
static STORE_VARIANTS: &[(i64, i64, i64, MmaElementType)] = &[
    (16, 16, 16, MmaElementType::F16),
    (32, 8, 16, MmaElementType::F16),
    (8, 32, 16, MmaElementType::F16),
    (16, 16, 16, MmaElementType::F32),
    (32, 8, 16, MmaElementType::F32),
    (8, 32, 16, MmaElementType::F32),
    (16, 16, 8, MmaElementType::F32),
];

/// `(m, n, k, source element, accumulator element)` tuples the
/// multiply-accumulate intrinsics accept (row x row).
#[rustfmt::skip]
static MMA_VARIANTS: &[(i64, i64, i64, MmaElementType, MmaElementType)] = &[
    (16, 16, 16, MmaElementType::F16, MmaElementType::F16),
    (16, 16, 16, MmaElementType::F16, MmaElementType::F32),
    (32, 8, 16, MmaElementType::F16, MmaElementType::F16),
    (32, 8, 16, MmaElementType::F16, MmaElementType::F32),
    (8, 32, 16, MmaElementType::F16, MmaElementType::F16),
    (8, 32, 16, MmaElementType::F16, MmaElementType::F32),
    (16, 16, 8, MmaElementType::Tf32, MmaElementType::F32),
];

pub fn load_intrinsic_exists(
    m: i64,
    n: i64,
    k: i64,
    layout: MmaLayout,
    elem: MmaElementType,
    frag: FragmentKind,
) -> bool {
    layout == MmaLayout::Row
        && LOAD_VARIANTS.iter().any(|e| (e.m, e.n, e.k, e.elem, e.frag) == (m, n, k, elem, frag))
}

pub fn store_intrinsic_exists(m: i64, n: i64, k: i64, layout: MmaLayout, elem: MmaElementType) -> bool {
    layout == MmaLayout::Row && STORE_VARIANTS.contains(&(m, n, k, elem))
}

pub fn mma_intrinsic_exists(
    m: i64,
    n: i64,
    k: i64,
    layout_a: MmaLayout,
    layout_b: MmaLayout,
    src: MmaElementType,
    acc: MmaElementType,
) -> bool {
    layout_a == MmaLayout::Row && layout_b == MmaLayout::Row && MMA_VARIANTS.contains(&(m, n, k, src, acc))
}

/// Infer `n` for an A fragment whose shape fixes `(m, k)`.
pub fn infer_n_dimension(m: i64, k: i64, elem: MmaElementType) -> Option<i64> {
    LOAD_VARIANTS.iter().find(|e| e.frag == FragmentKind::A && (e.m, e.k, e.elem) == (m, k, elem)).map(|e| e.n)
}

/// Infer `m` for a B fragment whose shape fixes `(k, n)`.
pub fn infer_m_dimension(k: i64, n: i64, elem: MmaElementType) -> Option<i64> {
    LOAD_VARIANTS.iter().find(|e| e.frag == FragmentKind::B && (e.k, e.n, e.elem) == (k, n, elem)).map(|e| e.m)
}

/// Infer `k` for an accumulator fragment whose shape fixes `(m, n)`.
pub fn infer_k_dimension(m: i64, n: i64, elem: MmaElementType) -> Option<i64> {
    LOAD_VARIANTS.iter().find(|e| e.frag == FragmentKind::Acc && (e.m, e.n, e.elem) == (m, n, elem)).map(|e| e.k)
}

/// Register layout of a lowered fragment: `(register count, register type)`.
///
/// Mirrors the target's packing: f16 fragments travel as pairs packed into
/// two-element vectors, f32 accumulators and tf32 operands as scalar
/// registers.
pub fn fragment_registers(elem: MmaElementType, frag: FragmentKind) -> (usize, DType) {
    match (elem, frag) {
        (MmaElementType::F16, FragmentKind::A | FragmentKind::B) => (8, DType::Float16.vec(2)),
        (MmaElementType::F16, FragmentKind::Acc) => (4, DType::Float16.vec(2)),
        (MmaElementType::F32, _) => (8, DType::Float32),
        (MmaElementType::Tf32, _) => (4, DType::Float32),
    }
}
