use test_case::test_case;

use tessel_dtype::DType;
use tessel_ir::FragmentKind;

use crate::intrinsics::*;

#[test_case(DType::Float16, FragmentKind::A, Some(MmaElementType::F16); "f16_a")]
#[test_case(DType::Float16, FragmentKind::Acc, Some(MmaElementType::F16); "f16_acc")]
#[test_case(DType::Float32, FragmentKind::A, Some(MmaElementType::Tf32); "f32_a_is_tf32")]
#[test_case(DType::Float32, FragmentKind::B, Some(MmaElementType::Tf32); "f32_b_is_tf32")]
#[test_case(DType::Float32, FragmentKind::Acc, Some(MmaElementType::F32); "f32_acc_stays_f32")]
#[test_case(DType::Float64, FragmentKind::A, None; "f64_unsupported")]
#[test_case(DType::Int32, FragmentKind::Acc, None; "int_unsupported")]
fn test_element_classification(element: DType, frag: FragmentKind, expected: Option<MmaElementType>) {
    assert_eq!(MmaElementType::of_fragment(&element, frag), expected);
}

#[test_case(16, 16, MmaElementType::F16, Some(16); "a_16x16_f16")]
#[test_case(32, 16, MmaElementType::F16, Some(8); "a_32x16_f16")]
#[test_case(8, 16, MmaElementType::F16, Some(32); "a_8x16_f16")]
#[test_case(16, 8, MmaElementType::Tf32, Some(16); "a_16x8_tf32")]
#[test_case(7, 7, MmaElementType::F16, None; "a_odd_shape")]
fn test_infer_n(m: i64, k: i64, elem: MmaElementType, expected: Option<i64>) {
    assert_eq!(infer_n_dimension(m, k, elem), expected);
}

#[test_case(16, 16, MmaElementType::F16, Some(16); "b_16x16_f16")]
#[test_case(16, 8, MmaElementType::F16, Some(32); "b_16x8_f16")]
#[test_case(16, 32, MmaElementType::F16, Some(8); "b_16x32_f16")]
fn test_infer_m(k: i64, n: i64, elem: MmaElementType, expected: Option<i64>) {
    assert_eq!(infer_m_dimension(k, n, elem), expected);
}

#[test_case(16, 16, MmaElementType::F16, Some(16); "acc_16x16_f16")]
#[test_case(16, 16, MmaElementType::F32, Some(16); "acc_16x16_f32")]
#[test_case(32, 8, MmaElementType::F32, Some(16); "acc_32x8_f32")]
#[test_case(16, 16, MmaElementType::Tf32, None; "acc_never_tf32")]
fn test_infer_k(m: i64, n: i64, elem: MmaElementType, expected: Option<i64>) {
    assert_eq!(infer_k_dimension(m, n, elem), expected);
}

#[test]
fn test_catalog_lookups() {
    assert!(load_intrinsic_exists(16, 16, 16, MmaLayout::Row, MmaElementType::F16, FragmentKind::A));
    assert!(!load_intrinsic_exists(16, 16, 16, MmaLayout::Col, MmaElementType::F16, FragmentKind::A));
    assert!(!load_intrinsic_exists(7, 7, 7, MmaLayout::Row, MmaElementType::F16, FragmentKind::A));

    assert!(store_intrinsic_exists(16, 16, 16, MmaLayout::Row, MmaElementType::F32));
    assert!(!store_intrinsic_exists(16, 16, 8, MmaLayout::Row, MmaElementType::F16));

    assert!(mma_intrinsic_exists(16, 16, 16, MmaLayout::Row, MmaLayout::Row, MmaElementType::F16, MmaElementType::F32));
    assert!(mma_intrinsic_exists(16, 16, 8, MmaLayout::Row, MmaLayout::Row, MmaElementType::Tf32, MmaElementType::F32));
    assert!(!mma_intrinsic_exists(16, 16, 16, MmaLayout::Row, MmaLayout::Row, MmaElementType::F32, MmaElementType::F32));
}

#[test]
fn test_register_layouts() {
    assert_eq!(fragment_registers(MmaElementType::F16, FragmentKind::A), (8, DType::Float16.vec(2)));
    assert_eq!(fragment_registers(MmaElementType::F16, FragmentKind::Acc), (4, DType::Float16.vec(2)));
    assert_eq!(fragment_registers(MmaElementType::F32, FragmentKind::Acc), (8, DType::Float32));
    assert_eq!(fragment_registers(MmaElementType::Tf32, FragmentKind::A), (4, DType::Float32));
}
