use brick_base::{Tensor, TensorError};

#[test]
fn test_tensor_new_valid() {
    let tensor = Tensor::new(vec![2, 3], vec![1u8, 2, 3, 4, 5, 6]).unwrap();
    assert_eq!(tensor.shape, vec![2, 3]);
    assert_eq!(tensor.len(), 6);
    assert_eq!(tensor.ndim(), 2);
}

#[test]
fn test_tensor_new_shape_mismatch() {
    let result = Tensor::new(vec![2, 3], vec![1u8, 2, 3]);
    assert_eq!(
        result.unwrap_err(),
        TensorError::ShapeMismatch {
            expected: 6,
            got: 3
        }
    );
}

#[test]
fn test_tensor_new_overflow() {
    let result = Tensor::<u8>::new(vec![usize::MAX, 2], vec![]);
    assert!(matches!(result, Err(TensorError::ShapeOverflow)));
}

#[test]
fn test_tensor_hwc_accessors() {
    let tensor = Tensor::from_hwc(2, 3, 3, (0..18u8).collect()).unwrap();
    assert_eq!(tensor.height(), 2);
    assert_eq!(tensor.width(), 3);
    assert_eq!(tensor.channels(), 3);
    assert_eq!(tensor.pixel(0, 0), Some(&[0u8, 1, 2][..]));
    assert_eq!(tensor.pixel(1, 2), Some(&[15u8, 16, 17][..]));
    assert_eq!(tensor.pixel(2, 0), None);
    assert_eq!(tensor.pixel(0, 3), None);
}

#[test]
fn test_tensor_two_dimensional_counts_as_single_channel() {
    let tensor = Tensor::new(vec![2, 2], vec![9u8; 4]).unwrap();
    assert_eq!(tensor.channels(), 1);
    assert_eq!(tensor.pixel(1, 1), Some(&[9u8][..]));
}

#[test]
fn test_tensor_filled_hwc() {
    let tensor = Tensor::filled_hwc(2, 2, &[114u8, 114, 114]).unwrap();
    assert_eq!(tensor.shape, vec![2, 2, 3]);
    assert!(tensor.data.iter().all(|&v| v == 114));
}

#[test]
fn test_tensor_debug_omits_samples() {
    let tensor = Tensor::from_hwc(1, 1, 3, vec![1u8, 2, 3]).unwrap();
    let printed = format!("{:?}", tensor);
    assert!(printed.contains("shape: [1, 1, 3]"));
    assert!(printed.contains("len: 3"));
}
