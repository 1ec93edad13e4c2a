use brick_base::Tensor;
use brick_image::{
    adjust, frame_info, greyscale, letterbox, resize, yuyv_to_frame, ImageError, Interpolation,
    LETTERBOX_COLOR,
};

fn solid(height: usize, width: usize, rgb: [u8; 3]) -> Tensor<u8> {
    Tensor::filled_hwc(height, width, &rgb).unwrap()
}

#[test]
fn test_letterbox_pads_vertically() {
    // 4x2 (w x h) into 4x4: two rows of padding, one above and one below
    let frame = solid(2, 4, [255, 0, 0]);
    let out = letterbox(&frame, Some((4, 4)), LETTERBOX_COLOR).unwrap();
    assert_eq!(out.shape, vec![4, 4, 3]);
    assert_eq!(out.pixel(0, 0), Some(&[114u8, 114, 114][..]));
    assert_eq!(out.pixel(1, 0), Some(&[255u8, 0, 0][..]));
    assert_eq!(out.pixel(2, 3), Some(&[255u8, 0, 0][..]));
    assert_eq!(out.pixel(3, 3), Some(&[114u8, 114, 114][..]));
}

#[test]
fn test_letterbox_odd_padding_goes_bottom_right() {
    // 2x2 into 4x3 scales to 3x3; the single padding column lands on the right
    let frame = solid(2, 2, [0, 0, 255]);
    let out = letterbox(&frame, Some((4, 3)), [0, 0, 0]).unwrap();
    assert_eq!(out.shape, vec![3, 4, 3]);
    assert_eq!(out.pixel(0, 0), Some(&[0u8, 0, 255][..]));
    assert_eq!(out.pixel(0, 2), Some(&[0u8, 0, 255][..]));
    assert_eq!(out.pixel(0, 3), Some(&[0u8, 0, 0][..]));
}

#[test]
fn test_letterbox_without_target_is_square() {
    let frame = solid(3, 6, [9, 9, 9]);
    let out = letterbox(&frame, None, LETTERBOX_COLOR).unwrap();
    assert_eq!(out.shape, vec![6, 6, 3]);
}

#[test]
fn test_letterbox_rejects_empty_target() {
    let frame = solid(2, 2, [0, 0, 0]);
    assert!(matches!(
        letterbox(&frame, Some((0, 4)), LETTERBOX_COLOR),
        Err(ImageError::Shape(_))
    ));
}

#[test]
fn test_resize_stretches_or_letterboxes() {
    let frame = solid(2, 4, [50, 60, 70]);

    let stretched = resize(&frame, (8, 8), false, Interpolation::Nearest).unwrap();
    assert_eq!(stretched.shape, vec![8, 8, 3]);
    assert!(stretched.data.chunks(3).all(|px| px == [50, 60, 70]));

    let boxed = resize(&frame, (8, 8), true, Interpolation::Linear).unwrap();
    assert_eq!(boxed.shape, vec![8, 8, 3]);
    assert_eq!(boxed.pixel(0, 0), Some(&LETTERBOX_COLOR[..]));
}

#[test]
fn test_adjust_brightness_and_contrast() {
    let frame = Tensor::from_hwc(1, 2, 3, vec![10, 100, 200, 0, 128, 255]).unwrap();
    let out = adjust(&frame, 10.0, 1.5, 1.0).unwrap();
    assert_eq!(out.data, vec![25, 160, 255, 10, 202, 255]);
}

#[test]
fn test_adjust_zero_saturation_is_grey() {
    let frame = solid(1, 1, [200, 100, 50]);
    let out = adjust(&frame, 0.0, 1.0, 0.0).unwrap();
    assert_eq!(out.data, vec![200, 200, 200]);
}

#[test]
fn test_adjust_saturation_needs_colour() {
    let frame = Tensor::from_hwc(1, 1, 1, vec![5u8]).unwrap();
    assert!(matches!(adjust(&frame, 0.0, 1.0, 2.0), Err(ImageError::Shape(_))));
    assert!(adjust(&frame, 5.0, 1.0, 1.0).is_ok());
}

#[test]
fn test_greyscale_keeps_three_channels() {
    let frame = Tensor::from_hwc(1, 2, 3, vec![255, 0, 0, 255, 255, 255]).unwrap();
    let out = greyscale(&frame).unwrap();
    assert_eq!(out.shape, vec![1, 2, 3]);
    assert_eq!(out.data, vec![76, 76, 76, 255, 255, 255]);
}

#[test]
fn test_frame_info() {
    let info = frame_info(&solid(480, 640, [0, 0, 0]));
    assert_eq!(info.height, 480);
    assert_eq!(info.width, 640);
    assert_eq!(info.channels, 3);
    assert_eq!(info.dtype, "u8");
    assert_eq!(info.size_bytes, 480 * 640 * 3);
    assert_eq!(info.shape, vec![480, 640, 3]);
}

#[test]
fn test_yuyv_to_frame_grey_pair() {
    let frame = yuyv_to_frame(&[128, 128, 64, 128], 2, 1).unwrap();
    assert_eq!(frame.shape, vec![1, 2, 3]);
    assert_eq!(frame.data, vec![128, 128, 128, 64, 64, 64]);
}

#[test]
fn test_yuyv_to_frame_short_buffer() {
    assert!(matches!(yuyv_to_frame(&[0u8; 6], 2, 2), Err(ImageError::Decode(_))));
}
