//! Frame codecs and pure frame transforms for the brick crates.
//!
//! Frames are `Tensor<u8>` in HWC layout `[height, width, channels]` with
//! RGB channel order. Decoding always yields 3 channels.

pub mod adjuster;
pub mod convert;
pub mod editor;
pub mod error;

pub use adjuster::{adjusted, greyscaled, letterboxed, resized, FrameAdjuster, Pipeline};
pub use convert::yuyv_to_frame;
pub use editor::{
    adjust, compress_to_jpeg, compress_to_png, frame_info, greyscale, letterbox, resize,
    FrameInfo, Interpolation, LETTERBOX_COLOR,
};
pub use error::ImageError;

use brick_base::Tensor;

/// Decodes compressed image bytes (JPEG, PNG, ...) into an RGB frame.
///
/// The format is auto-detected. Greyscale and alpha inputs are converted
/// to 3-channel RGB, 16-bit and float inputs are scaled down to 8 bits.
pub fn decode_image(data: &[u8]) -> Result<Tensor<u8>, ImageError> {
    let rgb = crates_image::load_from_memory(data)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Tensor::from_hwc(
        height as usize,
        width as usize,
        3,
        rgb.into_raw(),
    )?)
}

/// [`decode_image`] on the tokio blocking pool.
pub async fn decode_image_async(data: Vec<u8>) -> Result<Tensor<u8>, ImageError> {
    tokio::task::spawn_blocking(move || decode_image(&data))
        .await
        .map_err(|e| ImageError::Decode(format!("decode task failed: {e}")))?
}
