use crate::ImageError;
use brick_base::Tensor;
use crates_image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

// BT.601, studio swing ignored
fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = y + 1.402 * (v - 128.0);
    let g = y - 0.344 * (u - 128.0) - 0.714 * (v - 128.0);
    let b = y + 1.772 * (u - 128.0);
    [
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
    ]
}

/// Converts a packed YUYV (4:2:2) buffer into an RGB frame.
///
/// Every 4 bytes `[Y0, U, Y1, V]` carry two pixels sharing U and V. Extra
/// trailing bytes are ignored; a short buffer or odd width is an error.
pub fn yuyv_to_frame(data: &[u8], width: u32, height: u32) -> Result<Tensor<u8>, ImageError> {
    let (width, height) = (width as usize, height as usize);
    if width % 2 != 0 {
        return Err(ImageError::Shape(format!("YUYV width must be even, got {width}")));
    }
    let needed = width * height * 2;
    if data.len() < needed {
        return Err(ImageError::Decode(format!(
            "YUYV buffer too short: {} bytes for {}x{}",
            data.len(),
            width,
            height
        )));
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for quad in data[..needed].chunks_exact(4) {
        let (u, v) = (quad[1] as f32, quad[3] as f32);
        rgb.extend_from_slice(&yuv_to_rgb(quad[0] as f32, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(quad[2] as f32, u, v));
    }
    Ok(Tensor::from_hwc(height, width, 3, rgb)?)
}

/// Views a frame as an `image` crate buffer. 1, 3 and 4 channels are supported.
pub(crate) fn to_dynamic(frame: &Tensor<u8>) -> Result<DynamicImage, ImageError> {
    if frame.ndim() != 3 && frame.ndim() != 2 {
        return Err(ImageError::Shape(format!("expected HWC frame, got shape {:?}", frame.shape)));
    }
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let data = frame.data.clone();
    let invalid = || ImageError::Shape(format!("buffer does not match shape {:?}", frame.shape));
    match frame.channels() {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8).ok_or_else(invalid),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8).ok_or_else(invalid),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8).ok_or_else(invalid),
        n => Err(ImageError::Shape(format!("{n}-channel frames are not supported"))),
    }
}

/// Back to a frame, keeping the channel count of `channels`.
pub(crate) fn from_dynamic(image: DynamicImage, channels: usize) -> Result<Tensor<u8>, ImageError> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let data = match channels {
        1 => image.into_luma8().into_raw(),
        4 => image.into_rgba8().into_raw(),
        _ => image.into_rgb8().into_raw(),
    };
    let channels = if matches!(channels, 1 | 4) { channels } else { 3 };
    Ok(Tensor::from_hwc(height, width, channels, data)?)
}
