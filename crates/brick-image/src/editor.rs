//! Stateless frame transforms: letterboxing, resizing, colour adjustment,
//! greyscale conversion and compression.

use crate::convert::{from_dynamic, to_dynamic};
use crate::ImageError;
use brick_base::Tensor;
use crates_image::codecs::jpeg::JpegEncoder;
use crates_image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use crates_image::imageops::FilterType;
use crates_image::{ExtendedColorType, ImageEncoder};

/// Default padding colour of [`letterbox`].
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Resampling filter used by [`resize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    Cubic,
    Lanczos,
}

impl Interpolation {
    fn filter(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Linear => FilterType::Triangle,
            Interpolation::Cubic => FilterType::CatmullRom,
            Interpolation::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Dimensions and storage of a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub dtype: &'static str,
    pub size_bytes: usize,
    pub shape: Vec<usize>,
}

pub fn frame_info<T>(frame: &Tensor<T>) -> FrameInfo {
    FrameInfo {
        height: frame.height(),
        width: frame.width(),
        channels: frame.channels(),
        dtype: std::any::type_name::<T>(),
        size_bytes: frame.len() * std::mem::size_of::<T>(),
        shape: frame.shape.clone(),
    }
}

fn check_size(width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::Shape(format!("target size {width}x{height} is empty")));
    }
    Ok(())
}

fn check_frame(frame: &Tensor<u8>) -> Result<(), ImageError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ImageError::Shape(format!("empty frame {:?}", frame.shape)));
    }
    Ok(())
}

fn scaled(frame: &Tensor<u8>, width: u32, height: u32, filter: FilterType) -> Result<Tensor<u8>, ImageError> {
    let image = to_dynamic(frame)?;
    let resized = image.resize_exact(width, height, filter);
    from_dynamic(resized, frame.channels())
}

/// Padding value for one pixel of a frame with `channels` samples.
fn border_pixel(color: [u8; 3], channels: usize) -> Vec<u8> {
    match channels {
        1 => vec![color[0]],
        4 => vec![color[0], color[1], color[2], 255],
        _ => color.to_vec(),
    }
}

/// Fits `frame` inside `target` (width, height) keeping its aspect ratio and
/// pads the remainder with `color`.
///
/// Without a target the output is a square of the larger frame dimension.
/// An odd padding puts the extra row/column at the bottom/right.
pub fn letterbox(
    frame: &Tensor<u8>,
    target: Option<(u32, u32)>,
    color: [u8; 3],
) -> Result<Tensor<u8>, ImageError> {
    check_frame(frame)?;
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let (target_w, target_h) = target.unwrap_or((w.max(h), w.max(h)));
    check_size(target_w, target_h)?;

    let scale = f64::min(target_w as f64 / w as f64, target_h as f64 / h as f64);
    let new_w = ((w as f64 * scale) as u32).clamp(1, target_w);
    let new_h = ((h as f64 * scale) as u32).clamp(1, target_h);
    let inner = scaled(frame, new_w, new_h, FilterType::Triangle)?;

    let channels = inner.channels();
    let mut out = Tensor::filled_hwc(
        target_h as usize,
        target_w as usize,
        &border_pixel(color, channels),
    )?;
    let top = ((target_h - new_h) / 2) as usize;
    let left = ((target_w - new_w) / 2) as usize;
    let row_len = new_w as usize * channels;
    for (y, row) in inner.data.chunks_exact(row_len).enumerate() {
        let start = ((top + y) * target_w as usize + left) * channels;
        out.data[start..start + row_len].copy_from_slice(row);
    }
    Ok(out)
}

/// Resizes to `target` (width, height). With `maintain_aspect` the frame is
/// letterboxed with the default colour instead of stretched.
pub fn resize(
    frame: &Tensor<u8>,
    target: (u32, u32),
    maintain_aspect: bool,
    interpolation: Interpolation,
) -> Result<Tensor<u8>, ImageError> {
    if maintain_aspect {
        return letterbox(frame, Some(target), LETTERBOX_COLOR);
    }
    check_frame(frame)?;
    check_size(target.0, target.1)?;
    scaled(frame, target.0, target.1, interpolation.filter())
}

// saturate(|x * contrast + brightness|), rounded
fn scale_abs(value: u8, contrast: f32, brightness: f32) -> u8 {
    (value as f32 * contrast + brightness).abs().round().min(255.0) as u8
}

fn rgb_to_hsv(rgb: &[u8]) -> (f32, f32, f32) {
    let (r, g, b) = (rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = if max == 0.0 { 0.0 } else { delta / max };
    (hue, sat, max)
}

fn hsv_to_rgb(hue: f32, sat: f32, value: f32) -> [u8; 3] {
    let chroma = value * sat;
    let x = chroma * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = value - chroma;
    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    [
        (r + m).round().clamp(0.0, 255.0) as u8,
        (g + m).round().clamp(0.0, 255.0) as u8,
        (b + m).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Brightness offset, contrast gain and saturation gain.
///
/// Every sample becomes `saturate(|contrast * x + brightness|)`. A saturation
/// other than 1.0 then scales the HSV saturation of each RGB pixel (alpha is
/// left alone on 4-channel frames).
pub fn adjust(
    frame: &Tensor<u8>,
    brightness: f32,
    contrast: f32,
    saturation: f32,
) -> Result<Tensor<u8>, ImageError> {
    let channels = frame.channels();
    if saturation != 1.0 && !matches!(channels, 3 | 4) {
        return Err(ImageError::Shape(format!(
            "saturation needs a colour frame, got {channels} channel(s)"
        )));
    }

    let mut out = frame.clone();
    for sample in out.data.iter_mut() {
        *sample = scale_abs(*sample, contrast, brightness);
    }

    if saturation != 1.0 {
        for px in out.data.chunks_exact_mut(channels) {
            let (hue, sat, value) = rgb_to_hsv(&px[..3]);
            let rgb = hsv_to_rgb(hue, (sat * saturation).clamp(0.0, 1.0), value);
            px[..3].copy_from_slice(&rgb);
        }
    }
    Ok(out)
}

/// Luma (BT.601 weights) replicated into 3 channels.
pub fn greyscale(frame: &Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
    let channels = frame.channels();
    let mut data = Vec::with_capacity(frame.height() * frame.width() * 3);
    match channels {
        1 => {
            for &y in &frame.data {
                data.extend_from_slice(&[y, y, y]);
            }
        }
        3 | 4 => {
            for px in frame.data.chunks_exact(channels) {
                let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                let y = luma.round().min(255.0) as u8;
                data.extend_from_slice(&[y, y, y]);
            }
        }
        n => return Err(ImageError::Shape(format!("{n}-channel frames are not supported"))),
    }
    Ok(Tensor::from_hwc(frame.height(), frame.width(), 3, data)?)
}

fn color_type(channels: usize) -> Result<ExtendedColorType, ImageError> {
    match channels {
        1 => Ok(ExtendedColorType::L8),
        3 => Ok(ExtendedColorType::Rgb8),
        4 => Ok(ExtendedColorType::Rgba8),
        n => Err(ImageError::Encode(format!("cannot encode {n}-channel frame"))),
    }
}

/// JPEG bytes at `quality` (clamped to 1..=100). Alpha is dropped.
pub fn compress_to_jpeg(frame: &Tensor<u8>, quality: u8) -> Result<Vec<u8>, ImageError> {
    check_frame(frame)?;
    let frame = if frame.channels() == 4 {
        from_dynamic(to_dynamic(frame)?, 3)?
    } else {
        frame.clone()
    };
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).write_image(
        &frame.data,
        frame.width() as u32,
        frame.height() as u32,
        color_type(frame.channels())?,
    )?;
    Ok(buffer)
}

/// PNG bytes. `level` follows zlib's 0-9 scale (higher is smaller and slower).
pub fn compress_to_png(frame: &Tensor<u8>, level: u8) -> Result<Vec<u8>, ImageError> {
    check_frame(frame)?;
    let compression = match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        7..=9 => CompressionType::Best,
        _ => return Err(ImageError::Encode(format!("PNG compression level {level} is outside 0-9"))),
    };
    let mut buffer = Vec::new();
    PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive).write_image(
        &frame.data,
        frame.width() as u32,
        frame.height() as u32,
        color_type(frame.channels())?,
    )?;
    Ok(buffer)
}
