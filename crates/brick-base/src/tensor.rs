use std::fmt;

#[derive(Debug, PartialEq)]
pub enum TensorError {
    ShapeOverflow,
    ShapeMismatch { expected: usize, got: usize },
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorError::ShapeOverflow => write!(f, "shape dimensions overflow when multiplied"),
            TensorError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {expected} elements, got {got}")
            }
        }
    }
}

impl std::error::Error for TensorError {}

/// Dense row-major buffer with a shape.
///
/// Frames use HWC layout: `[height, width, channels]`, interleaved samples.
#[derive(Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> fmt::Debug for Tensor<T> {
    // frames are large, print the shape only
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("len", &self.data.len())
            .finish()
    }
}

fn element_count(shape: &[usize]) -> Result<usize, TensorError> {
    shape.iter().try_fold(1usize, |product, &dim| {
        product.checked_mul(dim).ok_or(TensorError::ShapeOverflow)
    })
}

impl<T> Tensor<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self, TensorError> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(TensorError::ShapeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Build an HWC tensor of `height` rows, `width` columns and `channels`
    /// interleaved samples per pixel.
    pub fn from_hwc(
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<T>,
    ) -> Result<Self, TensorError> {
        Self::new(vec![height, width, channels], data)
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn height(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(0)
    }

    /// Samples per pixel. A 2-D tensor counts as single-channel.
    pub fn channels(&self) -> usize {
        match self.shape.len() {
            0 | 1 => 0,
            2 => 1,
            _ => self.shape[2],
        }
    }

    /// Samples of the pixel at row `y`, column `x`, or `None` outside the frame.
    pub fn pixel(&self, y: usize, x: usize) -> Option<&[T]> {
        if y >= self.height() || x >= self.width() {
            return None;
        }
        let channels = self.channels();
        let start = (y * self.width() + x) * channels;
        self.data.get(start..start + channels)
    }
}

impl<T: Clone> Tensor<T> {
    /// HWC tensor where every pixel holds `value`.
    pub fn filled_hwc(height: usize, width: usize, value: &[T]) -> Result<Self, TensorError> {
        let pixels = height.checked_mul(width).ok_or(TensorError::ShapeOverflow)?;
        let mut data = Vec::with_capacity(pixels.saturating_mul(value.len()));
        for _ in 0..pixels {
            data.extend_from_slice(value);
        }
        Self::from_hwc(height, width, value.len(), data)
    }
}
