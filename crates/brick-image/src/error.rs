use std::fmt;

#[derive(Debug)]
pub enum ImageError {
    Decode(String),
    Encode(String),
    /// Frame layout the operation cannot handle (channel count, zero size).
    Shape(String),
    Tensor(brick_base::TensorError),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Decode(msg) => write!(f, "decode error: {msg}"),
            ImageError::Encode(msg) => write!(f, "encode error: {msg}"),
            ImageError::Shape(msg) => write!(f, "unsupported frame: {msg}"),
            ImageError::Tensor(err) => write!(f, "tensor error: {err}"),
        }
    }
}

impl std::error::Error for ImageError {}

impl From<crates_image::ImageError> for ImageError {
    fn from(err: crates_image::ImageError) -> Self {
        match err {
            crates_image::ImageError::Encoding(e) => ImageError::Encode(e.to_string()),
            other => ImageError::Decode(other.to_string()),
        }
    }
}

impl From<brick_base::TensorError> for ImageError {
    fn from(err: brick_base::TensorError) -> Self {
        ImageError::Tensor(err)
    }
}
