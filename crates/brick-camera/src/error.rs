use std::fmt;

/// Camera failures, split by when they can happen.
#[derive(Debug)]
pub enum CameraError {
    /// Unsupported source, URL or option. Raised before any resource is touched.
    Config(String),
    /// Acquiring the device, stream or server failed. Nothing is left open.
    Open(String),
    /// A local device read failed.
    Read(String),
    /// The frame adjuster rejected a frame.
    Transform(String),
    /// An outbound message could not be delivered to the connected client.
    Send(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::Config(msg) => write!(f, "camera config error: {msg}"),
            CameraError::Open(msg) => write!(f, "camera open error: {msg}"),
            CameraError::Read(msg) => write!(f, "camera read error: {msg}"),
            CameraError::Transform(msg) => write!(f, "frame transformation failed: {msg}"),
            CameraError::Send(msg) => write!(f, "camera send error: {msg}"),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<brick_image::ImageError> for CameraError {
    fn from(err: brick_image::ImageError) -> Self {
        CameraError::Transform(err.to_string())
    }
}

impl From<url::ParseError> for CameraError {
    fn from(err: url::ParseError) -> Self {
        CameraError::Config(format!("invalid URL: {err}"))
    }
}
