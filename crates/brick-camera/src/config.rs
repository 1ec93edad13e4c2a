use crate::CameraError;
use brick_image::FrameAdjuster;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Encoding of frames pushed by a client to the inbound socket camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameFormat {
    /// Text (or binary) message holding base64 of a compressed image.
    #[default]
    Base64,
    /// Binary message holding the compressed image bytes.
    Binary,
    /// JSON object with the base64 image under `"image"` or `"frame"`.
    Json,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameFormat::Base64 => "base64",
            FrameFormat::Binary => "binary",
            FrameFormat::Json => "json",
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameFormat {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base64" => Ok(FrameFormat::Base64),
            "binary" => Ok(FrameFormat::Binary),
            "json" => Ok(FrameFormat::Json),
            other => Err(CameraError::Config(format!(
                "unsupported frame format '{other}' (expected base64, binary or json)"
            ))),
        }
    }
}

/// Pixel format requested from a local capture device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureFormat {
    #[default]
    Mjpeg,
    Yuyv,
}

impl FromStr for CaptureFormat {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mjpeg" | "mjpg" => Ok(CaptureFormat::Mjpeg),
            "yuyv" | "yuy2" => Ok(CaptureFormat::Yuyv),
            other => Err(CameraError::Config(format!("unsupported capture format '{other}'"))),
        }
    }
}

/// Options shared by every camera source.
///
/// Options that only apply to one kind of source (credentials for network
/// streams, frame format for the inbound socket, capture format for local
/// devices) are ignored by the others.
#[derive(Clone)]
pub struct CameraConfig {
    resolution: Option<(u32, u32)>,
    fps: u32,
    adjuster: Option<Arc<dyn FrameAdjuster>>,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    frame_format: FrameFormat,
    capture_format: CaptureFormat,
    buffer_size: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            resolution: Some((640, 480)),
            fps: 10,
            adjuster: None,
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            frame_format: FrameFormat::Base64,
            capture_format: CaptureFormat::Mjpeg,
            buffer_size: 1,
        }
    }
}

impl fmt::Debug for CameraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraConfig")
            .field("resolution", &self.resolution)
            .field("fps", &self.fps)
            .field("adjuster", &self.adjuster.is_some())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("frame_format", &self.frame_format)
            .field("capture_format", &self.capture_format)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

impl CameraConfig {
    /// Request a capture size in pixels.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }

    /// Leave the capture size to the source.
    pub fn with_auto_resolution(mut self) -> Self {
        self.resolution = None;
        self
    }

    /// Target frame rate. 0 disables throttling.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Post-processing applied to every captured frame.
    pub fn with_adjuster(mut self, adjuster: impl FrameAdjuster + 'static) -> Self {
        self.adjuster = Some(Arc::new(adjuster));
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Connect and read timeout for network streams; handshake and startup timeout
    /// for the inbound socket server.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_frame_format(mut self, frame_format: FrameFormat) -> Self {
        self.frame_format = frame_format;
        self
    }

    pub fn with_capture_format(mut self, capture_format: CaptureFormat) -> Self {
        self.capture_format = capture_format;
        self
    }

    /// Driver-side frame buffers for local devices. 1 keeps only the newest.
    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    // Getters
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn adjuster(&self) -> Option<&Arc<dyn FrameAdjuster>> {
        self.adjuster.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn frame_format(&self) -> FrameFormat {
        self.frame_format
    }

    pub fn capture_format(&self) -> CaptureFormat {
        self.capture_format
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Minimum spacing between two captures, `None` when unthrottled.
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.fps > 0).then(|| Duration::from_secs_f64(1.0 / self.fps as f64))
    }
}
