//! Local capture devices (V4L2 on Linux).

use crate::backend::CameraBackend;
use crate::config::{CameraConfig, CaptureFormat};
use crate::{CameraError, Frame};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Directory of stable per-device symlinks maintained by udev.
pub const STABLE_ID_DIR: &str = "/dev/v4l/by-id";

/// How a local device was named by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceId {
    /// Device number, used as is.
    Index(u32),
    /// Logical index as a digit string, or a `/dev/videoN` path.
    Name(String),
}

/// What the backend asks the device for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub resolution: Option<(u32, u32)>,
    pub fps: u32,
    pub format: CaptureFormat,
    pub buffer_count: u32,
}

/// What the device actually agreed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Negotiated {
    pub resolution: (u32, u32),
    pub fps: u32,
}

/// A capture device driver.
pub trait CaptureDevice: Send {
    /// Opens device number `index`, returning the settings in effect.
    fn open(&mut self, index: u32, request: &CaptureRequest) -> Result<Negotiated, CameraError>;

    /// Releases the device. Must be safe to call when not open.
    fn close(&mut self);

    /// Blocks until the next frame.
    fn blocking_capture(&mut self) -> Result<Frame, CameraError>;
}

// "usb-Vendor_Camera-video-index0" -> 0
fn trailing_index(entry: &str) -> Option<u32> {
    let digits = &entry[entry.rfind("index")? + "index".len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Maps logical indices to device numbers from the symlinks in `dir`.
fn stable_id_map(dir: &Path) -> HashMap<u32, u32> {
    let mut map = HashMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot read {}: {}", dir.display(), e);
            return map;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_link = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
        let Some(index) = entry.file_name().to_str().and_then(trailing_index) else {
            continue;
        };
        if !is_link {
            continue;
        }

        let target = fs::canonicalize(&path).or_else(|_| fs::read_link(&path));
        let number = target.ok().and_then(|target| {
            target
                .file_name()?
                .to_str()?
                .strip_prefix("video")?
                .parse::<u32>()
                .ok()
        });
        match number {
            Some(number) => {
                map.insert(index, number);
            }
            None => log::warn!("Could not resolve video device behind {}", path.display()),
        }
    }
    map
}

/// Resolves `id` to a device number using the stable-ID links in [`STABLE_ID_DIR`].
pub fn resolve_device_index(id: &DeviceId) -> Result<u32, CameraError> {
    resolve_device_index_in(Path::new(STABLE_ID_DIR), id)
}

/// Resolves `id` against the stable-ID links in `dir`.
///
/// A digit string is looked up as a logical index; when `dir` has no entry
/// for it the number itself is used. On hosts with several cameras the
/// logical and kernel numbering can differ, so the fallback may pick a
/// different device than intended.
pub fn resolve_device_index_in(dir: &Path, id: &DeviceId) -> Result<u32, CameraError> {
    let name = match id {
        DeviceId::Index(index) => return Ok(*index),
        DeviceId::Name(name) => name.trim(),
    };

    if let Some(number) = name.strip_prefix("/dev/video") {
        return number
            .parse()
            .map_err(|_| CameraError::Config(format!("Cannot resolve camera identifier: {name}")));
    }

    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        let logical: u32 = name
            .parse()
            .map_err(|_| CameraError::Config(format!("Camera index out of range: {name}")))?;
        return Ok(match stable_id_map(dir).get(&logical) {
            Some(&number) => number,
            None => {
                log::warn!(
                    "No stable-ID entry for camera index {logical} in {}, using it as the device number",
                    dir.display()
                );
                logical
            }
        });
    }

    Err(CameraError::Config(format!("Cannot resolve camera identifier: {name}")))
}

/// Driver used when no capture backend is compiled in.
#[cfg(not(feature = "v4l2"))]
struct UnsupportedDevice;

#[cfg(not(feature = "v4l2"))]
impl CaptureDevice for UnsupportedDevice {
    fn open(&mut self, index: u32, _request: &CaptureRequest) -> Result<Negotiated, CameraError> {
        Err(CameraError::Open(format!(
            "cannot open local camera {index}: built without the `v4l2` feature"
        )))
    }

    fn close(&mut self) {}

    fn blocking_capture(&mut self) -> Result<Frame, CameraError> {
        Err(CameraError::Read("no capture backend available".to_string()))
    }
}

fn default_device() -> Box<dyn CaptureDevice> {
    #[cfg(feature = "v4l2")]
    {
        Box::new(crate::v4l2::V4l2Device::new())
    }
    #[cfg(not(feature = "v4l2"))]
    {
        Box::new(UnsupportedDevice)
    }
}

/// Camera attached to this machine.
pub struct LocalDeviceBackend {
    index: u32,
    request: CaptureRequest,
    device: Box<dyn CaptureDevice>,
    negotiated: Option<Negotiated>,
}

impl LocalDeviceBackend {
    /// Resolves `id` and prepares the platform driver.
    pub fn new(id: DeviceId, config: &CameraConfig) -> Result<Self, CameraError> {
        Self::with_device(id, config, default_device())
    }

    /// Same as [`LocalDeviceBackend::new`] with an explicit driver.
    pub fn with_device(
        id: DeviceId,
        config: &CameraConfig,
        device: Box<dyn CaptureDevice>,
    ) -> Result<Self, CameraError> {
        let index = resolve_device_index(&id)?;
        Ok(Self {
            index,
            request: CaptureRequest {
                resolution: config.resolution(),
                fps: config.fps(),
                format: config.capture_format(),
                buffer_count: config.buffer_size(),
            },
            device,
            negotiated: None,
        })
    }

    /// Resolved device number.
    pub fn index(&self) -> u32 {
        self.index
    }

    fn report_negotiation(&self, actual: &Negotiated) {
        if let Some((width, height)) = self.request.resolution {
            if actual.resolution != (width, height) {
                log::warn!(
                    "Camera {} resolution set to {}x{} instead of requested {}x{}",
                    self.index,
                    actual.resolution.0,
                    actual.resolution.1,
                    width,
                    height
                );
            }
        }
        if self.request.fps > 0 && actual.fps != self.request.fps {
            log::warn!(
                "Camera {} FPS set to {} instead of requested {}",
                self.index,
                actual.fps,
                self.request.fps
            );
        }
    }
}

impl CameraBackend for LocalDeviceBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn open(&mut self) -> Result<(), CameraError> {
        let actual = self.device.open(self.index, &self.request).map_err(|e| match e {
            CameraError::Open(msg) => CameraError::Open(msg),
            other => CameraError::Open(format!("Failed to open camera {}: {other}", self.index)),
        })?;
        self.report_negotiation(&actual);
        self.negotiated = Some(actual);
        log::info!("Opened local camera with index {}", self.index);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.device.close();
        self.negotiated = None;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.negotiated.is_none() {
            return Ok(None);
        }
        match self.device.blocking_capture() {
            Ok(frame) => Ok(Some(frame)),
            Err(CameraError::Read(msg)) => Err(CameraError::Read(msg)),
            Err(other) => Err(CameraError::Read(format!(
                "Failed to read from camera {}: {other}",
                self.index
            ))),
        }
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        self.negotiated
            .map(|n| n.resolution)
            .or(self.request.resolution)
    }

    fn fps(&self) -> u32 {
        self.negotiated.map(|n| n.fps).unwrap_or(self.request.fps)
    }
}
