use crate::backend::Backend;
use crate::config::CameraConfig;
use crate::inbound::InboundSocketBackend;
use crate::local::{DeviceId, LocalDeviceBackend};
use crate::network::NetworkStreamBackend;
use crate::CameraError;
use std::fmt;
use url::Url;

pub const DEFAULT_INBOUND_HOST: &str = "localhost";
pub const DEFAULT_INBOUND_PORT: u16 = 8080;

/// What the caller passed to pick a camera: a device number or a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraSource {
    Index(i64),
    Text(String),
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::Index(index) => write!(f, "{index}"),
            CameraSource::Text(text) => f.write_str(text),
        }
    }
}

macro_rules! source_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CameraSource {
                fn from(value: $ty) -> Self {
                    CameraSource::Index(value as i64)
                }
            }
        )*
    };
}

source_from_int!(i32, u32, i64, u8, u16);

impl From<usize> for CameraSource {
    fn from(value: usize) -> Self {
        CameraSource::Index(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for CameraSource {
    fn from(value: &str) -> Self {
        CameraSource::Text(value.to_string())
    }
}

impl From<String> for CameraSource {
    fn from(value: String) -> Self {
        CameraSource::Text(value)
    }
}

/// The backend a source maps to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    LocalDevice(DeviceId),
    NetworkStream(String),
    InboundSocket { host: String, port: u16 },
}

fn unsupported(source: &CameraSource) -> CameraError {
    CameraError::Config(format!("Unsupported camera source: {source}"))
}

/// Decides which backend serves `source`.
pub fn classify(source: &CameraSource) -> Result<SourceKind, CameraError> {
    let text = match source {
        CameraSource::Index(index) => {
            return u32::try_from(*index)
                .map(|index| SourceKind::LocalDevice(DeviceId::Index(index)))
                .map_err(|_| unsupported(source));
        }
        CameraSource::Text(text) => text.trim(),
    };

    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(SourceKind::LocalDevice(DeviceId::Name(text.to_string())));
    }
    if text.starts_with("/dev/video") {
        return Ok(SourceKind::LocalDevice(DeviceId::Name(text.to_string())));
    }

    let Ok(url) = Url::parse(text) else {
        return Err(unsupported(source));
    };
    match url.scheme() {
        "http" | "https" | "rtsp" => Ok(SourceKind::NetworkStream(text.to_string())),
        "ws" | "wss" => Ok(SourceKind::InboundSocket {
            host: url
                .host_str()
                .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
                .unwrap_or_else(|| DEFAULT_INBOUND_HOST.to_string()),
            port: url.port().unwrap_or(DEFAULT_INBOUND_PORT),
        }),
        _ => Err(unsupported(source)),
    }
}

/// Builds the backend for `source`. Nothing is opened yet.
pub fn create_backend(source: &CameraSource, config: &CameraConfig) -> Result<Backend, CameraError> {
    let backend = match classify(source)? {
        SourceKind::LocalDevice(id) => LocalDeviceBackend::new(id, config)?.into(),
        SourceKind::NetworkStream(url) => NetworkStreamBackend::new(&url, config)?.into(),
        SourceKind::InboundSocket { host, port } => InboundSocketBackend::new(host, port, config).into(),
    };
    Ok(backend)
}
