//! Unified camera capture for the brick crates.
//!
//! A [`Camera`] wraps one of three backends, picked from a source descriptor:
//! a local capture device (index, digit string or `/dev/videoN`), a network
//! stream (`http`, `https`, `rtsp`) or an inbound WebSocket server (`ws`,
//! `wss`) that a remote producer pushes frames into.

pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod factory;
mod http;
pub mod inbound;
pub mod local;
pub mod network;
pub mod queue;

#[cfg(feature = "rtsp")]
mod rtsp;
#[cfg(feature = "v4l2")]
mod v4l2;

pub use backend::{Backend, CameraBackend};
pub use camera::Camera;
pub use config::{CameraConfig, CaptureFormat, FrameFormat};
pub use error::CameraError;
pub use factory::{classify, create_backend, CameraSource, SourceKind};
pub use inbound::{InboundSocketBackend, OutboundMessage};
pub use local::{CaptureDevice, CaptureRequest, DeviceId, LocalDeviceBackend, Negotiated};
pub use network::{FrameStream, NetworkStreamBackend, StreamOpener, StreamTarget};
pub use queue::FrameSlot;

/// A captured image: `[height, width, 3]` RGB bytes.
pub type Frame = brick_base::Tensor<u8>;
