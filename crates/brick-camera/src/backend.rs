use crate::inbound::{InboundSocketBackend, OutboundMessage};
use crate::local::LocalDeviceBackend;
use crate::network::NetworkStreamBackend;
use crate::{CameraError, Frame};
use std::net::SocketAddr;

/// Lifecycle every camera transport implements.
///
/// `open`/`close` are only called by the `Camera` facade, which guarantees
/// they alternate. `read` returns `Ok(None)` when no frame is available.
pub trait CameraBackend: Send {
    fn name(&self) -> &'static str;
    fn open(&mut self) -> Result<(), CameraError>;
    fn close(&mut self) -> Result<(), CameraError>;
    fn read(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Capture size in effect: the negotiated one once opened, else the requested one.
    fn resolution(&self) -> Option<(u32, u32)>;

    /// Frame rate in effect, same rules as `resolution`.
    fn fps(&self) -> u32;
}

/// The closed set of transports a `Camera` can wrap.
pub enum Backend {
    Local(LocalDeviceBackend),
    Network(NetworkStreamBackend),
    Inbound(InboundSocketBackend),
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            Backend::Local($backend) => $call,
            Backend::Network($backend) => $call,
            Backend::Inbound($backend) => $call,
        }
    };
}

impl CameraBackend for Backend {
    fn name(&self) -> &'static str {
        dispatch!(self, b => b.name())
    }

    fn open(&mut self) -> Result<(), CameraError> {
        dispatch!(self, b => b.open())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        dispatch!(self, b => b.close())
    }

    fn read(&mut self) -> Result<Option<Frame>, CameraError> {
        dispatch!(self, b => b.read())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        dispatch!(self, b => b.resolution())
    }

    fn fps(&self) -> u32 {
        dispatch!(self, b => b.fps())
    }
}

impl Backend {
    /// Address the inbound socket server is bound to, while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Backend::Inbound(b) => b.local_addr(),
            _ => None,
        }
    }

    /// Sends a message to the client connected to an inbound socket camera.
    pub fn send_message(&self, message: OutboundMessage) -> Result<(), CameraError> {
        match self {
            Backend::Inbound(b) => b.send_message(message),
            other => Err(CameraError::Send(format!(
                "{} cameras have no connected client to message",
                other.name()
            ))),
        }
    }
}

impl From<LocalDeviceBackend> for Backend {
    fn from(backend: LocalDeviceBackend) -> Self {
        Backend::Local(backend)
    }
}

impl From<NetworkStreamBackend> for Backend {
    fn from(backend: NetworkStreamBackend) -> Self {
        Backend::Network(backend)
    }
}

impl From<InboundSocketBackend> for Backend {
    fn from(backend: InboundSocketBackend) -> Self {
        Backend::Inbound(backend)
    }
}
