use crate::backend::{Backend, CameraBackend};
use crate::config::CameraConfig;
use crate::factory::{create_backend, CameraSource};
use crate::inbound::OutboundMessage;
use crate::{CameraError, Frame};
use brick_image::FrameAdjuster;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct CameraState {
    backend: Backend,
    started: bool,
    last_capture: Instant,
}

/// Unified camera over any [`Backend`].
///
/// All methods take `&self` and are serialized by an internal lock, so one
/// `Camera` can be shared between threads. Dropping it stops it.
pub struct Camera {
    state: Mutex<CameraState>,
    interval: Option<Duration>,
    adjuster: Option<Arc<dyn FrameAdjuster>>,
}

impl Camera {
    /// Picks the backend for `source` and wraps it. Nothing is opened until [`Camera::start`].
    pub fn new(source: impl Into<CameraSource>, config: CameraConfig) -> Result<Self, CameraError> {
        let backend = create_backend(&source.into(), &config)?;
        Ok(Self::from_backend(backend, config))
    }

    /// Wraps an explicitly built backend.
    pub fn from_backend(backend: impl Into<Backend>, config: CameraConfig) -> Self {
        Self {
            state: Mutex::new(CameraState {
                backend: backend.into(),
                started: false,
                last_capture: Instant::now(),
            }),
            interval: config.frame_interval(),
            adjuster: config.adjuster().cloned(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens the backend. Does nothing when already started.
    pub fn start(&self) -> Result<(), CameraError> {
        let mut state = self.lock();
        if state.started {
            return Ok(());
        }

        if let Err(e) = state.backend.open() {
            if let Err(close_err) = state.backend.close() {
                log::warn!("Cleanup after failed start also failed: {close_err}");
            }
            return Err(match e {
                CameraError::Open(msg) => CameraError::Open(msg),
                other => CameraError::Open(format!("Failed to start camera: {other}")),
            });
        }

        state.started = true;
        state.last_capture = Instant::now();
        log::info!("Successfully started {}", state.backend.name());
        Ok(())
    }

    /// Releases the backend. Does nothing when not started.
    pub fn stop(&self) {
        let mut state = self.lock();
        if !state.started {
            return;
        }
        if let Err(e) = state.backend.close() {
            log::warn!("Failed to stop {}: {e}", state.backend.name());
        }
        state.started = false;
        log::info!("Stopped {}", state.backend.name());
    }

    /// Next frame, throttled to the configured FPS and passed through the adjuster.
    ///
    /// `Ok(None)` when the camera is not started or no frame is available.
    pub fn capture(&self) -> Result<Option<Frame>, CameraError> {
        if let Some(interval) = self.interval {
            let elapsed = self.lock().last_capture.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }

        let mut state = self.lock();
        if !state.started {
            return Ok(None);
        }
        let Some(frame) = state.backend.read()? else {
            return Ok(None);
        };
        state.last_capture = Instant::now();

        match &self.adjuster {
            Some(adjuster) => adjuster.apply(frame).map(Some).map_err(CameraError::from),
            None => Ok(Some(frame)),
        }
    }

    /// Same as [`Camera::capture`].
    pub fn produce(&self) -> Result<Option<Frame>, CameraError> {
        self.capture()
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.lock().backend.resolution()
    }

    pub fn fps(&self) -> u32 {
        self.lock().backend.fps()
    }

    pub fn backend_name(&self) -> &'static str {
        self.lock().backend.name()
    }

    /// Bound address of an inbound socket camera while started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().backend.local_addr()
    }

    /// Sends `message` to the client connected to an inbound socket camera.
    pub fn send_message(&self, message: impl Into<OutboundMessage>) -> Result<(), CameraError> {
        self.lock().backend.send_message(message.into())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop();
    }
}
