//! Pull-style network cameras: RTSP, MJPEG over HTTP(S) and HTTP snapshots.

use crate::backend::CameraBackend;
use crate::config::CameraConfig;
use crate::{CameraError, Frame};
use base64::Engine;
use std::time::Duration;
use url::Url;

const SUPPORTED_SCHEMES: [&str; 3] = ["http", "https", "rtsp"];

/// Where and how to connect.
#[derive(Clone, Debug)]
pub struct StreamTarget {
    /// URL as configured, used for logging and HTTP requests.
    pub url: Url,
    /// `url` with the credentials in its authority.
    pub authenticated_url: Url,
    pub credentials: Option<(String, String)>,
    pub timeout: Duration,
}

impl StreamTarget {
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// `Authorization` header value for HTTP basic auth.
    pub fn basic_auth(&self) -> Option<String> {
        self.credentials.as_ref().map(|(user, pass)| {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            format!("Basic {token}")
        })
    }
}

/// An open network stream.
pub trait FrameStream: Send {
    /// Next decoded frame. An error means this read produced nothing.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// False once the connection is gone and reads can no longer succeed.
    fn is_open(&self) -> bool;
}

/// Connects streams for a [`NetworkStreamBackend`].
pub trait StreamOpener: Send {
    fn open(&mut self, target: &StreamTarget) -> Result<Box<dyn FrameStream>, CameraError>;
}

/// HTTP(S) through `ureq`, RTSP through GStreamer when the `rtsp` feature is on.
#[derive(Debug, Default)]
pub struct DefaultStreamOpener;

impl StreamOpener for DefaultStreamOpener {
    fn open(&mut self, target: &StreamTarget) -> Result<Box<dyn FrameStream>, CameraError> {
        if target.is_http() {
            return Ok(Box::new(crate::http::HttpFrameStream::connect(target)?));
        }

        #[cfg(feature = "rtsp")]
        {
            Ok(Box::new(crate::rtsp::RtspFrameStream::connect(target)?))
        }
        #[cfg(not(feature = "rtsp"))]
        {
            Err(CameraError::Open(format!(
                "cannot open {}: built without the `rtsp` feature",
                target.url
            )))
        }
    }
}

/// Puts `username`/`password` into the authority of `url` unless it already
/// carries a user name.
pub fn inject_credentials(url: &Url, username: &str, password: &str) -> Result<Url, CameraError> {
    let mut authenticated = url.clone();
    if !url.username().is_empty() {
        return Ok(authenticated);
    }
    authenticated
        .set_username(username)
        .and_then(|_| authenticated.set_password(Some(password)))
        .map_err(|_| CameraError::Config(format!("URL {url} cannot carry credentials")))?;
    Ok(authenticated)
}

/// HEAD request that must answer 200 or 206.
pub(crate) fn probe(target: &StreamTarget) -> Result<(), CameraError> {
    let agent = ureq::AgentBuilder::new()
        .timeout(target.timeout)
        .redirects(5)
        .build();
    let mut request = agent.head(target.url.as_str());
    if let Some(auth) = target.basic_auth() {
        request = request.set("Authorization", &auth);
    }

    let status = match request.call() {
        Ok(response) => response.status(),
        Err(ureq::Error::Status(code, _)) => code,
        Err(e) => {
            return Err(CameraError::Open(format!(
                "Cannot reach HTTP camera {}: {e}",
                target.url
            )));
        }
    };
    match status {
        200 | 206 => Ok(()),
        code => Err(CameraError::Open(format!(
            "HTTP camera returned status {code}: {}",
            target.url
        ))),
    }
}

/// Network camera that reconnects on demand.
pub struct NetworkStreamBackend {
    target: StreamTarget,
    resolution: Option<(u32, u32)>,
    fps: u32,
    opener: Box<dyn StreamOpener>,
    stream: Option<Box<dyn FrameStream>>,
}

impl NetworkStreamBackend {
    pub fn new(url: &str, config: &CameraConfig) -> Result<Self, CameraError> {
        Self::with_opener(url, config, Box::new(DefaultStreamOpener))
    }

    /// Validates `url` and uses `opener` to connect.
    pub fn with_opener(
        url: &str,
        config: &CameraConfig,
        opener: Box<dyn StreamOpener>,
    ) -> Result<Self, CameraError> {
        let url = Url::parse(url)?;
        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(CameraError::Config(format!(
                "Unsupported URL scheme '{}' (expected http, https or rtsp)",
                url.scheme()
            )));
        }

        let credentials = match (config.username(), config.password()) {
            (Some(user), Some(pass)) => Some((user.to_string(), pass.to_string())),
            _ => None,
        };
        let authenticated_url = match &credentials {
            Some((user, pass)) => inject_credentials(&url, user, pass)?,
            None => url.clone(),
        };

        Ok(Self {
            target: StreamTarget {
                url,
                authenticated_url,
                credentials,
                timeout: config.timeout(),
            },
            resolution: config.resolution(),
            fps: config.fps(),
            opener,
            stream: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.target.url
    }

    pub fn authenticated_url(&self) -> &Url {
        &self.target.authenticated_url
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self) -> Result<(), CameraError> {
        if self.target.is_http() {
            probe(&self.target)?;
        }

        let mut stream = self.opener.open(&self.target).map_err(|e| match e {
            CameraError::Open(msg) => CameraError::Open(msg),
            other => CameraError::Open(format!("Failed to open {}: {other}", self.target.url)),
        })?;

        if let Err(e) = stream.read_frame() {
            return Err(CameraError::Open(format!(
                "Read test failed on {}: {e}",
                self.target.url
            )));
        }

        self.stream = Some(stream);
        log::info!("Opened network camera {}", self.target.url);
        Ok(())
    }
}

impl CameraBackend for NetworkStreamBackend {
    fn name(&self) -> &'static str {
        "network"
    }

    fn open(&mut self) -> Result<(), CameraError> {
        self.connect()
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.stream = None;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.stream.is_none() {
            log::info!("No connection to {}, reconnecting", self.target.url);
            if let Err(e) = self.connect() {
                log::error!("Failed to reconnect to {}: {e}", self.target.url);
                return Ok(None);
            }
        }

        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.read_frame() {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                if stream.is_open() {
                    log::debug!("Missed frame from {}: {e}", self.target.url);
                } else {
                    log::warn!("Connection to {} dropped: {e}", self.target.url);
                    self.stream = None;
                }
                Ok(None)
            }
        }
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        self.resolution
    }

    fn fps(&self) -> u32 {
        self.fps
    }
}
