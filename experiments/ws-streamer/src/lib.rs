//! Client side of the inbound socket camera: pushes JPEG frames from a
//! local camera, or a generated test pattern, to a `ws://` camera server.

use base64::Engine;
use brick_base::{log, Tensor};
use brick_camera::{Camera, CameraConfig, CameraError, FrameFormat};
use futures_util::{SinkExt, StreamExt};
use clap::Parser;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_websockets::{ClientBuilder, Message};

pub const DEFAULT_URL: &str = "ws://localhost:8080";
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const BUSY_CODE: u64 = 1000;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Streams frames to an inbound socket camera.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(version)]
pub struct Options {
    /// Camera server to connect to.
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,
    /// Camera source; the test pattern is streamed when unset.
    #[arg(long)]
    pub camera: Option<String>,
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: u32,
    /// JPEG quality.
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,
    /// Frame size as `WxH`.
    #[arg(long, value_name = "WxH", default_value = "640x480", value_parser = parse_size)]
    pub size: (u32, u32),
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            camera: None,
            fps: 30,
            quality: 80,
            size: (640, 480),
        }
    }
}

fn parse_size(size: &str) -> Result<(u32, u32), String> {
    let (w, h) = size
        .split_once('x')
        .ok_or_else(|| format!("expected WxH, got {size}"))?;
    let width = w.parse().map_err(|_| format!("invalid width: {w}"))?;
    let height = h.parse().map_err(|_| format!("invalid height: {h}"))?;
    Ok((width, height))
}

/// What the camera server told us.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome { frame_format: FrameFormat },
    Goodbye,
    Rejected { code: Option<u64>, message: String },
    Other(String),
}

impl ServerMessage {
    /// True for messages after which the server closes the connection.
    pub fn ends_session(&self) -> bool {
        match self {
            ServerMessage::Goodbye => true,
            ServerMessage::Rejected { code, .. } => *code == Some(BUSY_CODE),
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    status: Option<String>,
    message: Option<String>,
    frame_format: Option<String>,
    error: Option<String>,
    code: Option<u64>,
}

pub fn parse_server_message(text: &str) -> ServerMessage {
    let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
        return ServerMessage::Other(text.to_string());
    };

    match envelope.status.as_deref() {
        Some("connected") => {
            let frame_format = envelope
                .frame_format
                .as_deref()
                .and_then(|f| f.parse().ok())
                .unwrap_or_default();
            return ServerMessage::Welcome { frame_format };
        }
        Some("disconnecting") => return ServerMessage::Goodbye,
        _ => {}
    }

    match envelope.error {
        Some(error) => ServerMessage::Rejected {
            code: envelope.code,
            message: envelope.message.unwrap_or(error),
        },
        None => ServerMessage::Other(text.to_string()),
    }
}

/// JPEG-compresses `frame` and wraps it the way the server expects.
pub fn encode_frame(
    frame: &Tensor<u8>,
    format: FrameFormat,
    quality: u8,
) -> Result<Message, brick_image::ImageError> {
    let jpeg = brick_image::compress_to_jpeg(frame, quality)?;
    let engine = &base64::engine::general_purpose::STANDARD;
    Ok(match format {
        FrameFormat::Binary => Message::binary(jpeg),
        FrameFormat::Base64 => Message::text(engine.encode(&jpeg)),
        FrameFormat::Json => {
            Message::text(serde_json::json!({ "image": engine.encode(&jpeg) }).to_string())
        }
    })
}

/// Diagonal colour bars that scroll with `tick`.
pub fn test_pattern(width: u32, height: u32, tick: u64) -> Tensor<u8> {
    let (w, h) = (width as usize, height as usize);
    let shift = (tick.wrapping_mul(4) % 256) as usize;
    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            data.push(((x * 256 / w.max(1) + shift) % 256) as u8);
            data.push(((y * 256 / h.max(1) + shift) % 256) as u8);
            data.push(((x + y + shift) % 256) as u8);
        }
    }
    Tensor {
        shape: vec![h, w, 3],
        data,
    }
}

pub enum FrameSource {
    Camera(Arc<Camera>),
    Pattern { width: u32, height: u32 },
}

impl FrameSource {
    /// Starts the configured camera, or falls back to the test pattern.
    pub fn open(options: &Options) -> Result<Self, CameraError> {
        let Some(source) = &options.camera else {
            let (width, height) = options.size;
            return Ok(FrameSource::Pattern { width, height });
        };

        let config = CameraConfig::default()
            .with_resolution(options.size.0, options.size.1)
            .with_fps(options.fps);
        let camera = Camera::new(source.as_str(), config)?;
        camera.start()?;
        log::info!("Camera {} opened ({})", source, camera.backend_name());
        Ok(FrameSource::Camera(Arc::new(camera)))
    }

    pub async fn next_frame(&self, tick: u64) -> Option<Tensor<u8>> {
        match self {
            FrameSource::Pattern { width, height } => Some(test_pattern(*width, *height, tick)),
            FrameSource::Camera(camera) => {
                let camera = camera.clone();
                match tokio::task::spawn_blocking(move || camera.capture()).await {
                    Ok(Ok(Some(frame))) => Some(frame),
                    Ok(Ok(None)) => {
                        log::warn!("Failed to capture frame");
                        None
                    }
                    Ok(Err(e)) => {
                        log::error!("Error in camera loop: {e}");
                        None
                    }
                    Err(e) => {
                        log::error!("Capture task failed: {e}");
                        None
                    }
                }
            }
        }
    }

    pub fn stop(&self) {
        if let FrameSource::Camera(camera) = self {
            camera.stop();
        }
    }
}

/// Why a session ended without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Goodbye,
    Busy,
    Closed,
}

/// Connects once and streams frames until the server ends the session.
///
/// Frames are only sent after the welcome message, in the format it names.
pub async fn stream_session(options: &Options, source: &FrameSource) -> Result<SessionEnd, BoxError> {
    log::info!("Connecting to {}...", options.url);
    let uri: http::Uri = options.url.parse()?;
    let (ws, _) = ClientBuilder::from_uri(uri)
        .connect()
        .await?;
    log::info!("WebSocket connected successfully");

    let (mut sink, mut stream) = ws.split();
    let mut format: Option<FrameFormat> = None;
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / options.fps.max(1) as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(message)) => {
                    let Some(text) = message.as_text() else {
                        continue;
                    };
                    let reply = parse_server_message(text);
                    match &reply {
                        ServerMessage::Welcome { frame_format } => {
                            log::info!("Server welcome, frame format: {frame_format}");
                            format = Some(*frame_format);
                        }
                        ServerMessage::Goodbye => log::info!("Server goodbye"),
                        ServerMessage::Rejected { message, .. } => log::warn!("Server error: {message}"),
                        ServerMessage::Other(text) => log::warn!("Received unknown message: {text}"),
                    }
                    if reply.ends_session() {
                        return Ok(match reply {
                            ServerMessage::Goodbye => SessionEnd::Goodbye,
                            _ => SessionEnd::Busy,
                        });
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    log::info!("WebSocket connection closed by server");
                    return Ok(SessionEnd::Closed);
                }
            },
            _ = ticker.tick() => {
                let Some(format) = format else {
                    continue;
                };
                tick += 1;
                let Some(frame) = source.next_frame(tick).await else {
                    continue;
                };
                match encode_frame(&frame, format, options.quality) {
                    Ok(message) => sink.send(message).await?,
                    Err(e) => log::error!("Error encoding frame: {e}"),
                }
            }
        }
    }
}
