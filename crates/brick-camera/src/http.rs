use crate::network::{FrameStream, StreamTarget};
use crate::queue::FrameSlot;
use crate::{CameraError, Frame};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// upper bound of one JPEG inside a multipart stream
const MAX_JPEG_BYTES: usize = 8 * 1024 * 1024;
const READ_CHUNK: usize = 8192;
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Finds the first complete JPEG (SOI..EOI) in `buffer`.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

/// JPEG frames cut out of a `multipart/x-mixed-replace` body.
struct MjpegReader {
    reader: Box<dyn Read + Send + Sync>,
    buffer: Vec<u8>,
}

impl MjpegReader {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn next_jpeg(&mut self) -> std::io::Result<Vec<u8>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let jpeg = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(jpeg);
            }

            let read = self.reader.read(&mut chunk)?;
            if read == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            // garbage without a frame end, keep only a possible marker prefix
            if self.buffer.len() > MAX_JPEG_BYTES {
                let stale = self.buffer.len() - 1;
                self.buffer.drain(..stale);
            }
        }
    }
}

/// Background reader that keeps only the newest decoded part.
struct MjpegFeed {
    frames: Arc<FrameSlot<Frame>>,
    alive: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl MjpegFeed {
    fn spawn(mut reader: MjpegReader, url: String) -> std::io::Result<Self> {
        let frames = Arc::new(FrameSlot::new());
        let alive = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));

        let (thread_frames, thread_alive, thread_stop) = (frames.clone(), alive.clone(), stop.clone());
        std::thread::Builder::new()
            .name("mjpeg-reader".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    let jpeg = match reader.next_jpeg() {
                        Ok(jpeg) => jpeg,
                        Err(e) => {
                            log::debug!("MJPEG reader for {url} stopped: {e}");
                            break;
                        }
                    };
                    match brick_image::decode_image(&jpeg) {
                        Ok(frame) => {
                            thread_frames.try_push_evicting_oldest(frame);
                        }
                        Err(e) => log::debug!("Skipping undecodable MJPEG part from {url}: {e}"),
                    }
                }
                thread_alive.store(false, Ordering::Release);
            })?;

        Ok(Self { frames, alive, stop })
    }
}

impl Drop for MjpegFeed {
    fn drop(&mut self) {
        // the thread exits after its current read, bounded by the read timeout
        self.stop.store(true, Ordering::Relaxed);
    }
}

enum Body {
    Multipart(MjpegFeed),
    // re-fetched on every read; the first response is kept for the first read
    Snapshot(Option<Vec<u8>>),
}

/// MJPEG or snapshot camera behind an HTTP(S) URL.
pub(crate) struct HttpFrameStream {
    agent: ureq::Agent,
    target: StreamTarget,
    body: Body,
    open: bool,
}

impl HttpFrameStream {
    pub fn connect(target: &StreamTarget) -> Result<Self, CameraError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(target.timeout)
            .timeout_read(target.timeout)
            .build();
        let response = get(&agent, target)
            .map_err(|e| CameraError::Open(format!("Cannot open HTTP stream {}: {e}", target.url)))?;

        let content_type = response.header("Content-Type").unwrap_or("").to_ascii_lowercase();
        let body = if content_type.contains("multipart") {
            let reader = MjpegReader::new(response.into_reader());
            Body::Multipart(MjpegFeed::spawn(reader, target.url.to_string()).map_err(|e| {
                CameraError::Open(format!("Cannot start MJPEG reader for {}: {e}", target.url))
            })?)
        } else {
            Body::Snapshot(Some(read_body(response).map_err(|e| {
                CameraError::Open(format!("Cannot read snapshot from {}: {e}", target.url))
            })?))
        };

        Ok(Self {
            agent,
            target: target.clone(),
            body,
            open: true,
        })
    }

    fn next_snapshot(&mut self) -> Result<Frame, String> {
        let Body::Snapshot(pending) = &mut self.body else {
            return Err("not a snapshot stream".to_string());
        };
        let jpeg = match pending.take() {
            Some(bytes) => bytes,
            None => match get(&self.agent, &self.target) {
                Ok(response) => read_body(response).map_err(|e| e.to_string())?,
                Err(ureq::Error::Status(code, _)) => return Err(format!("snapshot returned status {code}")),
                Err(e) => {
                    self.open = false;
                    return Err(e.to_string());
                }
            },
        };
        brick_image::decode_image(&jpeg).map_err(|e| e.to_string())
    }
}

fn get(agent: &ureq::Agent, target: &StreamTarget) -> Result<ureq::Response, ureq::Error> {
    let mut request = agent.get(target.url.as_str());
    if let Some(auth) = target.basic_auth() {
        request = request.set("Authorization", &auth);
    }
    request.call()
}

fn read_body(response: ureq::Response) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)?;
    if bytes.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty body"));
    }
    Ok(bytes)
}

impl FrameStream for HttpFrameStream {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !matches!(self.body, Body::Multipart(_)) {
            return self.next_snapshot().map_err(CameraError::Read);
        }
        let Body::Multipart(feed) = &self.body else {
            return Err(CameraError::Read("not an MJPEG stream".to_string()));
        };

        let deadline = Instant::now() + self.target.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(frame) = feed.frames.pop_with_timeout(remaining.min(POLL_SLICE)) {
                return Ok(frame);
            }
            if !feed.alive.load(Ordering::Acquire) {
                // the last part may have landed just before the reader quit
                if let Some(frame) = feed.frames.drain() {
                    return Ok(frame);
                }
                self.open = false;
                return Err(CameraError::Read("MJPEG stream ended".to_string()));
            }
            if remaining.is_zero() {
                // stalled: tear down so the next read reconnects
                self.open = false;
                return Err(CameraError::Read("MJPEG stream stalled".to_string()));
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
