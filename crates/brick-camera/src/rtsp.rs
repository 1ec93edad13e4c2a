use crate::network::{FrameStream, StreamTarget};
use crate::{CameraError, Frame};
use brick_base::Tensor;
use gstreamer::prelude::*;
use gstreamer::ClockTime;

fn open_error(target: &StreamTarget, what: impl std::fmt::Display) -> CameraError {
    CameraError::Open(format!("Cannot open RTSP stream {}: {what}", target.url))
}

/// RTSP camera decoded to RGB by a GStreamer pipeline.
pub(crate) struct RtspFrameStream {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    pull_timeout: ClockTime,
    failed: Option<String>,
}

impl RtspFrameStream {
    pub fn connect(target: &StreamTarget) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| open_error(target, e))?;

        let description = format!(
            "rtspsrc location=\"{}\" latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            target.authenticated_url
        );
        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| open_error(target, e))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| open_error(target, "not a pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| open_error(target, "appsink missing from pipeline"))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| open_error(target, "appsink has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| open_error(target, e))?;

        let timeout_ms = u64::try_from(target.timeout.as_millis()).unwrap_or(u64::MAX);
        Ok(Self {
            pipeline,
            appsink,
            pull_timeout: ClockTime::from_mseconds(timeout_ms),
            failed: None,
        })
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(ClockTime::ZERO) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.failed = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.failed = Some("end of stream".to_string());
                }
                _ => {}
            }
        }
    }
}

impl FrameStream for RtspFrameStream {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        self.poll_bus();
        if let Some(reason) = &self.failed {
            return Err(CameraError::Read(reason.clone()));
        }

        let sample = self
            .appsink
            .try_pull_sample(self.pull_timeout)
            .ok_or_else(|| CameraError::Read("RTSP stream stalled".to_string()))?;
        sample_to_frame(&sample)
    }

    fn is_open(&self) -> bool {
        self.failed.is_none()
    }
}

impl Drop for RtspFrameStream {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("Failed to stop RTSP pipeline: {e}");
        }
    }
}

// copies the RGB rows out of a possibly padded buffer
fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame, CameraError> {
    let read_error = |what: &str| CameraError::Read(format!("RTSP sample {what}"));

    let buffer = sample.buffer().ok_or_else(|| read_error("has no buffer"))?;
    let caps = sample.caps().ok_or_else(|| read_error("has no caps"))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| CameraError::Read(format!("RTSP caps are not video: {e}")))?;

    let width = info.width() as usize;
    let height = info.height() as usize;
    let row_bytes = width * 3;
    let stride = info.stride().first().copied().unwrap_or(0) as usize;

    let map = buffer.map_readable().map_err(|_| read_error("cannot be mapped"))?;
    let data = map.as_slice();

    let pixels = if stride == row_bytes {
        data.get(..row_bytes * height)
            .ok_or_else(|| read_error("is truncated"))?
            .to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * height);
        for row in 0..height {
            let start = row * stride;
            pixels.extend_from_slice(
                data.get(start..start + row_bytes)
                    .ok_or_else(|| read_error("row is out of bounds"))?,
            );
        }
        pixels
    };

    Tensor::from_hwc(height, width, 3, pixels).map_err(|e| CameraError::Read(e.to_string()))
}
