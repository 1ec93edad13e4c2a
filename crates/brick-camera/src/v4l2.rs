use crate::config::CaptureFormat;
use crate::local::{CaptureDevice, CaptureRequest, Negotiated};
use crate::{CameraError, Frame};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

fn open_error(index: u32, err: std::io::Error) -> CameraError {
    CameraError::Open(format!("Failed to open V4L camera {index}: {err}"))
}

/// V4L2 capture through memory-mapped buffers.
pub(crate) struct V4l2Device {
    stream: Option<MmapStream<'static>>,
    format: CaptureFormat,
    size: (u32, u32),
}

impl V4l2Device {
    pub fn new() -> Self {
        Self {
            stream: None,
            format: CaptureFormat::Mjpeg,
            size: (0, 0),
        }
    }
}

impl CaptureDevice for V4l2Device {
    fn open(&mut self, index: u32, request: &CaptureRequest) -> Result<Negotiated, CameraError> {
        self.stream.take();

        let device = Device::new(index as usize).map_err(|e| open_error(index, e))?;
        let current = Capture::format(&device).map_err(|e| open_error(index, e))?;

        let fourcc = match request.format {
            CaptureFormat::Mjpeg => FourCC::new(b"MJPG"),
            CaptureFormat::Yuyv => FourCC::new(b"YUYV"),
        };
        let (width, height) = request.resolution.unwrap_or((current.width, current.height));
        let actual = Capture::set_format(&device, &Format::new(width, height, fourcc))
            .map_err(|e| open_error(index, e))?;
        if actual.fourcc != fourcc {
            return Err(CameraError::Open(format!(
                "V4L camera {index} does not support {fourcc}, it offered {}",
                actual.fourcc
            )));
        }

        let params = if request.fps > 0 {
            Capture::set_params(&device, &Parameters::with_fps(request.fps))
        } else {
            Capture::params(&device)
        }
        .map_err(|e| open_error(index, e))?;
        let fps = match params.interval.numerator {
            0 => 0,
            numerator => params.interval.denominator / numerator,
        };

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, request.buffer_count)
            .map_err(|e| open_error(index, e))?;

        self.stream = Some(stream);
        self.format = request.format;
        self.size = (actual.width, actual.height);
        Ok(Negotiated {
            resolution: self.size,
            fps,
        })
    }

    fn close(&mut self) {
        self.stream.take();
    }

    fn blocking_capture(&mut self) -> Result<Frame, CameraError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CameraError::Read("V4L stream is not open".to_string()))?;
        let (data, _metadata) = CaptureStream::next(stream)
            .map_err(|e| CameraError::Read(format!("V4L capture failed: {e}")))?;

        let frame = match self.format {
            CaptureFormat::Mjpeg => brick_image::decode_image(data),
            CaptureFormat::Yuyv => brick_image::yuyv_to_frame(data, self.size.0, self.size.1),
        };
        frame.map_err(|e| CameraError::Read(format!("V4L frame could not be decoded: {e}")))
    }
}
