//! Composable frame post-processing.
//!
//! A [`FrameAdjuster`] turns one frame into another. The editor operations
//! have adjuster forms (`letterboxed`, `resized`, `adjusted`, `greyscaled`)
//! that chain left to right with `|` or [`FrameAdjuster::then`]:
//!
//! ```no_run
//! use brick_image::{adjusted, greyscaled, letterboxed, FrameAdjuster};
//!
//! let pipeline = letterboxed(Some((640, 640))) | greyscaled() | adjusted(10.0, 1.2, 1.0);
//! # let frame = brick_base::Tensor::filled_hwc(480, 640, &[0u8, 0, 0]).unwrap();
//! let out = pipeline.apply(frame).unwrap();
//! assert_eq!(out.shape, vec![640, 640, 3]);
//! ```

use crate::editor::{self, Interpolation, LETTERBOX_COLOR};
use crate::ImageError;
use brick_base::Tensor;
use std::fmt;
use std::ops::BitOr;

pub trait FrameAdjuster: Send + Sync {
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError>;

    /// Runs `self`, then `next` on its output.
    fn then<B>(self, next: B) -> Pipeline
    where
        Self: Sized + 'static,
        B: FrameAdjuster + 'static,
    {
        Pipeline::new().then(self).then(next)
    }
}

impl<F> FrameAdjuster for F
where
    F: Fn(Tensor<u8>) -> Result<Tensor<u8>, ImageError> + Send + Sync,
{
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
        self(frame)
    }
}

/// Adjusters applied in insertion order. An empty pipeline returns its input.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn FrameAdjuster>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl FrameAdjuster + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages.len()).finish()
    }
}

impl FrameAdjuster for Pipeline {
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
        self.stages.iter().try_fold(frame, |frame, stage| stage.apply(frame))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterboxed {
    pub target: Option<(u32, u32)>,
    pub color: [u8; 3],
}

impl Letterboxed {
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }
}

impl FrameAdjuster for Letterboxed {
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
        editor::letterbox(&frame, self.target, self.color)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resized {
    pub target: (u32, u32),
    pub maintain_aspect: bool,
    pub interpolation: Interpolation,
}

impl Resized {
    pub fn keep_aspect(mut self) -> Self {
        self.maintain_aspect = true;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

impl FrameAdjuster for Resized {
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
        editor::resize(&frame, self.target, self.maintain_aspect, self.interpolation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjusted {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl FrameAdjuster for Adjusted {
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
        editor::adjust(&frame, self.brightness, self.contrast, self.saturation)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Greyscaled;

impl FrameAdjuster for Greyscaled {
    fn apply(&self, frame: Tensor<u8>) -> Result<Tensor<u8>, ImageError> {
        editor::greyscale(&frame)
    }
}

/// Letterbox to `target` (square of the larger side when `None`) with the
/// default grey padding.
pub fn letterboxed(target: Option<(u32, u32)>) -> Letterboxed {
    Letterboxed {
        target,
        color: LETTERBOX_COLOR,
    }
}

/// Stretch to `target` with linear interpolation.
pub fn resized(target: (u32, u32)) -> Resized {
    Resized {
        target,
        maintain_aspect: false,
        interpolation: Interpolation::Linear,
    }
}

pub fn adjusted(brightness: f32, contrast: f32, saturation: f32) -> Adjusted {
    Adjusted {
        brightness,
        contrast,
        saturation,
    }
}

pub fn greyscaled() -> Greyscaled {
    Greyscaled
}

macro_rules! impl_pipe {
    ($($ty:ty),*) => {
        $(
            impl<B: FrameAdjuster + 'static> BitOr<B> for $ty {
                type Output = Pipeline;

                fn bitor(self, next: B) -> Pipeline {
                    self.then(next)
                }
            }
        )*
    };
}

impl_pipe!(Letterboxed, Resized, Adjusted, Greyscaled);

impl<B: FrameAdjuster + 'static> BitOr<B> for Pipeline {
    type Output = Pipeline;

    fn bitor(self, next: B) -> Pipeline {
        Pipeline::then(self, next)
    }
}
