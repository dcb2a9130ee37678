use crate::error::Result;
use crate::frame::{FacingMode, RasterFrame};
use async_trait::async_trait;

/// Constraint set passed to a provider when acquiring a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Required facing; `None` accepts any camera
    pub facing: Option<FacingMode>,
    /// Preferred (width, height); `None` leaves the device default
    pub resolution: Option<(u32, u32)>,
}

impl StreamConstraints {
    /// Fine-grained constraints: facing plus resolution
    pub fn ideal(facing: FacingMode, resolution: (u32, u32)) -> Self {
        Self {
            facing: Some(facing),
            resolution: Some(resolution),
        }
    }

    /// Minimal constraints any working camera should satisfy
    pub fn basic() -> Self {
        Self {
            facing: None,
            resolution: None,
        }
    }
}

/// Properties of an open stream, reported to the preview surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub device: String,
    pub facing: Option<FacingMode>,
    pub width: u32,
    pub height: u32,
}

/// An open video stream. Dropping it without `release` is a leak the
/// owner must avoid; `CaptureController` releases on every exit path.
#[async_trait]
pub trait VideoStream: Send {
    fn info(&self) -> &StreamInfo;

    /// Sample the most recent frame as RGBA
    async fn grab(&mut self) -> Result<RasterFrame>;

    /// Stop all tracks. Must be idempotent.
    fn release(&mut self);
}

/// Source of video streams (a platform camera API or a mock)
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Facings of the physical cameras currently present
    fn enumerate(&self) -> Vec<FacingMode>;

    async fn acquire(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>>;
}

/// Live-preview target the stream is attached to
pub trait PreviewSurface: Send {
    fn attach(&mut self, info: &StreamInfo);
    fn detach(&mut self);
}

/// Headless surface
#[derive(Debug, Default)]
pub struct NullSurface;

impl PreviewSurface for NullSurface {
    fn attach(&mut self, _info: &StreamInfo) {}
    fn detach(&mut self) {}
}
