use super::device::{DeviceProvider, PreviewSurface, StreamConstraints, StreamInfo, VideoStream};
use crate::config::CameraConfig;
use crate::error::{CaptureError, Result, SurveyError};
use crate::frame::{clamp_dimensions, FacingMode, RasterFrame};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Owns at most one open video stream and turns it into still frames.
///
/// `open` always closes a previous stream first, and `Drop` closes the
/// current one, so a controller never leaks a device handle.
pub struct CaptureController {
    config: CameraConfig,
    provider: Arc<dyn DeviceProvider>,
    facing: FacingMode,
    resolution: (u32, u32),
    stream: Option<Box<dyn VideoStream>>,
    surface: Option<Box<dyn PreviewSurface>>,
}

impl CaptureController {
    pub fn new(config: CameraConfig, provider: Arc<dyn DeviceProvider>) -> Self {
        let facing = config.facing;
        let resolution = config.resolution;
        Self {
            config,
            provider,
            facing,
            resolution,
            stream: None,
            surface: None,
        }
    }

    /// Acquire a stream for `facing` and attach it to `surface`.
    ///
    /// Tries the ideal constraint set first, then the basic one; fails with
    /// `DeviceUnavailable` when neither is granted.
    pub async fn open(
        &mut self,
        mut surface: Box<dyn PreviewSurface>,
        facing: FacingMode,
        resolution_hint: Option<(u32, u32)>,
    ) -> Result<StreamInfo> {
        self.close();

        self.facing = facing;
        self.resolution = resolution_hint.unwrap_or(self.config.resolution);

        info!(
            "Opening {:?} camera ({}x{} ideal)",
            facing, self.resolution.0, self.resolution.1
        );

        let stream = self.acquire_with_fallback().await?;
        let info = stream.info().clone();

        surface.attach(&info);
        self.stream = Some(stream);
        self.surface = Some(surface);

        info!(
            "Camera stream open on {} ({}x{})",
            info.device, info.width, info.height
        );
        Ok(info)
    }

    async fn acquire_with_fallback(&self) -> Result<Box<dyn VideoStream>> {
        let ideal = StreamConstraints::ideal(self.facing, self.resolution);
        let ideal_err = match self.provider.acquire(&ideal).await {
            Ok(stream) => return Ok(stream),
            Err(e) => e,
        };

        warn!(
            "Camera rejected ideal constraints ({}), retrying with basic constraints",
            ideal_err
        );

        match self.provider.acquire(&StreamConstraints::basic()).await {
            Ok(stream) => Ok(stream),
            Err(basic_err) => Err(CaptureError::DeviceUnavailable {
                details: format!("ideal: {}; basic: {}", ideal_err, basic_err),
            }
            .into()),
        }
    }

    /// Sample the current stream into an RGBA frame, scaled down to the
    /// configured maximum dimension when necessary.
    pub async fn capture_frame(&mut self) -> Result<RasterFrame> {
        let stream = self.stream.as_mut().ok_or_else(|| CaptureError::CaptureEmpty {
            details: "camera is not open".to_string(),
        })?;

        let frame = stream.grab().await?;
        if !frame.validate_size() {
            return Err(CaptureError::CaptureEmpty {
                details: format!(
                    "frame buffer of {} bytes does not match {}x{}",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ),
            }
            .into());
        }

        trace!("Grabbed {}x{} frame", frame.width, frame.height);
        Self::bound_frame(frame, self.config.max_dimension)
    }

    fn bound_frame(frame: RasterFrame, max_dimension: u32) -> Result<RasterFrame> {
        let (width, height) = clamp_dimensions(frame.width, frame.height, max_dimension);
        if (width, height) == (frame.width, frame.height) {
            return Ok(frame);
        }

        let RasterFrame {
            width: src_w,
            height: src_h,
            data,
            timestamp,
        } = frame;
        let image = RgbaImage::from_raw(src_w, src_h, data).ok_or_else(|| {
            CaptureError::CaptureEmpty {
                details: format!("cannot view {}x{} frame as RGBA", src_w, src_h),
            }
        })?;

        debug!("Scaling frame {}x{} -> {}x{}", src_w, src_h, width, height);
        let scaled = imageops::resize(&image, width, height, FilterType::Triangle);
        Ok(RasterFrame {
            width,
            height,
            data: scaled.into_raw(),
            timestamp,
        })
    }

    /// Flip between front and rear cameras and reopen.
    ///
    /// With a single physical camera the current stream is kept.
    pub async fn switch_facing(&mut self) -> Result<StreamInfo> {
        let current = self
            .stream
            .as_ref()
            .map(|s| s.info().clone())
            .ok_or_else(|| SurveyError::invalid_state("camera is not open"))?;

        let cameras = self.provider.enumerate();
        if !(cameras.contains(&FacingMode::Front) && cameras.contains(&FacingMode::Rear)) {
            info!("Only one camera present, keeping {} open", current.device);
            return Ok(current);
        }

        let mut surface = self
            .surface
            .take()
            .ok_or_else(|| SurveyError::invalid_state("camera has no preview surface"))?;
        surface.detach();
        let target = self.facing.toggled();
        let resolution = self.resolution;

        info!("Switching camera to {:?}", target);
        self.open(surface, target, Some(resolution)).await
    }

    /// Release the stream and detach the preview. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("Releasing camera stream on {}", stream.info().device);
            stream.release();
        }
        if let Some(mut surface) = self.surface.take() {
            surface.detach();
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref().map(|s| s.info())
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.close();
    }
}
