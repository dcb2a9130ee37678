use super::device::{DeviceProvider, StreamConstraints, StreamInfo, VideoStream};
use crate::config::CameraConfig;
use crate::error::{CaptureError, Result, SurveyError};
use crate::frame::{FacingMode, RasterFrame};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// GStreamer V4L2 camera provider
pub struct GstDeviceProvider {
    config: CameraConfig,
}

impl GstDeviceProvider {
    pub fn new(config: CameraConfig) -> Result<Self> {
        gstreamer::init().map_err(|e| CaptureError::DeviceUnavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;
        Ok(Self { config })
    }

    fn device_for(&self, facing: FacingMode) -> &str {
        match facing {
            FacingMode::Rear => &self.config.rear_device,
            FacingMode::Front => &self.config.front_device,
        }
    }

    /// Build the capture pipeline; resolution caps only for ideal constraints
    fn build_pipeline_string(device: &str, resolution: Option<(u32, u32)>) -> String {
        let caps = match resolution {
            Some((width, height)) => format!(
                "videoscale ! video/x-raw,format=RGBA,width={},height={}",
                width, height
            ),
            None => "video/x-raw,format=RGBA".to_string(),
        };

        format!(
            "v4l2src device={} ! videoconvert ! {} ! \
             appsink name=sink max-buffers=1 drop=true sync=false emit-signals=false",
            device, caps
        )
    }
}

#[async_trait]
impl DeviceProvider for GstDeviceProvider {
    fn enumerate(&self) -> Vec<FacingMode> {
        let mut cameras = Vec::new();
        if Path::new(&self.config.rear_device).exists() {
            cameras.push(FacingMode::Rear);
        }
        if self.config.front_device != self.config.rear_device
            && Path::new(&self.config.front_device).exists()
        {
            cameras.push(FacingMode::Front);
        }
        cameras
    }

    async fn acquire(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>> {
        let present = self.enumerate();
        let facing = match constraints.facing {
            Some(facing) if present.contains(&facing) => facing,
            Some(facing) => {
                return Err(CaptureError::DeviceUnavailable {
                    details: format!("no {:?} camera at {}", facing, self.device_for(facing)),
                }
                .into())
            }
            None => *present.first().ok_or_else(|| CaptureError::DeviceUnavailable {
                details: "no V4L2 devices present".to_string(),
            })?,
        };

        let device = self.device_for(facing).to_string();
        let desc = Self::build_pipeline_string(&device, constraints.resolution);
        let timeout = Duration::from_millis(self.config.open_timeout_ms);

        info!("Creating GStreamer pipeline: {}", desc);

        let (pipeline, appsink) = tokio::task::spawn_blocking(move || start_pipeline(&desc, timeout))
            .await
            .map_err(|e| SurveyError::component("camera", format!("open task failed: {}", e)))??;

        let (width, height) = constraints.resolution.unwrap_or((0, 0));
        Ok(Box::new(GstStream {
            info: StreamInfo {
                device,
                facing: Some(facing),
                width,
                height,
            },
            pipeline,
            appsink,
            timeout,
            released: false,
        }))
    }
}

fn start_pipeline(desc: &str, timeout: Duration) -> Result<(Pipeline, AppSink)> {
    let unavailable = |details: String| SurveyError::from(CaptureError::DeviceUnavailable { details });

    let pipeline = gstreamer::parse::launch(desc)
        .map_err(|e| unavailable(format!("Failed to create pipeline: {}", e)))?
        .downcast::<Pipeline>()
        .map_err(|_| unavailable("Failed to downcast to Pipeline".to_string()))?;

    let appsink = pipeline
        .by_name("sink")
        .ok_or_else(|| unavailable("Failed to get appsink".to_string()))?
        .downcast::<AppSink>()
        .map_err(|_| unavailable("Failed to downcast to AppSink".to_string()))?;

    if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(unavailable(format!("Failed to start pipeline: {}", e)));
    }

    let (result, _, _) = pipeline.state(gstreamer::ClockTime::from_mseconds(
        timeout.as_millis() as u64,
    ));
    if let Err(e) = result {
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(unavailable(format!("Device did not start streaming: {}", e)));
    }

    Ok((pipeline, appsink))
}

struct GstStream {
    info: StreamInfo,
    pipeline: Pipeline,
    appsink: AppSink,
    timeout: Duration,
    released: bool,
}

#[async_trait]
impl VideoStream for GstStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    async fn grab(&mut self) -> Result<RasterFrame> {
        if self.released {
            return Err(CaptureError::CaptureEmpty {
                details: "stream already released".to_string(),
            }
            .into());
        }

        let appsink = self.appsink.clone();
        let timeout = gstreamer::ClockTime::from_mseconds(self.timeout.as_millis() as u64);
        let frame = tokio::task::spawn_blocking(move || pull_frame(&appsink, timeout))
            .await
            .map_err(|e| SurveyError::component("camera", format!("grab task failed: {}", e)))??;

        self.info.width = frame.width;
        self.info.height = frame.height;
        Ok(frame)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop pipeline on {}: {}", self.info.device, e);
        }
        debug!("GStreamer stream on {} released", self.info.device);
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn pull_frame(appsink: &AppSink, timeout: gstreamer::ClockTime) -> Result<RasterFrame> {
    let empty = |details: String| SurveyError::from(CaptureError::CaptureEmpty { details });

    let sample = appsink
        .try_pull_sample(timeout)
        .ok_or_else(|| empty("No sample within timeout".to_string()))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| empty("No buffer in sample".to_string()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| empty("No caps in sample".to_string()))?;
    let video_info = VideoInfo::from_caps(caps)
        .map_err(|e| empty(format!("Failed to get video info: {}", e)))?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0] as usize;
    let row_bytes = width as usize * RasterFrame::BYTES_PER_PIXEL;

    let map = buffer
        .map_readable()
        .map_err(|e| empty(format!("Failed to map buffer: {}", e)))?;
    let src = map.as_slice();

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = src
            .get(start..start + row_bytes)
            .ok_or_else(|| empty(format!("Truncated buffer at row {}", row)))?;
        data.extend_from_slice(line);
    }

    Ok(RasterFrame::new(width, height, data))
}
