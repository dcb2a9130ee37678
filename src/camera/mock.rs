use super::device::{DeviceProvider, StreamConstraints, StreamInfo, VideoStream};
use crate::error::{CaptureError, Result};
use crate::frame::{FacingMode, RasterFrame};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct MockState {
    open_streams: AtomicUsize,
    max_open_streams: AtomicUsize,
    releases: AtomicUsize,
    attempts: Mutex<Vec<StreamConstraints>>,
}

/// Device provider for testing without camera hardware.
///
/// Counts open streams so tests can check no handle is leaked, and can be
/// told to reject the ideal or every constraint set.
#[derive(Debug, Clone)]
pub struct MockDeviceProvider {
    cameras: Vec<FacingMode>,
    reject_ideal: bool,
    reject_all: bool,
    frame_size: (u32, u32),
    state: Arc<MockState>,
}

impl MockDeviceProvider {
    /// Provider with a rear and a front camera
    pub fn new() -> Self {
        Self {
            cameras: vec![FacingMode::Rear, FacingMode::Front],
            reject_ideal: false,
            reject_all: false,
            frame_size: (640, 480),
            state: Arc::new(MockState::default()),
        }
    }

    pub fn with_cameras(mut self, cameras: Vec<FacingMode>) -> Self {
        self.cameras = cameras;
        self
    }

    /// Fail any acquisition that asks for a resolution
    pub fn reject_ideal(mut self) -> Self {
        self.reject_ideal = true;
        self
    }

    /// Fail every acquisition
    pub fn reject_all(mut self) -> Self {
        self.reject_all = true;
        self
    }

    /// Frame size used when the constraints carry no resolution
    pub fn frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    pub fn open_streams(&self) -> usize {
        self.state.open_streams.load(Ordering::SeqCst)
    }

    pub fn max_open_streams(&self) -> usize {
        self.state.max_open_streams.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    /// Every constraint set passed to `acquire`, in order
    pub fn attempts(&self) -> Vec<StreamConstraints> {
        self.state.attempts.lock().clone()
    }
}

impl Default for MockDeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProvider for MockDeviceProvider {
    fn enumerate(&self) -> Vec<FacingMode> {
        self.cameras.clone()
    }

    async fn acquire(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>> {
        self.state.attempts.lock().push(constraints.clone());

        if self.reject_all || (self.reject_ideal && constraints.resolution.is_some()) {
            return Err(CaptureError::DeviceUnavailable {
                details: "mock device rejected constraints".to_string(),
            }
            .into());
        }

        let facing = match constraints.facing {
            Some(facing) if self.cameras.contains(&facing) => Some(facing),
            Some(facing) => {
                return Err(CaptureError::DeviceUnavailable {
                    details: format!("no {:?} camera", facing),
                }
                .into())
            }
            None => self.cameras.first().copied(),
        };
        let facing = facing.ok_or_else(|| CaptureError::DeviceUnavailable {
            details: "no cameras present".to_string(),
        })?;

        let (width, height) = constraints.resolution.unwrap_or(self.frame_size);
        let open = self.state.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open_streams.fetch_max(open, Ordering::SeqCst);

        debug!("Mock stream opened ({:?}, {} open)", facing, open);

        Ok(Box::new(MockStream {
            info: StreamInfo {
                device: format!("mock:{:?}", facing).to_lowercase(),
                facing: Some(facing),
                width,
                height,
            },
            state: Arc::clone(&self.state),
            released: false,
            frames: 0,
        }))
    }
}

struct MockStream {
    info: StreamInfo,
    state: Arc<MockState>,
    released: bool,
    frames: u64,
}

#[async_trait]
impl VideoStream for MockStream {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    async fn grab(&mut self) -> Result<RasterFrame> {
        if self.released {
            return Err(CaptureError::CaptureEmpty {
                details: "mock stream already released".to_string(),
            }
            .into());
        }

        self.frames += 1;
        let (width, height) = (self.info.width, self.info.height);
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                let b = (self.frames % 256) as u8;
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }

        Ok(RasterFrame::new(width, height, data))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.state.open_streams.fetch_sub(1, Ordering::SeqCst);
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}
