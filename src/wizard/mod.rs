use crate::camera::{CaptureController, DeviceProvider, PreviewSurface, StreamInfo};
use crate::catalog;
use crate::config::SurveycamConfig;
use crate::enhance::ImageEnhancer;
use crate::error::{Result, SurveyError};
use crate::frame::{EncodedImage, RasterFrame};
use crate::gateway::SubmitGateway;
use crate::model::{Classification, PaintingDimensions, Photo};
use crate::staging::{PhotoTarget, StagingStore};
use image::imageops::FilterType;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-photo lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoState {
    Idle,
    Capturing,
    Captured,
    Enhancing,
    Staged,
    Uploading,
    Recorded,
}

/// Where images come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Camera,
    /// No camera could be opened; images are supplied as files
    FileUpload,
}

/// Drives one environment's photo flow: type selection, optional service
/// item and dimensions, capture, review, submit.
///
/// Everything the flow collects lives in the wizard's own `StagingStore`;
/// nothing is shared between wizards.
pub struct PhotoWizard {
    target: PhotoTarget,
    camera: CaptureController,
    enhancer: ImageEnhancer,
    staging: StagingStore,
    gateway: Arc<SubmitGateway>,
    max_dimension: u32,
    state: PhotoState,
    mode: CaptureMode,
}

impl PhotoWizard {
    pub fn new(
        config: &SurveycamConfig,
        provider: Arc<dyn DeviceProvider>,
        gateway: Arc<SubmitGateway>,
        target: PhotoTarget,
    ) -> Self {
        Self {
            target,
            camera: CaptureController::new(config.camera.clone(), provider),
            enhancer: ImageEnhancer::new(config.enhance.clone()),
            staging: StagingStore::new(),
            gateway,
            max_dimension: config.camera.max_dimension,
            state: PhotoState::Idle,
            mode: CaptureMode::Camera,
        }
    }

    pub fn state(&self) -> PhotoState {
        self.state
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn target(&self) -> PhotoTarget {
        self.target
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    pub fn camera(&self) -> &CaptureController {
        &self.camera
    }

    /// Open the camera. When no device can be opened the wizard switches
    /// to file-upload mode instead of failing.
    pub async fn start_camera(&mut self, surface: Box<dyn PreviewSurface>) -> Result<CaptureMode> {
        let facing = self.camera.facing();
        match self.camera.open(surface, facing, None).await {
            Ok(_) => {
                self.mode = CaptureMode::Camera;
            }
            Err(e) if e.is_device_unavailable() => {
                warn!("Camera unavailable, switching to file upload: {}", e);
                self.mode = CaptureMode::FileUpload;
            }
            Err(e) => return Err(e),
        }
        Ok(self.mode)
    }

    pub async fn switch_camera(&mut self) -> Result<StreamInfo> {
        self.camera.switch_facing().await
    }

    /// Select the photo type. Leaving the service/item type drops any item
    /// and dimensions chosen for it.
    pub fn choose_type(&mut self, classification: Classification) -> Result<()> {
        self.require_editable()?;

        if classification != Classification::ServicosItens {
            self.staging.set_service_item(None);
            self.staging.set_dimensions(None);
        }
        self.staging.set_classification(classification);

        debug!("Photo type set to {}", classification);
        Ok(())
    }

    pub fn choose_service_item(&mut self, label: &str) -> Result<()> {
        self.require_editable()?;
        if self.staging.classification() != Some(Classification::ServicosItens) {
            return Err(SurveyError::invalid_state(format!(
                "service items require the {} type",
                Classification::ServicosItens
            )));
        }

        let label = label.trim();
        if label.is_empty() {
            return Err(SurveyError::validation("service item is required"));
        }

        if !catalog::is_painting(label) {
            self.staging.set_dimensions(None);
        }
        self.staging.set_service_item(Some(label.to_string()));

        debug!("Service item set to '{}'", label);
        Ok(())
    }

    /// Confirm the dimensions form, deriving the area
    pub fn confirm_dimensions(&mut self, width: &str, height: &str) -> Result<PaintingDimensions> {
        self.require_editable()?;
        let painting = self
            .staging
            .service_item()
            .map(catalog::is_painting)
            .unwrap_or(false);
        if !painting {
            return Err(SurveyError::invalid_state(
                "dimensions apply to painting items only",
            ));
        }

        let dimensions = PaintingDimensions::confirm(width, height);
        debug!(
            "Dimensions {} x {} = {}",
            dimensions.width, dimensions.height, dimensions.area
        );
        self.staging.set_dimensions(Some(dimensions.clone()));
        Ok(dimensions)
    }

    pub fn set_observation(&mut self, observation: &str) -> Result<()> {
        self.require_editable()?;
        self.staging.set_observation(Some(observation.to_string()));
        Ok(())
    }

    /// Grab, enhance and stage one frame from the open camera
    pub async fn shutter(&mut self) -> Result<&EncodedImage> {
        self.require_capture_ready()?;
        if self.mode != CaptureMode::Camera {
            return Err(SurveyError::invalid_state(
                "camera unavailable, upload a file instead",
            ));
        }

        self.state = PhotoState::Capturing;
        let frame = match self.camera.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                self.state = PhotoState::Idle;
                return Err(e);
            }
        };
        self.state = PhotoState::Captured;

        self.stage_frame(frame)
    }

    /// Stage an image supplied as a file. The bytes must decode as an
    /// image; they go through the same enhancement as camera frames.
    pub fn use_uploaded_file(&mut self, bytes: &[u8]) -> Result<&EncodedImage> {
        self.require_capture_ready()?;

        let decoded = image::load_from_memory(bytes).map_err(|e| {
            SurveyError::validation(format!("uploaded file is not a readable image: {}", e))
        })?;

        let decoded = if decoded.width() > self.max_dimension || decoded.height() > self.max_dimension
        {
            decoded.resize(self.max_dimension, self.max_dimension, FilterType::Triangle)
        } else {
            decoded
        };

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        info!("Using uploaded {}x{} image", width, height);

        self.state = PhotoState::Captured;
        self.stage_frame(RasterFrame::new(width, height, rgba.into_raw()))
    }

    fn stage_frame(&mut self, frame: RasterFrame) -> Result<&EncodedImage> {
        self.state = PhotoState::Enhancing;
        let encoded = match self.enhancer.process(frame) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.state = PhotoState::Idle;
                return Err(e);
            }
        };

        self.staging.set_image(encoded);
        self.state = PhotoState::Staged;

        self.staging
            .image()
            .ok_or_else(|| SurveyError::invalid_state("staged image missing"))
    }

    /// Discard the staged image and return to capture, keeping the type,
    /// item and dimensions already chosen.
    pub fn retake(&mut self) -> Result<()> {
        if self.state != PhotoState::Staged {
            return Err(SurveyError::invalid_state("nothing to retake"));
        }
        self.staging.discard_image();
        self.state = PhotoState::Idle;
        info!("Photo discarded for retake");
        Ok(())
    }

    /// Abandon the current photo entirely
    pub fn cancel(&mut self) -> Result<()> {
        if self.state == PhotoState::Uploading {
            return Err(SurveyError::invalid_state("submission in progress"));
        }
        self.staging.clear();
        self.state = PhotoState::Idle;
        info!("Photo cancelled");
        Ok(())
    }

    /// Upload and record the reviewed photo.
    ///
    /// On success the staging store is cleared. On failure the photo stays
    /// staged so the same confirm can be retried; an upload that already
    /// succeeded is not repeated.
    pub async fn submit(&mut self) -> Result<Photo> {
        if self.state != PhotoState::Staged {
            return Err(SurveyError::invalid_state("no photo ready for review"));
        }

        let mut staged = self.staging.confirm(self.target)?;
        self.state = PhotoState::Uploading;

        match self.gateway.submit(&mut staged).await {
            Ok(photo) => {
                self.staging.clear();
                self.state = PhotoState::Recorded;
                Ok(photo)
            }
            Err(e) => {
                if let Some(receipt) = staged.upload {
                    self.staging.record_upload(receipt);
                }
                self.state = PhotoState::Staged;
                warn!("Submission failed, photo kept for retry: {}", e);
                Err(e)
            }
        }
    }

    /// Release the camera. Called when leaving the capture screen.
    pub fn close(&mut self) {
        self.camera.close();
    }

    /// Editing after a recorded photo starts the next one
    fn require_editable(&mut self) -> Result<()> {
        match self.state {
            PhotoState::Recorded => {
                self.state = PhotoState::Idle;
                Ok(())
            }
            PhotoState::Idle | PhotoState::Staged => Ok(()),
            state => Err(SurveyError::invalid_state(format!(
                "cannot edit photo while {:?}",
                state
            ))),
        }
    }

    fn require_capture_ready(&mut self) -> Result<()> {
        match self.state {
            PhotoState::Recorded => {
                self.state = PhotoState::Idle;
                Ok(())
            }
            PhotoState::Idle => Ok(()),
            state => Err(SurveyError::invalid_state(format!(
                "cannot capture while {:?}",
                state
            ))),
        }
    }
}
