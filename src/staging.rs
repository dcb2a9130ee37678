use crate::error::{Result, SurveyError};
use crate::frame::EncodedImage;
use crate::gateway::UploadReceipt;
use crate::model::{check_service_payload, Classification, PaintingDimensions};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Survey/environment a photo is being taken for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoTarget {
    pub survey_id: i64,
    pub environment_id: i64,
}

/// A confirmed, validated photo bundle. Only `StagingStore::confirm`
/// produces one, so unconfirmed data never reaches the gateway.
#[derive(Debug, Clone)]
pub struct StagedPhoto {
    pub draft_id: Uuid,
    pub target: PhotoTarget,
    pub image: EncodedImage,
    pub classification: Classification,
    pub service_item: Option<String>,
    pub dimensions: Option<PaintingDimensions>,
    pub observation: Option<String>,
    /// Fixed when the image was staged; names the storage object
    pub staged_at: DateTime<Utc>,
    /// Set once the image has been uploaded
    pub upload: Option<UploadReceipt>,
}

/// Holds the single in-progress photo across the wizard steps.
///
/// Each setter overwrites its slot. `clear` empties every slot so nothing
/// from one photo can leak into the next.
#[derive(Debug)]
pub struct StagingStore {
    draft_id: Uuid,
    image: Option<EncodedImage>,
    staged_at: Option<DateTime<Utc>>,
    classification: Option<Classification>,
    service_item: Option<String>,
    dimensions: Option<PaintingDimensions>,
    observation: Option<String>,
    upload: Option<UploadReceipt>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self {
            draft_id: Uuid::new_v4(),
            image: None,
            staged_at: None,
            classification: None,
            service_item: None,
            dimensions: None,
            observation: None,
            upload: None,
        }
    }

    /// Stage a new image. A previous upload belonged to the old image and
    /// is forgotten.
    pub fn set_image(&mut self, image: EncodedImage) {
        debug!(draft = %self.draft_id, "Staging {} byte image", image.len());
        self.image = Some(image);
        self.staged_at = Some(Utc::now());
        self.upload = None;
    }

    /// Changing the type moves the photo to another storage path, so an
    /// earlier upload no longer counts.
    pub fn set_classification(&mut self, classification: Classification) {
        if self.classification != Some(classification) {
            self.forget_upload();
        }
        self.classification = Some(classification);
    }

    pub fn set_service_item(&mut self, item: Option<String>) {
        if self.service_item != item {
            self.forget_upload();
        }
        self.service_item = item;
    }

    pub fn set_dimensions(&mut self, dimensions: Option<PaintingDimensions>) {
        self.dimensions = dimensions;
    }

    pub fn set_observation(&mut self, observation: Option<String>) {
        self.observation = observation.filter(|text| !text.trim().is_empty());
    }

    /// Remember where the current image was uploaded
    pub fn record_upload(&mut self, receipt: UploadReceipt) {
        self.upload = Some(receipt);
    }

    fn forget_upload(&mut self) {
        if let Some(receipt) = self.upload.take() {
            debug!(draft = %self.draft_id, "Forgetting upload at {}", receipt.url);
        }
    }

    /// Drop the image (retake) while keeping the chosen classification
    pub fn discard_image(&mut self) {
        self.image = None;
        self.staged_at = None;
        self.upload = None;
    }

    /// Empty every slot and start a fresh draft
    pub fn clear(&mut self) {
        debug!(draft = %self.draft_id, "Clearing staging store");
        *self = Self::new();
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
            && self.staged_at.is_none()
            && self.classification.is_none()
            && self.service_item.is_none()
            && self.dimensions.is_none()
            && self.observation.is_none()
            && self.upload.is_none()
    }

    pub fn draft_id(&self) -> Uuid {
        self.draft_id
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        self.image.as_ref()
    }

    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    pub fn service_item(&self) -> Option<&str> {
        self.service_item.as_deref()
    }

    pub fn dimensions(&self) -> Option<&PaintingDimensions> {
        self.dimensions.as_ref()
    }

    pub fn observation(&self) -> Option<&str> {
        self.observation.as_deref()
    }

    pub fn upload(&self) -> Option<&UploadReceipt> {
        self.upload.as_ref()
    }

    /// Read every slot into a validated bundle for submission
    pub fn confirm(&self, target: PhotoTarget) -> Result<StagedPhoto> {
        let (image, staged_at) = match (&self.image, self.staged_at) {
            (Some(image), Some(staged_at)) => (image.clone(), staged_at),
            _ => return Err(SurveyError::invalid_state("no image staged")),
        };
        let classification = self
            .classification
            .ok_or_else(|| SurveyError::invalid_state("no photo type chosen"))?;

        check_service_payload(
            classification,
            self.service_item.as_deref(),
            self.dimensions.as_ref(),
        )?;

        Ok(StagedPhoto {
            draft_id: self.draft_id,
            target,
            image,
            classification,
            service_item: self.service_item.clone(),
            dimensions: self.dimensions.clone(),
            observation: self.observation.clone(),
            staged_at,
            upload: self.upload.clone(),
        })
    }
}

impl Default for StagingStore {
    fn default() -> Self {
        Self::new()
    }
}
