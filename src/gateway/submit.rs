use super::object_store::{ObjectStore, UploadReceipt};
use super::path::storage_key;
use crate::error::{Result, SurveyError};
use crate::model::{NewPhoto, Photo};
use crate::staging::StagedPhoto;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Metadata API that persists photo records
#[async_trait]
pub trait PhotoRecorder: Send + Sync {
    async fn record_photo(&self, user_id: i64, photo: NewPhoto) -> Result<Photo>;

    /// Image URLs referenced by any stored photo
    async fn referenced_image_urls(&self) -> Result<HashSet<String>>;
}

/// Uploads a confirmed photo and records it
#[derive(Clone)]
pub struct SubmitGateway {
    store: Arc<dyn ObjectStore>,
    recorder: Arc<dyn PhotoRecorder>,
    user_id: i64,
}

impl SubmitGateway {
    pub fn new(store: Arc<dyn ObjectStore>, recorder: Arc<dyn PhotoRecorder>, user_id: i64) -> Self {
        Self {
            store,
            recorder,
            user_id,
        }
    }

    /// Upload (unless already uploaded) and record a staged photo.
    ///
    /// A successful upload is written back into `staged.upload`, so after a
    /// `RecordingFailed` the caller can retry without uploading again. A
    /// receipt whose key no longer matches the photo's type or item is
    /// ignored and the image is uploaded to the current key.
    pub async fn submit(&self, staged: &mut StagedPhoto) -> Result<Photo> {
        let key = storage_key(staged);
        if let Some(stale) = staged.upload.as_ref().filter(|receipt| receipt.key != key) {
            warn!(
                draft = %staged.draft_id,
                "Upload at {} no longer matches {}, uploading again", stale.key, key
            );
            staged.upload = None;
        }

        let receipt = match &staged.upload {
            Some(receipt) => {
                info!(draft = %staged.draft_id, "Reusing upload at {}", receipt.url);
                receipt.clone()
            }
            None => {
                let receipt = self.upload(staged).await?;
                staged.upload = Some(receipt.clone());
                receipt
            }
        };

        self.record(staged, &receipt).await
    }

    pub async fn upload(&self, staged: &StagedPhoto) -> Result<UploadReceipt> {
        let key = storage_key(staged);
        info!(
            draft = %staged.draft_id,
            "Uploading {} bytes to {}",
            staged.image.len(),
            key
        );

        let url = self
            .store
            .put(&key, &staged.image.bytes, &staged.image.content_type)
            .await
            .map_err(|e| {
                error!(draft = %staged.draft_id, "Upload of {} failed: {}", key, e);
                SurveyError::UploadFailed {
                    reason: e.to_string(),
                }
            })?;

        Ok(UploadReceipt { key, url })
    }

    pub async fn record(&self, staged: &StagedPhoto, receipt: &UploadReceipt) -> Result<Photo> {
        let new_photo = NewPhoto {
            environment_id: staged.target.environment_id,
            image_url: receipt.url.clone(),
            observation: staged.observation.clone(),
            photo_type: staged.classification,
            service_item: staged.service_item.clone(),
            painting_dimensions: staged.dimensions.clone(),
        };

        let photo = self
            .recorder
            .record_photo(self.user_id, new_photo)
            .await
            .map_err(|e| {
                error!(
                    draft = %staged.draft_id,
                    "Recording {} failed, object left in storage: {}", receipt.url, e
                );
                SurveyError::RecordingFailed {
                    url: receipt.url.clone(),
                    reason: e.to_string(),
                }
            })?;

        info!(
            draft = %staged.draft_id,
            "Recorded photo {} ({}) for environment {}",
            photo.id, photo.photo_type, photo.environment_id
        );
        Ok(photo)
    }
}
