use super::*;
use crate::error::SurveyError;
use crate::frame::EncodedImage;
use crate::model::{Classification, NewEnvironment, NewPhoto, NewSurvey, PaintingDimensions, Photo};
use crate::repository::SurveyRepository;
use crate::staging::{PhotoTarget, StagedPhoto, StagingStore};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const USER: i64 = 1;

async fn seeded_repository() -> (Arc<SurveyRepository>, PhotoTarget) {
    let repo = Arc::new(SurveyRepository::in_memory());
    let survey = repo
        .create_survey(
            USER,
            NewSurvey {
                agency_name: "Agência Sul".to_string(),
                prefix: "0101".to_string(),
                manager_name: "João Lima".to_string(),
                registration: "F000111".to_string(),
            },
        )
        .await
        .unwrap();
    let env = repo
        .create_environment(
            USER,
            NewEnvironment {
                survey_id: survey.id,
                name: "Área de Caixas".to_string(),
            },
        )
        .await
        .unwrap();

    (
        repo,
        PhotoTarget {
            survey_id: survey.id,
            environment_id: env.id,
        },
    )
}

fn staged(
    target: PhotoTarget,
    classification: Classification,
    item: Option<&str>,
    dims: Option<PaintingDimensions>,
) -> StagedPhoto {
    let mut store = StagingStore::new();
    store.set_classification(classification);
    store.set_service_item(item.map(str::to_string));
    store.set_dimensions(dims);
    store.set_image(EncodedImage::jpeg(vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9], 2, 2));
    store.confirm(target).unwrap()
}

/// Store that rejects every write
struct RejectingStore;

#[async_trait]
impl ObjectStore for RejectingStore {
    async fn put(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> crate::error::Result<String> {
        Err(SurveyError::component("storage", "bucket rejected payload"))
    }

    async fn delete(&self, _key: &str) -> crate::error::Result<()> {
        Ok(())
    }

    async fn list(&self, _prefix: &str) -> crate::error::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn url_for(&self, key: &str) -> String {
        format!("mem://{}", key)
    }
}

/// Recorder that fails the first `failures` calls, then delegates
struct FlakyRecorder {
    inner: Arc<SurveyRepository>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl PhotoRecorder for FlakyRecorder {
    async fn record_photo(&self, user_id: i64, photo: NewPhoto) -> crate::error::Result<Photo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(SurveyError::component("api", "500 Internal Server Error"));
        }
        self.inner.record_photo(user_id, photo).await
    }

    async fn referenced_image_urls(&self) -> crate::error::Result<HashSet<String>> {
        self.inner.referenced_image_urls().await
    }
}

#[test]
fn test_storage_key_layout() {
    let target = PhotoTarget {
        survey_id: 12,
        environment_id: 34,
    };

    let draft = Uuid::parse_str("6f1c2b9e-8d3a-4f5e-9a7b-1c2d3e4f5a6b").unwrap();
    let mut wide = staged(target, Classification::VistaAmpla, None, None);
    wide.staged_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    wide.draft_id = draft;
    assert_eq!(
        storage_key(&wide),
        "12/34/vista_ampla/1700000000123-6f1c2b9e-8d3a-4f5e-9a7b-1c2d3e4f5a6b.jpg"
    );

    let mut item = staged(
        target,
        Classification::ServicosItens,
        Some("19.37 - SUBSTITUIÇÃO DE LÂMPADAS"),
        None,
    );
    item.staged_at = wide.staged_at;
    item.draft_id = draft;
    assert_eq!(
        storage_key(&item),
        "12/34/servicos_itens/19_37___substituicao_de_lampadas/1700000000123-6f1c2b9e-8d3a-4f5e-9a7b-1c2d3e4f5a6b.jpg"
    );
}

#[test]
fn test_drafts_staged_together_get_distinct_keys() {
    let target = PhotoTarget {
        survey_id: 1,
        environment_id: 2,
    };
    let staged_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

    let mut first = staged(target, Classification::Detalhes, None, None);
    let mut second = staged(target, Classification::Detalhes, None, None);
    first.staged_at = staged_at;
    second.staged_at = staged_at;

    assert_ne!(storage_key(&first), storage_key(&second));
    assert_eq!(storage_key(&first), storage_key(&first.clone()));
}

#[test]
fn test_validate_key() {
    assert!(validate_key("1/2/detalhes/3.jpg").is_ok());
    assert!(validate_key("").is_err());
    assert!(validate_key("/abs/path.jpg").is_err());
    assert!(validate_key("1/../secret").is_err());
    assert!(validate_key("1//2.jpg").is_err());
}

#[tokio::test]
async fn test_local_store_put_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::new(dir.path(), "http://files.local/");

    let url = store.put("1/2/detalhes/10.jpg", b"abc", "image/jpeg").await.unwrap();
    assert_eq!(url, "http://files.local/1/2/detalhes/10.jpg");
    store.put("1/3/vista_ampla/11.jpg", b"def", "image/jpeg").await.unwrap();

    assert_eq!(
        store.list("1/").await.unwrap(),
        vec!["1/2/detalhes/10.jpg", "1/3/vista_ampla/11.jpg"]
    );
    assert_eq!(store.list("1/3").await.unwrap().len(), 1);

    let on_disk = tokio::fs::read(dir.path().join("1/2/detalhes/10.jpg")).await.unwrap();
    assert_eq!(on_disk, b"abc");

    store.delete("1/2/detalhes/10.jpg").await.unwrap();
    store.delete("1/2/detalhes/10.jpg").await.unwrap();
    assert_eq!(store.list("").await.unwrap(), vec!["1/3/vista_ampla/11.jpg"]);
}

#[tokio::test]
async fn test_submit_wide_view_photo() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, target) = seeded_repository().await;
    let store = Arc::new(LocalObjectStore::new(dir.path(), "http://files"));
    let gateway = SubmitGateway::new(store.clone(), repo.clone(), USER);

    let mut photo = staged(target, Classification::VistaAmpla, None, None);
    let record = gateway.submit(&mut photo).await.unwrap();

    assert_eq!(record.photo_type, Classification::VistaAmpla);
    assert!(record.painting_dimensions.is_none());
    assert_eq!(record.image_url, photo.upload.as_ref().unwrap().url);
    assert!(record
        .image_url
        .starts_with(&format!("http://files/{}/{}/vista_ampla/", target.survey_id, target.environment_id)));
    assert_eq!(store.list("").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_painting_photo_records_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, target) = seeded_repository().await;
    let store = Arc::new(LocalObjectStore::new(dir.path(), "http://files"));
    let gateway = SubmitGateway::new(store, repo.clone(), USER);

    let mut photo = staged(
        target,
        Classification::ServicosItens,
        Some("17.8 - PINTURA DE PISO"),
        Some(PaintingDimensions::confirm("2", "3")),
    );
    let record = gateway.submit(&mut photo).await.unwrap();

    assert_eq!(
        record.painting_dimensions,
        Some(PaintingDimensions {
            width: "2".to_string(),
            height: "3".to_string(),
            area: "6,00".to_string(),
        })
    );
    assert!(record.image_url.contains("/17_8___pintura_de_piso/"));
    assert_eq!(repo.list_photos(USER, target.environment_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_failure_leaves_photo_unuploaded() {
    let (repo, target) = seeded_repository().await;
    let gateway = SubmitGateway::new(Arc::new(RejectingStore), repo.clone(), USER);

    let mut photo = staged(target, Classification::Detalhes, None, None);
    let result = gateway.submit(&mut photo).await;

    assert!(matches!(result, Err(SurveyError::UploadFailed { .. })));
    assert!(photo.upload.is_none());
    assert!(repo.list_photos(USER, target.environment_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recording_retry_reuses_upload() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, target) = seeded_repository().await;
    let store = Arc::new(LocalObjectStore::new(dir.path(), "http://files"));
    let recorder = Arc::new(FlakyRecorder {
        inner: repo.clone(),
        failures: AtomicUsize::new(1),
        calls: AtomicUsize::new(0),
    });
    let gateway = SubmitGateway::new(store.clone(), recorder.clone(), USER);

    let mut photo = staged(target, Classification::Detalhes, None, None);
    let first = gateway.submit(&mut photo).await;

    let url = match first {
        Err(SurveyError::RecordingFailed { url, .. }) => url,
        other => panic!("Expected RecordingFailed, got {:?}", other),
    };
    assert_eq!(photo.upload.as_ref().map(|r| r.url.clone()), Some(url.clone()));

    let record = gateway.submit(&mut photo).await.unwrap();
    assert_eq!(record.image_url, url);
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.list("").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sweep_removes_only_unreferenced_objects() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, target) = seeded_repository().await;
    let store = Arc::new(LocalObjectStore::new(dir.path(), "http://files"));
    let gateway = SubmitGateway::new(store.clone(), repo.clone(), USER);

    let mut kept = staged(target, Classification::VistaAmpla, None, None);
    gateway.submit(&mut kept).await.unwrap();

    let orphan_key = format!("{}/{}/detalhes/1.jpg", target.survey_id, target.environment_id);
    store.put(&orphan_key, b"orphan", "image/jpeg").await.unwrap();

    let report = sweep_orphans(store.as_ref(), repo.as_ref(), "").await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.deleted, vec![orphan_key]);
    assert!(report.errors.is_empty());
    assert_eq!(
        store.list("").await.unwrap(),
        vec![kept.upload.unwrap().key]
    );
}

#[tokio::test]
async fn test_stale_receipt_is_uploaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let (repo, target) = seeded_repository().await;
    let store = Arc::new(LocalObjectStore::new(dir.path(), "http://files"));
    let gateway = SubmitGateway::new(store.clone(), repo.clone(), USER);

    let mut photo = staged(target, Classification::VistaAmpla, None, None);
    let old = gateway.upload(&photo).await.unwrap();
    photo.upload = Some(old.clone());

    photo.classification = Classification::ServicosItens;
    photo.service_item = Some("17.8 - PINTURA DE PISO".to_string());
    photo.dimensions = Some(PaintingDimensions::confirm("2", "3"));
    let record = gateway.submit(&mut photo).await.unwrap();

    assert_eq!(record.image_url, store.url_for(&storage_key(&photo)));
    assert!(record.image_url.contains("/servicos_itens/17_8___pintura_de_piso/"));
    assert_ne!(photo.upload.as_ref().unwrap().key, old.key);
    assert_eq!(store.list("").await.unwrap().len(), 2);
}
