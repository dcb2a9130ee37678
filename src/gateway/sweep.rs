use super::object_store::ObjectStore;
use super::submit::PhotoRecorder;
use crate::error::Result;
use tracing::{info, warn};

/// Outcome of an orphan sweep
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: Vec<String>,
    pub errors: Vec<String>,
}

/// Delete stored objects under `prefix` that no photo record references.
///
/// Uploads whose recording is still pending look like orphans too, so
/// run this while no wizard is submitting.
pub async fn sweep_orphans(
    store: &dyn ObjectStore,
    recorder: &dyn PhotoRecorder,
    prefix: &str,
) -> Result<SweepReport> {
    let referenced = recorder.referenced_image_urls().await?;
    let keys = store.list(prefix).await?;

    let mut report = SweepReport {
        scanned: keys.len(),
        ..SweepReport::default()
    };

    for key in keys {
        if referenced.contains(&store.url_for(&key)) {
            continue;
        }
        match store.delete(&key).await {
            Ok(()) => report.deleted.push(key),
            Err(e) => {
                warn!("Failed to delete orphan {}: {}", key, e);
                report.errors.push(format!("{}: {}", key, e));
            }
        }
    }

    info!(
        "Orphan sweep: {} scanned, {} deleted, {} errors",
        report.scanned,
        report.deleted.len(),
        report.errors.len()
    );
    Ok(report)
}
