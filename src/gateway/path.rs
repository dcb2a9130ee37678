use crate::catalog;
use crate::model::Classification;
use crate::staging::StagedPhoto;

/// Storage key for a staged photo:
/// `{survey}/{environment}/{classification}[/{item-slug}]/{timestamp}-{draft}.jpg`.
///
/// The timestamp is the staging time and the draft id is unique per
/// wizard draft, so retrying the same staged photo always targets the same
/// key while concurrent drafts never collide.
pub fn storage_key(staged: &StagedPhoto) -> String {
    let mut key = format!(
        "{}/{}/{}",
        staged.target.survey_id, staged.target.environment_id, staged.classification
    );

    if staged.classification == Classification::ServicosItens {
        if let Some(item) = staged.service_item.as_deref() {
            key.push('/');
            key.push_str(&catalog::slugify(item));
        }
    }

    key.push_str(&format!(
        "/{}-{}.jpg",
        staged.staged_at.timestamp_millis(),
        staged.draft_id
    ));
    key
}
