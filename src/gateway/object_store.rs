use crate::error::{Result, SurveyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Where an uploaded image ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub key: String,
    pub url: String,
}

/// Binary object storage keyed by hierarchical paths
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store (or overwrite) an object, returning its retrievable URL
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    fn url_for(&self, key: &str) -> String;
}

/// Object store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, part| path.join(part)))
    }
}

/// Keys are relative, `/`-separated, with no empty, `.` or `..` segments
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.contains('\\')
        && key
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");

    if valid {
        Ok(())
    } else {
        Err(SurveyError::validation(format!("invalid storage key '{}'", key)))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // write-then-rename so readers never see a partial object
        let partial = path.with_extension("part");
        fs::write(&partial, bytes).await?;
        fs::rename(&partial, &path).await?;

        info!(
            "Stored {} ({} bytes, {})",
            path.display(),
            bytes.len(),
            content_type
        );
        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if !fs::try_exists(&self.root).await? {
            return Ok(keys);
        }

        let mut pending = vec![(self.root.clone(), String::new())];
        while let Some((dir, dir_key)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if dir_key.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", dir_key, name)
                };

                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), key));
                } else if !name.ends_with(".part") && key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}
