use crate::error::{Result, SurveyError};
use crate::gateway::PhotoRecorder;
use crate::model::{Environment, NewEnvironment, NewPhoto, NewSurvey, Photo, Survey};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    surveys: Vec<Survey>,
    environments: Vec<Environment>,
    photos: Vec<Photo>,
    last_survey_id: i64,
    last_environment_id: i64,
    last_photo_id: i64,
}

impl Tables {
    fn survey(&self, id: i64) -> Result<&Survey> {
        self.surveys
            .iter()
            .find(|s| s.id == id)
            .ok_or(SurveyError::NotFound {
                entity: "Survey",
                id,
            })
    }

    fn environment(&self, id: i64) -> Result<&Environment> {
        self.environments
            .iter()
            .find(|e| e.id == id)
            .ok_or(SurveyError::NotFound {
                entity: "Environment",
                id,
            })
    }

    /// Survey `id`, provided `user_id` owns it
    fn owned_survey(&self, user_id: i64, id: i64) -> Result<&Survey> {
        let survey = self.survey(id)?;
        if survey.user_id != user_id {
            return Err(SurveyError::forbidden(format!(
                "survey {} belongs to another user",
                id
            )));
        }
        Ok(survey)
    }

    fn owned_environment(&self, user_id: i64, id: i64) -> Result<&Environment> {
        let environment = self.environment(id)?;
        self.owned_survey(user_id, environment.survey_id)?;
        Ok(environment)
    }
}

/// Surveys, environments and photos, with per-user ownership checks.
///
/// Held in memory; when a data file is configured every write is
/// persisted as a JSON snapshot.
pub struct SurveyRepository {
    tables: RwLock<Tables>,
    data_file: Option<PathBuf>,
}

impl SurveyRepository {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            data_file: None,
        }
    }

    /// Open a repository persisted at `data_file`, loading it if present
    pub async fn open<P: Into<PathBuf>>(data_file: P) -> Result<Self> {
        let data_file = data_file.into();
        let tables = if fs::try_exists(&data_file).await? {
            let raw = fs::read(&data_file).await?;
            let tables: Tables = serde_json::from_slice(&raw)?;
            info!(
                "Loaded {} surveys, {} environments, {} photos from {}",
                tables.surveys.len(),
                tables.environments.len(),
                tables.photos.len(),
                data_file.display()
            );
            tables
        } else {
            info!("Starting empty repository at {}", data_file.display());
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            data_file: Some(data_file),
        })
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(tables)?;
        let partial = path.with_extension("part");
        fs::write(&partial, json).await?;
        fs::rename(&partial, path).await?;

        debug!("Persisted repository to {}", path.display());
        Ok(())
    }

    pub async fn create_survey(&self, user_id: i64, new_survey: NewSurvey) -> Result<Survey> {
        new_survey.validate()?;

        let mut tables = self.tables.write().await;
        tables.last_survey_id += 1;
        let survey = Survey {
            id: tables.last_survey_id,
            user_id,
            agency_name: new_survey.agency_name.trim().to_string(),
            prefix: new_survey.prefix.trim().to_string(),
            manager_name: new_survey.manager_name.trim().to_string(),
            registration: new_survey.registration.trim().to_string(),
            created_at: Utc::now(),
        };
        tables.surveys.push(survey.clone());
        self.persist(&tables).await?;

        info!("Created survey {} for user {}", survey.id, user_id);
        Ok(survey)
    }

    pub async fn get_survey(&self, user_id: i64, id: i64) -> Result<Survey> {
        let tables = self.tables.read().await;
        tables.owned_survey(user_id, id).cloned()
    }

    /// A user's surveys, oldest first
    pub async fn list_surveys(&self, user_id: i64) -> Result<Vec<Survey>> {
        let tables = self.tables.read().await;
        let mut surveys: Vec<Survey> = tables
            .surveys
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        surveys.sort_by_key(|s| (s.created_at, s.id));
        Ok(surveys)
    }

    pub async fn list_all_surveys(&self) -> Result<Vec<Survey>> {
        let tables = self.tables.read().await;
        Ok(tables.surveys.clone())
    }

    pub async fn create_environment(
        &self,
        user_id: i64,
        new_environment: NewEnvironment,
    ) -> Result<Environment> {
        let name = new_environment.name.trim();
        if name.is_empty() {
            return Err(SurveyError::validation("name is required"));
        }

        let mut tables = self.tables.write().await;
        tables.owned_survey(user_id, new_environment.survey_id)?;

        tables.last_environment_id += 1;
        let environment = Environment {
            id: tables.last_environment_id,
            survey_id: new_environment.survey_id,
            name: name.to_string(),
        };
        tables.environments.push(environment.clone());
        self.persist(&tables).await?;

        info!(
            "Created environment {} '{}' in survey {}",
            environment.id, environment.name, environment.survey_id
        );
        Ok(environment)
    }

    pub async fn get_environment(&self, user_id: i64, id: i64) -> Result<Environment> {
        let tables = self.tables.read().await;
        tables.owned_environment(user_id, id).cloned()
    }

    /// Environments of a survey in insertion order
    pub async fn list_environments(&self, user_id: i64, survey_id: i64) -> Result<Vec<Environment>> {
        let tables = self.tables.read().await;
        tables.owned_survey(user_id, survey_id)?;
        Ok(tables
            .environments
            .iter()
            .filter(|e| e.survey_id == survey_id)
            .cloned()
            .collect())
    }

    pub async fn create_photo(&self, user_id: i64, new_photo: NewPhoto) -> Result<Photo> {
        new_photo.validate()?;

        let mut tables = self.tables.write().await;
        tables.owned_environment(user_id, new_photo.environment_id)?;

        tables.last_photo_id += 1;
        let photo = Photo {
            id: tables.last_photo_id,
            environment_id: new_photo.environment_id,
            image_url: new_photo.image_url,
            observation: new_photo.observation.filter(|o| !o.trim().is_empty()),
            photo_type: new_photo.photo_type,
            service_item: new_photo.service_item,
            painting_dimensions: new_photo.painting_dimensions,
            created_at: Utc::now(),
        };
        tables.photos.push(photo.clone());
        self.persist(&tables).await?;

        info!(
            "Created photo {} in environment {}",
            photo.id, photo.environment_id
        );
        Ok(photo)
    }

    pub async fn list_photos(&self, user_id: i64, environment_id: i64) -> Result<Vec<Photo>> {
        let tables = self.tables.read().await;
        tables.owned_environment(user_id, environment_id)?;
        Ok(tables
            .photos
            .iter()
            .filter(|p| p.environment_id == environment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PhotoRecorder for SurveyRepository {
    async fn record_photo(&self, user_id: i64, photo: NewPhoto) -> Result<Photo> {
        self.create_photo(user_id, photo).await
    }

    async fn referenced_image_urls(&self) -> Result<HashSet<String>> {
        let tables = self.tables.read().await;
        Ok(tables.photos.iter().map(|p| p.image_url.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classification, PaintingDimensions};

    fn new_survey() -> NewSurvey {
        NewSurvey {
            agency_name: "Agência Centro".to_string(),
            prefix: "0042".to_string(),
            manager_name: "Maria Souza".to_string(),
            registration: "F123456".to_string(),
        }
    }

    fn wide_photo(environment_id: i64) -> NewPhoto {
        NewPhoto {
            environment_id,
            image_url: "http://files/a.jpg".to_string(),
            observation: Some("".to_string()),
            photo_type: Classification::VistaAmpla,
            service_item: None,
            painting_dimensions: None,
        }
    }

    #[tokio::test]
    async fn test_survey_ownership() {
        let repo = SurveyRepository::in_memory();
        let survey = repo.create_survey(1, new_survey()).await.unwrap();

        assert_eq!(repo.get_survey(1, survey.id).await.unwrap(), survey);
        assert!(matches!(
            repo.get_survey(2, survey.id).await,
            Err(SurveyError::Forbidden { .. })
        ));
        assert!(matches!(
            repo.get_survey(1, 999).await,
            Err(SurveyError::NotFound { .. })
        ));
        assert_eq!(repo.list_surveys(1).await.unwrap().len(), 1);
        assert!(repo.list_surveys(2).await.unwrap().is_empty());
        assert_eq!(repo.list_all_surveys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_environments_keep_insertion_order() {
        let repo = SurveyRepository::in_memory();
        let survey = repo.create_survey(1, new_survey()).await.unwrap();

        for name in ["Área de Caixas", "Copa", "Auto-atendimento"] {
            repo.create_environment(
                1,
                NewEnvironment {
                    survey_id: survey.id,
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
        }

        let names: Vec<String> = repo
            .list_environments(1, survey.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Área de Caixas", "Copa", "Auto-atendimento"]);
    }

    #[tokio::test]
    async fn test_environment_validation_and_parents() {
        let repo = SurveyRepository::in_memory();
        let survey = repo.create_survey(1, new_survey()).await.unwrap();

        let blank = NewEnvironment {
            survey_id: survey.id,
            name: "  ".to_string(),
        };
        assert!(matches!(
            repo.create_environment(1, blank).await,
            Err(SurveyError::Validation { .. })
        ));

        let orphan = NewEnvironment {
            survey_id: 77,
            name: "Copa".to_string(),
        };
        assert!(matches!(
            repo.create_environment(1, orphan).await,
            Err(SurveyError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_photo_records() {
        let repo = SurveyRepository::in_memory();
        let survey = repo.create_survey(1, new_survey()).await.unwrap();
        let env = repo
            .create_environment(
                1,
                NewEnvironment {
                    survey_id: survey.id,
                    name: "Copa".to_string(),
                },
            )
            .await
            .unwrap();

        let photo = repo.create_photo(1, wide_photo(env.id)).await.unwrap();
        assert_eq!(photo.photo_type, Classification::VistaAmpla);
        assert!(photo.painting_dimensions.is_none());
        assert!(photo.observation.is_none());

        assert!(matches!(
            repo.create_photo(2, wide_photo(env.id)).await,
            Err(SurveyError::Forbidden { .. })
        ));
        assert!(matches!(
            repo.create_photo(1, wide_photo(404)).await,
            Err(SurveyError::NotFound { .. })
        ));

        let mut bad = wide_photo(env.id);
        bad.painting_dimensions = Some(PaintingDimensions::confirm("1", "1"));
        assert!(matches!(
            repo.create_photo(1, bad).await,
            Err(SurveyError::Validation { .. })
        ));

        assert_eq!(repo.list_photos(1, env.id).await.unwrap(), vec![photo]);
        let urls = repo.referenced_image_urls().await.unwrap();
        assert!(urls.contains("http://files/a.jpg"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("surveys.json");

        {
            let repo = SurveyRepository::open(&path).await.unwrap();
            let survey = repo.create_survey(5, new_survey()).await.unwrap();
            repo.create_environment(
                5,
                NewEnvironment {
                    survey_id: survey.id,
                    name: "Copa".to_string(),
                },
            )
            .await
            .unwrap();
        }

        let reopened = SurveyRepository::open(&path).await.unwrap();
        let surveys = reopened.list_surveys(5).await.unwrap();
        assert_eq!(surveys.len(), 1);
        assert_eq!(
            reopened.list_environments(5, surveys[0].id).await.unwrap()[0].name,
            "Copa"
        );

        let next = reopened.create_survey(5, new_survey()).await.unwrap();
        assert_eq!(next.id, surveys[0].id + 1);
    }
}
