use crate::config::{ApiConfig, ApiToken};
use crate::error::{Result, SurveyError};
use crate::repository::SurveyRepository;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    admin_list_surveys_handler, create_environment_handler, create_photo_handler,
    create_survey_handler, get_environment_handler, get_survey_handler, health_handler,
    list_environments_handler, list_photos_handler, list_surveys_handler, service_items_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ApiState {
    pub(crate) repository: Arc<SurveyRepository>,
    pub(crate) tokens: Arc<Vec<ApiToken>>,
}

/// REST API over the survey repository
pub struct ApiServer {
    pub(crate) config: ApiConfig,
    pub(crate) state: ApiState,
    pub(crate) files_root: Option<PathBuf>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, repository: Arc<SurveyRepository>, tokens: Vec<ApiToken>) -> Self {
        Self {
            config,
            state: ApiState {
                repository,
                tokens: Arc::new(tokens),
            },
            files_root: None,
        }
    }

    /// Also serve stored photos under `/files`
    pub fn with_files(mut self, root: impl Into<PathBuf>) -> Self {
        self.files_root = Some(root.into());
        self
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/health", get(health_handler))
            .route(
                "/api/surveys",
                post(create_survey_handler).get(list_surveys_handler),
            )
            .route("/api/surveys/:id", get(get_survey_handler))
            .route(
                "/api/surveys/:id/environments",
                get(list_environments_handler),
            )
            .route("/api/environments", post(create_environment_handler))
            .route("/api/environments/:id", get(get_environment_handler))
            .route("/api/environments/:id/photos", get(list_photos_handler))
            .route("/api/photos", post(create_photo_handler))
            .route("/api/service-items", get(service_items_handler))
            .route("/api/admin/surveys", get(admin_list_surveys_handler))
            .with_state(self.state.clone());

        let api = match &self.files_root {
            Some(root) => api.nest_service("/files", ServeDir::new(root)),
            None => api,
        };

        api.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let addr = format!("{}:{}", self.config.ip, self.config.port);

        info!("Starting survey API on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            SurveyError::component("api", format!("Failed to bind {}: {}", addr, e))
        })?;

        info!("Survey API listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| SurveyError::component("api", format!("Server error: {}", e)))?;

        info!("Survey API stopped");
        Ok(())
    }
}
