use crate::catalog;
use crate::error::{Result, SurveyError};
use crate::model::{Environment, NewEnvironment, NewPhoto, NewSurvey, Photo, Survey};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{error, warn};

use super::auth::AuthUser;
use super::server::ApiState;

impl IntoResponse for SurveyError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // internal details stay in the log
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
            self.to_string()
        };

        let body = serde_json::json!({ "message": message });
        (status, Json(body)).into_response()
    }
}

/// Malformed JSON bodies are validation failures
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| SurveyError::validation(e.body_text()))
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

pub async fn create_survey_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    payload: std::result::Result<Json<NewSurvey>, JsonRejection>,
) -> Result<(StatusCode, Json<Survey>)> {
    let survey = state
        .repository
        .create_survey(user.user_id, body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(survey)))
}

pub async fn list_surveys_handler(
    State(state): State<ApiState>,
    user: AuthUser,
) -> Result<Json<Vec<Survey>>> {
    Ok(Json(state.repository.list_surveys(user.user_id).await?))
}

pub async fn get_survey_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Survey>> {
    Ok(Json(state.repository.get_survey(user.user_id, id).await?))
}

pub async fn admin_list_surveys_handler(
    State(state): State<ApiState>,
    user: AuthUser,
) -> Result<Json<Vec<Survey>>> {
    user.require_admin()?;
    Ok(Json(state.repository.list_all_surveys().await?))
}

pub async fn create_environment_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    payload: std::result::Result<Json<NewEnvironment>, JsonRejection>,
) -> Result<(StatusCode, Json<Environment>)> {
    let environment = state
        .repository
        .create_environment(user.user_id, body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(environment)))
}

pub async fn get_environment_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Environment>> {
    Ok(Json(state.repository.get_environment(user.user_id, id).await?))
}

pub async fn list_environments_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(survey_id): Path<i64>,
) -> Result<Json<Vec<Environment>>> {
    Ok(Json(
        state
            .repository
            .list_environments(user.user_id, survey_id)
            .await?,
    ))
}

pub async fn create_photo_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    payload: std::result::Result<Json<NewPhoto>, JsonRejection>,
) -> Result<(StatusCode, Json<Photo>)> {
    let photo = state
        .repository
        .create_photo(user.user_id, body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn list_photos_handler(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(environment_id): Path<i64>,
) -> Result<Json<Vec<Photo>>> {
    Ok(Json(
        state
            .repository
            .list_photos(user.user_id, environment_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ServiceItemQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn service_items_handler(
    _user: AuthUser,
    Query(query): Query<ServiceItemQuery>,
) -> Json<Vec<&'static str>> {
    Json(catalog::search(&query.q))
}
