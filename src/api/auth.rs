use crate::error::SurveyError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use super::server::ApiState;

/// Caller identified by a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), SurveyError> {
        if self.admin {
            Ok(())
        } else {
            Err(SurveyError::forbidden(format!(
                "{} is not an administrator",
                self.username
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = SurveyError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(SurveyError::Unauthorized)?;

        let entry = state
            .tokens
            .iter()
            .find(|entry| entry.token == token)
            .ok_or_else(|| {
                debug!("Rejected unknown bearer token");
                SurveyError::Unauthorized
            })?;

        Ok(AuthUser {
            user_id: entry.user_id,
            username: entry.username.clone(),
            admin: entry.admin,
        })
    }
}
