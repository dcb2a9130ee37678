use thiserror::Error;

/// Failures of the camera / frame pipeline
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No camera device available: {details}")]
    DeviceUnavailable { details: String },

    #[error("No frame available: {details}")]
    CaptureEmpty { details: String },

    #[error("Image enhancement failed: {details}")]
    EnhancementFailed { details: String },

    #[error("Image encoding failed: {details}")]
    Encode { details: String },
}

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    #[error("Recording failed for {url}: {reason}")]
    RecordingFailed { url: String, reason: String },

    #[error("Invalid data: {message}")]
    Validation { message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid wizard step: {message}")]
    InvalidState { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SurveyError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// HTTP status code this error maps to on the REST surface
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Capture(CaptureError::DeviceUnavailable { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SurveyError>;
