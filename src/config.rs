use crate::frame::FacingMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SurveycamConfig {
    pub camera: CameraConfig,
    pub enhance: EnhanceConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// V4L2 device used for the rear-facing camera
    #[serde(default = "default_rear_device")]
    pub rear_device: String,

    /// V4L2 device used for the front-facing camera
    #[serde(default = "default_front_device")]
    pub front_device: String,

    /// Facing requested when the camera is first opened
    #[serde(default = "default_facing")]
    pub facing: FacingMode,

    /// Ideal stream resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Captured frames are scaled down so neither side exceeds this
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// How long to wait for a device to reach the playing state
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnhanceConfig {
    /// Apply brightness/contrast correction before encoding
    #[serde(default = "default_enhance_enabled")]
    pub enabled: bool,

    /// Per-channel brightness multiplier
    #[serde(default = "default_brightness")]
    pub brightness: f32,

    /// Contrast multiplier around mid-gray
    #[serde(default = "default_contrast")]
    pub contrast: f32,

    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the object store
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Base URL under which stored objects are served
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// IP address to bind to
    #[serde(default = "default_api_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// JSON snapshot of surveys, environments and photos
    pub data_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuthConfig {
    /// Static bearer tokens accepted by the API
    #[serde(default)]
    pub tokens: Vec<ApiToken>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ApiToken {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub admin: bool,
}

impl SurveycamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("surveycam.toml")
    }

    /// Load configuration from a specific file path.
    ///
    /// `SURVEYCAM_`-prefixed environment variables override the file, with
    /// `__` between section and field: `SURVEYCAM_ENHANCE__JPEG_QUALITY=80`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, Self::environment())
    }

    /// Environment source for `SURVEYCAM_SECTION__FIELD` variables
    pub fn environment() -> Environment {
        Environment::with_prefix("SURVEYCAM")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Load from a file with an explicit environment source layered on top
    pub fn load_with_environment<P: AsRef<Path>>(
        path: P,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.rear_device", default_rear_device())?
            .set_default("camera.front_device", default_front_device())?
            .set_default("camera.facing", "rear")?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.max_dimension", default_max_dimension())?
            .set_default("camera.open_timeout_ms", default_open_timeout_ms())?
            .set_default("enhance.enabled", default_enhance_enabled())?
            .set_default("enhance.brightness", default_brightness() as f64)?
            .set_default("enhance.contrast", default_contrast() as f64)?
            .set_default("enhance.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("storage.path", default_storage_path())?
            .set_default("storage.public_url", default_public_url())?
            .set_default("api.ip", default_api_ip())?
            .set_default("api.port", default_api_port() as i64)?
            .set_default("auth.tokens", Vec::<String>::new())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            .add_source(environment)
            .build()?;

        let config: SurveycamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.max_dimension == 0 {
            return Err(ConfigError::Message(
                "Camera max_dimension must be greater than 0".to_string(),
            ));
        }

        for (name, factor) in [
            ("brightness", self.enhance.brightness),
            ("contrast", self.enhance.contrast),
        ] {
            if !(factor > 0.0 && factor <= 2.0) {
                return Err(ConfigError::Message(format!(
                    "Enhance {} must be in (0, 2], got {}",
                    name, factor
                )));
            }
        }

        if !(1..=100).contains(&self.enhance.jpeg_quality) {
            return Err(ConfigError::Message(
                "Enhance jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.api.port == 0 {
            return Err(ConfigError::Message(
                "API port must be greater than 0".to_string(),
            ));
        }

        if self.auth.tokens.iter().any(|t| t.token.trim().is_empty()) {
            return Err(ConfigError::Message(
                "Auth tokens must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SurveycamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            enhance: EnhanceConfig::default(),
            storage: StorageConfig {
                path: default_storage_path(),
                public_url: default_public_url(),
            },
            api: ApiConfig {
                ip: default_api_ip(),
                port: default_api_port(),
                data_file: None,
            },
            auth: AuthConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rear_device: default_rear_device(),
            front_device: default_front_device(),
            facing: default_facing(),
            resolution: default_camera_resolution(),
            max_dimension: default_max_dimension(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enhance_enabled(),
            brightness: default_brightness(),
            contrast: default_contrast(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

// Default value functions
fn default_rear_device() -> String {
    "/dev/video0".to_string()
}
fn default_front_device() -> String {
    "/dev/video1".to_string()
}
fn default_facing() -> FacingMode {
    FacingMode::Rear
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_max_dimension() -> u32 {
    1920
}
fn default_open_timeout_ms() -> u64 {
    3000
}

fn default_enhance_enabled() -> bool {
    true
}
fn default_brightness() -> f32 {
    1.1
}
fn default_contrast() -> f32 {
    1.05
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_storage_path() -> String {
    "./survey-photos".to_string()
}
fn default_public_url() -> String {
    "http://localhost:8080/files".to_string()
}

fn default_api_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SurveycamConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.camera.facing, FacingMode::Rear);
        assert_eq!(config.enhance.jpeg_quality, 90);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SurveycamConfig::default();

        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());
        config.camera.resolution = (1280, 720);

        config.enhance.brightness = 3.0;
        assert!(config.validate().is_err());
        config.enhance.brightness = 1.1;

        config.enhance.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.enhance.jpeg_quality = 85;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
facing = "front"
resolution = [640, 480]

[enhance]
brightness = 1.05
jpeg_quality = 85

[[auth.tokens]]
token = "abc"
user_id = 7
username = "inspector"
"#
        )
        .unwrap();

        let config = SurveycamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.facing, FacingMode::Front);
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.camera.max_dimension, 1920);
        assert_eq!(config.enhance.jpeg_quality, 85);
        assert!((config.enhance.brightness - 1.05).abs() < f32::EPSILON);
        assert_eq!(config.auth.tokens.len(), 1);
        assert_eq!(config.auth.tokens[0].user_id, 7);
        assert!(!config.auth.tokens[0].admin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_underscored_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[enhance]\njpeg_quality = 85").unwrap();

        let vars: config::Map<String, String> = [
            ("SURVEYCAM_ENHANCE__JPEG_QUALITY", "42"),
            ("SURVEYCAM_CAMERA__MAX_DIMENSION", "800"),
            ("SURVEYCAM_API__PORT", "9911"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let environment = SurveycamConfig::environment().source(Some(vars));

        let config = SurveycamConfig::load_with_environment(file.path(), environment).unwrap();

        assert_eq!(config.enhance.jpeg_quality, 42);
        assert_eq!(config.camera.max_dimension, 800);
        assert_eq!(config.api.port, 9911);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let text = toml::to_string_pretty(&SurveycamConfig::default()).unwrap();
        assert!(text.contains("[camera]"));
        assert!(text.contains("jpeg_quality = 90"));
    }
}
