pub mod camera;
pub mod catalog;
pub mod config;
pub mod enhance;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod model;
pub mod repository;
pub mod staging;
pub mod wizard;

#[cfg(feature = "api")]
pub mod api;

pub use camera::{CaptureController, DeviceProvider, MockDeviceProvider, NullSurface, PreviewSurface};
pub use config::SurveycamConfig;
pub use enhance::ImageEnhancer;
pub use error::{CaptureError, Result, SurveyError};
pub use frame::{EncodedImage, FacingMode, RasterFrame};
pub use gateway::{sweep_orphans, LocalObjectStore, ObjectStore, PhotoRecorder, SubmitGateway, SweepReport};
pub use model::{Classification, Environment, PaintingDimensions, Photo, Survey};
pub use repository::SurveyRepository;
pub use staging::{PhotoTarget, StagedPhoto, StagingStore};
pub use wizard::{CaptureMode, PhotoState, PhotoWizard};

#[cfg(all(target_os = "linux", feature = "camera"))]
pub use camera::GstDeviceProvider;

#[cfg(feature = "api")]
pub use api::ApiServer;
