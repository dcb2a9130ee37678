mod controller;
mod device;
mod mock;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod v4l2;

pub use controller::CaptureController;
pub use device::{DeviceProvider, NullSurface, PreviewSurface, StreamConstraints, StreamInfo, VideoStream};
pub use mock::MockDeviceProvider;
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use v4l2::GstDeviceProvider;
