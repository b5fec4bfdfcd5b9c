pub mod capture;
#[cfg(feature = "webcam")]
pub mod webcam;

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use capture::{capture_frame, encode_data_uri, Capture, CaptureError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("media devices not supported")]
    Unsupported,
    #[error("no camera device found")]
    NoDevice,
    #[error("failed to read frame: {0}")]
    Frame(String),
    #[error("camera backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRequest {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            index: 0,
            width: 1280,
            height: 720,
        }
    }
}

/// Something that can hand out a live video stream.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, request: CameraRequest) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// An open camera session. Implementations must stop their tracks on drop.
#[async_trait]
pub trait CameraStream: Send {
    /// Current frame of the live feed.
    async fn frame(&mut self) -> Result<RgbImage, CameraError>;

    fn is_active(&self) -> bool;

    /// Stops all tracks. Calling it twice is a no-op.
    fn release(&mut self);
}

/// Stand-in used when the binary was built without a camera backend.
pub struct UnavailableCamera;

#[async_trait]
impl CameraDevice for UnavailableCamera {
    async fn open(&self, _request: CameraRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        Err(CameraError::Unsupported)
    }
}

pub fn default_camera() -> Arc<dyn CameraDevice> {
    #[cfg(feature = "webcam")]
    {
        Arc::new(webcam::NokhwaCamera::new())
    }

    #[cfg(not(feature = "webcam"))]
    {
        log::warn!("built without the `webcam` feature; camera access will be unavailable");
        Arc::new(UnavailableCamera)
    }
}
