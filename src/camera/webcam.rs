use std::sync::mpsc::{self, Sender};
use std::thread;

use async_trait::async_trait;
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
    Camera, NokhwaError,
};
use tokio::sync::oneshot;

use super::{CameraDevice, CameraError, CameraRequest, CameraStream};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

enum CameraCommand {
    Frame(oneshot::Sender<Result<RgbImage, CameraError>>),
    Stop,
}

/// Native webcam through `nokhwa`.
#[derive(Default)]
pub struct NokhwaCamera;

impl NokhwaCamera {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CameraDevice for NokhwaCamera {
    async fn open(&self, request: CameraRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        let (tx, rx) = mpsc::channel::<CameraCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CameraError>>();

        // nokhwa cameras are not Send; the worker thread owns the device for its whole life
        thread::Builder::new()
            .name("camera-worker".to_string())
            .spawn(move || {
                let mut camera = match open_camera(request) {
                    Ok(camera) => {
                        let _ = ready_tx.send(Ok(()));
                        camera
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        CameraCommand::Frame(reply) => {
                            let _ = reply.send(read_frame(&mut camera));
                        }
                        CameraCommand::Stop => break,
                    }
                }

                if let Err(err) = camera.stop_stream() {
                    log_warn!("failed to stop camera stream: {err}");
                }
                log_info!("camera worker exited");
            })
            .map_err(|err| CameraError::Backend(err.to_string()))?;

        ready_rx
            .await
            .map_err(|_| CameraError::Backend("camera worker exited during open".into()))??;

        log_info!(
            "camera {} opened at requested {}x{}",
            request.index,
            request.width,
            request.height
        );

        Ok(Box::new(NokhwaStream { tx: Some(tx) }))
    }
}

struct NokhwaStream {
    tx: Option<Sender<CameraCommand>>,
}

#[async_trait]
impl CameraStream for NokhwaStream {
    async fn frame(&mut self) -> Result<RgbImage, CameraError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| CameraError::Frame("camera stream released".into()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(CameraCommand::Frame(reply_tx))
            .map_err(|_| CameraError::Frame("camera worker is gone".into()))?;

        reply_rx
            .await
            .map_err(|_| CameraError::Frame("camera worker dropped the request".into()))?
    }

    fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    fn release(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(CameraCommand::Stop);
        }
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn open_camera(request: CameraRequest) -> Result<Camera, CameraError> {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
        Resolution::new(request.width, request.height),
    ));

    let mut camera =
        Camera::new(CameraIndex::Index(request.index), format).map_err(map_nokhwa_error)?;
    camera.open_stream().map_err(map_nokhwa_error)?;
    Ok(camera)
}

fn read_frame(camera: &mut Camera) -> Result<RgbImage, CameraError> {
    let buffer = camera
        .frame()
        .map_err(|err| CameraError::Frame(err.to_string()))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|err| CameraError::Frame(err.to_string()))?;

    // nokhwa links its own `image` version; rebuild the buffer on ours
    let (width, height) = (decoded.width(), decoded.height());
    RgbImage::from_raw(width, height, decoded.into_raw())
        .ok_or_else(|| CameraError::Frame("frame buffer size mismatch".into()))
}

fn map_nokhwa_error(err: NokhwaError) -> CameraError {
    let message = err.to_string();
    let lowered = message.to_lowercase();

    if lowered.contains("permission") || lowered.contains("not authorized") || lowered.contains("denied") {
        CameraError::PermissionDenied
    } else if lowered.contains("not supported") || lowered.contains("unsupported") {
        CameraError::Unsupported
    } else if lowered.contains("no device") || lowered.contains("not found") || lowered.contains("index") {
        CameraError::NoDevice
    } else {
        CameraError::Backend(message)
    }
}
