use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use thiserror::Error;
use tokio::time::Instant;

use super::CameraStream;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("could not get a drawing surface: {0}")]
    Surface(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// One still taken from the live feed, ready to send.
#[derive(Debug, Clone)]
pub struct Capture {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

pub async fn capture_frame(
    stream: &mut dyn CameraStream,
    jpeg_quality: u8,
) -> Result<Capture, CaptureError> {
    let captured_at = Utc::now();
    let started = Instant::now();

    let frame = stream
        .frame()
        .await
        .map_err(|err| CaptureError::Surface(err.to_string()))?;

    if frame.width() == 0 || frame.height() == 0 {
        return Err(CaptureError::Surface("frame has no pixels".into()));
    }

    let (width, height) = frame.dimensions();
    let data_uri = tokio::task::spawn_blocking(move || encode_data_uri(&frame, jpeg_quality))
        .await
        .map_err(|err| CaptureError::Encode(format!("encoder worker join failed: {err}")))??;

    log::debug!(
        "Captured {}x{} frame ({} bytes as data URI) in {}ms",
        width,
        height,
        data_uri.len(),
        started.elapsed().as_millis()
    );

    Ok(Capture {
        data_uri,
        width,
        height,
        captured_at,
    })
}

/// Encodes a frame as a `data:image/jpeg;base64,...` URI.
pub fn encode_data_uri(frame: &RgbImage, jpeg_quality: u8) -> Result<String, CaptureError> {
    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality.clamp(1, 100))
        .encode_image(frame)
        .map_err(|err| CaptureError::Encode(err.to_string()))?;

    let mut uri = String::from(DATA_URI_PREFIX);
    STANDARD.encode_string(jpeg.get_ref(), &mut uri);
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeStream;
    use image::{ImageFormat, Rgb};

    #[test]
    fn encodes_jpeg_data_uri() {
        let frame = RgbImage::from_pixel(8, 6, Rgb([120, 40, 200]));

        let uri = encode_data_uri(&frame, 80).unwrap();

        let payload = uri.strip_prefix(DATA_URI_PREFIX).expect("jpeg data uri prefix");
        let bytes = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[tokio::test]
    async fn capture_reports_frame_dimensions() {
        let mut stream = FakeStream::new(RgbImage::from_pixel(16, 9, Rgb([0, 0, 0])));

        let capture = capture_frame(&mut stream, 80).await.unwrap();

        assert_eq!((capture.width, capture.height), (16, 9));
        assert!(capture.data_uri.starts_with(DATA_URI_PREFIX));
    }

    #[tokio::test]
    async fn empty_frame_is_a_surface_error() {
        let mut stream = FakeStream::new(RgbImage::new(0, 0));

        let err = capture_frame(&mut stream, 80).await.unwrap_err();

        assert!(matches!(err, CaptureError::Surface(_)));
    }

    #[tokio::test]
    async fn frame_error_is_a_surface_error() {
        let mut stream = FakeStream::new(RgbImage::new(4, 4));
        stream.release();

        let err = capture_frame(&mut stream, 80).await.unwrap_err();

        assert!(matches!(err, CaptureError::Surface(_)));
    }
}
