//! File-backed screen capture.
//!
//! Reads the frame from an image file on every grab, so editing the file
//! between turns behaves like a changing screen.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sketchpal_core::capture::{CaptureSource, CapturedFrame, ScreenCapture};
use sketchpal_core::error::CaptureError;
use tracing::{debug, warn};

pub struct FileCapture {
    frame: PathBuf,
    canvas: Option<PathBuf>,
}

impl FileCapture {
    pub fn new(frame: PathBuf, canvas: Option<PathBuf>) -> Self {
        Self { frame, canvas }
    }
}

/// Capture source for the `--frame` / `--canvas` flags.
pub fn source(frame: Option<PathBuf>, canvas: Option<PathBuf>) -> CaptureSource {
    match frame {
        Some(frame) => CaptureSource::available(Arc::new(FileCapture::new(frame, canvas))),
        None => CaptureSource::Unavailable,
    }
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[async_trait]
impl ScreenCapture for FileCapture {
    fn name(&self) -> &str {
        "file"
    }

    async fn capture_frame(&self) -> Result<Option<CapturedFrame>, CaptureError> {
        let mime = mime_type(&self.frame).ok_or_else(|| {
            CaptureError::FrameFailed(format!(
                "unsupported image type: {}",
                self.frame.display()
            ))
        })?;

        let bytes = tokio::fs::read(&self.frame).await.map_err(|e| {
            CaptureError::FrameFailed(format!("{}: {e}", self.frame.display()))
        })?;
        if bytes.is_empty() {
            return Ok(None);
        }

        debug!(path = %self.frame.display(), bytes = bytes.len(), "Frame read");
        Ok(Some(CapturedFrame::new(mime, bytes)))
    }

    async fn canvas_snapshot(&self) -> Option<serde_json::Value> {
        let path = self.canvas.as_ref()?;
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Canvas state unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Canvas state is not JSON");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_type(Path::new("a/shot.PNG")), Some("image/png"));
        assert_eq!(mime_type(Path::new("shot.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_type(Path::new("shot.bmp")), None);
        assert_eq!(mime_type(Path::new("shot")), None);
    }

    #[test]
    fn no_frame_flag_means_unavailable() {
        assert!(!source(None, None).is_available());
        assert!(source(Some("x.png".into()), None).is_available());
    }

    #[tokio::test]
    async fn reads_frame_and_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("screen.png");
        let canvas = dir.path().join("canvas.json");
        std::fs::write(&frame, [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::File::create(&canvas)
            .unwrap()
            .write_all(br#"{"shapes":[{"type":"arrow"}]}"#)
            .unwrap();

        let source = source(Some(frame), Some(canvas));
        let (frame, canvas) = source.grab().await.unwrap().unwrap();

        assert_eq!(frame.mime_type, "image/png");
        assert_eq!(frame.bytes.len(), 4);
        assert!(frame.to_data_url().starts_with("data:image/png;base64,"));
        assert_eq!(canvas.unwrap()["shapes"][0]["type"], "arrow");
    }

    #[tokio::test]
    async fn missing_frame_file_is_capture_error() {
        let capture = FileCapture::new("/nonexistent/screen.png".into(), None);
        let err = capture.capture_frame().await.unwrap_err();
        assert!(matches!(err, CaptureError::FrameFailed(_)));
    }

    #[tokio::test]
    async fn bad_canvas_json_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = dir.path().join("canvas.json");
        std::fs::write(&canvas, "not json").unwrap();

        let capture = FileCapture::new(dir.path().join("screen.png"), Some(canvas));
        assert!(capture.canvas_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn empty_frame_file_means_no_frame_yet() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("screen.jpg");
        std::fs::write(&frame, b"").unwrap();

        let capture = FileCapture::new(frame, None);
        assert!(capture.capture_frame().await.unwrap().is_none());
    }
}
