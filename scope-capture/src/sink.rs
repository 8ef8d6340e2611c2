//! Stores captures as annotated PNG files.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use image::{ImageError, ImageFormat};
use scope_client::capture::{CaptureRequest, CaptureSink, Screen, TransferStatus};
use thiserror::Error;

use crate::annotate::{Annotation, annotate};

/// Name of the unannotated copy of the latest capture.
pub const RAW_CAPTURE_NAME: &str = "raw_scope_capture.png";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to decode image: {0}")]
    Decode(#[source] ImageError),
    #[error("Failed to encode {}: {source}", .path.display())]
    Encode { path: PathBuf, source: ImageError },
}

/// Writes the raw capture and the annotated capture into one directory.
pub struct PngFileSink {
    dir: PathBuf,
}

impl PngFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> PngFileSink {
        PngFileSink { dir: dir.into() }
    }

    fn write_raw(&self, png: &[u8]) -> Result<(), SinkError> {
        let path = self.dir.join(RAW_CAPTURE_NAME);
        fs::write(&path, png).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!("Wrote raw scope capture to {}", path.display());
        Ok(())
    }
}

impl CaptureSink for PngFileSink {
    type Error = SinkError;

    fn store(&mut self, screen: &Screen, request: &CaptureRequest) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.dir).map_err(|source| SinkError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        self.write_raw(&screen.png)?;

        if let TransferStatus::Truncated { declared, received } = screen.transfer {
            log::warn!(
                "Screen data incomplete ({} of {} bytes), the capture may be damaged",
                received,
                declared
            );
        }
        let image = image::load_from_memory_with_format(&screen.png, ImageFormat::Png)
            .map_err(SinkError::Decode)?
            .to_rgba8();
        log::debug!("Decoded {}x{} image", image.width(), image.height());

        log::info!("Annotating scope capture");
        let annotated = annotate(
            &image,
            &Annotation {
                note: request.note.as_deref(),
                labels: &request.labels,
                timestamp: screen.taken_at,
            },
        );

        let path = unused_path(&self.dir.join(&screen.filename));
        annotated
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| SinkError::Encode {
                path: path.clone(),
                source,
            })?;
        log::info!("Wrote annotated scope capture to {}", path.display());
        Ok(path)
    }
}

/// Returns `path` if it does not exist yet, otherwise the first of
/// `<stem>_2.<ext>`, `<stem>_3.<ext>`, ... that does not exist.
pub fn unused_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (2u32..)
        .map(|i| path.with_file_name(format!("{}_{}{}", stem, i, extension)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
