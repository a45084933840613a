//! Image sources for reconstruction requests

use crate::ingest::PixelBuffer;
use crate::ingest::dicom_file::{DicomSource, is_dicom_path};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while decoding an input image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("DICOM read error: {0}")]
    DicomRead(#[from] dicom::object::ReadError),

    #[error("DICOM pixel data error: {0}")]
    DicomPixels(#[from] dicom_pixeldata::Error),

    #[error("Unsupported DICOM samples per pixel: {0}")]
    UnsupportedSamples(u16),

    #[error("Image has zero width or height")]
    EmptyImage,

    #[error("Invalid pixel buffer: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Anything that can produce a decoded pixel buffer.
///
/// Each call decodes into a fresh buffer owned by the caller.
pub trait ImageSource {
    /// Decode the image into RGB pixels.
    fn decode(&self) -> Result<PixelBuffer, DecodeError>;

    /// Human-readable description for logs and request metadata.
    fn describe(&self) -> String;
}

/// An image file on disk. `.dcm`/`.dicom` files are read as DICOM slices,
/// everything else through the `image` crate.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for FileSource {
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    fn decode(&self) -> Result<PixelBuffer, DecodeError> {
        if is_dicom_path(&self.path) {
            debug!("Decoding DICOM file");
            return DicomSource::new(&self.path).decode();
        }
        debug!("Decoding image file");
        let image = image::open(&self.path).map_err(|e| {
            warn!("Failed to decode {}: {}", self.path.display(), e);
            e
        })?;
        PixelBuffer::from_rgb_image(image.to_rgb8())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Encoded image bytes held in memory (e.g. an upload body).
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ImageSource for MemorySource {
    #[tracing::instrument(skip_all, fields(name = %self.name, bytes = self.bytes.len()))]
    fn decode(&self) -> Result<PixelBuffer, DecodeError> {
        let image = image::load_from_memory(&self.bytes)?;
        PixelBuffer::from_rgb_image(image.to_rgb8())
    }

    fn describe(&self) -> String {
        format!("{} ({} bytes)", self.name, self.bytes.len())
    }
}
