//! Image ingestion
//!
//! Decoding of input images (raster formats and single DICOM slices) into
//! owned pixel buffers and reduction to the working resolution used by every
//! analysis stage.

pub mod dicom_file;
pub mod pixels;
pub mod sampler;
pub mod source;

pub use dicom_file::DicomSource;
pub use pixels::PixelBuffer;
pub use sampler::{ImageSampler, SamplerConfig};
pub use source::{DecodeError, FileSource, ImageSource, MemorySource};
