//! Radiomesh Reconstruction Crate
//!
//! Heuristic reconstruction of a closed 3D surface from a single 2D
//! medical-style image. No volumetric data or learned model is involved; the
//! output is a plausible approximation, not a diagnostic result.
//!
//! ## Modules
//!
//! - [`ingest`]: Image and DICOM decoding, downsampling to the working resolution
//! - [`analysis`]: Intensity/edge fields, regions, abnormalities, classification
//! - [`reconstruction`]: Depth estimation, volumetric mesh assembly, pipeline
//! - [`templates`]: Organ template provider port
//! - [`persistence`]: Request tracking port
//! - [`config`]: Request parameters and stage thresholds

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod persistence;
pub mod reconstruction;
pub mod templates;

pub use analysis::TissueCategory;
pub use config::{ConfigError, OrganHint, PipelineConfig, ReconstructionParams};
pub use ingest::{DecodeError, DicomSource, FileSource, ImageSource, MemorySource, PixelBuffer};
pub use persistence::{InMemoryGateway, PersistenceGateway};
pub use reconstruction::{CancellationToken, Reconstruction, ReconstructionError, Reconstructor};
pub use templates::{OrganTemplateProvider, PrimitiveTemplates, TemplateError};
