//! Radiomesh Data Crate
//!
//! Mesh representation, topology validation, smoothing and file export for
//! reconstructed surfaces. This crate knows nothing about images; it only
//! describes the geometry the reconstruction core produces.

pub mod export;
pub mod smooth;
pub mod topology;
pub mod types;

pub use export::{ExportError, ExportFormat, write_mesh, write_mesh_to};
pub use smooth::{LaplacianParams, SmoothingReport, smooth_laplacian};
pub use topology::TopologyReport;
pub use types::{MaterialHint, Mesh, MeshComponent, MeshStatistics};
