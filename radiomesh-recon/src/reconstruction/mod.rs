//! Surface reconstruction
//!
//! Depth estimation from analyzed fields, closed mesh assembly, and the
//! pipeline that ties every stage together.

pub mod cancel;
pub mod depth;
pub mod pipeline;
pub mod volumetric;

pub use cancel::CancellationToken;
pub use depth::{DepthEstimator, DepthParams};
pub use pipeline::{
    ImageAnalysis, Reconstruction, ReconstructionError, ReconstructionRoute, Reconstructor,
};
pub use volumetric::{GridResolution, MeshParams, VolumetricMeshBuilder};
