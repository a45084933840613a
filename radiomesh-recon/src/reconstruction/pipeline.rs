//! End-to-end reconstruction of one image.
//!
//! Stages run in a fixed order, each producing a fresh read-only output for
//! the next: analysis, regions, abnormalities, classification, then either
//! an organ template or depth estimation, volumetric assembly and optional
//! Laplacian smoothing. A
//! [`CancellationToken`] is checked between stages.

use crate::analysis::{
    AbnormalityDetector, AbnormalityReport, Classification, IntensityAnalyzer, RegionExtractor,
    TissueCategory, TissueClassifier,
};
use crate::config::{PipelineConfig, ReconstructionParams};
use crate::ingest::{DecodeError, ImageSource, PixelBuffer};
use crate::persistence::ReconstructionSummary;
use crate::reconstruction::{
    CancellationToken, DepthEstimator, GridResolution, VolumetricMeshBuilder,
};
use crate::templates::OrganTemplateProvider;
use radiomesh_data::{Mesh, MeshStatistics, smooth_laplacian};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that abort a reconstruction.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Reconstruction cancelled before {stage}")]
    Cancelled { stage: &'static str },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Which path produced the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconstructionRoute {
    Template,
    Volumetric,
}

/// Image-level findings reported alongside the mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAnalysis {
    /// Source image size.
    pub width: u32,
    pub height: u32,
    pub detected_category: TissueCategory,
    /// Classification rule that fired. `None` when an organ hint or a
    /// decode fallback chose the category.
    pub classification_rule: Option<&'static str>,
    pub regions_detected: usize,
    pub abnormalities: AbnormalityReport,
}

/// Result of a reconstruction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconstruction {
    pub mesh: Mesh,
    pub statistics: MeshStatistics,
    pub image_analysis: ImageAnalysis,
    pub route: ReconstructionRoute,
}

impl Reconstruction {
    fn new(mesh: Mesh, image_analysis: ImageAnalysis, route: ReconstructionRoute) -> Self {
        Self {
            statistics: mesh.statistics(),
            mesh,
            image_analysis,
            route,
        }
    }
}

impl From<&Reconstruction> for ReconstructionSummary {
    fn from(r: &Reconstruction) -> Self {
        Self {
            statistics: r.statistics,
            detected_category: r.image_analysis.detected_category,
            regions_detected: r.image_analysis.regions_detected,
            abnormalities_detected: r.image_analysis.abnormalities.regions.len(),
            from_template: r.route == ReconstructionRoute::Template,
        }
    }
}

/// Runs the full pipeline with a fixed configuration.
pub struct Reconstructor {
    config: PipelineConfig,
    template_provider: Option<Box<dyn OrganTemplateProvider>>,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Reconstructor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            template_provider: None,
        }
    }

    /// Route recognized organs to `provider`.
    pub fn with_template_provider<P>(mut self, provider: P) -> Self
    where
        P: OrganTemplateProvider + 'static,
    {
        self.template_provider = Some(Box::new(provider));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn reconstruct(
        &self,
        pixels: &PixelBuffer,
        params: &ReconstructionParams,
    ) -> Result<Reconstruction, ReconstructionError> {
        self.reconstruct_with_cancel(pixels, params, &CancellationToken::new())
    }

    #[tracing::instrument(skip_all, fields(width = pixels.width(), height = pixels.height()))]
    pub fn reconstruct_with_cancel(
        &self,
        pixels: &PixelBuffer,
        params: &ReconstructionParams,
        cancel: &CancellationToken,
    ) -> Result<Reconstruction, ReconstructionError> {
        let params = params.validate()?;
        let config = &self.config;

        checkpoint(cancel, "analysis")?;
        let image = IntensityAnalyzer::new(config.sampler).analyze(pixels);

        checkpoint(cancel, "region extraction")?;
        let regions = RegionExtractor::new(config.regions).extract(&image.intensity, &image.edges);

        checkpoint(cancel, "abnormality detection")?;
        let abnormalities = AbnormalityDetector::new(config.abnormality).detect(&image, &regions);

        checkpoint(cancel, "classification")?;
        let classification: Classification =
            TissueClassifier::new(config.classifier).classify(&image);
        let (category, classification_rule) = match params.organ_hint.category() {
            Some(hinted) => (hinted, None),
            None => (classification.category, Some(classification.rule)),
        };

        let analysis = ImageAnalysis {
            width: pixels.width(),
            height: pixels.height(),
            detected_category: category,
            classification_rule,
            regions_detected: regions.len(),
            abnormalities,
        };

        if let Some(mesh) = self.try_template(category, &params) {
            checkpoint(cancel, "template assembly")?;
            let result = Reconstruction::new(mesh, analysis, ReconstructionRoute::Template);
            log_result(&result);
            return Ok(result);
        }

        checkpoint(cancel, "depth estimation")?;
        let resolution =
            GridResolution::for_image(pixels.width(), pixels.height(), params.detail, &config.mesh);
        let (nx, ny) = resolution.vertex_dims();
        let intensity = image.intensity.resample(nx, ny);
        let edges = image.edges.resample(nx, ny);
        let depth = DepthEstimator::new(config.depth).estimate(
            &intensity,
            &edges,
            params.depth_scale,
            params.smoothing,
        );

        checkpoint(cancel, "mesh assembly")?;
        let mut mesh = VolumetricMeshBuilder::new(config.mesh).build(&depth, pixels, resolution);

        if config.mesh_smoothing.iterations > 0 {
            checkpoint(cancel, "mesh smoothing")?;
            smooth_laplacian(&mut mesh, &config.mesh_smoothing);
        }

        let result = Reconstruction::new(mesh, analysis, ReconstructionRoute::Volumetric);
        log_result(&result);
        Ok(result)
    }

    /// Decode `source` and reconstruct it. When decoding fails and a template
    /// provider is configured, the template for the hinted category (skeleton
    /// for `auto`) is returned instead.
    pub fn reconstruct_source(
        &self,
        source: &dyn ImageSource,
        params: &ReconstructionParams,
    ) -> Result<Reconstruction, ReconstructionError> {
        let err = match source.decode() {
            Ok(pixels) => return self.reconstruct(&pixels, params),
            Err(err) => err,
        };
        warn!("Failed to decode {}: {}", source.describe(), err);

        let category = params.organ_hint.category().unwrap_or(TissueCategory::Skeleton);
        let Some(provider) = &self.template_provider else {
            return Err(err.into());
        };
        match provider.generate(category, params) {
            Ok(mesh) => {
                info!("Falling back to {} template", category);
                let analysis = ImageAnalysis {
                    width: 0,
                    height: 0,
                    detected_category: category,
                    classification_rule: None,
                    regions_detected: 0,
                    abnormalities: AbnormalityReport::empty(),
                };
                Ok(Reconstruction::new(mesh, analysis, ReconstructionRoute::Template))
            }
            Err(template_err) => {
                warn!("Fallback template unavailable: {}", template_err);
                Err(err.into())
            }
        }
    }

    /// Template mesh for an organ category, or `None` to take the volumetric path.
    fn try_template(
        &self,
        category: TissueCategory,
        params: &ReconstructionParams,
    ) -> Option<Mesh> {
        if !category.is_organ() {
            return None;
        }
        let provider = self.template_provider.as_ref()?;
        match provider.generate(category, params) {
            Ok(mesh) => Some(mesh),
            Err(err) => {
                warn!("Template provider failed, using volumetric path: {}", err);
                None
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken, stage: &'static str) -> Result<(), ReconstructionError> {
    if cancel.is_cancelled() {
        return Err(ReconstructionError::Cancelled { stage });
    }
    Ok(())
}

fn log_result(result: &Reconstruction) {
    info!(
        "Reconstructed {} via {:?} path: {} vertices, {} faces, {} regions, {} abnormal",
        result.image_analysis.detected_category,
        result.route,
        result.statistics.vertices,
        result.statistics.faces,
        result.image_analysis.regions_detected,
        result.image_analysis.abnormalities.regions.len()
    );
}
