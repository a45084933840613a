//! Request parameters and pipeline configuration.
//!
//! Every empirically chosen threshold lives in one of the per-stage parameter
//! records grouped by [`PipelineConfig`]. All of them deserialize with
//! defaults, so a partial JSON document overrides only the fields it names.

use crate::analysis::{AbnormalityParams, ClassifierThresholds, RegionParams, TissueCategory};
use crate::ingest::SamplerConfig;
use crate::reconstruction::{DepthParams, MeshParams, ReconstructionError};
use radiomesh_data::LaplacianParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Category requested by the caller, or `Auto` to use the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrganHint {
    #[default]
    Auto,
    Category(TissueCategory),
}

impl OrganHint {
    pub fn category(&self) -> Option<TissueCategory> {
        match self {
            Self::Auto => None,
            Self::Category(c) => Some(*c),
        }
    }
}

impl fmt::Display for OrganHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Category(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for OrganHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse().map(Self::Category)
    }
}

impl TryFrom<String> for OrganHint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrganHint> for String {
    fn from(hint: OrganHint) -> Self {
        hint.to_string()
    }
}

/// Per-request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionParams {
    /// Mesh density in [0, 1].
    pub detail: f32,
    /// Bilateral smoothing strength in [0, 1].
    pub smoothing: f32,
    /// Depth multiplier, must be positive.
    pub depth_scale: f32,
    pub organ_hint: OrganHint,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            detail: 0.5,
            smoothing: 0.5,
            depth_scale: 1.0,
            organ_hint: OrganHint::Auto,
        }
    }
}

impl ReconstructionParams {
    /// Clamp `detail` and `smoothing` into [0, 1] and reject a non-positive
    /// or non-finite depth scale.
    pub fn validate(&self) -> Result<Self, ReconstructionError> {
        if !self.depth_scale.is_finite() || self.depth_scale <= 0.0 {
            return Err(ReconstructionError::InvalidParameters(format!(
                "depth scale must be positive, got {}",
                self.depth_scale
            )));
        }
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        Ok(Self {
            detail: unit(self.detail),
            smoothing: unit(self.smoothing),
            ..*self
        })
    }
}

/// Configuration for every pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    pub regions: RegionParams,
    pub abnormality: AbnormalityParams,
    pub classifier: ClassifierThresholds,
    pub depth: DepthParams,
    pub mesh: MeshParams,
    /// Post-assembly smoothing of the volumetric solid. Off by default.
    pub mesh_smoothing: LaplacianParams,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "sampler": { "max_dimension": 128 }, "depth": { "bilateral_radius": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.sampler.max_dimension, 128);
        assert_eq!(config.depth.bilateral_radius, 3);
        assert_eq!(config.depth.spatial_sigma, DepthParams::default().spatial_sigma);
        assert_eq!(config.regions, RegionParams::default());
        assert_eq!(config.classifier.kidney_score, 4.0);
        assert_eq!(config.mesh_smoothing.iterations, 0);
    }

    #[test]
    fn test_mesh_smoothing_config() {
        let config =
            PipelineConfig::from_json_str(r#"{ "mesh_smoothing": { "iterations": 10 } }"#)
                .unwrap();
        assert_eq!(config.mesh_smoothing.iterations, 10);
        assert_eq!(config.mesh_smoothing.relaxation, 0.15);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            PipelineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_organ_hint_parsing() {
        assert_eq!("auto".parse::<OrganHint>(), Ok(OrganHint::Auto));
        assert_eq!(
            "Kidney".parse::<OrganHint>(),
            Ok(OrganHint::Category(TissueCategory::Kidney))
        );
        assert!("toe".parse::<OrganHint>().is_err());

        let params: ReconstructionParams =
            serde_json::from_str(r#"{ "organ_hint": "mri-volumetric", "detail": 0.9 }"#).unwrap();
        assert_eq!(
            params.organ_hint,
            OrganHint::Category(TissueCategory::MriVolumetric)
        );
        assert_eq!(params.smoothing, 0.5);
        assert_eq!(
            serde_json::to_string(&OrganHint::Auto).unwrap(),
            "\"auto\""
        );
    }

    #[test]
    fn test_validate_clamps_and_rejects() {
        let params = ReconstructionParams {
            detail: 1.7,
            smoothing: -0.2,
            ..Default::default()
        };
        let valid = params.validate().unwrap();
        assert_eq!(valid.detail, 1.0);
        assert_eq!(valid.smoothing, 0.0);

        for depth_scale in [0.0, -1.0, f32::NAN] {
            let bad = ReconstructionParams {
                depth_scale,
                ..Default::default()
            };
            assert!(matches!(
                bad.validate(),
                Err(ReconstructionError::InvalidParameters(_))
            ));
        }
    }
}
