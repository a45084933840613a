//! Heuristic tissue and organ classification.
//!
//! Global statistics are computed once and then run through an ordered list
//! of named rules. Classification never fails: the final rule always matches.
//! Ambiguous inputs can be misclassified; this is a heuristic, not a model.

pub mod kidney;
pub mod rules;
pub mod statistics;

pub use kidney::KidneyIndicators;
pub use rules::{ClassificationRule, DEFAULT_RULES};
pub use statistics::TissueStatistics;

use crate::analysis::intensity::AnalyzedImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Category that routes a request to a template or the volumetric path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TissueCategory {
    Brain,
    Heart,
    Lung,
    Liver,
    Kidney,
    Skeleton,
    MriVolumetric,
}

impl TissueCategory {
    pub const ALL: [TissueCategory; 7] = [
        Self::Brain,
        Self::Heart,
        Self::Lung,
        Self::Liver,
        Self::Kidney,
        Self::Skeleton,
        Self::MriVolumetric,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Brain => "brain",
            Self::Heart => "heart",
            Self::Lung => "lung",
            Self::Liver => "liver",
            Self::Kidney => "kidney",
            Self::Skeleton => "skeleton",
            Self::MriVolumetric => "mri-volumetric",
        }
    }

    /// Whether the category names a specific organ.
    pub fn is_organ(&self) -> bool {
        matches!(
            self,
            Self::Brain | Self::Heart | Self::Lung | Self::Liver | Self::Kidney
        )
    }
}

impl fmt::Display for TissueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TissueCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.label() == lower)
            .ok_or_else(|| format!("Unknown tissue category: {s}"))
    }
}

/// Rule thresholds. Defaults carry the empirically chosen constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub blue_ratio: f32,
    pub gray_ratio: f32,
    pub symmetry: f32,
    pub strong_symmetry: f32,
    pub max_divergence: f32,
    pub brightness_min: f32,
    pub brightness_max: f32,
    pub bright_foreground: f32,
    pub pink_ratio: f32,
    pub brown_ratio: f32,
    pub square_aspect_min: f32,
    pub square_aspect_max: f32,
    pub red_dominance: f32,
    pub center_intensity: f32,
    pub kidney_score: f32,
    pub mri_gray_ratio: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            blue_ratio: 0.10,
            gray_ratio: 0.5,
            symmetry: 0.70,
            strong_symmetry: 0.85,
            max_divergence: 15.0,
            brightness_min: 80.0,
            brightness_max: 200.0,
            bright_foreground: 150.0,
            pink_ratio: 0.3,
            brown_ratio: 0.3,
            square_aspect_min: 0.85,
            square_aspect_max: 1.18,
            red_dominance: 0.8,
            center_intensity: 0.3,
            kidney_score: 4.0,
            mri_gray_ratio: 0.3,
        }
    }
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: TissueCategory,
    /// Name of the rule that matched.
    pub rule: &'static str,
    pub kidney_score: f32,
    pub statistics: TissueStatistics,
}

/// Assigns a single [`TissueCategory`] to an analyzed image.
#[derive(Debug, Clone)]
pub struct TissueClassifier {
    thresholds: ClassifierThresholds,
    rules: Vec<ClassificationRule>,
}

impl Default for TissueClassifier {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}

impl TissueClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self {
            thresholds,
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn classify(&self, image: &AnalyzedImage) -> Classification {
        let statistics = TissueStatistics::compute(image);
        self.classify_statistics(statistics)
    }

    /// Run the rule list over precomputed statistics.
    pub fn classify_statistics(&self, statistics: TissueStatistics) -> Classification {
        let (category, rule) = self
            .rules
            .iter()
            .find(|r| r.matches(&statistics, &self.thresholds))
            .map(|r| (r.category, r.name))
            .unwrap_or((TissueCategory::Skeleton, "default"));

        let kidney_score = statistics.kidney.score();
        debug!(
            "Classified as {} by rule '{}' (kidney score {:.1})",
            category, rule, kidney_score
        );
        Classification {
            category,
            rule,
            kidney_score,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::intensity::IntensityAnalyzer;
    use crate::ingest::PixelBuffer;

    fn classify(pixels: PixelBuffer) -> Classification {
        TissueClassifier::default().classify(&IntensityAnalyzer::default().analyze(&pixels))
    }

    /// Two layered kidneys with a medial notch on a warm background.
    fn kidney_image() -> PixelBuffer {
        const BACKGROUND: [u8; 3] = [85, 70, 55];
        const PELVIS: [u8; 3] = [95, 75, 60];
        const MEDULLA: [u8; 3] = [120, 95, 75];
        const CORTEX: [u8; 3] = [235, 205, 165];
        let (a, b) = (30.0f32, 45.0f32);
        PixelBuffer::from_fn(200, 120, |x, y| {
            let (cx, medial_sign) = if x < 100 { (50.0, 1.0) } else { (150.0, -1.0) };
            let dx = x as f32 - cx;
            let dy = y as f32 - 60.0;
            if dx * medial_sign > 0.6 * a && dy.abs() < 0.15 * b {
                return BACKGROUND;
            }
            let d = ((dx / a).powi(2) + (dy / b).powi(2)).sqrt();
            match d {
                d if d < 0.25 => PELVIS,
                d if d < 0.6 => MEDULLA,
                d if d < 1.0 => CORTEX,
                _ => BACKGROUND,
            }
        })
        .unwrap()
    }

    #[test]
    fn test_category_labels_round_trip() {
        for category in TissueCategory::ALL {
            assert_eq!(category.label().parse::<TissueCategory>(), Ok(category));
        }
        assert!("spleen".parse::<TissueCategory>().is_err());
        assert!(TissueCategory::Kidney.is_organ());
        assert!(!TissueCategory::MriVolumetric.is_organ());
    }

    #[test]
    fn test_rule_list_is_ordered() {
        let classifier = TissueClassifier::default();
        let names: Vec<_> = classifier.rules().iter().map(|r| r.name).collect();
        assert_eq!(names.first(), Some(&"bluish-dark-background"));
        assert_eq!(names.last(), Some(&"default"));
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_symmetric_grayscale_is_brain() {
        let pixels = PixelBuffer::from_fn(160, 160, |x, y| {
            let dx = (x as f32 + 0.5 - 80.0) / 60.0;
            let dy = (y as f32 + 0.5 - 80.0) / 70.0;
            if dx * dx + dy * dy < 1.0 { [140; 3] } else { [0; 3] }
        })
        .unwrap();
        let c = classify(pixels);
        assert_eq!(c.category, TissueCategory::Brain);
        assert_eq!(c.rule, "symmetric-grayscale");
    }

    #[test]
    fn test_red_image_is_heart() {
        let c = classify(PixelBuffer::filled(200, 120, [200, 40, 40]).unwrap());
        assert_eq!(c.category, TissueCategory::Heart);
    }

    #[test]
    fn test_pink_image_is_lung() {
        let c = classify(PixelBuffer::filled(200, 120, [230, 160, 170]).unwrap());
        assert_eq!(c.category, TissueCategory::Lung);
    }

    #[test]
    fn test_brown_image_is_liver() {
        let c = classify(PixelBuffer::filled(200, 120, [120, 55, 35]).unwrap());
        assert_eq!(c.category, TissueCategory::Liver);
    }

    #[test]
    fn test_bright_asymmetric_gray_is_xray() {
        let pixels = PixelBuffer::from_fn(160, 160, |x, y| {
            if (30..70).contains(&x) && (30..130).contains(&y) { [220; 3] } else { [0; 3] }
        })
        .unwrap();
        let c = classify(pixels);
        assert_eq!(c.category, TissueCategory::Skeleton);
        assert_eq!(c.rule, "xray");
    }

    #[test]
    fn test_dim_asymmetric_gray_is_mri() {
        let pixels = PixelBuffer::from_fn(160, 160, |x, y| {
            if (30..70).contains(&x) && (30..130).contains(&y) { [100; 3] } else { [0; 3] }
        })
        .unwrap();
        let c = classify(pixels);
        assert_eq!(c.category, TissueCategory::MriVolumetric);
    }

    #[test]
    fn test_kidney_image_meets_all_indicators() {
        let c = classify(kidney_image());
        assert_eq!(c.statistics.kidney, KidneyIndicators::ALL);
        assert!(c.kidney_score >= 4.0);
        assert_eq!(c.category, TissueCategory::Kidney);
        assert_eq!(c.rule, "kidney-score");
    }

    #[test]
    fn test_kidney_missing_indicators_falls_through() {
        let image = IntensityAnalyzer::default().analyze(&kidney_image());
        let mut stats = TissueStatistics::compute(&image);
        stats.kidney.similar_halves = false;
        stats.kidney.layering = false;
        stats.kidney.hilum = false;
        stats.kidney.pelvis = false;
        let c = TissueClassifier::default().classify_statistics(stats);
        assert!(c.kidney_score < 4.0);
        assert_ne!(c.category, TissueCategory::Kidney);
    }
}
