//! Image analysis
//!
//! Intensity and edge fields, region segmentation, abnormality scanning and
//! tissue classification. Every stage is a pure function of its inputs.

pub mod abnormality;
pub mod classifier;
pub mod field;
pub mod intensity;
pub mod regions;

pub use abnormality::{
    AbnormalityDetector, AbnormalityKind, AbnormalityParams, AbnormalityRecord, AbnormalityRegion,
    AbnormalityReport,
};
pub use classifier::{Classification, ClassifierThresholds, TissueCategory, TissueClassifier};
pub use field::{DepthField, EdgeMap, IntensityMap, ScalarField};
pub use intensity::{AnalyzedImage, IntensityAnalyzer};
pub use regions::{Region, RegionBounds, RegionExtractor, RegionParams};
