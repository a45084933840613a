//! Ordered classification rules. The first rule whose predicate holds wins.

use super::statistics::TissueStatistics;
use super::{ClassifierThresholds, TissueCategory};

pub type RulePredicate = fn(&TissueStatistics, &ClassifierThresholds) -> bool;

/// One named `(predicate, category)` pair.
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub category: TissueCategory,
    pub predicate: RulePredicate,
}

impl ClassificationRule {
    pub fn matches(&self, stats: &TissueStatistics, t: &ClassifierThresholds) -> bool {
        (self.predicate)(stats, t)
    }
}

impl std::fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

fn bluish_dark_background(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.blue_ratio > t.blue_ratio && s.dark_background
}

fn symmetric_grayscale(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.gray_ratio > t.gray_ratio
        && s.symmetry > t.symmetry
        && s.channel_divergence < t.max_divergence
        && (t.brightness_min..=t.brightness_max).contains(&s.foreground_brightness)
}

fn symmetric_square_pink_or_gray(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    let tinted = s.pink_ratio > t.pink_ratio || (s.gray_ratio > t.gray_ratio && !s.dark_background);
    tinted
        && s.symmetry > t.strong_symmetry
        && (t.square_aspect_min..=t.square_aspect_max).contains(&s.aspect_ratio)
}

fn red_dominant_center(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.red_dominance > t.red_dominance && s.center_intensity > t.center_intensity
}

fn xray(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    let bright_gray = s.gray_ratio > t.gray_ratio && s.foreground_brightness > t.bright_foreground;
    let blue_asymmetric = s.blue_ratio > t.blue_ratio && s.symmetry <= t.symmetry;
    s.dark_background && (bright_gray || blue_asymmetric)
}

fn pink_dominant(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.pink_ratio > t.pink_ratio
}

fn brown_dominant(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.brown_ratio > t.brown_ratio
}

fn kidney_score(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.kidney.score() >= t.kidney_score
}

fn grayscale_dark_background(s: &TissueStatistics, t: &ClassifierThresholds) -> bool {
    s.gray_ratio > t.mri_gray_ratio && s.dark_background
}

fn always(_: &TissueStatistics, _: &ClassifierThresholds) -> bool {
    true
}

/// The rule list in evaluation order. The last rule always matches.
pub const DEFAULT_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "bluish-dark-background",
        category: TissueCategory::Brain,
        predicate: bluish_dark_background,
    },
    ClassificationRule {
        name: "symmetric-grayscale",
        category: TissueCategory::Brain,
        predicate: symmetric_grayscale,
    },
    ClassificationRule {
        name: "symmetric-square",
        category: TissueCategory::Brain,
        predicate: symmetric_square_pink_or_gray,
    },
    ClassificationRule {
        name: "red-dominant",
        category: TissueCategory::Heart,
        predicate: red_dominant_center,
    },
    ClassificationRule {
        name: "xray",
        category: TissueCategory::Skeleton,
        predicate: xray,
    },
    ClassificationRule {
        name: "pink-dominant",
        category: TissueCategory::Lung,
        predicate: pink_dominant,
    },
    ClassificationRule {
        name: "brown-red-dominant",
        category: TissueCategory::Liver,
        predicate: brown_dominant,
    },
    ClassificationRule {
        name: "kidney-score",
        category: TissueCategory::Kidney,
        predicate: kidney_score,
    },
    ClassificationRule {
        name: "grayscale-dark-background",
        category: TissueCategory::MriVolumetric,
        predicate: grayscale_dark_background,
    },
    ClassificationRule {
        name: "default",
        category: TissueCategory::Skeleton,
        predicate: always,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::kidney::KidneyIndicators;

    fn neutral() -> TissueStatistics {
        TissueStatistics {
            mean_r: 120.0,
            mean_g: 120.0,
            mean_b: 120.0,
            blue_ratio: 0.0,
            gray_ratio: 0.0,
            pink_ratio: 0.0,
            brown_ratio: 0.0,
            dark_ratio: 0.0,
            border_dark_ratio: 0.0,
            dark_background: false,
            symmetry: 0.5,
            aspect_ratio: 1.5,
            foreground_brightness: 120.0,
            channel_divergence: 0.0,
            red_dominance: 0.5,
            center_intensity: 0.5,
            kidney: KidneyIndicators::default(),
        }
    }

    fn first_match(s: &TissueStatistics) -> &'static str {
        let t = ClassifierThresholds::default();
        DEFAULT_RULES
            .iter()
            .find(|r| r.matches(s, &t))
            .map(|r| r.name)
            .unwrap_or("none")
    }

    #[test]
    fn test_last_rule_always_matches() {
        assert_eq!(first_match(&neutral()), "default");
    }

    #[test]
    fn test_rule_order_brain_before_xray() {
        let s = TissueStatistics {
            blue_ratio: 0.2,
            dark_background: true,
            symmetry: 0.3,
            ..neutral()
        };
        // matches both rule 1 and the x-ray rule; rule 1 comes first
        assert!(xray(&s, &ClassifierThresholds::default()));
        assert_eq!(first_match(&s), "bluish-dark-background");
    }

    #[test]
    fn test_heart_rule_needs_bright_center() {
        let dim = TissueStatistics {
            red_dominance: 1.5,
            center_intensity: 0.2,
            ..neutral()
        };
        assert_ne!(first_match(&dim), "red-dominant");
        let bright = TissueStatistics {
            center_intensity: 0.4,
            ..dim
        };
        assert_eq!(first_match(&bright), "red-dominant");
    }

    #[test]
    fn test_kidney_rule_threshold() {
        let s = TissueStatistics {
            kidney: KidneyIndicators {
                similar_halves: true,
                layering: true,
                ..Default::default()
            },
            ..neutral()
        };
        assert_eq!(first_match(&s), "kidney-score");
        let weak = TissueStatistics {
            kidney: KidneyIndicators {
                layering: true,
                hilum: true,
                ..Default::default()
            },
            ..neutral()
        };
        assert_eq!(first_match(&weak), "default");
    }
}
