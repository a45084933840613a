//! Heuristic abnormality scanning and consolidation.
//!
//! Four independent scans produce raw findings (dark lesions, calcification,
//! color deviance, vessel blockage). Findings within a normalized distance of
//! each other are merged by single linkage into reported regions. The
//! detector never fails; an empty scan yields `detected = false`.

use crate::analysis::field::IntensityMap;
use crate::analysis::intensity::AnalyzedImage;
use crate::analysis::regions::Region;
use crate::ingest::PixelBuffer;
use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Abnormality detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbnormalityParams {
    /// Pixels darker than this may belong to a lesion.
    pub lesion_intensity: f32,
    /// Lesions must be larger than this many pixels.
    pub lesion_min_pixels: usize,
    /// Optional upper bound on a lesion's share of the image. `None` keeps
    /// every dark component regardless of size.
    pub lesion_max_fraction: Option<f32>,
    /// Local contrast above which a pixel is a calcification.
    pub calcification_contrast: f32,
    pub calcification_stride: usize,
    pub color_stride: usize,
    /// Blue must exceed red and green by this much (0-255 scale).
    pub cyanotic_margin: f32,
    pub cyanotic_max_brightness: f32,
    pub necrotic_max_brightness: f32,
    pub necrotic_max_saturation: f32,
    pub vessel_stride: usize,
    /// Red must exceed green and blue by this factor.
    pub vessel_red_dominance: f32,
    pub vessel_min_red: f32,
    /// Distance of the neighbors checked around vessel pixels.
    pub vessel_neighbor_distance: usize,
    /// A neighbor below this fraction of the vessel intensity is a drop.
    pub vessel_drop_ratio: f32,
    pub vessel_drop_floor: f32,
    pub max_findings_per_kind: usize,
    /// Findings closer than this (normalized units) are merged.
    pub merge_distance: f32,
}

impl Default for AbnormalityParams {
    fn default() -> Self {
        Self {
            lesion_intensity: 0.15,
            lesion_min_pixels: 15,
            lesion_max_fraction: None,
            calcification_contrast: 0.4,
            calcification_stride: 2,
            color_stride: 4,
            cyanotic_margin: 20.0,
            cyanotic_max_brightness: 100.0,
            necrotic_max_brightness: 40.0,
            necrotic_max_saturation: 0.15,
            vessel_stride: 3,
            vessel_red_dominance: 1.2,
            vessel_min_red: 80.0,
            vessel_neighbor_distance: 3,
            vessel_drop_ratio: 0.4,
            vessel_drop_floor: 0.2,
            max_findings_per_kind: 256,
            merge_distance: 0.1,
        }
    }
}

/// Category of an abnormal finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbnormalityKind {
    DarkLesion,
    Calcification,
    Cyanotic,
    Necrotic,
    VesselBlockage,
}

impl AbnormalityKind {
    pub const ALL: [AbnormalityKind; 5] = [
        Self::DarkLesion,
        Self::Calcification,
        Self::Cyanotic,
        Self::Necrotic,
        Self::VesselBlockage,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::DarkLesion => "dark lesion",
            Self::Calcification => "calcification",
            Self::Cyanotic => "cyanotic tissue",
            Self::Necrotic => "necrotic tissue",
            Self::VesselBlockage => "vessel blockage",
        }
    }
}

impl fmt::Display for AbnormalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single raw finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalityRecord {
    pub kind: AbnormalityKind,
    /// Position normalized to [0, 1] on both axes.
    pub position: Vec2,
    pub severity: f32,
    pub description: String,
}

/// Consolidated group of nearby findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalityRegion {
    pub kind: AbnormalityKind,
    pub position: Vec2,
    pub severity: f32,
    pub finding_count: usize,
    pub description: String,
}

/// Detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalityReport {
    pub detected: bool,
    pub regions: Vec<AbnormalityRegion>,
    pub summary: String,
}

impl AbnormalityReport {
    /// A report with no findings.
    pub fn empty() -> Self {
        Self {
            detected: false,
            regions: Vec::new(),
            summary: summarize(&[]),
        }
    }
}

/// Scans analyzed images for anomalous sub-regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbnormalityDetector {
    params: AbnormalityParams,
}

impl AbnormalityDetector {
    pub fn new(params: AbnormalityParams) -> Self {
        Self { params }
    }

    /// Run every scan and consolidate the findings.
    #[tracing::instrument(skip_all, fields(regions = regions.len()))]
    pub fn detect(&self, image: &AnalyzedImage, regions: &[Region]) -> AbnormalityReport {
        if image.intensity.is_empty() {
            return AbnormalityReport::empty();
        }

        let mut findings = Vec::new();
        findings.extend(self.dark_lesions(&image.intensity));
        findings.extend(self.calcifications(&image.intensity));
        findings.extend(self.color_deviance(&image.pixels, regions));
        findings.extend(self.vessel_blockages(&image.pixels, &image.intensity));

        debug!("Collected {} raw findings", findings.len());
        let merged = consolidate(&findings, self.params.merge_distance);

        AbnormalityReport {
            detected: !merged.is_empty(),
            summary: summarize(&merged),
            regions: merged,
        }
    }

    fn dark_lesions(&self, intensity: &IntensityMap) -> Vec<AbnormalityRecord> {
        let (w, h) = intensity.dimensions();
        let max_pixels = self
            .params
            .lesion_max_fraction
            .map_or(usize::MAX, |fraction| (fraction * (w * h) as f32) as usize);
        let threshold = self.params.lesion_intensity;
        let mut visited = vec![false; w * h];
        let mut findings = Vec::new();

        for y in 0..h {
            for x in 0..w {
                if visited[y * w + x] || intensity.get(x, y) >= threshold {
                    continue;
                }
                let component = dark_component(intensity, &mut visited, x, y, threshold);
                if component.pixels <= self.params.lesion_min_pixels
                    || component.pixels > max_pixels
                {
                    continue;
                }
                let mean = component.intensity_sum / component.pixels as f32;
                let centroid = component.position_sum / component.pixels as f32;
                findings.push(AbnormalityRecord {
                    kind: AbnormalityKind::DarkLesion,
                    position: normalize(centroid, w, h),
                    severity: (1.0 - mean).clamp(0.0, 1.0),
                    description: format!(
                        "Dark area of {} px (mean intensity {:.2})",
                        component.pixels, mean
                    ),
                });
                if findings.len() >= self.params.max_findings_per_kind {
                    return findings;
                }
            }
        }
        findings
    }

    fn calcifications(&self, intensity: &IntensityMap) -> Vec<AbnormalityRecord> {
        let (w, h) = intensity.dimensions();
        let d = self.params.calcification_stride.max(1);
        let mut findings = Vec::new();
        if w <= 2 * d || h <= 2 * d {
            return findings;
        }

        for y in (d..h - d).step_by(d) {
            for x in (d..w - d).step_by(d) {
                let neighbors = (intensity.get(x - d, y)
                    + intensity.get(x + d, y)
                    + intensity.get(x, y - d)
                    + intensity.get(x, y + d))
                    / 4.0;
                let contrast = intensity.get(x, y) - neighbors;
                if contrast > self.params.calcification_contrast {
                    findings.push(AbnormalityRecord {
                        kind: AbnormalityKind::Calcification,
                        position: normalize(Vec2::new(x as f32, y as f32), w, h),
                        severity: contrast.min(1.0),
                        description: format!("Bright focus, local contrast {contrast:.2}"),
                    });
                    if findings.len() >= self.params.max_findings_per_kind {
                        return findings;
                    }
                }
            }
        }
        findings
    }

    fn color_deviance(&self, pixels: &PixelBuffer, regions: &[Region]) -> Vec<AbnormalityRecord> {
        let (w, h) = (pixels.width() as usize, pixels.height() as usize);
        let stride = self.params.color_stride.max(1);
        let mut seen = vec![false; w * h];
        let mut cyanotic = Vec::new();
        let mut necrotic = Vec::new();
        let cap = self.params.max_findings_per_kind;

        for region in regions {
            let b = region.bounds;
            for y in (b.min_y..=b.max_y).step_by(stride) {
                for x in (b.min_x..=b.max_x).step_by(stride) {
                    if seen[y * w + x] {
                        continue;
                    }
                    seen[y * w + x] = true;
                    let [r, g, bl] = pixels.rgb(x as u32, y as u32).map(f32::from);
                    let brightness = (r + g + bl) / 3.0;
                    let position = normalize(Vec2::new(x as f32, y as f32), w, h);

                    if cyanotic.len() < cap
                        && bl > r + self.params.cyanotic_margin
                        && bl > g + self.params.cyanotic_margin
                        && brightness < self.params.cyanotic_max_brightness
                    {
                        cyanotic.push(AbnormalityRecord {
                            kind: AbnormalityKind::Cyanotic,
                            position,
                            severity: ((bl - r.max(g)) / 255.0).clamp(0.0, 1.0),
                            description: "Bluish low-brightness tissue".to_string(),
                        });
                    } else if necrotic.len() < cap
                        && brightness < self.params.necrotic_max_brightness
                        && saturation(r, g, bl) < self.params.necrotic_max_saturation
                    {
                        necrotic.push(AbnormalityRecord {
                            kind: AbnormalityKind::Necrotic,
                            position,
                            severity: (1.0 - brightness / 255.0).clamp(0.0, 1.0),
                            description: "Dark desaturated tissue".to_string(),
                        });
                    }
                }
            }
        }

        cyanotic.extend(necrotic);
        cyanotic
    }

    fn vessel_blockages(
        &self,
        pixels: &PixelBuffer,
        intensity: &IntensityMap,
    ) -> Vec<AbnormalityRecord> {
        let (w, h) = intensity.dimensions();
        let stride = self.params.vessel_stride.max(1);
        let reach = self.params.vessel_neighbor_distance as isize;
        let mut findings = Vec::new();

        for y in (0..h).step_by(stride) {
            for x in (0..w).step_by(stride) {
                let [r, g, b] = pixels.rgb(x as u32, y as u32).map(f32::from);
                let is_vessel = r > g * self.params.vessel_red_dominance
                    && r > b * self.params.vessel_red_dominance
                    && r > self.params.vessel_min_red;
                if !is_vessel {
                    continue;
                }
                let vessel_intensity = intensity.get(x, y);
                let drop = [(reach, 0), (-reach, 0), (0, reach), (0, -reach)]
                    .into_iter()
                    .filter_map(|(dx, dy)| {
                        let nx = x as isize + dx;
                        let ny = y as isize + dy;
                        (nx >= 0 && ny >= 0 && nx < w as isize && ny < h as isize)
                            .then(|| intensity.get(nx as usize, ny as usize))
                    })
                    .filter(|&n| {
                        n < vessel_intensity * self.params.vessel_drop_ratio
                            && n < self.params.vessel_drop_floor
                    })
                    .min_by_key(|&n| OrderedFloat(n));

                if let Some(neighbor) = drop {
                    let severity = if vessel_intensity > 0.0 {
                        1.0 - neighbor / vessel_intensity
                    } else {
                        0.0
                    };
                    findings.push(AbnormalityRecord {
                        kind: AbnormalityKind::VesselBlockage,
                        position: normalize(Vec2::new(x as f32, y as f32), w, h),
                        severity: severity.clamp(0.0, 1.0),
                        description: format!(
                            "Vessel signal drops from {vessel_intensity:.2} to {neighbor:.2}"
                        ),
                    });
                    if findings.len() >= self.params.max_findings_per_kind {
                        return findings;
                    }
                }
            }
        }
        findings
    }
}

struct DarkComponent {
    pixels: usize,
    intensity_sum: f32,
    position_sum: Vec2,
}

fn dark_component(
    intensity: &IntensityMap,
    visited: &mut [bool],
    sx: usize,
    sy: usize,
    threshold: f32,
) -> DarkComponent {
    let (w, h) = intensity.dimensions();
    let mut component = DarkComponent {
        pixels: 0,
        intensity_sum: 0.0,
        position_sum: Vec2::ZERO,
    };
    let mut stack = vec![(sx, sy)];
    visited[sy * w + sx] = true;

    while let Some((x, y)) = stack.pop() {
        component.pixels += 1;
        component.intensity_sum += intensity.get(x, y);
        component.position_sum += Vec2::new(x as f32, y as f32);
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx >= w || ny >= h {
                continue;
            }
            let idx = ny * w + nx;
            if !visited[idx] && intensity.get(nx, ny) < threshold {
                visited[idx] = true;
                stack.push((nx, ny));
            }
        }
    }

    component
}

fn normalize(p: Vec2, w: usize, h: usize) -> Vec2 {
    Vec2::new(
        p.x / (w.max(2) - 1) as f32,
        p.y / (h.max(2) - 1) as f32,
    )
}

fn saturation(r: f32, g: f32, b: f32) -> f32 {
    let max = r.max(g).max(b);
    if max <= 0.0 {
        return 0.0;
    }
    (max - r.min(g).min(b)) / max
}

/// Merge findings within `distance` of each other (single linkage).
///
/// Regions come out sorted by descending severity; ties keep the order of
/// their first finding.
pub fn consolidate(findings: &[AbnormalityRecord], distance: f32) -> Vec<AbnormalityRegion> {
    let n = findings.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in i + 1..n {
            if findings[i].position.distance(findings[j].position) <= distance {
                let a = find(&mut parent, i);
                let b = find(&mut parent, j);
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    // groups keyed by root, in order of first member
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(i),
            None => groups.push((root, vec![i])),
        }
    }

    let mut regions: Vec<AbnormalityRegion> = groups
        .into_iter()
        .map(|(_, members)| merge_group(findings, &members))
        .collect();
    regions.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.severity)));
    regions
}

fn merge_group(findings: &[AbnormalityRecord], members: &[usize]) -> AbnormalityRegion {
    let count = members.len();
    let position = members
        .iter()
        .map(|&i| findings[i].position)
        .sum::<Vec2>()
        / count as f32;

    // most frequent kind, ties broken by earliest member
    let mut kind = findings[members[0]].kind;
    let mut best = 0;
    for &i in members {
        let k = findings[i].kind;
        let c = members.iter().filter(|&&j| findings[j].kind == k).count();
        if c > best {
            best = c;
            kind = k;
        }
    }

    let description = if count == 1 {
        findings[members[0]].description.clone()
    } else {
        format!(
            "{} {} findings near ({:.2}, {:.2})",
            count,
            kind.label(),
            position.x,
            position.y
        )
    };

    AbnormalityRegion {
        kind,
        position,
        severity: (0.3 + 0.1 * count as f32).min(1.0),
        finding_count: count,
        description,
    }
}

/// Human-readable summary built from per-kind region counts.
pub fn summarize(regions: &[AbnormalityRegion]) -> String {
    if regions.is_empty() {
        return "No abnormalities detected".to_string();
    }
    let parts: Vec<String> = AbnormalityKind::ALL
        .iter()
        .filter_map(|kind| {
            let count = regions.iter().filter(|r| r.kind == *kind).count();
            (count > 0).then(|| format!("{count} {kind}"))
        })
        .collect();
    format!("Detected {} region(s): {}", regions.len(), parts.join(", "))
}
