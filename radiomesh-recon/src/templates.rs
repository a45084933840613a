//! Organ template provider port and a primitive-shape implementation.
//!
//! The pipeline asks a provider for a pre-authored mesh whenever the
//! classifier recognizes a specific organ. [`PrimitiveTemplates`] stands in
//! for a real anatomical catalog with one closed primitive per category.

use crate::analysis::TissueCategory;
use crate::config::ReconstructionParams;
use glam::Vec3;
use radiomesh_data::{MaterialHint, Mesh, MeshComponent};
use std::collections::HashMap;
use std::f32::consts::{PI, TAU};
use thiserror::Error;
use tracing::debug;

/// Errors a template provider can report. The pipeline recovers from all of
/// them by taking the volumetric path.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("No template for category '{0}'")]
    Unsupported(TissueCategory),

    #[error("Template generation failed: {0}")]
    Generation(String),
}

/// Supplies a parametric mesh for a recognized category.
pub trait OrganTemplateProvider: Send + Sync {
    fn generate(
        &self,
        category: TissueCategory,
        params: &ReconstructionParams,
    ) -> Result<Mesh, TemplateError>;
}

/// Closed primitive shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    Ellipsoid { radii: Vec3 },
    Box { size: Vec3 },
    /// Y-aligned, centered on the origin.
    Cylinder { radius: f32, height: f32 },
}

impl ShapeKind {
    /// Build a closed, outward-wound component. `segments` controls the
    /// tessellation of curved shapes and is raised to at least 3.
    pub fn generate(&self, segments: u32) -> MeshComponent {
        let segments = segments.max(3) as usize;
        let mut component = MeshComponent::new(MaterialHint::Template(self.name().to_string()));
        match *self {
            Self::Ellipsoid { radii } => ellipsoid(&mut component, radii, segments),
            Self::Box { size } => cuboid(&mut component, size),
            Self::Cylinder { radius, height } => cylinder(&mut component, radius, height, segments),
        }
        component
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ellipsoid { .. } => "ellipsoid",
            Self::Box { .. } => "box",
            Self::Cylinder { .. } => "cylinder",
        }
    }
}

const NEUTRAL: Vec3 = Vec3::splat(0.8);

fn ellipsoid(c: &mut MeshComponent, radii: Vec3, rings: usize) {
    let sectors = 2 * rings;
    let north = c.push_vertex(Vec3::new(0.0, radii.y, 0.0), NEUTRAL);
    for i in 1..rings {
        let theta = PI * i as f32 / rings as f32;
        for k in 0..sectors {
            let phi = TAU * k as f32 / sectors as f32;
            let p = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            c.push_vertex(p * radii, NEUTRAL);
        }
    }
    let south = c.push_vertex(Vec3::new(0.0, -radii.y, 0.0), NEUTRAL);

    let ring = |i: usize, k: usize| (1 + (i - 1) * sectors + k % sectors) as u32;
    for k in 0..sectors {
        c.push_triangle(north, ring(1, k + 1), ring(1, k));
        for i in 1..rings - 1 {
            let (p00, p01) = (ring(i, k), ring(i, k + 1));
            let (p10, p11) = (ring(i + 1, k), ring(i + 1, k + 1));
            c.push_triangle(p00, p01, p10);
            c.push_triangle(p01, p11, p10);
        }
        c.push_triangle(ring(rings - 1, k), ring(rings - 1, k + 1), south);
    }
}

fn cuboid(c: &mut MeshComponent, size: Vec3) {
    // corner n has x, y, z taken from bits 0, 1, 2
    for n in 0..8u32 {
        let bit = |b: u32| if n & (1 << b) != 0 { 0.5 } else { -0.5 };
        c.push_vertex(Vec3::new(bit(0), bit(1), bit(2)) * size, NEUTRAL);
    }
    const FACES: [[u32; 3]; 12] = [
        [0, 4, 6], [0, 6, 2], // -x
        [1, 3, 7], [1, 7, 5], // +x
        [0, 1, 5], [0, 5, 4], // -y
        [2, 6, 7], [2, 7, 3], // +y
        [0, 2, 3], [0, 3, 1], // -z
        [4, 5, 7], [4, 7, 6], // +z
    ];
    for [a, b, d] in FACES {
        c.push_triangle(a, b, d);
    }
}

fn cylinder(c: &mut MeshComponent, radius: f32, height: f32, segments: usize) {
    let half = height / 2.0;
    for k in 0..segments {
        let phi = TAU * k as f32 / segments as f32;
        let (x, z) = (radius * phi.cos(), radius * phi.sin());
        c.push_vertex(Vec3::new(x, -half, z), NEUTRAL);
        c.push_vertex(Vec3::new(x, half, z), NEUTRAL);
    }
    let bottom_center = c.push_vertex(Vec3::new(0.0, -half, 0.0), NEUTRAL);
    let top_center = c.push_vertex(Vec3::new(0.0, half, 0.0), NEUTRAL);

    for k in 0..segments {
        let next = (k + 1) % segments;
        let (b0, t0) = (2 * k as u32, 2 * k as u32 + 1);
        let (b1, t1) = (2 * next as u32, 2 * next as u32 + 1);
        c.push_triangle(b0, t0, b1);
        c.push_triangle(b1, t0, t1);
        c.push_triangle(top_center, t1, t0);
        c.push_triangle(bottom_center, b0, b1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Template {
    shape: ShapeKind,
    color: Vec3,
}

/// One primitive per category, tinted and named after it.
#[derive(Debug, Clone)]
pub struct PrimitiveTemplates {
    templates: HashMap<TissueCategory, Template>,
}

impl Default for PrimitiveTemplates {
    fn default() -> Self {
        let entries = [
            (
                TissueCategory::Brain,
                ShapeKind::Ellipsoid { radii: Vec3::new(1.4, 1.1, 1.2) },
                Vec3::new(0.9, 0.75, 0.75),
            ),
            (
                TissueCategory::Heart,
                ShapeKind::Ellipsoid { radii: Vec3::new(1.0, 1.3, 0.9) },
                Vec3::new(0.7, 0.1, 0.1),
            ),
            (
                TissueCategory::Lung,
                ShapeKind::Ellipsoid { radii: Vec3::new(0.9, 1.5, 0.7) },
                Vec3::new(0.9, 0.6, 0.65),
            ),
            (
                TissueCategory::Liver,
                ShapeKind::Ellipsoid { radii: Vec3::new(1.6, 0.8, 1.0) },
                Vec3::new(0.5, 0.2, 0.15),
            ),
            (
                TissueCategory::Kidney,
                ShapeKind::Ellipsoid { radii: Vec3::new(0.6, 1.1, 0.5) },
                Vec3::new(0.6, 0.25, 0.2),
            ),
            (
                TissueCategory::Skeleton,
                ShapeKind::Cylinder { radius: 0.3, height: 3.0 },
                Vec3::new(0.9, 0.9, 0.85),
            ),
            (
                TissueCategory::MriVolumetric,
                ShapeKind::Box { size: Vec3::splat(2.0) },
                Vec3::splat(0.6),
            ),
        ];
        Self {
            templates: entries
                .into_iter()
                .map(|(category, shape, color)| (category, Template { shape, color }))
                .collect(),
        }
    }
}

impl PrimitiveTemplates {
    /// Replace the shape used for `category`.
    pub fn with_shape(mut self, category: TissueCategory, shape: ShapeKind, color: Vec3) -> Self {
        self.templates.insert(category, Template { shape, color });
        self
    }

    /// Drop `category`; requests for it fail with `Unsupported`.
    pub fn without(mut self, category: TissueCategory) -> Self {
        self.templates.remove(&category);
        self
    }

    pub fn shape(&self, category: TissueCategory) -> Option<ShapeKind> {
        self.templates.get(&category).map(|t| t.shape)
    }

    /// Tessellation for a detail level: 8 segments at 0, 32 at 1.
    pub fn segments_for(detail: f32) -> u32 {
        8 + (detail.clamp(0.0, 1.0) * 24.0).round() as u32
    }
}

impl OrganTemplateProvider for PrimitiveTemplates {
    fn generate(
        &self,
        category: TissueCategory,
        params: &ReconstructionParams,
    ) -> Result<Mesh, TemplateError> {
        let template = self
            .templates
            .get(&category)
            .ok_or(TemplateError::Unsupported(category))?;

        let mut component = template.shape.generate(Self::segments_for(params.detail));
        if !component.validate_indices() {
            return Err(TemplateError::Generation(format!(
                "{} template produced out-of-range indices",
                template.shape.name()
            )));
        }
        component.material = MaterialHint::Template(category.label().to_string());
        component.vertex_colors.fill(template.color);

        debug!(
            "Generated {} template: {} vertices, {} faces",
            category,
            component.vertex_count(),
            component.triangle_count()
        );
        Ok(Mesh::new(vec![component]))
    }
}
