//! Core mesh types produced by the reconstruction pipeline.
//!
//! A [`Mesh`] is a list of independently indexed components. Components do
//! not share vertex buffers; closedness of the assembled solid is a geometric
//! property checked by [`crate::topology`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Rendering/material hint attached to each mesh component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialHint {
    /// Displaced front surface carrying image colors.
    FrontSurface,
    /// Flat, darkened back surface.
    BackSurface,
    WallTop,
    WallRight,
    WallBottom,
    WallLeft,
    /// Mesh supplied by a template provider for the named category.
    Template(String),
}

impl MaterialHint {
    /// True for the four perimeter strips closing front and back.
    pub fn is_wall(&self) -> bool {
        matches!(
            self,
            Self::WallTop | Self::WallRight | Self::WallBottom | Self::WallLeft
        )
    }
}

/// One independently indexed piece of a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshComponent {
    /// Vertex positions.
    pub vertices: Vec<Vec3>,
    /// Triangle vertex indices into `vertices`.
    pub indices: Vec<[u32; 3]>,
    /// Per-vertex RGB color (linear, 0-1 range).
    pub vertex_colors: Vec<Vec3>,
    pub material: MaterialHint,
}

impl MeshComponent {
    /// Create an empty component with the given material hint.
    pub fn new(material: MaterialHint) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            vertex_colors: Vec::new(),
            material,
        }
    }

    /// Create an empty component with preallocated buffers.
    pub fn with_capacity(material: MaterialHint, vertices: usize, triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(triangles),
            vertex_colors: Vec::with_capacity(vertices),
            material,
        }
    }

    /// Append a vertex and return its index.
    pub fn push_vertex(&mut self, position: Vec3, color: Vec3) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(position);
        self.vertex_colors.push(color.clamp(Vec3::ZERO, Vec3::ONE));
        index
    }

    /// Append a triangle.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.push([a, b, c]);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Check that every index references an existing vertex and that colors
    /// line up with vertices.
    pub fn validate_indices(&self) -> bool {
        let count = self.vertices.len() as u32;
        self.vertex_colors.len() == self.vertices.len()
            && self
                .indices
                .iter()
                .all(|tri| tri.iter().all(|&i| i < count))
    }

    /// Unnormalized normal of triangle `tri`.
    pub fn triangle_normal(&self, tri: usize) -> Vec3 {
        let [a, b, c] = self.indices[tri];
        let v0 = self.vertices[a as usize];
        let v1 = self.vertices[b as usize];
        let v2 = self.vertices[c as usize];
        (v1 - v0).cross(v2 - v0)
    }

    /// Axis-aligned bounds `(min, max)`, or `None` when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(min, max), v| (min.min(*v), max.max(*v))),
        )
    }
}

/// Aggregate vertex/face counts. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStatistics {
    pub vertices: usize,
    pub faces: usize,
}

/// A mesh made of one or more components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub components: Vec<MeshComponent>,
}

impl Mesh {
    pub fn new(components: Vec<MeshComponent>) -> Self {
        Self { components }
    }

    /// Sum of vertex and triangle counts over all components.
    pub fn statistics(&self) -> MeshStatistics {
        self.components
            .iter()
            .fold(MeshStatistics::default(), |acc, c| MeshStatistics {
                vertices: acc.vertices + c.vertex_count(),
                faces: acc.faces + c.triangle_count(),
            })
    }

    /// First component carrying `material`, if any.
    pub fn component(&self, material: &MaterialHint) -> Option<&MeshComponent> {
        self.components.iter().find(|c| &c.material == material)
    }

    pub fn is_empty(&self) -> bool {
        self.components.iter().all(|c| c.indices.is_empty())
    }

    /// Axis-aligned bounds over every component.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.components
            .iter()
            .filter_map(MeshComponent::bounds)
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> MeshComponent {
        let mut c = MeshComponent::new(MaterialHint::FrontSurface);
        let a = c.push_vertex(Vec3::ZERO, Vec3::ONE);
        let b = c.push_vertex(Vec3::X, Vec3::ONE);
        let d = c.push_vertex(Vec3::Y, Vec3::ONE);
        c.push_triangle(a, b, d);
        c
    }

    #[test]
    fn test_push_vertex_clamps_color() {
        let mut c = MeshComponent::new(MaterialHint::BackSurface);
        c.push_vertex(Vec3::ZERO, Vec3::new(1.5, -0.2, 0.5));
        assert_eq!(c.vertex_colors[0], Vec3::new(1.0, 0.0, 0.5));
    }

    #[test]
    fn test_triangle_normal_ccw() {
        let c = unit_triangle();
        let n = c.triangle_normal(0).normalize();
        assert!((n - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_validate_indices() {
        let mut c = unit_triangle();
        assert!(c.validate_indices());
        c.push_triangle(0, 1, 7);
        assert!(!c.validate_indices());
    }

    #[test]
    fn test_statistics_sums_components() {
        let mesh = Mesh::new(vec![unit_triangle(), unit_triangle()]);
        let stats = mesh.statistics();
        assert_eq!(stats.vertices, 6);
        assert_eq!(stats.faces, 2);
    }

    #[test]
    fn test_bounds() {
        let mut other = unit_triangle();
        other.vertices[0] = Vec3::new(-2.0, 0.0, 1.0);
        let mesh = Mesh::new(vec![unit_triangle(), other]);
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 1.0, 1.0));
        assert!(Mesh::default().bounds().is_none());
    }

    #[test]
    fn test_material_hint_wall() {
        assert!(MaterialHint::WallLeft.is_wall());
        assert!(!MaterialHint::FrontSurface.is_wall());
        assert!(!MaterialHint::Template("heart".into()).is_wall());
    }
}
