//! Closed volumetric mesh assembly from a depth field.
//!
//! The solid is a displaced front grid, a flat back grid at a small negative
//! offset, and four wall strips joining their perimeters. Walls reuse the
//! exact boundary positions of the two grids so the union welds into one
//! watertight, outward-oriented surface.

use crate::analysis::field::DepthField;
use crate::ingest::PixelBuffer;
use glam::Vec3;
use radiomesh_data::{MaterialHint, Mesh, MeshComponent};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mesh assembly constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshParams {
    /// Width of the front surface in world units; height follows the grid aspect.
    pub physical_width: f32,
    /// Fixed z of the back surface.
    pub back_offset: f32,
    /// Multiplier applied to back-surface colors.
    pub back_darkening: f32,
    /// Cells along the long axis at `detail = 0`.
    pub min_resolution: u32,
    /// Cells along the long axis at `detail = 1`.
    pub max_resolution: u32,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            physical_width: 3.0,
            back_offset: -0.1,
            back_darkening: 0.5,
            min_resolution: 100,
            max_resolution: 256,
        }
    }
}

/// Number of grid cells along each axis. The grid has one more vertex than
/// cells per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridResolution {
    pub x: u32,
    pub y: u32,
}

impl GridResolution {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x: x.max(1), y: y.max(1) }
    }

    /// Aspect-corrected resolution for a `width x height` image. `detail`
    /// interpolates the long axis between the configured bounds.
    pub fn for_image(width: u32, height: u32, detail: f32, params: &MeshParams) -> Self {
        let lo = params.min_resolution.min(params.max_resolution) as f32;
        let hi = params.max_resolution.max(params.min_resolution) as f32;
        let long = (lo + detail.clamp(0.0, 1.0) * (hi - lo)).round().max(1.0);
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        if w >= h {
            Self::new(long as u32, (long * h / w).round() as u32)
        } else {
            Self::new((long * w / h).round() as u32, long as u32)
        }
    }

    /// Vertices per axis, `(x + 1, y + 1)`.
    pub fn vertex_dims(&self) -> (usize, usize) {
        (self.x as usize + 1, self.y as usize + 1)
    }

    pub fn vertex_count(&self) -> usize {
        let (nx, ny) = self.vertex_dims();
        nx * ny
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumetricMeshBuilder {
    params: MeshParams,
}

impl VolumetricMeshBuilder {
    pub fn new(params: MeshParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MeshParams {
        &self.params
    }

    /// Build the closed mesh. `depth` is resampled to the vertex grid when
    /// its dimensions differ; colors are sampled bilinearly from `colors`.
    #[tracing::instrument(skip_all, fields(res_x = resolution.x, res_y = resolution.y))]
    pub fn build(
        &self,
        depth: &DepthField,
        colors: &PixelBuffer,
        resolution: GridResolution,
    ) -> Mesh {
        let (nx, ny) = resolution.vertex_dims();
        let depth = if depth.dimensions() == (nx, ny) {
            depth.clone()
        } else {
            depth.resample(nx, ny)
        };

        let grid = Grid::new(&self.params, resolution);
        let mut front = MeshComponent::with_capacity(
            MaterialHint::FrontSurface,
            nx * ny,
            2 * resolution.x as usize * resolution.y as usize,
        );
        let mut back = MeshComponent::with_capacity(
            MaterialHint::BackSurface,
            nx * ny,
            2 * resolution.x as usize * resolution.y as usize,
        );

        for j in 0..ny {
            let v = j as f32 / (ny - 1) as f32;
            for i in 0..nx {
                let u = i as f32 / (nx - 1) as f32;
                let color = colors.sample_color(u, v);
                let z = depth.get(i, j);
                let z = if z.is_finite() { z } else { 0.0 };
                front.push_vertex(grid.position(i, j, z), color);
                back.push_vertex(
                    grid.position(i, j, self.params.back_offset),
                    color * self.params.back_darkening,
                );
            }
        }

        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let a = grid.index(i, j);
                let b = grid.index(i + 1, j);
                let c = grid.index(i, j + 1);
                let d = grid.index(i + 1, j + 1);
                // front faces +z
                front.push_triangle(a, c, b);
                front.push_triangle(b, c, d);
                back.push_triangle(a, b, c);
                back.push_triangle(b, d, c);
            }
        }

        let walls = [
            (MaterialHint::WallTop, grid.top_path()),
            (MaterialHint::WallRight, grid.right_path()),
            (MaterialHint::WallBottom, grid.bottom_path()),
            (MaterialHint::WallLeft, grid.left_path()),
        ]
        .map(|(material, path)| wall_strip(material, &path, &front, &back));

        let mut components = vec![front, back];
        components.extend(walls);
        let mesh = Mesh::new(components);

        let stats = mesh.statistics();
        debug!(
            "Built volumetric mesh: {} vertices, {} faces",
            stats.vertices, stats.faces
        );
        mesh
    }
}

struct Grid {
    nx: usize,
    ny: usize,
    width: f32,
    height: f32,
}

impl Grid {
    fn new(params: &MeshParams, resolution: GridResolution) -> Self {
        let (nx, ny) = resolution.vertex_dims();
        let width = params.physical_width;
        Self {
            nx,
            ny,
            width,
            height: width * resolution.y as f32 / resolution.x as f32,
        }
    }

    fn index(&self, i: usize, j: usize) -> u32 {
        (j * self.nx + i) as u32
    }

    fn position(&self, i: usize, j: usize, z: f32) -> Vec3 {
        let res_x = (self.nx - 1) as f32;
        let res_y = (self.ny - 1) as f32;
        Vec3::new(
            -self.width / 2.0 + i as f32 * self.width / res_x,
            self.height / 2.0 - j as f32 * self.height / res_y,
            z,
        )
    }

    // Perimeter paths run clockwise seen from the front: top left-to-right,
    // right top-to-bottom, bottom right-to-left, left bottom-to-top.

    fn top_path(&self) -> Vec<u32> {
        (0..self.nx).map(|i| self.index(i, 0)).collect()
    }

    fn right_path(&self) -> Vec<u32> {
        (0..self.ny).map(|j| self.index(self.nx - 1, j)).collect()
    }

    fn bottom_path(&self) -> Vec<u32> {
        (0..self.nx).rev().map(|i| self.index(i, self.ny - 1)).collect()
    }

    fn left_path(&self) -> Vec<u32> {
        (0..self.ny).rev().map(|j| self.index(0, j)).collect()
    }
}

/// Ladder of quads joining consecutive front/back boundary vertices along
/// `path`, wound to face away from the solid.
fn wall_strip(
    material: MaterialHint,
    path: &[u32],
    front: &MeshComponent,
    back: &MeshComponent,
) -> MeshComponent {
    let mut wall = MeshComponent::with_capacity(
        material,
        2 * path.len(),
        2 * path.len().saturating_sub(1),
    );
    for &idx in path {
        let k = idx as usize;
        wall.push_vertex(front.vertices[k], front.vertex_colors[k]);
        wall.push_vertex(back.vertices[k], back.vertex_colors[k]);
    }
    for s in 0..path.len().saturating_sub(1) as u32 {
        let (fp, bp) = (2 * s, 2 * s + 1);
        let (fq, bq) = (2 * s + 2, 2 * s + 3);
        wall.push_triangle(fp, fq, bq);
        wall.push_triangle(fp, bq, bp);
    }
    wall
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::field::ScalarField;
    use radiomesh_data::TopologyReport;

    fn build(res_x: u32, res_y: u32) -> Mesh {
        let depth = ScalarField::from_fn(7, 5, |x, y| 0.1 * x as f32 + 0.05 * y as f32);
        let colors = PixelBuffer::from_fn(7, 5, |x, y| [x as u8 * 30, y as u8 * 40, 90]).unwrap();
        VolumetricMeshBuilder::default().build(&depth, &colors, GridResolution::new(res_x, res_y))
    }

    #[test]
    fn test_component_layout() {
        let mesh = build(6, 4);
        let materials: Vec<_> = mesh.components.iter().map(|c| c.material.clone()).collect();
        assert_eq!(
            materials,
            vec![
                MaterialHint::FrontSurface,
                MaterialHint::BackSurface,
                MaterialHint::WallTop,
                MaterialHint::WallRight,
                MaterialHint::WallBottom,
                MaterialHint::WallLeft,
            ]
        );
        assert_eq!(mesh.components[0].vertex_count(), 7 * 5);
        assert_eq!(mesh.components[1].vertex_count(), 7 * 5);
        assert_eq!(mesh.components[0].triangle_count(), 2 * 6 * 4);
        assert_eq!(mesh.components[2].triangle_count(), 2 * 6);
        assert_eq!(mesh.components[3].triangle_count(), 2 * 4);
        assert!(mesh.components.iter().all(MeshComponent::validate_indices));
    }

    #[test]
    fn test_watertight_for_various_resolutions() {
        for (rx, ry) in [(1, 1), (2, 3), (17, 5), (100, 64)] {
            let mesh = build(rx, ry);
            let report = TopologyReport::analyze(&mesh);
            assert!(report.is_watertight(), "{rx}x{ry}: {report:?}");
            let (nx, ny) = (rx as usize + 1, ry as usize + 1);
            assert_eq!(report.welded_vertices, 2 * nx * ny);
            assert_eq!(mesh.components[0].vertex_count(), nx * ny);
            assert_eq!(mesh.components[1].vertex_count(), nx * ny);
        }
    }

    #[test]
    fn test_front_faces_forward_back_faces_backward() {
        let mesh = build(4, 4);
        let front = &mesh.components[0];
        let back = &mesh.components[1];
        assert!((0..front.triangle_count()).all(|t| front.triangle_normal(t).z > 0.0));
        assert!((0..back.triangle_count()).all(|t| back.triangle_normal(t).z < 0.0));
    }

    #[test]
    fn test_walls_face_outward() {
        let mesh = build(5, 3);
        let expected = [
            (MaterialHint::WallTop, Vec3::Y),
            (MaterialHint::WallRight, Vec3::X),
            (MaterialHint::WallBottom, Vec3::NEG_Y),
            (MaterialHint::WallLeft, Vec3::NEG_X),
        ];
        for (material, outward) in expected {
            let wall = mesh.component(&material).unwrap();
            for t in 0..wall.triangle_count() {
                let normal = wall.triangle_normal(t).normalize();
                assert!(normal.dot(outward) > 0.99, "{material:?} triangle {t}");
            }
        }
    }

    #[test]
    fn test_grid_extent_and_back_offset() {
        let mesh = build(6, 4);
        let front = &mesh.components[0];
        assert_eq!(front.vertices[0].x, -1.5);
        assert_eq!(front.vertices[0].y, 1.0);
        let last = front.vertices[front.vertex_count() - 1];
        assert!((last.x - 1.5).abs() < 1e-5);
        assert!((last.y + 1.0).abs() < 1e-5);
        let back = &mesh.components[1];
        assert!(back.vertices.iter().all(|v| v.z == -0.1));
        assert!((back.vertex_colors[0] * 2.0 - front.vertex_colors[0]).length() < 1e-6);
    }

    #[test]
    fn test_resolution_for_image() {
        let params = MeshParams::default();
        let grid = |w, h, detail| GridResolution::for_image(w, h, detail, &params);
        assert_eq!(grid(640, 480, 0.0), GridResolution::new(100, 75));
        assert_eq!(grid(480, 960, 1.0), GridResolution::new(128, 256));
        assert_eq!(grid(300, 300, 0.5), GridResolution::new(178, 178));
        assert_eq!(grid(5000, 2, 0.0), GridResolution::new(100, 1));
    }
}
