//! Laplacian smoothing across mesh components.
//!
//! Each pass moves every vertex toward the centroid of its edge neighbors:
//!
//! ```text
//! v' = v + relaxation * (centroid(N(v)) - v)
//! ```
//!
//! Components are welded by exact position first, so copies of a shared
//! vertex (the seam between a surface and its wall strip) move together and a
//! watertight solid stays watertight.

use crate::topology::position_key;
use crate::types::Mesh;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Laplacian smoothing settings. Zero iterations disables the pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaplacianParams {
    pub iterations: u32,
    /// Fraction of the way each vertex moves toward its neighbor centroid per
    /// pass, clamped to [0, 1].
    pub relaxation: f32,
}

impl Default for LaplacianParams {
    fn default() -> Self {
        Self {
            iterations: 0,
            relaxation: 0.15,
        }
    }
}

/// Outcome of [`smooth_laplacian`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SmoothingReport {
    pub iterations: u32,
    /// Distinct vertex positions moved by the pass.
    pub welded_vertices: usize,
    /// Largest single-vertex move in any iteration.
    pub max_displacement: f32,
}

/// Smooth `mesh` in place.
pub fn smooth_laplacian(mesh: &mut Mesh, params: &LaplacianParams) -> SmoothingReport {
    let relaxation = params.relaxation.clamp(0.0, 1.0);
    if params.iterations == 0 || relaxation == 0.0 || mesh.is_empty() {
        return SmoothingReport::default();
    }

    // welded id for every vertex of every component
    let mut welded: HashMap<[u32; 3], usize> = HashMap::new();
    let mut positions: Vec<Vec3> = Vec::new();
    let ids: Vec<Vec<usize>> = mesh
        .components
        .iter()
        .map(|component| {
            component
                .vertices
                .iter()
                .map(|&p| {
                    *welded.entry(position_key(p)).or_insert_with(|| {
                        positions.push(p);
                        positions.len() - 1
                    })
                })
                .collect()
        })
        .collect();

    // ordered sets fix the summation order
    let mut neighbors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); positions.len()];
    for (component, ids) in mesh.components.iter().zip(&ids) {
        for tri in &component.indices {
            let [a, b, c] = tri.map(|i| ids[i as usize]);
            for (from, to) in [(a, b), (b, c), (c, a)] {
                if from != to {
                    neighbors[from].insert(to);
                    neighbors[to].insert(from);
                }
            }
        }
    }

    let mut max_displacement = 0.0f32;
    for _ in 0..params.iterations {
        let next: Vec<Vec3> = positions
            .iter()
            .zip(&neighbors)
            .map(|(&p, adjacent)| {
                if adjacent.is_empty() {
                    return p;
                }
                let centroid =
                    adjacent.iter().map(|&n| positions[n]).sum::<Vec3>() / adjacent.len() as f32;
                p + (centroid - p) * relaxation
            })
            .collect();
        for (old, new) in positions.iter().zip(&next) {
            max_displacement = max_displacement.max(old.distance(*new));
        }
        positions = next;
    }

    for (component, ids) in mesh.components.iter_mut().zip(&ids) {
        for (vertex, &id) in component.vertices.iter_mut().zip(ids) {
            *vertex = positions[id];
        }
    }

    debug!(
        "Laplacian smoothing: {} iterations over {} welded vertices, max move {:.4}",
        params.iterations,
        positions.len(),
        max_displacement
    );

    SmoothingReport {
        iterations: params.iterations,
        welded_vertices: positions.len(),
        max_displacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyReport;
    use crate::types::{MaterialHint, MeshComponent};

    /// Unit cube with corner (1, 1, 1) pulled out to (2, 2, 2). The +y face is
    /// a separate component holding its own vertex copies.
    fn spiked_cube() -> Mesh {
        let corners: Vec<Vec3> = (0..8u32)
            .map(|n| {
                let bit = |b: u32| if n & (1 << b) != 0 { 1.0 } else { 0.0 };
                Vec3::new(bit(0), bit(1), bit(2))
            })
            .collect();
        let spike = |p: Vec3| if p == Vec3::ONE { Vec3::splat(2.0) } else { p };
        const FACES: [[u32; 3]; 12] = [
            [0, 4, 6], [0, 6, 2], // -x
            [1, 3, 7], [1, 7, 5], // +x
            [0, 1, 5], [0, 5, 4], // -y
            [0, 2, 3], [0, 3, 1], // -z
            [4, 5, 7], [4, 7, 6], // +z
            [2, 6, 7], [2, 7, 3], // +y
        ];
        let mut body = MeshComponent::new(MaterialHint::FrontSurface);
        for &c in &corners {
            body.push_vertex(spike(c), Vec3::ONE);
        }
        for [a, b, c] in &FACES[..10] {
            body.push_triangle(*a, *b, *c);
        }
        // +y face duplicated into a second component
        let mut top = MeshComponent::new(MaterialHint::WallTop);
        for [a, b, c] in &FACES[10..] {
            let base = top.vertices.len() as u32;
            for i in [a, b, c] {
                top.push_vertex(spike(corners[*i as usize]), Vec3::ONE);
            }
            top.push_triangle(base, base + 1, base + 2);
        }
        Mesh::new(vec![body, top])
    }

    #[test]
    fn test_zero_iterations_is_noop() {
        let mut mesh = spiked_cube();
        let before = mesh.clone();
        let report = smooth_laplacian(&mut mesh, &LaplacianParams::default());
        assert_eq!(report, SmoothingReport::default());
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_smoothing_keeps_solid_watertight() {
        let mut mesh = spiked_cube();
        assert!(TopologyReport::analyze(&mesh).is_watertight());
        let params = LaplacianParams {
            iterations: 10,
            relaxation: 0.15,
        };
        let report = smooth_laplacian(&mut mesh, &params);
        assert_eq!(report.iterations, 10);
        assert_eq!(report.welded_vertices, 8);
        assert!(report.max_displacement > 0.0);

        let topology = TopologyReport::analyze(&mesh);
        assert_eq!(topology.welded_vertices, 8);
        assert!(topology.is_watertight(), "{topology:?}");
    }

    #[test]
    fn test_spike_pulled_toward_neighbors() {
        let mut mesh = spiked_cube();
        let params = LaplacianParams {
            iterations: 1,
            relaxation: 0.5,
        };
        smooth_laplacian(&mut mesh, &params);
        let tip = mesh.components[0].vertices[7];
        assert!(tip.length() < Vec3::splat(2.0).length());
        // the duplicated copy in the second component moved identically
        assert!(mesh.components[1].vertices.contains(&tip));
    }

    #[test]
    fn test_flat_grid_interior_stays_flat() {
        // 3x3 vertex grid in the z = 0 plane; only in-plane motion is possible
        let mut c = MeshComponent::new(MaterialHint::FrontSurface);
        for y in 0..3 {
            for x in 0..3 {
                c.push_vertex(Vec3::new(x as f32, y as f32, 0.0), Vec3::ONE);
            }
        }
        for y in 0..2u32 {
            for x in 0..2u32 {
                let i = y * 3 + x;
                c.push_triangle(i, i + 1, i + 3);
                c.push_triangle(i + 1, i + 4, i + 3);
            }
        }
        let mut mesh = Mesh::new(vec![c]);
        let params = LaplacianParams {
            iterations: 3,
            relaxation: 0.3,
        };
        smooth_laplacian(&mut mesh, &params);
        assert!(mesh.components[0].vertices.iter().all(|v| v.z == 0.0));
    }
}
