//! Edge topology analysis across mesh components.
//!
//! Components are indexed independently, so vertices are welded by exact
//! position before edges are counted. A closed, consistently oriented solid
//! uses every undirected edge exactly twice, once in each direction.

use crate::types::Mesh;
use glam::Vec3;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Edge statistics of a welded mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopologyReport {
    /// Distinct vertex positions after welding.
    pub welded_vertices: usize,
    /// Distinct undirected edges.
    pub edges: usize,
    /// Edges used by exactly one triangle.
    pub boundary_edges: usize,
    /// Edges used by more than two triangles.
    pub non_manifold_edges: usize,
    /// Edges used twice in the same direction.
    pub orientation_conflicts: usize,
    /// Triangles collapsing to fewer than three distinct welded vertices.
    pub degenerate_triangles: usize,
}

#[derive(Default)]
struct EdgeUse {
    forward: u32,
    backward: u32,
}

pub(crate) fn position_key(p: Vec3) -> [u32; 3] {
    // +0.0 and -0.0 must weld together
    let canon = |v: f32| if v == 0.0 { 0.0f32.to_bits() } else { v.to_bits() };
    [canon(p.x), canon(p.y), canon(p.z)]
}

impl TopologyReport {
    /// Weld every component of `mesh` and count edge usage.
    pub fn analyze(mesh: &Mesh) -> Self {
        let mut welded: HashMap<[u32; 3], u32> = HashMap::new();
        let mut edges: HashMap<(u32, u32), EdgeUse> = HashMap::new();
        let mut degenerate_triangles = 0;

        for component in &mesh.components {
            let ids: Vec<u32> = component
                .vertices
                .iter()
                .map(|&p| {
                    let next = welded.len() as u32;
                    *welded.entry(position_key(p)).or_insert(next)
                })
                .collect();

            for tri in &component.indices {
                let [a, b, c] = tri.map(|i| ids[i as usize]);
                if a == b || b == c || a == c {
                    degenerate_triangles += 1;
                    continue;
                }
                for (from, to) in [(a, b), (b, c), (c, a)] {
                    let entry = edges.entry((from.min(to), from.max(to))).or_default();
                    if from < to {
                        entry.forward += 1;
                    } else {
                        entry.backward += 1;
                    }
                }
            }
        }

        let mut report = TopologyReport {
            welded_vertices: welded.len(),
            edges: edges.len(),
            degenerate_triangles,
            ..Default::default()
        };

        for edge in edges.values() {
            match edge.forward + edge.backward {
                1 => report.boundary_edges += 1,
                2 if edge.forward != edge.backward => report.orientation_conflicts += 1,
                2 => {}
                _ => report.non_manifold_edges += 1,
            }
        }

        debug!(
            "Topology: {} welded vertices, {} edges, {} boundary, {} non-manifold, {} flipped, \
             {} degenerate",
            report.welded_vertices,
            report.edges,
            report.boundary_edges,
            report.non_manifold_edges,
            report.orientation_conflicts,
            report.degenerate_triangles
        );

        report
    }

    /// Closed, manifold, consistently oriented and free of collapsed faces.
    pub fn is_watertight(&self) -> bool {
        self.edges > 0
            && self.boundary_edges == 0
            && self.non_manifold_edges == 0
            && self.orientation_conflicts == 0
            && self.degenerate_triangles == 0
    }
}
