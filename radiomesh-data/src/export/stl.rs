//! STL writers (binary and ASCII)

use crate::export::ExportError;
use crate::types::Mesh;
use glam::Vec3;
use std::io::Write;

const HEADER_SIZE: usize = 80;

/// Unit facet normal, zero for degenerate triangles.
fn facet_normal(v0: Vec3, v1: Vec3, v2: Vec3) -> Vec3 {
    (v1 - v0).cross(v2 - v0).normalize_or_zero()
}

fn triangles(mesh: &Mesh) -> impl Iterator<Item = [Vec3; 3]> + '_ {
    mesh.components.iter().flat_map(|c| {
        c.indices
            .iter()
            .map(|tri| tri.map(|i| c.vertices[i as usize]))
    })
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> Result<(), ExportError> {
    writer.write_all(&v.x.to_le_bytes())?;
    writer.write_all(&v.y.to_le_bytes())?;
    writer.write_all(&v.z.to_le_bytes())?;
    Ok(())
}

/// Write all components as one binary STL solid.
pub fn write_stl_binary<W: Write>(mesh: &Mesh, mut writer: W) -> Result<(), ExportError> {
    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL generated by radiomesh";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    let face_count = mesh.statistics().faces as u32;
    writer.write_all(&face_count.to_le_bytes())?;

    for [v0, v1, v2] in triangles(mesh) {
        write_vec3(&mut writer, facet_normal(v0, v1, v2))?;
        write_vec3(&mut writer, v0)?;
        write_vec3(&mut writer, v1)?;
        write_vec3(&mut writer, v2)?;
        writer.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

/// Write all components as one ASCII STL solid.
pub fn write_stl_ascii<W: Write>(mesh: &Mesh, mut writer: W) -> Result<(), ExportError> {
    writeln!(writer, "solid radiomesh")?;

    for [v0, v1, v2] in triangles(mesh) {
        let n = facet_normal(v0, v1, v2);
        writeln!(writer, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for v in [v0, v1, v2] {
            writeln!(writer, "      vertex {:.6e} {:.6e} {:.6e}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }

    writeln!(writer, "endsolid radiomesh")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaterialHint, MeshComponent};

    fn single_triangle() -> Mesh {
        let mut c = MeshComponent::new(MaterialHint::FrontSurface);
        c.push_vertex(Vec3::ZERO, Vec3::ONE);
        c.push_vertex(Vec3::X, Vec3::ONE);
        c.push_vertex(Vec3::Y, Vec3::ONE);
        c.push_triangle(0, 1, 2);
        Mesh::new(vec![c])
    }

    #[test]
    fn test_binary_layout() {
        let mut buf = Vec::new();
        write_stl_binary(&single_triangle(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 4 + 50);
        let count = u32::from_le_bytes([buf[80], buf[81], buf[82], buf[83]]);
        assert_eq!(count, 1);
        // normal z component
        let nz = f32::from_le_bytes([buf[92], buf[93], buf[94], buf[95]]);
        assert!((nz - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ascii_structure() {
        let mut buf = Vec::new();
        write_stl_ascii(&single_triangle(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("solid radiomesh"));
        assert!(text.trim_end().ends_with("endsolid radiomesh"));
        assert_eq!(text.matches("facet normal").count(), 1);
        assert_eq!(text.matches("vertex ").count(), 3);
    }

    #[test]
    fn test_degenerate_normal_is_zero() {
        assert_eq!(facet_normal(Vec3::ZERO, Vec3::X, Vec3::X * 2.0), Vec3::ZERO);
    }

    #[test]
    fn test_empty_mesh() {
        let mut buf = Vec::new();
        write_stl_binary(&Mesh::default(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 4);
    }
}
