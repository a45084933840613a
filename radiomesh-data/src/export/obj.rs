//! Wavefront OBJ writer with per-vertex colors

use crate::export::ExportError;
use crate::types::{MaterialHint, Mesh};
use std::io::Write;

fn object_name(material: &MaterialHint) -> String {
    match material {
        MaterialHint::FrontSurface => "front".to_string(),
        MaterialHint::BackSurface => "back".to_string(),
        MaterialHint::WallTop => "wall_top".to_string(),
        MaterialHint::WallRight => "wall_right".to_string(),
        MaterialHint::WallBottom => "wall_bottom".to_string(),
        MaterialHint::WallLeft => "wall_left".to_string(),
        MaterialHint::Template(category) => format!("template_{category}"),
    }
}

/// Write the mesh as OBJ, one `o` block per component.
///
/// Colors use the common `v x y z r g b` extension. Face indices are global
/// and 1-based.
pub fn write_obj<W: Write>(mesh: &Mesh, mut writer: W) -> Result<(), ExportError> {
    let stats = mesh.statistics();
    writeln!(writer, "# radiomesh")?;
    writeln!(writer, "# Vertices: {}, Faces: {}", stats.vertices, stats.faces)?;

    let mut offset = 1u32;
    for component in &mesh.components {
        writeln!(writer, "o {}", object_name(&component.material))?;
        for (v, c) in component.vertices.iter().zip(&component.vertex_colors) {
            writeln!(
                writer,
                "v {:.6} {:.6} {:.6} {:.4} {:.4} {:.4}",
                v.x, v.y, v.z, c.x, c.y, c.z
            )?;
        }
        for [a, b, c] in &component.indices {
            writeln!(writer, "f {} {} {}", a + offset, b + offset, c + offset)?;
        }
        offset += component.vertices.len() as u32;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MeshComponent;
    use glam::Vec3;

    fn triangle(material: MaterialHint) -> MeshComponent {
        let mut c = MeshComponent::new(material);
        c.push_vertex(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        c.push_vertex(Vec3::X, Vec3::ONE);
        c.push_vertex(Vec3::Y, Vec3::ONE);
        c.push_triangle(0, 1, 2);
        c
    }

    #[test]
    fn test_obj_offsets_indices_per_component() {
        let mesh = Mesh::new(vec![
            triangle(MaterialHint::FrontSurface),
            triangle(MaterialHint::BackSurface),
        ]);
        let mut buf = Vec::new();
        write_obj(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("o front"));
        assert!(text.contains("o back"));
        assert!(text.contains("f 1 2 3"));
        assert!(text.contains("f 4 5 6"));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 6);
        assert!(text.contains("v 0.000000 0.000000 0.000000 1.0000 0.0000 0.0000"));
    }

    #[test]
    fn test_template_object_name() {
        assert_eq!(
            object_name(&MaterialHint::Template("kidney".into())),
            "template_kidney"
        );
    }
}
