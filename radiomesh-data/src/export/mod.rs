//! Mesh file export (STL, OBJ, JSON)

mod obj;
mod stl;

pub use obj::write_obj;
pub use stl::{write_stl_ascii, write_stl_binary};

use crate::types::Mesh;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while writing a mesh.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    BinaryStl,
    AsciiStl,
    Obj,
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension (`.stl` is binary).
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "stl" => Ok(Self::BinaryStl),
            "obj" => Ok(Self::Obj),
            "json" => Ok(Self::Json),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::BinaryStl | Self::AsciiStl => "stl",
            Self::Obj => "obj",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stl" => Ok(Self::BinaryStl),
            "stl-ascii" => Ok(Self::AsciiStl),
            "obj" => Ok(Self::Obj),
            "json" => Ok(Self::Json),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Write `mesh` to any writer in the given format.
pub fn write_mesh_to<W: Write>(
    mesh: &Mesh,
    writer: W,
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::BinaryStl => write_stl_binary(mesh, writer),
        ExportFormat::AsciiStl => write_stl_ascii(mesh, writer),
        ExportFormat::Obj => write_obj(mesh, writer),
        ExportFormat::Json => {
            serde_json::to_writer(writer, mesh)?;
            Ok(())
        }
    }
}

/// Write `mesh` to a file.
#[tracing::instrument(skip_all, fields(path = %path.display(), format = ?format))]
pub fn write_mesh(mesh: &Mesh, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_mesh_to(mesh, &mut writer, format)?;
    writer.flush()?;

    let stats = mesh.statistics();
    info!(
        "Exported {} vertices, {} faces to {}",
        stats.vertices,
        stats.faces,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("out/model.STL")).unwrap(),
            ExportFormat::BinaryStl
        );
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("model.obj")).unwrap(),
            ExportFormat::Obj
        );
        assert!(ExportFormat::from_path(&PathBuf::from("model.ply")).is_err());
        assert!(ExportFormat::from_path(&PathBuf::from("model")).is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(
            "stl-ascii".parse::<ExportFormat>().unwrap(),
            ExportFormat::AsciiStl
        );
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("vtk".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_export_contains_components() {
        let mesh = Mesh::new(vec![crate::types::MeshComponent::new(
            crate::types::MaterialHint::WallTop,
        )]);
        let mut buf = Vec::new();
        write_mesh_to(&mesh, &mut buf, ExportFormat::Json).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"components\""));
        assert!(text.contains("wall-top"));
    }
}
