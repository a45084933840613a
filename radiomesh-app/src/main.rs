//! Radiomesh Application
//!
//! Reconstructs a closed, colored 3D surface from a single 2D medical-style
//! image and writes it as STL, OBJ or JSON.

mod app;

use clap::Parser;
use radiomesh_data::ExportFormat;
use radiomesh_recon::OrganHint;
use std::path::PathBuf;

/// Radiomesh - heuristic single-image surface reconstruction
#[derive(Parser, Debug)]
#[command(name = "radiomesh")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input image (any format the image crate decodes, or a .dcm/.dicom slice)
    input: PathBuf,

    /// Output mesh path (defaults to the input path with the format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: stl, stl-ascii, obj, json (defaults to the output extension, then stl)
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// Mesh density in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    detail: f32,

    /// Bilateral smoothing strength in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    smoothing: f32,

    /// Depth multiplier, must be positive
    #[arg(long, default_value_t = 1.0)]
    depth_scale: f32,

    /// Organ category or "auto" to classify the image
    #[arg(long, default_value = "auto")]
    organ: OrganHint,

    /// Laplacian smoothing passes over the finished mesh (overrides the config file)
    #[arg(long)]
    mesh_smoothing: Option<u32>,

    /// JSON file overriding pipeline thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON analysis report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Use primitive organ templates for recognized organs
    #[arg(long)]
    templates: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = app::run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
