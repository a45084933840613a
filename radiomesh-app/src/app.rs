//! Request handling: logging setup, reconstruction, export and reporting.

use crate::Args;
use radiomesh_data::{ExportFormat, TopologyReport, write_mesh};
use radiomesh_recon::persistence::{
    ImageMetadata, RecordId, ReconstructionOutcome, ReconstructionSummary, RequestStatus,
};
use radiomesh_recon::reconstruction::{ImageAnalysis, ReconstructionRoute};
use radiomesh_recon::{
    FileSource, ImageSource, InMemoryGateway, PersistenceGateway, PipelineConfig,
    PrimitiveTemplates, ReconstructionParams, Reconstructor,
};
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// JSON report written next to the mesh.
#[derive(Serialize)]
struct Report<'a> {
    request_id: RecordId,
    request: RequestStatus,
    output: &'a Path,
    route: ReconstructionRoute,
    image_analysis: &'a ImageAnalysis,
    topology: TopologyReport,
}

pub fn init_tracing() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }
}

/// Explicit format, else the output extension, else binary STL.
fn resolve_format(args: &Args) -> Result<ExportFormat, Box<dyn Error>> {
    if let Some(format) = args.format {
        return Ok(format);
    }
    match &args.output {
        Some(path) => Ok(ExportFormat::from_path(path)?),
        None => Ok(ExportFormat::BinaryStl),
    }
}

pub fn run(args: Args) -> Result<(), Box<dyn Error>> {
    init_tracing();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading pipeline config from {}", path.display());
            PipelineConfig::from_path(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(iterations) = args.mesh_smoothing {
        config.mesh_smoothing.iterations = iterations;
    }
    let params = ReconstructionParams {
        detail: args.detail,
        smoothing: args.smoothing,
        depth_scale: args.depth_scale,
        organ_hint: args.organ,
    };
    let format = resolve_format(&args)?;
    let output: PathBuf = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(format.extension()));

    let mut reconstructor = Reconstructor::new(config);
    if args.templates {
        reconstructor = reconstructor.with_template_provider(PrimitiveTemplates::default());
    }

    let gateway = InMemoryGateway::new();
    let source = FileSource::new(&args.input);
    let id = gateway.store(ImageMetadata {
        name: source.describe(),
        params,
    })?;

    let result = reconstructor.reconstruct_source(&source, &params);
    let outcome = match &result {
        Ok(reconstruction) => {
            ReconstructionOutcome::Completed(ReconstructionSummary::from(reconstruction))
        }
        Err(e) => ReconstructionOutcome::Failed {
            message: e.to_string(),
        },
    };
    gateway.record_reconstruction(id, outcome)?;
    let reconstruction = result?;

    let topology = TopologyReport::analyze(&reconstruction.mesh);
    if reconstruction.route == ReconstructionRoute::Volumetric && !topology.is_watertight() {
        warn!("Volumetric mesh is not watertight: {:?}", topology);
    }

    match format {
        ExportFormat::Json => {
            let mut writer = BufWriter::new(File::create(&output)?);
            serde_json::to_writer_pretty(&mut writer, &reconstruction)?;
            writer.flush()?;
            info!("Wrote reconstruction record to {}", output.display());
        }
        _ => write_mesh(&reconstruction.mesh, &output, format)?,
    }

    info!(
        "{}: {} ({} vertices, {} faces)",
        reconstruction.image_analysis.detected_category,
        reconstruction.image_analysis.abnormalities.summary,
        reconstruction.statistics.vertices,
        reconstruction.statistics.faces
    );

    if let Some(report_path) = &args.report {
        let report = Report {
            request_id: id,
            request: gateway.fetch_status(id)?,
            output: &output,
            route: reconstruction.route,
            image_analysis: &reconstruction.image_analysis,
            topology,
        };
        let mut writer = BufWriter::new(File::create(report_path)?);
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.flush()?;
        info!("Wrote report to {}", report_path.display());
    }

    Ok(())
}
