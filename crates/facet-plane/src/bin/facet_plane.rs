//! facet-plane CLI: estimate the dominant facet plane of one image.

use clap::Parser;
use facet_plane::core::CameraModel;
use facet_plane::detect::{DetectError, DetectorParams, PlaneDetector};
use facet_plane::overlay::draw_centroids;
use facet_plane::{Centroid, PlaneEstimate};
use image::ImageReader;
use log::{info, LevelFilter};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "facet-plane")]
#[command(about = "Estimate the dominant facet plane of a cube image")]
#[command(version)]
struct Cli {
    /// Input image (any format supported by the `image` crate).
    image: PathBuf,

    /// Camera model JSON (`{"intrinsics": [[..], [..], [..]]}`). Identity when omitted.
    #[arg(long)]
    camera: Option<PathBuf>,

    /// Detector parameters JSON; missing sections use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the input image with centroids marked.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Fixed RANSAC seed, overrides the config.
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
}

#[derive(Debug, Serialize)]
struct Report {
    image: String,
    centroid_count: usize,
    centroids: Vec<Centroid>,
    plane: Option<PlaneReport>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlaneReport {
    /// `(a, b, c)` of `z = a*x + b*y + c`.
    coefficients: [f64; 3],
    normal: [f64; 3],
    residual: f64,
    trials: usize,
    n_inliers: usize,
    inliers: Vec<usize>,
}

impl From<&PlaneEstimate> for PlaneReport {
    fn from(est: &PlaneEstimate) -> Self {
        let p = &est.plane;
        Self {
            coefficients: [p.a(), p.b(), p.c()],
            normal: [p.normal.x, p.normal.y, p.normal.z],
            residual: p.residual,
            trials: est.trials,
            n_inliers: est.n_inliers,
            inliers: est.inliers(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    #[cfg(feature = "tracing")]
    facet_plane::core::init_tracing(false, &cli.log_level.to_string().to_lowercase());
    #[cfg(not(feature = "tracing"))]
    facet_plane::core::init_with_level(cli.log_level)?;

    let mut params: DetectorParams = match &cli.config {
        Some(path) => read_json(path)?,
        None => DetectorParams::default(),
    };
    if cli.seed.is_some() {
        params.ransac.seed = cli.seed;
    }
    let camera: CameraModel = match &cli.camera {
        Some(path) => read_json(path)?,
        None => CameraModel::identity(),
    };

    let frame = ImageReader::open(&cli.image)?.decode()?.to_rgb8();
    info!(
        "loaded {} ({}x{})",
        cli.image.display(),
        frame.width(),
        frame.height()
    );

    let detector = PlaneDetector::new(params, camera);
    let mut report = Report {
        image: cli.image.display().to_string(),
        centroid_count: 0,
        centroids: Vec::new(),
        plane: None,
        error: None,
    };

    match detector.locate(&frame) {
        Ok(surface) => {
            report.centroid_count = surface.centroids.len();
            match detector.fit(&surface.centroids) {
                Ok((_, estimate)) => report.plane = Some(PlaneReport::from(&estimate)),
                Err(err) => report.error = Some(not_found_or_fail(err)?),
            }
            report.centroids = surface.centroids;
        }
        Err(err) => report.error = Some(not_found_or_fail(err)?),
    }

    if let Some(path) = &cli.overlay {
        draw_centroids(&frame, &report.centroids).save(path)?;
        info!("overlay written to {}", path.display());
    }

    match &cli.output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &report)?;
            info!("report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Not-found outcomes belong in the report; anything else aborts the run.
fn not_found_or_fail(err: DetectError) -> CliResult<String> {
    match err {
        DetectError::NotFound { .. } => Ok(err.to_string()),
        other => Err(other.into()),
    }
}
