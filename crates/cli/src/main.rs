//! geomask CLI - distortion-aware buffering and comparison of raster masks

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geomask_algorithms::buffer::{buffer_mask, BufferParams};
use geomask_algorithms::compare::{compare_masks, AreaModel, CompareParams, RatingWeights};
use geomask_algorithms::diagnostics::{SampleErrors, ScaleRange, MAX_REPORTED_SAMPLE_ERRORS};
use geomask_algorithms::distance::EuclideanDistance;
use geomask_algorithms::scale::{ProjectionSampler, ScalePolicy, ScaleSampler, WebMercatorSampler};
use geomask_algorithms::valscale::scale_values;
use geomask_core::io::{
    read_geotiff, read_geotiff_bands, write_geotiff, write_geotiff_bands, GeoTiffOptions,
    SampleType,
};
use geomask_core::raster::mask;
use geomask_core::{Projection, Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geomask")]
#[command(
    author,
    version,
    about = "Distortion-aware buffering and change rating for projected raster masks",
    long_about = None
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How per-pixel scale factors are obtained
#[derive(Args, Clone)]
struct SamplerArgs {
    /// PROJ definition overriding the raster's projection metadata
    #[arg(long)]
    proj: Option<String>,
    /// Use the analytic Web Mercator scale instead of the projection engine
    #[arg(long)]
    web_mercator: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Grow (positive radius) or shrink (negative radius) a mask by a ground distance
    Buffer {
        /// Mask file (foreground 255, background 0)
        image: PathBuf,
        /// Buffer radius in ground units; non-numeric input counts as 0
        #[arg(allow_hyphen_values = true)]
        radius: String,
        /// Output file (default: update the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Linear scale used to convert the radius: max, min, mean, areal
        #[arg(long, default_value = "max")]
        scale_policy: ScalePolicy,
        #[command(flatten)]
        sampler: SamplerArgs,
    },
    /// Classify the differences between two masks and rate them by ground area
    Compare {
        /// Reference mask
        reference: PathBuf,
        /// Candidate mask, same size as the reference
        candidate: PathBuf,
        /// Tolerance radius in ground units; its sign selects grow or shrink semantics
        #[arg(allow_hyphen_values = true)]
        radius: String,
        /// Linear scale used to convert the radius: max, min, mean, areal
        #[arg(long, default_value = "max")]
        scale_policy: ScalePolicy,
        /// Rating weights: fg_normal,fg_isolated,bg_normal,bg_isolated
        #[arg(long, default_value = "1,3,1,10")]
        weights: RatingWeights,
        /// Cell area model: areal-scale (pixel area * s) or ground (pixel area / s)
        #[arg(long, default_value = "areal-scale")]
        area_model: AreaModel,
        #[command(flatten)]
        sampler: SamplerArgs,
    },
    /// Multiply every band value by the local areal scale
    Valscale {
        /// Value raster (1, 3 or 4 bands)
        image: PathBuf,
        /// Output file (default: update the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        sampler: SamplerArgs,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Parse a radius the way C's `atof` does: the longest numeric prefix, or 0.
fn parse_radius(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

fn read_mask(path: &Path) -> Result<Raster<u8>> {
    let pb = spinner("Reading mask...");
    let mask: Raster<u8> =
        read_geotiff(path, None).with_context(|| format!("Failed to read mask: {}", path.display()))?;
    pb.finish_and_clear();
    let (rows, cols) = mask.shape();
    debug!("{}: {} x {}", path.display(), cols, rows);
    if !mask::is_binary(&mask) {
        warn!(
            "{} contains values other than 0 and 255; only 255 counts as foreground",
            path.display()
        );
    }
    Ok(mask)
}

fn build_sampler<T: RasterElement>(
    raster: &Raster<T>,
    args: &SamplerArgs,
) -> Result<Box<dyn ScaleSampler>> {
    if args.web_mercator {
        raster
            .require_transform()
            .context("Web Mercator sampling needs a georeferenced raster")?;
        if raster.crs().is_none() && args.proj.is_none() {
            return Err(geomask_core::Error::MissingProjection)
                .context("Web Mercator sampling needs projection metadata");
        }
        let is_web_mercator = raster.crs().map_or(false, |crs| crs.is_web_mercator());
        if !is_web_mercator {
            warn!("--web-mercator used on a raster that is not EPSG:3857");
        }
        let sampler = WebMercatorSampler::for_raster(raster);
        info!("Scale: analytic Web Mercator, pixel size {:.3}", sampler.pixel_size());
        return Ok(Box::new(sampler));
    }

    let sampler = ProjectionSampler::for_raster(raster, args.proj.as_deref())
        .context("Failed to set up projection")?;
    info!("Projection: {}", sampler.projection().definition());
    debug!("Pixel size: {:.3}", sampler.pixel_size());
    Ok(Box::new(sampler))
}

fn report_sample_errors(errors: &SampleErrors) {
    for failure in errors.reported() {
        warn!("{}", failure);
    }
    if errors.suppressed() {
        warn!(
            "more than {} errors - not showing further errors",
            MAX_REPORTED_SAMPLE_ERRORS
        );
    }
    if !errors.is_empty() {
        warn!("{} pixels skipped: scale could not be sampled", errors.total());
    }
}

fn report_range(label: &str, range: &ScaleRange) {
    if !range.is_empty() {
        info!("{} range: {:.6} - {:.6}", label, range.min, range.max);
    }
}

// ─── Subcommands ────────────────────────────────────────────────────────

fn run_buffer(
    image: PathBuf,
    radius: &str,
    output: Option<PathBuf>,
    policy: ScalePolicy,
    sampler_args: &SamplerArgs,
) -> Result<()> {
    let mask = read_mask(&image)?;
    let sampler = build_sampler(&mask, sampler_args)?;
    let radius = parse_radius(radius);
    info!("Buffer radius: {} ({} scale)", radius, policy);

    let start = Instant::now();
    let pb = spinner("Buffering...");
    let params = BufferParams { radius, policy };
    let result = buffer_mask(&mask, sampler.as_ref(), &EuclideanDistance, &params)
        .context("Buffering failed")?;
    pb.finish_and_clear();

    report_sample_errors(&result.summary.errors);
    report_range("Scale", &result.summary.scale_range);
    info!("{} pixels changed", result.summary.changed);

    let output = output.unwrap_or(image);
    let pb = spinner("Writing mask...");
    write_geotiff(
        &result.mask,
        &output,
        Some(GeoTiffOptions::with_sample_type(SampleType::UInt8)),
    )
    .with_context(|| format!("Failed to write: {}", output.display()))?;
    pb.finish_and_clear();

    info!("Mask saved to: {}", output.display());
    info!("Processing time: {:.2?}", start.elapsed());
    Ok(())
}

fn run_compare(
    reference: PathBuf,
    candidate: PathBuf,
    radius: &str,
    params: CompareParams,
    sampler_args: &SamplerArgs,
) -> Result<()> {
    let before = read_mask(&reference)?;
    let after = read_mask(&candidate)?;
    let sampler = build_sampler(&before, sampler_args)?;
    let params = CompareParams {
        radius: parse_radius(radius),
        ..params
    };
    info!(
        "Tolerance radius: {} ({} scale, {} area)",
        params.radius, params.policy, params.area_model
    );

    let start = Instant::now();
    let pb = spinner("Comparing...");
    let report = compare_masks(&before, &after, sampler.as_ref(), &EuclideanDistance, &params)
        .with_context(|| {
            format!(
                "Failed to compare {} with {}",
                reference.display(),
                candidate.display()
            )
        })?;
    pb.finish_and_clear();

    report_sample_errors(&report.errors);
    report_range("Scale", &report.scale_range);
    report_range("Areal scale", &report.areal_range);
    let c = &report.counters;
    info!(
        "New foreground: {} normal, {} isolated; new background: {} normal, {} isolated",
        c.fg_normal.count, c.fg_isolated.count, c.bg_normal.count, c.bg_isolated.count
    );
    info!("Total area: {:.2} km2", c.total_area_km2);
    info!("Processing time: {:.2?}", start.elapsed());

    println!("{}", report.summary_line());
    Ok(())
}

fn run_valscale(image: PathBuf, output: Option<PathBuf>, sampler_args: &SamplerArgs) -> Result<()> {
    let pb = spinner("Reading raster...");
    let bands = read_geotiff_bands(&image)
        .with_context(|| format!("Failed to read raster: {}", image.display()))?;
    pb.finish_and_clear();
    let first = bands.first().context("Raster has no bands")?;
    let sampler = build_sampler(first, sampler_args)?;
    info!("{} band(s)", bands.len());

    let start = Instant::now();
    let pb = spinner("Scaling values...");
    let result = scale_values(&bands, sampler.as_ref()).context("Value scaling failed")?;
    pb.finish_and_clear();

    report_sample_errors(&result.summary.errors);
    report_range("Areal scale", &result.summary.areal_range);

    let output = output.unwrap_or(image);
    let pb = spinner("Writing output...");
    write_geotiff_bands(
        &result.bands,
        &output,
        Some(GeoTiffOptions::with_sample_type(SampleType::Float32)),
    )
    .with_context(|| format!("Failed to write: {}", output.display()))?;
    pb.finish_and_clear();

    info!("Scaled raster saved to: {}", output.display());
    info!("Processing time: {:.2?}", start.elapsed());
    Ok(())
}

fn run_info(input: PathBuf) -> Result<()> {
    let pb = spinner("Reading raster...");
    let bands = read_geotiff_bands(&input)
        .with_context(|| format!("Failed to read raster: {}", input.display()))?;
    pb.finish_and_clear();
    let raster = bands.first().context("Raster has no bands")?;
    let (rows, cols) = raster.shape();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Bands: {}", bands.len());
    if raster.is_georeferenced() {
        let bounds = raster.bounds();
        println!("Pixel size: {}", raster.pixel_size());
        println!(
            "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
            bounds.0, bounds.1, bounds.2, bounds.3
        );
    } else {
        println!("GeoTransform: none");
    }
    match raster.crs() {
        Some(crs) => {
            println!("CRS: {}", crs);
            match crs.proj_definition() {
                Some(def) => println!("PROJ: {}", def),
                None => println!("PROJ: unknown"),
            }
        }
        None => println!("CRS: none"),
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }

    let binary = raster
        .data()
        .iter()
        .all(|&v| v == f64::from(mask::BACKGROUND) || v == f64::from(mask::FOREGROUND));
    if binary && bands.len() == 1 {
        let foreground = raster
            .data()
            .iter()
            .filter(|&&v| v == f64::from(mask::FOREGROUND))
            .count();
        println!(
            "Mask foreground: {} ({:.2}%)",
            foreground,
            100.0 * foreground as f64 / raster.len().max(1) as f64
        );
    }

    for (i, band) in bands.iter().enumerate() {
        let stats = band.statistics();
        println!("\nBand {} statistics:", i + 1);
        if let Some(min) = stats.min {
            println!("  Min: {:.4}", min);
        }
        if let Some(max) = stats.max {
            println!("  Max: {:.4}", max);
        }
        if let Some(mean) = stats.mean {
            println!("  Mean: {:.4}", mean);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / band.len().max(1) as f64
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Buffer {
            image,
            radius,
            output,
            scale_policy,
            sampler,
        } => run_buffer(image, &radius, output, scale_policy, &sampler),

        Commands::Compare {
            reference,
            candidate,
            radius,
            scale_policy,
            weights,
            area_model,
            sampler,
        } => {
            let params = CompareParams {
                policy: scale_policy,
                weights,
                area_model,
                ..Default::default()
            };
            run_compare(reference, candidate, &radius, params, &sampler)
        }

        Commands::Valscale {
            image,
            output,
            sampler,
        } => run_valscale(image, output, &sampler),

        Commands::Info { input } => run_info(input),
    }
}
