//! facewarp-bench: CLI tool for warp parameter experimentation and diagnostics.
//!
//! Warps the face in a given image file with configurable sliders and
//! engine parameters, printing per-phase diagnostics. Useful for:
//!
//! - Tuning amplification, falloff and transition band constants
//! - Comparing bilinear and bicubic resampling
//! - Measuring how slice height and effects affect latency
//! - Inspecting the displacement field as an arrow plot
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin facewarp-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use facewarp_pipeline::decode::{decode_rgba, encode_png};
use facewarp_pipeline::vector_field::{DEFAULT_GRID_STEP, render_vector_field};
use facewarp_pipeline::{
    Clock, Dimensions, DisplacementField, EffectKind, EffectOptions, FaceBox, Falloff, Feature,
    Interpolation, MaskImage, Point, RegionModel, RgbaImage, SliderMap, WarpConfig,
    WarpDiagnostics, WarpJob, WarpParams,
};

/// Warp parameter experimentation and diagnostics for facewarp.
///
/// Warps the face in an image with the given sliders and prints
/// per-phase timing and pixel count diagnostics.
#[derive(Parser)]
#[command(name = "facewarp-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Face box as `x,y,width,height` in pixels. Defaults to a centered
    /// estimate.
    #[arg(long, value_parser = parse_face)]
    face: Option<FaceBox>,

    /// Slider value as `name=value`, e.g. `eyeSize=50`. Repeatable.
    #[arg(long = "slider", value_parser = parse_slider)]
    sliders: Vec<(Feature, f64)>,

    /// Landmark point as `x,y`, drawn on the vector field plot. Repeatable.
    #[arg(long = "landmark", value_parser = parse_point)]
    landmarks: Vec<Point>,

    /// Post-warp effect.
    #[arg(long, value_enum, default_value_t = Effect::None)]
    effect: Effect,

    /// Effect intensity (0-100).
    #[arg(long, default_value_t = EffectOptions::DEFAULT_INTENSITY)]
    intensity: f64,

    /// Mask image composited by `--effect mask`.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Mask center as `x,y` fractions of the face box.
    #[arg(long, value_parser = parse_point, default_value = "0.5,0.5")]
    mask_position: Point,

    /// Mask width as a multiple of the face box width.
    #[arg(long, default_value_t = EffectOptions::DEFAULT_MASK_SCALE)]
    mask_scale: f64,

    /// Amplification at the 640x480 reference resolution.
    #[arg(long, default_value_t = WarpConfig::DEFAULT_AMPLIFICATION_BASE)]
    amplification_base: f64,

    /// Face box half-extent multiplier.
    #[arg(long, default_value_t = WarpConfig::DEFAULT_OVER_SCAN)]
    over_scan: f64,

    /// Normalized distance of full displacement.
    #[arg(long, default_value_t = WarpConfig::DEFAULT_INNER_EDGE)]
    inner_edge: f64,

    /// Normalized distance of zero displacement.
    #[arg(long, default_value_t = WarpConfig::DEFAULT_MAX_INFLUENCE)]
    max_influence: f64,

    /// Transition curve.
    #[arg(long, value_enum, default_value_t = FalloffArg::Septic)]
    falloff: FalloffArg,

    /// Resampling kernel.
    #[arg(long, value_enum, default_value_t = InterpolationArg::Bicubic)]
    interpolation: InterpolationArg,

    /// Rows per scheduler slice.
    #[arg(long, default_value_t = WarpConfig::DEFAULT_SLICE_ROWS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    slice_rows: u32,

    /// Per-channel noise bound.
    #[arg(long, default_value_t = 0)]
    noise_level: u8,

    /// Noise seed.
    #[arg(long, default_value_t = 0)]
    noise_seed: u64,

    /// Write the warped image to this PNG file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write a displacement field arrow plot to this PNG file.
    #[arg(long)]
    vector_field: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full engine config as a JSON string.
    ///
    /// When provided, all other engine parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Log verbosity (written to stderr).
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

/// Effect selection.
#[derive(Clone, Copy, ValueEnum)]
enum Effect {
    None,
    Blur,
    Pixelate,
    Mask,
}

#[derive(Clone, Copy, ValueEnum)]
enum FalloffArg {
    Cubic,
    Quintic,
    Septic,
}

#[derive(Clone, Copy, ValueEnum)]
enum InterpolationArg {
    Bilinear,
    Bicubic,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

fn parse_numbers<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid {what} {s:?}: {e}"))?;
    parts
        .try_into()
        .map_err(|_| format!("invalid {what} {s:?}: expected {N} comma-separated numbers"))
}

fn parse_face(s: &str) -> Result<FaceBox, String> {
    let [x, y, width, height] = parse_numbers::<4>(s, "face box")?;
    Ok(FaceBox::new(x, y, width, height))
}

fn parse_point(s: &str) -> Result<Point, String> {
    let [x, y] = parse_numbers::<2>(s, "point")?;
    Ok(Point::new(x, y))
}

fn parse_slider(s: &str) -> Result<(Feature, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid slider {s:?}: expected name=value"))?;
    let feature = name.trim().parse::<Feature>().map_err(|e| e.to_string())?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid slider value {value:?}: {e}"))?;
    Ok((feature, value))
}

/// Build a [`WarpConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<WarpConfig, String> {
    let config: WarpConfig = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        WarpConfig {
            amplification_base: cli.amplification_base,
            over_scan: cli.over_scan,
            inner_edge: cli.inner_edge,
            max_influence: cli.max_influence,
            falloff: match cli.falloff {
                FalloffArg::Cubic => Falloff::Cubic,
                FalloffArg::Quintic => Falloff::Quintic,
                FalloffArg::Septic => Falloff::Septic,
            },
            interpolation: match cli.interpolation {
                InterpolationArg::Bilinear => Interpolation::Bilinear,
                InterpolationArg::Bicubic => Interpolation::Bicubic,
            },
            slice_rows: cli.slice_rows,
            noise_level: cli.noise_level,
            noise_seed: cli.noise_seed,
            ..WarpConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn effect_from_cli(cli: &Cli) -> Result<EffectOptions, String> {
    let kind = match cli.effect {
        Effect::None => EffectKind::None,
        Effect::Blur => EffectKind::Blur,
        Effect::Pixelate => EffectKind::Pixelate,
        Effect::Mask => EffectKind::Mask,
    };
    let mask_image = match &cli.mask {
        Some(path) => Some(MaskImage::new(load_image(path)?)),
        None => None,
    };
    Ok(EffectOptions {
        kind,
        intensity: cli.intensity,
        mask_image,
        mask_position: cli.mask_position,
        mask_scale: cli.mask_scale,
    })
}

fn load_image(path: &Path) -> Result<RgbaImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    decode_rgba(&bytes).map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

fn write_png(path: &Path, image: &RgbaImage, what: &str) {
    let written = encode_png(image)
        .map_err(|e| e.to_string())
        .and_then(|png| {
            std::fs::write(path, &png)
                .map(|()| png.len())
                .map_err(|e| e.to_string())
        });
    match written {
        Ok(len) => eprintln!("{what} written to {} ({len} bytes)", path.display()),
        Err(e) => eprintln!("Error writing {what} to {}: {e}", path.display()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    let setup = config_from_cli(&cli).and_then(|config| {
        let effect = effect_from_cli(&cli)?;
        let image = load_image(&cli.image_path)?;
        Ok((config, effect, image))
    });
    let (config, effect, image) = match setup {
        Ok(setup) => setup,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let sliders: SliderMap = cli.sliders.iter().copied().collect();
    let params = WarpParams::resolve(
        cli.face.as_ref(),
        Dimensions::of(&image),
        &sliders,
        &effect,
        &config,
    );
    let model = RegionModel::standard();

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Sliders: {sliders:?}");
    eprintln!("Params: {:#?}", params.geometry);
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    if let Some(ref path) = cli.vector_field {
        let field = DisplacementField::new(
            &model,
            &params.sliders,
            params.geometry,
            params.amplification,
        )
        .with_transition(params.inner_edge, params.max_influence, params.falloff);
        let plot = render_vector_field(&image, &field, &cli.landmarks, DEFAULT_GRID_STEP);
        write_png(path, &plot, "Vector field");
    }

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let finished = match WarpJob::new(&image, &params, &model)
            .with_clock(StdClock)
            .prepare()
        {
            Ok(warping) => warping.finish().apply_effect(),
            Err(e) => {
                eprintln!("Warp error: {e}");
                return ExitCode::FAILURE;
            }
        };
        let (output, diagnostics) = finished.into_parts();

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Write the image on the first run only.
        if run == 0
            && let Some(ref path) = cli.output
        {
            write_png(path, &output, "Output");
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
#[derive(Clone, Copy)]
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn since(&self, start: Instant) -> Duration {
        start.elapsed()
    }
}

/// Function pointer type for extracting a phase duration from diagnostics.
type PhaseExtractor = fn(&WarpDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[WarpDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Phase", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let phase_extractors: &[(&str, PhaseExtractor)] = &[
        ("Prepare", |d| d.prepare),
        ("Warp", |d| d.warp),
        ("Effect", |d| d.effect),
    ];

    for (name, extractor) in phase_extractors {
        let phase_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {phase_mean:>10.3}ms");
    }
}
