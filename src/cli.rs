use crate::config::load_config;
use crate::frame_dump::{FrameDump, write_frame_dump};
use crate::labels::Labels;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::scene::Scene;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "mlabel", version, about = "Map label placement and occlusion")]
pub struct Args {
    /// Scene file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON and SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Number of frames to run before writing the output
    #[arg(long = "frames", default_value_t = 1)]
    pub frames: usize,

    /// Seconds per frame
    #[arg(long = "dt", default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Pick interactive labels at X,Y after the last frame
    #[arg(long = "pick", value_parser = parse_point)]
    pub pick: Option<(f32, f32)>,

    /// Only pick labels that are currently shown
    #[arg(long = "visibleOnly")]
    pub visible_only: bool,

    /// Draw debug primitives regardless of the config file
    #[arg(long = "debug")]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut config = load_config(args.config.as_deref())?;
    if args.debug {
        config.labels.debug.labels = true;
    }
    let input = read_input(args.input.as_deref())?;
    let mut scene = Scene::from_json(&input, &config.labels)?;

    let mut engine = Labels::new(config.labels.clone());
    let options = config.labels.frame_options();
    let frames = args.frames.max(1);
    for _ in 0..frames {
        scene.update(&mut engine, args.dt, options);
    }
    tracing::info!(
        frames,
        placed = engine.placed().len(),
        needs_update = engine.needs_update(),
        "frames resolved"
    );

    let touches = match args.pick {
        Some((x, y)) => scene.pick(&mut engine, x, y, args.visible_only).to_vec(),
        None => Vec::new(),
    };
    let dump = FrameDump::from_frame(&engine, &scene, frames, &touches);

    match args.output_format {
        OutputFormat::Json => write_frame_dump(&dump, args.output.as_deref())?,
        OutputFormat::Svg => {
            let svg = render_svg(&dump, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&dump, &config.render);
            write_output_png(&svg, &output, &config.render)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

fn parse_point(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{value}'"))?;
    let x = x.trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|e| e.to_string())?;
    Ok((x, y))
}
