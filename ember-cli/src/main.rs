use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ember::dispatch::tiers::FilterKernels;
use ember::{
    CpuCapabilities, CpuDevice, DeviceConfig, DeviceTask, DeviceTaskKind, DisplayBuffer,
    DisplayPixels, FilmConvertTask, FilmParams, KernelGlobals, PixelRect, SampleRange, TileQueue,
    TileState, TileTask,
};

mod demo;

#[derive(Parser, Debug)]
#[command(name = "ember", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the synthetic demo scene to a PNG.
    Render(RenderArgs),
    /// Print the kernel tier the device would bind.
    Tiers(TiersArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Image width in pixels.
    #[arg(long, default_value_t = 256)]
    width: i32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 192)]
    height: i32,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = 64)]
    tile: i32,

    /// Samples per pixel.
    #[arg(long, default_value_t = 16)]
    samples: u32,

    /// Denoise the result.
    #[arg(long, default_value_t = false)]
    denoise: bool,

    /// Overscan margin; when set, tiles are denoised on their own right after path tracing.
    #[arg(long, default_value_t = 0)]
    overscan: i32,

    /// Device config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct TiersArgs {
    /// Device config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Tiers(args) => cmd_tiers(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DeviceConfig> {
    let config = match path {
        Some(path) => DeviceConfig::from_path(path)
            .with_context(|| format!("load device config '{}'", path.display()))?,
        None => DeviceConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn cmd_tiers(args: TiersArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;
    let detected = CpuCapabilities::detect();
    let allowed = match config.max_kernel_tier {
        Some(max) => detected.restricted_to(max),
        None => detected,
    };
    println!("detected: {}", detected.highest());
    println!("bound: {}", FilterKernels::with_capabilities(allowed).tier());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    if args.width <= 0 || args.height <= 0 || args.tile <= 0 {
        anyhow::bail!("width, height and tile must be >= 1");
    }
    if args.samples == 0 {
        anyhow::bail!("samples must be >= 1");
    }

    let mut config = load_config(args.config.as_ref())?;
    if args.threads.is_some() {
        config.threads = args.threads;
    }

    let film = FilmParams::standard(false);
    let globals = KernelGlobals::new(film.clone(), config.denoise.clone()).with_scene(
        demo::DemoScene {
            width: args.width,
            height: args.height,
        },
    );
    let device = CpuDevice::new(&config, globals, demo::kernels())?;
    tracing::info!(
        threads = device.num_threads(),
        tier = %device.kernel_tier(),
        "rendering demo scene"
    );

    let image = PixelRect::from_xywh(0, 0, args.width, args.height);
    let overscan = if args.denoise { args.overscan.max(0) } else { 0 };
    let queue = Arc::new(TileQueue::new(
        image,
        (args.tile, args.tile),
        &film,
        overscan,
        TileTask::PathTrace,
        SampleRange::new(0, args.samples)?,
    )?);

    let pixel_samples = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&pixel_samples);
    device.task_add(DeviceTask::render(queue.clone()).with_progress(move |n| {
        counter.fetch_add(n, Ordering::Relaxed);
    }))?;
    device.task_wait();
    check_tiles(&queue, "path trace")?;

    if args.denoise && overscan == 0 {
        queue.restart(
            TileTask::Denoise,
            SampleRange::new(args.samples, args.samples)?,
        );
        device.task_add(DeviceTask::render(queue.clone()))?;
        device.task_wait();
        check_tiles(&queue, "denoise")?;
    }

    let display = Arc::new(Mutex::new(DisplayBuffer::new_byte(image)?));
    for tile in queue.layout() {
        device.task_add(DeviceTask::new(DeviceTaskKind::FilmConvert(FilmConvertTask {
            buffer: tile.buffer,
            offset: tile.offset,
            stride: tile.stride,
            rect: tile.rect,
            sample: args.samples - 1,
            output: Arc::clone(&display),
        })))?;
    }
    device.task_wait();

    let display = display
        .lock()
        .map_err(|_| anyhow::anyhow!("display buffer lock poisoned"))?;
    let DisplayPixels::Byte(pixels) = display.pixels() else {
        anyhow::bail!("expected an 8-bit display buffer");
    };
    let bytes: Vec<u8> = pixels.iter().flatten().copied().collect();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &bytes,
        args.width as u32,
        args.height as u32,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} pixel-samples)",
        args.out.display(),
        pixel_samples.load(Ordering::Relaxed)
    );
    Ok(())
}

fn check_tiles(queue: &TileQueue, pass: &str) -> anyhow::Result<()> {
    let outcomes = queue.outcomes();
    if let Some(failed) = outcomes.iter().find(|o| o.state == TileState::Failed) {
        anyhow::bail!(
            "{pass}: tile {} failed: {}",
            failed.id,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    if outcomes.len() != queue.len() {
        anyhow::bail!(
            "{pass}: {} of {} tiles finished",
            outcomes.len(),
            queue.len()
        );
    }
    Ok(())
}
