use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use sprite_processor::{
    ComparisonEntry, FailurePolicy, FlowKind, ModelId, ModelRegistry, Pipeline, PipelineConfig,
    PipelineOutput, PipelineResult, ProcessedSheets, RembgLoader, SheetOutput, SourceInput,
};

#[derive(Parser, Debug)]
#[command(name = "sprite-processor", version, about = "Spritesheet and video background removal")]
struct Cli {
    /// Pipeline config JSON; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Concurrent segmentation calls.
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Per-call segmentation timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Path to the `rembg` executable (default: $SPRITE_PROCESSOR_REMBG or `rembg`).
    #[arg(long, global = true)]
    rembg: Option<PathBuf>,

    /// Print a JSON job summary on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove the background from one image.
    One(OneArgs),
    /// Remove backgrounds from every image in a directory.
    Batch(BatchArgs),
    /// Remove backgrounds from every frame of a spritesheet or GIF.
    Spritesheet(SpritesheetArgs),
    /// Report the detected grid of a spritesheet.
    Grid(GridCmdArgs),
    /// Convert a video to an animated GIF.
    Video(VideoArgs),
    /// Convert a video to an unprocessed spritesheet.
    VideoSpritesheet(VideoSheetArgs),
    /// Video to GIF to spritesheet to background-removed spritesheet(s).
    Pipeline(PipelineArgs),
    /// Print video properties and recommended settings.
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug, Default)]
struct GridArgs {
    /// Grid as COLSxROWS, or `auto`.
    #[arg(long)]
    grid: Option<String>,
    /// Frame width in pixels.
    #[arg(long)]
    frame_width: Option<u32>,
    /// Frame height in pixels.
    #[arg(long)]
    frame_height: Option<u32>,
    /// Columns per row.
    #[arg(long)]
    frames_per_row: Option<u32>,
    /// Number of frames to use.
    #[arg(long)]
    frames: Option<u32>,
}

#[derive(Args, Debug, Default)]
struct SampleArgs {
    /// Sampling rate.
    #[arg(long)]
    fps: Option<f64>,
    /// Seconds of video to sample (default: all).
    #[arg(long)]
    duration: Option<f64>,
    /// Maximum output width.
    #[arg(long)]
    max_width: Option<u32>,
    /// Maximum output height.
    #[arg(long)]
    max_height: Option<u32>,
}

#[derive(Parser, Debug)]
struct OneArgs {
    /// Input image.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output PNG.
    #[arg(long)]
    out: PathBuf,
    /// Model to use.
    #[arg(long)]
    model: Option<ModelId>,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory of input images.
    #[arg(long)]
    in_dir: PathBuf,
    /// Directory for output PNGs.
    #[arg(long)]
    out_dir: PathBuf,
    /// Model to use.
    #[arg(long)]
    model: Option<ModelId>,
    /// Replace existing outputs.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Parser, Debug)]
struct SpritesheetArgs {
    /// Input spritesheet or animated GIF.
    #[arg(long = "in")]
    in_path: PathBuf,
    #[command(flatten)]
    grid: GridArgs,
    /// Model to use.
    #[arg(long)]
    model: Option<ModelId>,
    /// Process with every model; one sheet per model.
    #[arg(long)]
    all_models: bool,
    /// Directory for per-frame PNGs (or per-model sheets with `--all-models`).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Write the reassembled sheet here.
    #[arg(long)]
    output_spritesheet: Option<PathBuf>,
    /// Fail when any frame cannot be processed.
    #[arg(long)]
    strict: bool,
}

#[derive(Parser, Debug)]
struct GridCmdArgs {
    /// Input spritesheet.
    #[arg(long = "in")]
    in_path: PathBuf,
    #[command(flatten)]
    grid: GridArgs,
}

#[derive(Parser, Debug)]
struct VideoArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output GIF.
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    sample: SampleArgs,
}

#[derive(Parser, Debug)]
struct VideoSheetArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output PNG spritesheet.
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    sample: SampleArgs,
    #[command(flatten)]
    grid: GridArgs,
}

#[derive(Parser, Debug)]
struct PipelineArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,
    #[command(flatten)]
    sample: SampleArgs,
    #[command(flatten)]
    grid: GridArgs,
    /// Model to use.
    #[arg(long)]
    model: Option<ModelId>,
    /// Process with every model.
    #[arg(long)]
    all_models: bool,
    /// Also write the intermediate GIF and unprocessed sheet.
    #[arg(long)]
    keep_intermediates: bool,
    /// Fail when any frame cannot be processed.
    #[arg(long)]
    strict: bool,
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(n) = cli.threads {
        config.dispatch.threads = n;
    }
    if let Some(s) = cli.timeout_secs {
        config.dispatch.timeout_secs = s;
    }

    let ctx = Ctx {
        rembg: cli.rembg.clone(),
        json: cli.json,
    };
    match cli.cmd {
        Command::One(args) => cmd_one(&ctx, config, args),
        Command::Batch(args) => cmd_batch(&ctx, config, args),
        Command::Spritesheet(args) => cmd_spritesheet(&ctx, config, args),
        Command::Grid(args) => cmd_grid(config, args),
        Command::Video(args) => cmd_video(&ctx, config, args),
        Command::VideoSpritesheet(args) => cmd_video_spritesheet(&ctx, config, args),
        Command::Pipeline(args) => cmd_pipeline(&ctx, config, args),
        Command::Analyze(args) => cmd_analyze(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct Ctx {
    rembg: Option<PathBuf>,
    json: bool,
}

impl Ctx {
    fn registry(&self) -> Arc<ModelRegistry> {
        let loader = match &self.rembg {
            Some(p) => RembgLoader::new(p),
            None => RembgLoader::from_env(),
        };
        Arc::new(ModelRegistry::new(Arc::new(loader)))
    }

    fn pipeline(&self, config: &PipelineConfig) -> anyhow::Result<Pipeline> {
        config.validate()?;
        Ok(Pipeline::new(self.registry(), config.dispatch)?)
    }

    fn report(&self, result: &PipelineResult) -> anyhow::Result<()> {
        if self.json {
            let text = serde_json::to_string_pretty(&result.summary())
                .context("serialize job summary")?;
            println!("{text}");
        }
        Ok(())
    }
}

fn apply_grid(config: &mut PipelineConfig, args: GridArgs) {
    let hints = &mut config.grid;
    let GridArgs {
        grid,
        frame_width,
        frame_height,
        frames_per_row,
        frames,
    } = args;
    if grid.is_some() {
        hints.grid = grid;
    }
    hints.frame_width = frame_width.or(hints.frame_width);
    hints.frame_height = frame_height.or(hints.frame_height);
    hints.frames_per_row = frames_per_row.or(hints.frames_per_row);
    hints.frames = frames.or(hints.frames);
}

fn apply_sample(config: &mut PipelineConfig, args: &SampleArgs) {
    let s = &mut config.sample;
    s.fps = args.fps.unwrap_or(s.fps);
    s.duration = args.duration.or(s.duration);
    s.max_width = args.max_width.unwrap_or(s.max_width);
    s.max_height = args.max_height.unwrap_or(s.max_height);
}

fn apply_model(config: &mut PipelineConfig, model: Option<ModelId>, strict: bool) {
    if let Some(m) = model {
        config.model = m;
    }
    if strict {
        config.failure_policy = FailurePolicy::Strict;
    }
}

fn cmd_one(ctx: &Ctx, config: PipelineConfig, args: OneArgs) -> anyhow::Result<()> {
    let model = args.model.unwrap_or(config.model);
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let registry = ctx.registry();
    let out = sprite_processor::remove_background(&registry, &bytes, model)?;
    write_file(&args.out, &out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_batch(ctx: &Ctx, config: PipelineConfig, args: BatchArgs) -> anyhow::Result<()> {
    let model = args.model.unwrap_or(config.model);
    let registry = ctx.registry();
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(&args.in_dir)
        .with_context(|| format!("read input dir '{}'", args.in_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| is_image_path(p))
        .collect();
    inputs.sort();

    let mut failed = 0usize;
    for input in &inputs {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = args.out_dir.join(format!("{stem}.png"));
        if out.exists() && !args.overwrite {
            tracing::info!(path = %out.display(), "output exists, skipping");
            continue;
        }
        let result = std::fs::read(input)
            .with_context(|| format!("read image '{}'", input.display()))
            .and_then(|bytes| {
                sprite_processor::remove_background(&registry, &bytes, model).map_err(Into::into)
            })
            .and_then(|png| write_file(&out, &png));
        match result {
            Ok(()) => eprintln!("wrote {}", out.display()),
            Err(e) => {
                failed += 1;
                tracing::warn!(path = %input.display(), "failed: {e:#}");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", inputs.len());
    }
    Ok(())
}

fn cmd_spritesheet(
    ctx: &Ctx,
    mut config: PipelineConfig,
    args: SpritesheetArgs,
) -> anyhow::Result<()> {
    if args.out_dir.is_none() && args.output_spritesheet.is_none() {
        anyhow::bail!("nothing to write: pass --out-dir and/or --output-spritesheet");
    }
    apply_grid(&mut config, args.grid);
    apply_model(&mut config, args.model, args.strict);

    let input = SourceInput::from_path(&args.in_path)?;
    let pipeline = ctx.pipeline(&config)?;
    let flow = if args.all_models {
        FlowKind::CompareModels
    } else {
        FlowKind::ProcessSheet
    };
    let result = pipeline.run_pipeline(&input, flow, &config)?;

    match &result.output {
        PipelineOutput::Sheet(out) => {
            if let Some(dir) = &args.out_dir {
                write_frames(dir, out)?;
            }
            if let Some(path) = &args.output_spritesheet {
                write_file(path, &out.sheet.to_png()?)?;
                eprintln!("wrote {}", path.display());
            }
        }
        PipelineOutput::Comparison(cmp) => {
            let dir = match (&args.out_dir, &args.output_spritesheet) {
                (Some(dir), _) => dir.clone(),
                (None, Some(path)) => path.parent().map(Path::to_path_buf).unwrap_or_default(),
                (None, None) => PathBuf::from("."),
            };
            let stem = file_stem(&args.in_path);
            write_comparison(&dir, &stem, &cmp.entries)?;
        }
        _ => anyhow::bail!("unexpected output for {}", flow.as_str()),
    }
    ctx.report(&result)
}

fn cmd_grid(mut config: PipelineConfig, args: GridCmdArgs) -> anyhow::Result<()> {
    apply_grid(&mut config, args.grid);
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read spritesheet '{}'", args.in_path.display()))?;
    let img = sprite_processor::decode_rgba(&bytes)?;
    let resolution = sprite_processor::resolve_grid_for_image(&img, &config.grid)?;
    let report = serde_json::json!({
        "width": img.width(),
        "height": img.height(),
        "resolution": resolution,
        "suggestions": sprite_processor::suggest_layouts(img.dimensions()),
    });
    println!("{}", serde_json::to_string_pretty(&report).context("serialize grid report")?);
    Ok(())
}

fn cmd_video(ctx: &Ctx, mut config: PipelineConfig, args: VideoArgs) -> anyhow::Result<()> {
    apply_sample(&mut config, &args.sample);
    let input = SourceInput::from_path(&args.in_path)?;
    let result = ctx
        .pipeline(&config)?
        .run_pipeline(&input, FlowKind::VideoToGif, &config)?;
    let PipelineOutput::Gif(gif) = &result.output else {
        anyhow::bail!("unexpected output for video_to_gif");
    };
    write_file(&args.out, &gif.gif)?;
    eprintln!(
        "wrote {} ({} frames at {} fps)",
        args.out.display(),
        gif.applied.frame_count,
        gif.applied.fps
    );
    ctx.report(&result)
}

fn cmd_video_spritesheet(
    ctx: &Ctx,
    mut config: PipelineConfig,
    args: VideoSheetArgs,
) -> anyhow::Result<()> {
    apply_sample(&mut config, &args.sample);
    apply_grid(&mut config, args.grid);
    let input = SourceInput::from_path(&args.in_path)?;
    let result = ctx
        .pipeline(&config)?
        .run_pipeline(&input, FlowKind::VideoToSheet, &config)?;
    let PipelineOutput::Sheet(out) = &result.output else {
        anyhow::bail!("unexpected output for video_to_sheet");
    };
    write_file(&args.out, &out.sheet.to_png()?)?;
    eprintln!("wrote {} (grid {})", args.out.display(), out.sheet.spec().grid);
    ctx.report(&result)
}

fn cmd_pipeline(ctx: &Ctx, mut config: PipelineConfig, args: PipelineArgs) -> anyhow::Result<()> {
    apply_sample(&mut config, &args.sample);
    apply_grid(&mut config, args.grid);
    apply_model(&mut config, args.model, args.strict);

    let input = SourceInput::from_path(&args.in_path)?;
    let flow = FlowKind::VideoPipeline {
        compare: args.all_models,
    };
    let result = ctx.pipeline(&config)?.run_pipeline(&input, flow, &config)?;
    let PipelineOutput::Video(video) = &result.output else {
        anyhow::bail!("unexpected output for {}", flow.as_str());
    };

    let stem = file_stem(&args.in_path);
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    if args.keep_intermediates {
        write_file(&args.out_dir.join(format!("{stem}.gif")), &video.gif.gif)?;
        write_file(
            &args.out_dir.join(format!("{stem}_spritesheet.png")),
            &video.sheet.sheet.to_png()?,
        )?;
    }
    match &video.processed {
        ProcessedSheets::Single(out) => {
            let model = out.model.unwrap_or(config.model);
            let path = args.out_dir.join(format!("{stem}_{model}.png"));
            write_file(&path, &out.sheet.to_png()?)?;
            eprintln!("wrote {}", path.display());
        }
        ProcessedSheets::Comparison(cmp) => write_comparison(&args.out_dir, &stem, &cmp.entries)?,
    }
    ctx.report(&result)
}

fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read video '{}'", args.in_path.display()))?;
    let source = sprite_processor::open_video(&bytes)?;
    let analysis = sprite_processor::analyze(source.info(), bytes.len() as u64);
    let report = serde_json::json!({
        "decoder": source.info().decoder,
        "analysis": analysis,
        "models": ModelId::ALL.iter().map(|m| serde_json::json!({
            "id": m.as_str(),
            "description": m.description(),
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report).context("serialize analysis")?);
    Ok(())
}

fn write_frames(dir: &Path, out: &SheetOutput) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create output dir '{}'", dir.display()))?;
    for frame in &out.frames {
        let path = dir.join(format!(
            "frame_{:03}_{:03}_processed.png",
            frame.row, frame.col
        ));
        write_file(&path, &sprite_processor::encode_png(&frame.image)?)?;
    }
    eprintln!("wrote {} frames to {}", out.frames.len(), dir.display());
    Ok(())
}

fn write_comparison(
    dir: &Path,
    stem: &str,
    entries: &[(ModelId, ComparisonEntry)],
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create output dir '{}'", dir.display()))?;
    for (model, entry) in entries {
        match entry {
            ComparisonEntry::Success { sheet, failed, .. } => {
                let path = dir.join(format!("{stem}_{model}.png"));
                write_file(&path, &sheet.to_png()?)?;
                eprintln!("wrote {} ({failed} frames kept original)", path.display());
            }
            ComparisonEntry::Failure { message } => {
                eprintln!("{model}: failed: {message}");
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned())
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| matches!(e.as_str(), "png" | "jpg" | "jpeg" | "webp" | "bmp"))
}
