use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::encode::gif::encode_gif;
use crate::foundation::core::{Frame, Grid, SheetLayout};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::{decode_rgba, is_gif};
use crate::grid::resolver::{GridHints, auto_grid_for_count, resolve_grid_for_image};
use crate::media::sampler::sample_video;
use crate::media::source::{extract_gif_frames, spread_indices};
use crate::pipeline::config::{FailurePolicy, PipelineConfig};
use crate::pipeline::job::{JobState, JobTrace};
use crate::pipeline::result::{
    ComparisonEntry, ComparisonOutput, FlowKind, GifOutput, PipelineOutput, PipelineResult,
    ProcessedSheets, SheetOutput, VideoPipelineOutput,
};
use crate::segment::dispatch::{DispatchOpts, DispatchReport, ModelDispatcher};
use crate::segment::model::ModelId;
use crate::segment::registry::ModelRegistry;
use crate::sheet::assembler::{assemble_sheet, fit_frames};
use crate::sheet::slicer::slice_image;

/// Encoded input plus the name it arrived under.
#[derive(Clone, Debug)]
pub struct SourceInput {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Original file name, echoed into sheet metadata.
    pub filename: String,
}

impl SourceInput {
    /// Wrap in-memory bytes.
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
        }
    }

    /// Read a file.
    pub fn from_path(path: &Path) -> SpriteResult<Self> {
        use anyhow::Context as _;
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(bytes, filename))
    }

    /// Byte size of the input.
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Composes grid resolution, slicing, dispatch, assembly and video sampling into jobs.
///
/// One `Pipeline` can serve many jobs; models loaded through its registry stay loaded.
#[derive(Debug)]
pub struct Pipeline {
    dispatcher: ModelDispatcher,
}

impl Pipeline {
    /// Pipeline dispatching through `registry` with `opts`.
    pub fn new(registry: Arc<ModelRegistry>, opts: DispatchOpts) -> SpriteResult<Self> {
        Ok(Self {
            dispatcher: ModelDispatcher::new(registry, opts)?,
        })
    }

    /// Registry models are loaded from.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.dispatcher.registry()
    }

    /// Run `flow` on `input` and report the output with the job's state trace.
    #[tracing::instrument(
        skip(self, input, config),
        fields(flow = flow.as_str(), source = %input.filename, bytes = input.bytes.len())
    )]
    pub fn run_pipeline(
        &self,
        input: &SourceInput,
        flow: FlowKind,
        config: &PipelineConfig,
    ) -> SpriteResult<PipelineResult> {
        let started = Instant::now();
        let mut trace = JobTrace::new();

        let output = config.validate().and_then(|()| match flow {
            FlowKind::VideoToGif => self
                .run_video_to_gif(input, config, &mut trace)
                .map(PipelineOutput::Gif),
            FlowKind::VideoToSheet => self
                .run_video_to_sheet(input, config, &mut trace)
                .map(PipelineOutput::Sheet),
            FlowKind::ProcessSheet => self
                .run_process_sheet(input, config, &mut trace)
                .map(PipelineOutput::Sheet),
            FlowKind::CompareModels => self
                .run_compare_models(input, config, &mut trace)
                .map(PipelineOutput::Comparison),
            FlowKind::VideoPipeline { compare } => self
                .run_video_pipeline(input, config, compare, &mut trace)
                .map(|v| PipelineOutput::Video(Box::new(v))),
        });

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                trace.fail();
                tracing::warn!(kind = e.kind(), states = ?trace.states(), "job failed: {e}");
                return Err(e);
            }
        };
        trace.advance(JobState::Completed)?;
        let elapsed = started.elapsed();
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "job completed");

        Ok(PipelineResult {
            flow,
            output,
            states: trace.into_states(),
            elapsed,
        })
    }

    /// Sample a video and encode the frames as a looping GIF.
    pub fn video_to_gif(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
    ) -> SpriteResult<GifOutput> {
        match self.run_pipeline(input, FlowKind::VideoToGif, config)?.output {
            PipelineOutput::Gif(out) => Ok(out),
            _ => Err(unexpected_output(FlowKind::VideoToGif)),
        }
    }

    /// Sample a video and lay the frames out on an unprocessed spritesheet.
    pub fn video_to_sheet(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
    ) -> SpriteResult<SheetOutput> {
        match self.run_pipeline(input, FlowKind::VideoToSheet, config)?.output {
            PipelineOutput::Sheet(out) => Ok(out),
            _ => Err(unexpected_output(FlowKind::VideoToSheet)),
        }
    }

    /// Remove backgrounds from every frame of a sheet (or GIF) with `config.model`.
    pub fn process_sheet(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
    ) -> SpriteResult<SheetOutput> {
        match self.run_pipeline(input, FlowKind::ProcessSheet, config)?.output {
            PipelineOutput::Sheet(out) => Ok(out),
            _ => Err(unexpected_output(FlowKind::ProcessSheet)),
        }
    }

    /// Process a sheet (or GIF) with every model in `config.models`.
    pub fn compare_models(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
    ) -> SpriteResult<ComparisonOutput> {
        match self.run_pipeline(input, FlowKind::CompareModels, config)?.output {
            PipelineOutput::Comparison(out) => Ok(out),
            _ => Err(unexpected_output(FlowKind::CompareModels)),
        }
    }

    /// Video to GIF to sheet to processed sheet(s).
    pub fn video_pipeline(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
        compare: bool,
    ) -> SpriteResult<VideoPipelineOutput> {
        let flow = FlowKind::VideoPipeline { compare };
        match self.run_pipeline(input, flow, config)?.output {
            PipelineOutput::Video(out) => Ok(*out),
            _ => Err(unexpected_output(flow)),
        }
    }

    fn run_video_to_gif(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
        trace: &mut JobTrace,
    ) -> SpriteResult<GifOutput> {
        sample_and_encode(input, config, trace).map(|(gif, _)| gif)
    }

    fn run_video_to_sheet(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
        trace: &mut JobTrace,
    ) -> SpriteResult<SheetOutput> {
        let sampled = sample_video(&input.bytes, &config.sample)?;
        trace.advance(JobState::Sampled)?;
        let (frames, layout) = lay_out_frames(sampled.frames, &config.grid)?;
        trace.advance(JobState::GridResolved)?;
        let sheet = assemble_sheet(&frames, &layout, &input.filename, input.size_bytes())?;
        trace.advance(JobState::Assembled)?;
        Ok(SheetOutput {
            sheet,
            frames,
            failures: Vec::new(),
            model: None,
        })
    }

    fn run_process_sheet(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
        trace: &mut JobTrace,
    ) -> SpriteResult<SheetOutput> {
        let (frames, layout) = load_sheet_frames(input, &config.grid, trace)?;
        self.process_frames(input, &frames, &layout, config, trace)
    }

    fn run_compare_models(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
        trace: &mut JobTrace,
    ) -> SpriteResult<ComparisonOutput> {
        let (frames, layout) = load_sheet_frames(input, &config.grid, trace)?;
        self.compare_frames(input, &frames, &layout, config, trace)
    }

    fn run_video_pipeline(
        &self,
        input: &SourceInput,
        config: &PipelineConfig,
        compare: bool,
        trace: &mut JobTrace,
    ) -> SpriteResult<VideoPipelineOutput> {
        let (gif, sampled) = sample_and_encode(input, config, trace)?;
        let (frames, layout) = lay_out_frames(sampled, &config.grid)?;
        trace.advance(JobState::GridResolved)?;
        let sheet = assemble_sheet(&frames, &layout, &input.filename, input.size_bytes())?;
        trace.advance(JobState::Sliced)?;

        let processed = if compare {
            ProcessedSheets::Comparison(
                self.compare_frames(input, &frames, &layout, config, trace)?,
            )
        } else {
            ProcessedSheets::Single(self.process_frames(input, &frames, &layout, config, trace)?)
        };
        Ok(VideoPipelineOutput {
            gif,
            sheet: SheetOutput {
                sheet,
                frames,
                failures: Vec::new(),
                model: None,
            },
            processed,
        })
    }

    fn process_frames(
        &self,
        input: &SourceInput,
        frames: &[Frame],
        layout: &SheetLayout,
        config: &PipelineConfig,
        trace: &mut JobTrace,
    ) -> SpriteResult<SheetOutput> {
        let model = config.model;
        let report = self.dispatcher.dispatch(frames, &[model]);
        trace.advance(JobState::Dispatched)?;

        let (merged, failed) = merge_model_frames(frames, &report, model);
        if config.failure_policy == FailurePolicy::Strict && failed > 0 {
            return Err(SpriteError::FramesFailed {
                model,
                failed,
                total: frames.len(),
            });
        }

        let sheet = assemble_sheet(&merged, layout, &input.filename, input.size_bytes())?;
        trace.advance(JobState::Assembled)?;
        Ok(SheetOutput {
            sheet,
            frames: merged,
            failures: report.failures().cloned().collect(),
            model: Some(model),
        })
    }

    fn compare_frames(
        &self,
        input: &SourceInput,
        frames: &[Frame],
        layout: &SheetLayout,
        config: &PipelineConfig,
        trace: &mut JobTrace,
    ) -> SpriteResult<ComparisonOutput> {
        let report = self.dispatcher.dispatch(frames, &config.models);
        trace.advance(JobState::Dispatched)?;

        let total = frames.len();
        let entries = config
            .models
            .iter()
            .map(|&model| {
                let (merged, failed) = merge_model_frames(frames, &report, model);
                let entry = if failed == total {
                    let first = report
                        .for_model(model)
                        .find_map(|r| r.error())
                        .map(|e| e.message.clone())
                        .unwrap_or_default();
                    ComparisonEntry::Failure {
                        message: format!("all {total} frames failed: {first}"),
                    }
                } else if config.failure_policy == FailurePolicy::Strict && failed > 0 {
                    ComparisonEntry::Failure {
                        message: SpriteError::FramesFailed {
                            model,
                            failed,
                            total,
                        }
                        .to_string(),
                    }
                } else {
                    match assemble_sheet(&merged, layout, &input.filename, input.size_bytes()) {
                        Ok(sheet) => ComparisonEntry::Success {
                            sheet,
                            processed: (total - failed) as u32,
                            failed: failed as u32,
                        },
                        Err(e) => ComparisonEntry::Failure {
                            message: e.to_string(),
                        },
                    }
                };
                (model, entry)
            })
            .collect();
        trace.advance(JobState::Assembled)?;
        Ok(ComparisonOutput { entries })
    }
}

fn unexpected_output(flow: FlowKind) -> SpriteError {
    SpriteError::Other(anyhow::anyhow!(
        "flow {} produced an unexpected output kind",
        flow.as_str()
    ))
}

fn sample_and_encode(
    input: &SourceInput,
    config: &PipelineConfig,
    trace: &mut JobTrace,
) -> SpriteResult<(GifOutput, Vec<RgbaImage>)> {
    let sampled = sample_video(&input.bytes, &config.sample)?;
    trace.advance(JobState::Sampled)?;
    let gif = encode_gif(&sampled.frames, sampled.applied.fps)?;
    trace.advance(JobState::Encoded)?;
    let out = GifOutput {
        gif,
        analysis: sampled.analysis,
        applied: sampled.applied,
    };
    Ok((out, sampled.frames))
}

/// Cut a still sheet on its resolved grid, or lay an animated GIF's frames out on one.
fn load_sheet_frames(
    input: &SourceInput,
    hints: &GridHints,
    trace: &mut JobTrace,
) -> SpriteResult<(Vec<Frame>, SheetLayout)> {
    if is_gif(&input.bytes) {
        let grid = hinted_grid(hints)?;
        let max = target_count(hints, grid)?;
        let images = extract_gif_frames(&input.bytes, max, true)?;
        let out = lay_out_frames(images, hints)?;
        trace.advance(JobState::GridResolved)?;
        trace.advance(JobState::Sliced)?;
        return Ok(out);
    }

    let img = decode_rgba(&input.bytes)?;
    let resolution = resolve_grid_for_image(&img, hints)?;
    tracing::info!(
        grid = %resolution.layout.grid,
        method = ?resolution.method,
        confidence = resolution.confidence,
        frames = resolution.frame_count,
        "grid resolved"
    );
    trace.advance(JobState::GridResolved)?;
    let frames = slice_image(&img, &resolution.layout, Some(resolution.frame_count))?;
    trace.advance(JobState::Sliced)?;
    Ok((frames, resolution.layout))
}

/// Place a frame sequence on the hinted grid, a `frames_per_row` grid, or a near-square one.
///
/// More frames than the target are thinned evenly; fewer are padded by repeating the
/// last frame. Frames are resized to the hinted frame size, else to the first frame's.
fn lay_out_frames(
    images: Vec<RgbaImage>,
    hints: &GridHints,
) -> SpriteResult<(Vec<Frame>, SheetLayout)> {
    if images.is_empty() {
        return Err(SpriteError::empty_source("no frames to lay out"));
    }
    let hinted = hinted_grid(hints)?;
    let target = match target_count(hints, hinted)? {
        Some(n) => n as usize,
        None => images.len(),
    };
    let grid = match (hinted, hints.frames_per_row) {
        (_, Some(0)) => return Err(SpriteError::invalid_grid("frames_per_row must be > 0")),
        (Some(g), Some(cols)) => {
            if cols != g.cols {
                tracing::warn!(
                    grid = %g,
                    frames_per_row = cols,
                    "grid hint overrides frames_per_row"
                );
            }
            g
        }
        (Some(g), None) => g,
        (None, Some(cols)) => Grid::new(cols, (target as u32).div_ceil(cols))?,
        (None, None) => auto_grid_for_count(target as u32)?,
    };

    let available = images.len();
    let picked: Vec<RgbaImage> = if available >= target {
        spread_indices(available, target)
            .map(|i| images[i].clone())
            .collect()
    } else {
        let last = images[available - 1].clone();
        images
            .into_iter()
            .chain(std::iter::repeat_n(last, target - available))
            .collect()
    };

    let (fw, fh) = match (hints.frame_width, hints.frame_height) {
        (Some(w), Some(h)) => (w, h),
        (None, None) => picked[0].dimensions(),
        _ => {
            return Err(SpriteError::invalid_grid(
                "frame_width and frame_height must be given together",
            ));
        }
    };
    let mut frames: Vec<Frame> = picked
        .into_iter()
        .enumerate()
        .map(|(i, img)| Frame::original(i as u32, grid, img))
        .collect();
    fit_frames(&mut frames, fw, fh)?;
    let layout = SheetLayout::new(grid, fw, fh)?;
    Ok((frames, layout))
}

fn hinted_grid(hints: &GridHints) -> SpriteResult<Option<Grid>> {
    hints.grid_spec().map(str::parse::<Grid>).transpose()
}

/// Frames to place: the `frames` hint, else the hinted grid's capacity.
fn target_count(hints: &GridHints, grid: Option<Grid>) -> SpriteResult<Option<u32>> {
    match (hints.frames, grid) {
        (Some(0), _) => Err(SpriteError::invalid_grid("frames must be > 0 when set")),
        (Some(n), Some(g)) if n > g.capacity() => Err(SpriteError::invalid_grid(format!(
            "requested {n} frames but grid {g} holds only {}",
            g.capacity()
        ))),
        (Some(n), _) => Ok(Some(n)),
        (None, Some(g)) => Ok(Some(g.capacity())),
        (None, None) => Ok(None),
    }
}

/// Frames as processed by `model`, originals where the call failed; plus the failure count.
fn merge_model_frames(
    frames: &[Frame],
    report: &DispatchReport,
    model: ModelId,
) -> (Vec<Frame>, usize) {
    let mut failed = 0;
    let merged = frames
        .iter()
        .map(|frame| match report.get(frame.index, model).and_then(|r| r.image()) {
            Some(img) => frame.processed(model, img.clone()),
            None => {
                failed += 1;
                frame.clone()
            }
        })
        .collect();
    (merged, failed)
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/flows.rs"]
mod tests;
