use std::time::Duration;

use crate::foundation::core::{Frame, Spritesheet, SpritesheetSpec};
use crate::media::sampler::{AppliedSampling, VideoAnalysis};
use crate::pipeline::job::JobState;
use crate::segment::dispatch::{FailureKind, ModelResult};
use crate::segment::model::ModelId;

/// End-to-end flow a job runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Sample a video and encode it as an animated GIF.
    VideoToGif,
    /// Sample a video and lay the frames out on a spritesheet.
    VideoToSheet,
    /// Remove backgrounds from a spritesheet or GIF with one model.
    ProcessSheet,
    /// Remove backgrounds with several models, one sheet per model.
    CompareModels,
    /// Video to GIF to sheet to processed sheet(s).
    VideoPipeline {
        /// Process with every configured model instead of one.
        compare: bool,
    },
}

impl FlowKind {
    /// Short label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoToGif => "video_to_gif",
            Self::VideoToSheet => "video_to_sheet",
            Self::ProcessSheet => "process_sheet",
            Self::CompareModels => "compare_models",
            Self::VideoPipeline { compare: false } => "video_pipeline",
            Self::VideoPipeline { compare: true } => "video_pipeline_compare",
        }
    }
}

/// Output of the video-to-GIF flow.
#[derive(Clone, Debug)]
pub struct GifOutput {
    /// Encoded animation.
    pub gif: Vec<u8>,
    /// Source analysis.
    pub analysis: VideoAnalysis,
    /// Sampling settings that were applied.
    pub applied: AppliedSampling,
}

/// One assembled sheet with the frames it was built from.
#[derive(Clone, Debug)]
pub struct SheetOutput {
    /// Assembled sheet.
    pub sheet: Spritesheet,
    /// Frames placed on the sheet, in index order.
    pub frames: Vec<Frame>,
    /// Calls that failed; their frames kept the original pixels.
    pub failures: Vec<ModelResult>,
    /// Model that processed the frames, if any.
    pub model: Option<ModelId>,
}

/// Per-model outcome of a comparison.
#[derive(Clone, Debug)]
pub enum ComparisonEntry {
    /// The model produced a sheet.
    Success {
        /// Sheet assembled from this model's frames.
        sheet: Spritesheet,
        /// Frames the model processed.
        processed: u32,
        /// Frames that fell back to the original.
        failed: u32,
    },
    /// The model produced no usable sheet.
    Failure {
        /// Why.
        message: String,
    },
}

impl ComparisonEntry {
    /// `true` for [`ComparisonEntry::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Sheet, on success.
    pub fn sheet(&self) -> Option<&Spritesheet> {
        match self {
            Self::Success { sheet, .. } => Some(sheet),
            Self::Failure { .. } => None,
        }
    }
}

/// Output of a model comparison, in requested model order.
#[derive(Clone, Debug, Default)]
pub struct ComparisonOutput {
    /// One entry per model.
    pub entries: Vec<(ModelId, ComparisonEntry)>,
}

impl ComparisonOutput {
    /// Entry for `model`.
    pub fn get(&self, model: ModelId) -> Option<&ComparisonEntry> {
        self.entries
            .iter()
            .find(|(m, _)| *m == model)
            .map(|(_, e)| e)
    }
}

/// Background-removal stage of the video pipeline.
#[derive(Clone, Debug)]
pub enum ProcessedSheets {
    /// One model.
    Single(SheetOutput),
    /// Several models.
    Comparison(ComparisonOutput),
}

/// Output of the full video pipeline.
#[derive(Clone, Debug)]
pub struct VideoPipelineOutput {
    /// Intermediate animation.
    pub gif: GifOutput,
    /// Unprocessed sheet of the sampled frames.
    pub sheet: SheetOutput,
    /// Processed sheet(s).
    pub processed: ProcessedSheets,
}

/// Flow-specific output.
#[derive(Clone, Debug)]
pub enum PipelineOutput {
    /// [`FlowKind::VideoToGif`].
    Gif(GifOutput),
    /// [`FlowKind::VideoToSheet`] and [`FlowKind::ProcessSheet`].
    Sheet(SheetOutput),
    /// [`FlowKind::CompareModels`].
    Comparison(ComparisonOutput),
    /// [`FlowKind::VideoPipeline`].
    Video(Box<VideoPipelineOutput>),
}

/// A finished job.
#[derive(Clone, Debug)]
pub struct PipelineResult {
    /// Flow that ran.
    pub flow: FlowKind,
    /// Flow output.
    pub output: PipelineOutput,
    /// States visited, ending in [`JobState::Completed`].
    pub states: Vec<JobState>,
    /// Wall time.
    pub elapsed: Duration,
}

impl PipelineResult {
    /// Pixel-free report of the job.
    pub fn summary(&self) -> PipelineSummary {
        let mut summary = PipelineSummary {
            flow: self.flow.as_str(),
            states: self.states.clone(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            gif: None,
            sheet: None,
            processed: None,
            comparison: None,
        };
        match &self.output {
            PipelineOutput::Gif(gif) => summary.gif = Some(GifSummary::from(gif)),
            PipelineOutput::Sheet(sheet) => summary.sheet = Some(SheetSummary::from(sheet)),
            PipelineOutput::Comparison(cmp) => summary.comparison = Some(comparison_summary(cmp)),
            PipelineOutput::Video(video) => {
                summary.gif = Some(GifSummary::from(&video.gif));
                summary.sheet = Some(SheetSummary::from(&video.sheet));
                match &video.processed {
                    ProcessedSheets::Single(s) => summary.processed = Some(SheetSummary::from(s)),
                    ProcessedSheets::Comparison(c) => {
                        summary.comparison = Some(comparison_summary(c))
                    }
                }
            }
        }
        summary
    }
}

/// Serializable job report.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PipelineSummary {
    /// Flow label.
    pub flow: &'static str,
    /// States visited.
    pub states: Vec<JobState>,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
    /// Animation details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif: Option<GifSummary>,
    /// Sheet details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<SheetSummary>,
    /// Processed sheet of the single-model video pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<SheetSummary>,
    /// Comparison details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Vec<ComparisonSummary>>,
}

/// Serializable [`GifOutput`] details.
#[derive(Clone, Debug, serde::Serialize)]
pub struct GifSummary {
    /// Encoded size.
    pub size_bytes: usize,
    /// Source analysis.
    pub analysis: VideoAnalysis,
    /// Applied sampling.
    pub applied: AppliedSampling,
}

impl From<&GifOutput> for GifSummary {
    fn from(gif: &GifOutput) -> Self {
        Self {
            size_bytes: gif.gif.len(),
            analysis: gif.analysis.clone(),
            applied: gif.applied,
        }
    }
}

/// One failed (frame, model) call.
#[derive(Clone, Debug, serde::Serialize)]
pub struct FailedFrame {
    /// Frame index.
    pub frame_index: u32,
    /// Model.
    pub model: ModelId,
    /// Failure stage.
    pub kind: FailureKind,
    /// Failure description.
    pub message: String,
}

/// Serializable [`SheetOutput`] details.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SheetSummary {
    /// Sheet metadata.
    pub spec: SpritesheetSpec,
    /// Processing model.
    pub model: Option<ModelId>,
    /// Failed calls.
    pub failed_frames: Vec<FailedFrame>,
}

impl From<&SheetOutput> for SheetSummary {
    fn from(out: &SheetOutput) -> Self {
        Self {
            spec: out.sheet.spec().clone(),
            model: out.model,
            failed_frames: failed_frames(&out.failures),
        }
    }
}

/// Serializable [`ComparisonEntry`].
#[derive(Clone, Debug, serde::Serialize)]
pub struct ComparisonSummary {
    /// Model.
    pub model: ModelId,
    /// Whether a sheet was produced.
    pub success: bool,
    /// Sheet metadata on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpritesheetSpec>,
    /// Processed frame count.
    pub processed: u32,
    /// Failed frame count.
    pub failed: u32,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn comparison_summary(cmp: &ComparisonOutput) -> Vec<ComparisonSummary> {
    cmp.entries
        .iter()
        .map(|(model, entry)| match entry {
            ComparisonEntry::Success {
                sheet,
                processed,
                failed,
            } => ComparisonSummary {
                model: *model,
                success: true,
                spec: Some(sheet.spec().clone()),
                processed: *processed,
                failed: *failed,
                error: None,
            },
            ComparisonEntry::Failure { message } => ComparisonSummary {
                model: *model,
                success: false,
                spec: None,
                processed: 0,
                failed: 0,
                error: Some(message.clone()),
            },
        })
        .collect()
}

fn failed_frames(results: &[ModelResult]) -> Vec<FailedFrame> {
    results
        .iter()
        .filter_map(|r| {
            r.error().map(|e| FailedFrame {
                frame_index: r.frame_index,
                model: r.model,
                kind: e.kind,
                message: e.message.clone(),
            })
        })
        .collect()
}
