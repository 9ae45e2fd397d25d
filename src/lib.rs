//! Sprite-processor turns spritesheets, animated GIFs and videos into background-free
//! sprite assets.
//!
//! The pipeline is built from small stages that can be used on their own:
//!
//! - Resolve a sheet's grid from hints or by detection ([`resolve_grid`])
//! - Slice a sheet into frames ([`slice`]) and put frames back together ([`assemble`])
//! - Fan frames out to background-removal models ([`ModelDispatcher`])
//! - Sample videos into frame sequences ([`sample_video`]) and encode GIFs ([`encode_gif`])
//!
//! [`Pipeline`] composes them into end-to-end jobs ([`FlowKind`]).
#![forbid(unsafe_code)]

mod encode;
mod foundation;
mod grid;
mod media;
mod pipeline;
mod segment;
mod sheet;

pub use crate::foundation::core::{
    Frame, FrameSource, Grid, SheetLayout, Spritesheet, SpritesheetSpec, relayout,
};
pub use crate::foundation::error::{SpriteError, SpriteResult};
pub use crate::foundation::raster::{decode_rgba, encode_png, image_dimensions, is_gif};

pub use crate::grid::detect::{GridCandidate, detect_candidates, suggest_layouts};
pub use crate::grid::resolver::{
    GridHints, GridResolution, ResolutionMethod, auto_grid_for_count, resolve_grid,
    resolve_grid_for_image,
};

pub use crate::sheet::assembler::{assemble, assemble_png, assemble_sheet, fit_frames};
pub use crate::sheet::slicer::{slice, slice_image};

pub use crate::segment::backend::{
    CancelToken, ModelLoader, REMBG_ENV, RembgLoader, RembgSegmenter, Segmenter,
};
pub use crate::segment::dispatch::{
    DispatchOpts, DispatchReport, FailureKind, ModelDispatcher, ModelFailure, ModelOutput,
    ModelResult, remove_background,
};
pub use crate::segment::model::ModelId;
pub use crate::segment::registry::ModelRegistry;

#[cfg(feature = "media-ffmpeg")]
pub use crate::media::ffmpeg::{FfmpegSource, is_ffmpeg_on_path};
pub use crate::media::sampler::{
    AppliedSampling, Recommendations, SampleConfig, SampledVideo, VideoAnalysis, analyze,
    constrain_size, sample_source, sample_times, sample_video,
};
pub use crate::media::source::{GifSource, VideoInfo, VideoSource, extract_gif_frames, open_video};

pub use crate::encode::gif::{encode_gif, frame_delay_ms};

pub use crate::pipeline::config::{FailurePolicy, PipelineConfig};
pub use crate::pipeline::flows::{Pipeline, SourceInput};
pub use crate::pipeline::job::{JobState, JobTrace};
pub use crate::pipeline::result::{
    ComparisonEntry, ComparisonOutput, ComparisonSummary, FailedFrame, FlowKind, GifOutput,
    GifSummary, PipelineOutput, PipelineResult, PipelineSummary, ProcessedSheets, SheetOutput,
    SheetSummary, VideoPipelineOutput,
};
