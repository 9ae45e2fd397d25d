use image::RgbaImage;
use image::imageops::FilterType;

use crate::foundation::core::Grid;
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::media::source::{VideoInfo, VideoSource, open_video};

/// Upper bound on the recommended frame count.
pub const MAX_RECOMMENDED_FRAMES: u32 = 50;
/// Upper bound on the recommended clip length, in seconds.
pub const MAX_RECOMMENDED_DURATION_SECS: f64 = 5.0;
/// Long-edge bound for recommended output size.
pub const RECOMMENDED_MAX_EDGE: u32 = 480;
/// Assumed cost of one (frame, model) segmentation call, in seconds.
const SECS_PER_CALL: f64 = 2.0;

/// Target sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Samples per second (> 0).
    pub fps: f64,
    /// Clip length in seconds; the whole source when absent.
    pub duration: Option<f64>,
    /// Output width bound (> 0).
    pub max_width: u32,
    /// Output height bound (> 0).
    pub max_height: u32,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            fps: 10.0,
            duration: None,
            max_width: RECOMMENDED_MAX_EDGE,
            max_height: RECOMMENDED_MAX_EDGE,
        }
    }
}

impl SampleConfig {
    /// Reject non-positive rates, negative durations and zero size bounds.
    pub fn validate(&self) -> SpriteResult<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(SpriteError::validation(format!(
                "sample fps must be a positive number, got {}",
                self.fps
            )));
        }
        if let Some(d) = self.duration
            && !(d.is_finite() && d >= 0.0)
        {
            return Err(SpriteError::validation(format!(
                "sample duration must be >= 0, got {d}"
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(SpriteError::validation(
                "sample max_width/max_height must be > 0",
            ));
        }
        Ok(())
    }
}

/// Settings suggested for turning a video into a processed spritesheet.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Recommendations {
    /// Sampling rate.
    pub fps: u32,
    /// Clip length in seconds.
    pub duration_secs: f64,
    /// Frames the clip yields (capped).
    pub frame_count: u32,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Sheet grid for the clip.
    pub grid: Grid,
    /// Rough cost of comparing every model on every frame, in seconds.
    pub estimated_processing_secs: f64,
}

/// Source properties plus recommended pipeline settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VideoAnalysis {
    /// Source duration in seconds.
    pub duration_secs: f64,
    /// Source frame rate.
    pub fps: f64,
    /// Source width.
    pub width: u32,
    /// Source height.
    pub height: u32,
    /// Source byte size.
    pub size_bytes: u64,
    /// Suggested settings.
    pub recommended: Recommendations,
}

/// Parameters a sampling run actually used.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct AppliedSampling {
    /// Sampling rate.
    pub fps: f64,
    /// Sampled clip length in seconds.
    pub duration_secs: f64,
    /// Frames produced.
    pub frame_count: u32,
    /// Output frame width.
    pub width: u32,
    /// Output frame height.
    pub height: u32,
}

/// Frames sampled from a video, with its analysis.
#[derive(Clone, Debug)]
pub struct SampledVideo {
    /// Sampled frames, in time order, all the same size.
    pub frames: Vec<RgbaImage>,
    /// Source analysis.
    pub analysis: VideoAnalysis,
    /// Settings that produced `frames`.
    pub applied: AppliedSampling,
}

/// Decode `bytes` and sample it per `cfg`.
pub fn sample_video(bytes: &[u8], cfg: &SampleConfig) -> SpriteResult<SampledVideo> {
    let mut source = open_video(bytes)?;
    sample_source(source.as_mut(), cfg, bytes.len() as u64)
}

/// Sample an opened video: `round(fps * duration)` frames at `t = i / fps`, each
/// downscaled to fit `max_width x max_height`.
#[tracing::instrument(skip(source), fields(decoder = source.info().decoder))]
pub fn sample_source(
    source: &mut dyn VideoSource,
    cfg: &SampleConfig,
    size_bytes: u64,
) -> SpriteResult<SampledVideo> {
    cfg.validate()?;
    let info = source.info().clone();
    let times = sample_times(cfg.fps, cfg.duration, info.duration_secs);
    let (out_w, out_h) = constrain_size(info.width, info.height, cfg.max_width, cfg.max_height);

    let mut frames = Vec::with_capacity(times.len());
    for t in &times {
        let Some(frame) = source.frame_at(*t)? else {
            tracing::debug!(t, "no frame decoded");
            continue;
        };
        let frame = if frame.dimensions() == (out_w, out_h) {
            frame
        } else {
            image::imageops::resize(&frame, out_w, out_h, FilterType::Lanczos3)
        };
        frames.push(frame);
    }
    if frames.is_empty() {
        return Err(SpriteError::empty_source(format!(
            "no frames could be sampled ({} requested)",
            times.len()
        )));
    }

    let applied = AppliedSampling {
        fps: cfg.fps,
        duration_secs: times.len() as f64 / cfg.fps,
        frame_count: frames.len() as u32,
        width: out_w,
        height: out_h,
    };
    tracing::info!(
        frames = applied.frame_count,
        width = out_w,
        height = out_h,
        "sampled video"
    );
    Ok(SampledVideo {
        frames,
        analysis: analyze(&info, size_bytes),
        applied,
    })
}

/// Sample instants for `fps` over `duration` (default: the whole source).
///
/// Yields `round(fps * duration)` times `i / fps`, at least one when the duration
/// is positive, each clamped to the source duration.
pub fn sample_times(fps: f64, duration: Option<f64>, source_duration: f64) -> Vec<f64> {
    if !(fps.is_finite() && fps > 0.0) {
        return Vec::new();
    }
    let source_duration = source_duration.max(0.0);
    let d = duration.unwrap_or(source_duration);
    if !(d.is_finite() && d > 0.0) {
        return Vec::new();
    }
    let n = ((fps * d).round() as usize).max(1);
    (0..n)
        .map(|i| (i as f64 / fps).min(source_duration))
        .collect()
}

/// Fit `(w, h)` inside `(max_w, max_h)` preserving aspect ratio; never upscales.
pub fn constrain_size(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 || (w <= max_w && h <= max_h) {
        return (w, h);
    }
    let scale = (f64::from(max_w) / f64::from(w)).min(f64::from(max_h) / f64::from(h));
    let fit = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
    (fit(w).min(max_w.max(1)), fit(h).min(max_h.max(1)))
}

/// Summarize a source and recommend sampling settings.
pub fn analyze(info: &VideoInfo, size_bytes: u64) -> VideoAnalysis {
    let fps = ((info.fps.max(1.0) / 2.0).round() as u32).clamp(5, 10);
    let duration_secs = info.duration_secs.clamp(0.0, MAX_RECOMMENDED_DURATION_SECS);
    let frame_count = ((f64::from(fps) * duration_secs).round() as u32).min(MAX_RECOMMENDED_FRAMES);
    let (width, height) = constrain_size(
        info.width,
        info.height,
        RECOMMENDED_MAX_EDGE,
        RECOMMENDED_MAX_EDGE,
    );
    let grid = if duration_secs <= 2.0 {
        Grid { cols: 3, rows: 2 }
    } else if duration_secs <= 4.0 {
        Grid { cols: 4, rows: 2 }
    } else {
        Grid { cols: 5, rows: 2 }
    };
    let models = crate::segment::model::ModelId::ALL.len() as f64;

    VideoAnalysis {
        duration_secs: info.duration_secs,
        fps: info.fps,
        width: info.width,
        height: info.height,
        size_bytes,
        recommended: Recommendations {
            fps,
            duration_secs,
            frame_count,
            width,
            height,
            grid,
            estimated_processing_secs: f64::from(frame_count) * models * SECS_PER_CALL,
        },
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/sampler.rs"]
mod tests;
