use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use image::RgbaImage;
use image::imageops;
use tempfile::NamedTempFile;

use crate::foundation::error::{SpriteError, SpriteResult};
use crate::media::source::{VideoInfo, VideoSource};

/// Video decoded by the system `ffmpeg`/`ffprobe` tools.
///
/// The source bytes are spilled to a temporary file that lives as long as the source.
/// Frames are decoded in coded orientation and then turned upright from the stream's
/// rotation metadata, so `info()` reports the displayed size.
#[derive(Debug)]
pub struct FfmpegSource {
    spill: NamedTempFile,
    probe: Probe,
}

impl FfmpegSource {
    /// Spill `bytes` to disk and probe them.
    pub fn from_bytes(bytes: &[u8]) -> SpriteResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(SpriteError::unsupported_format(
                "ffmpeg is required for video decoding, but was not found on PATH",
            ));
        }

        let mut spill = tempfile::Builder::new()
            .prefix("sprite_processor_video_")
            .suffix(".bin")
            .tempfile()
            .map_err(|e| {
                SpriteError::Other(anyhow::anyhow!("failed to create video spill file: {e}"))
            })?;
        spill.write_all(bytes).map_err(|e| {
            SpriteError::Other(anyhow::anyhow!(
                "failed to write video to '{}': {e}",
                spill.path().display()
            ))
        })?;

        let probe = probe_video(spill.path())?;
        tracing::debug!(
            width = probe.info.width,
            height = probe.info.height,
            quarter_turns = probe.quarter_turns,
            fps = probe.info.fps,
            duration = probe.info.duration_secs,
            "probed video"
        );
        Ok(Self { spill, probe })
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.probe.info
    }

    fn frame_at(&mut self, t: f64) -> SpriteResult<Option<RgbaImage>> {
        let info = &self.probe.info;
        let last = if info.fps > 0.0 {
            (info.duration_secs - 1.0 / info.fps).max(0.0)
        } else {
            info.duration_secs
        };
        let t = if t.is_finite() { t.clamp(0.0, last) } else { 0.0 };
        decode_frame(self.spill.path(), &self.probe, t)
    }
}

/// Probe results: displayed info plus the coded geometry frames arrive in.
#[derive(Clone, Debug, PartialEq)]
struct Probe {
    info: VideoInfo,
    coded_width: u32,
    coded_height: u32,
    /// Clockwise quarter turns from coded to displayed orientation (0..=3).
    quarter_turns: u32,
}

fn probe_video(path: &Path) -> SpriteResult<Probe> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| SpriteError::unsupported_format(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(SpriteError::unsupported_format(format!(
            "ffprobe could not read the video: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe(&out.stdout)
}

fn parse_probe(json: &[u8]) -> SpriteResult<Probe> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        avg_frame_rate: Option<String>,
        r_frame_rate: Option<String>,
        duration: Option<String>,
        #[serde(default)]
        tags: Option<ProbeTags>,
        #[serde(default)]
        side_data_list: Vec<ProbeSideData>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeTags {
        rotate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeSideData {
        rotation: Option<f64>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| SpriteError::unsupported_format(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SpriteError::unsupported_format("no video stream found"))?;
    let (Some(coded_width), Some(coded_height)) = (stream.width, stream.height) else {
        return Err(SpriteError::unsupported_format(
            "ffprobe reported no video dimensions",
        ));
    };

    let fps = [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(parse_ff_ratio)
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);
    let duration_secs = stream
        .duration
        .as_deref()
        .or_else(|| parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    // The display matrix angle is counter-clockwise; the legacy `rotate` tag is clockwise.
    let clockwise = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .map(|ccw| -ccw)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        })
        .unwrap_or(0.0);
    let quarter_turns = quarter_turns(clockwise);
    let (width, height) = if quarter_turns % 2 == 1 {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };

    Ok(Probe {
        info: VideoInfo {
            width,
            height,
            fps,
            duration_secs,
            decoder: "ffmpeg",
        },
        coded_width,
        coded_height,
        quarter_turns,
    })
}

/// Nearest clockwise quarter-turn count in `0..4` for an angle in degrees.
fn quarter_turns(clockwise_degrees: f64) -> u32 {
    if !clockwise_degrees.is_finite() {
        return 0;
    }
    ((clockwise_degrees / 90.0).round() as i64).rem_euclid(4) as u32
}

fn decode_frame(path: &Path, probe: &Probe, t: f64) -> SpriteResult<Option<RgbaImage>> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-noautorotate", "-ss", &format!("{t:.6}")])
        .arg("-i")
        .arg(path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SpriteError::decode(format!("failed to run ffmpeg for video decode: {e}")))?;
    if !out.status.success() {
        return Err(SpriteError::decode(format!(
            "ffmpeg video decode failed at {t:.3}s: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    if out.stdout.is_empty() {
        return Ok(None);
    }

    let (w, h) = (probe.coded_width, probe.coded_height);
    let expected = w as usize * h as usize * 4;
    if out.stdout.len() < expected {
        return Err(SpriteError::decode(format!(
            "decoded frame has {} bytes, expected {expected}",
            out.stdout.len()
        )));
    }
    let mut raw = out.stdout;
    raw.truncate(expected);
    Ok(RgbaImage::from_raw(w, h, raw).map(|img| upright(img, probe.quarter_turns)))
}

fn upright(img: RgbaImage, quarter_turns: u32) -> RgbaImage {
    match quarter_turns % 4 {
        1 => imageops::rotate90(&img),
        2 => imageops::rotate180(&img),
        3 => imageops::rotate270(&img),
        _ => img,
    }
}

fn parse_ff_ratio(s: &str) -> Option<f64> {
    let (a, b) = s.split_once('/')?;
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    if b == 0.0 {
        return None;
    }
    Some(a / b)
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/ffmpeg.rs"]
mod tests;
