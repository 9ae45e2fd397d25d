use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};

use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::is_gif;

/// GIF frames with a zero delay are shown for this long.
pub const GIF_ZERO_DELAY_MS: u32 = 100;

/// Properties of a decodable video stream.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VideoInfo {
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Average frames per second.
    pub fps: f64,
    /// Stream duration in seconds.
    pub duration_secs: f64,
    /// Decoder that opened the stream (`"gif"` or `"ffmpeg"`).
    pub decoder: &'static str,
}

/// Random-access frame decoding for one video.
pub trait VideoSource: Send {
    /// Stream properties.
    fn info(&self) -> &VideoInfo;

    /// Frame shown at `t` seconds; `t` past the end yields the last frame.
    ///
    /// `Ok(None)` means the decoder produced nothing for that instant.
    fn frame_at(&mut self, t: f64) -> SpriteResult<Option<RgbaImage>>;
}

/// Animated GIF decoded fully into memory.
#[derive(Clone, Debug)]
pub struct GifSource {
    info: VideoInfo,
    starts: Vec<f64>,
    frames: Vec<RgbaImage>,
}

impl GifSource {
    /// Decode every frame of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> SpriteResult<Self> {
        let (frames, delays_ms) = decode_gif(bytes)?;

        let mut starts = Vec::with_capacity(frames.len());
        let mut elapsed_ms = 0u64;
        for delay in &delays_ms {
            starts.push(elapsed_ms as f64 / 1000.0);
            elapsed_ms += u64::from(*delay);
        }
        let duration_secs = elapsed_ms as f64 / 1000.0;
        let (width, height) = frames[0].dimensions();
        let fps = frames.len() as f64 / duration_secs;

        Ok(Self {
            info: VideoInfo {
                width,
                height,
                fps,
                duration_secs,
                decoder: "gif",
            },
            starts,
            frames,
        })
    }

    /// Number of decoded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false`; construction rejects frameless GIFs.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for GifSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_at(&mut self, t: f64) -> SpriteResult<Option<RgbaImage>> {
        let t = if t.is_finite() { t.max(0.0) } else { 0.0 };
        let idx = self.starts.partition_point(|s| *s <= t).saturating_sub(1);
        Ok(self.frames.get(idx).cloned())
    }
}

/// Open `bytes` with the first decoder that recognizes them.
pub fn open_video(bytes: &[u8]) -> SpriteResult<Box<dyn VideoSource>> {
    if bytes.is_empty() {
        return Err(SpriteError::empty_source("video data is empty"));
    }
    if is_gif(bytes) {
        return Ok(Box::new(GifSource::from_bytes(bytes)?));
    }
    open_with_ffmpeg(bytes)
}

#[cfg(feature = "media-ffmpeg")]
fn open_with_ffmpeg(bytes: &[u8]) -> SpriteResult<Box<dyn VideoSource>> {
    Ok(Box::new(crate::media::ffmpeg::FfmpegSource::from_bytes(
        bytes,
    )?))
}

#[cfg(not(feature = "media-ffmpeg"))]
fn open_with_ffmpeg(_bytes: &[u8]) -> SpriteResult<Box<dyn VideoSource>> {
    Err(SpriteError::unsupported_format(
        "only animated GIF input is supported without the 'media-ffmpeg' feature",
    ))
}

/// Extract GIF frames as RGBA images.
///
/// With `max_frames`, keeps the first N frames, or N frames spread evenly across the
/// animation when `evenly` is set.
pub fn extract_gif_frames(
    bytes: &[u8],
    max_frames: Option<u32>,
    evenly: bool,
) -> SpriteResult<Vec<RgbaImage>> {
    if max_frames == Some(0) {
        return Err(SpriteError::validation("max_frames must be > 0 when set"));
    }
    let (mut frames, _) = decode_gif(bytes)?;
    let Some(max) = max_frames.map(|m| m as usize) else {
        return Ok(frames);
    };
    if frames.len() <= max {
        return Ok(frames);
    }
    if !evenly {
        frames.truncate(max);
        return Ok(frames);
    }
    let picked = spread_indices(frames.len(), max)
        .map(|i| frames[i].clone())
        .collect();
    Ok(picked)
}

/// `count` indices into `0..total`, evenly spaced and keeping both ends.
///
/// Index `k` is `round(k * (total - 1) / (count - 1))`; a single pick is the first item.
/// Expects `1 <= count <= total`.
pub(crate) fn spread_indices(total: usize, count: usize) -> impl Iterator<Item = usize> {
    let span = total.saturating_sub(1);
    let steps = count.saturating_sub(1);
    (0..count).map(move |k| {
        if steps == 0 {
            0
        } else {
            (2 * k * span + steps) / (2 * steps)
        }
    })
}

fn decode_gif(bytes: &[u8]) -> SpriteResult<(Vec<RgbaImage>, Vec<u32>)> {
    let decoder = GifDecoder::new(Cursor::new(bytes))
        .map_err(|e| SpriteError::unsupported_format(format!("open gif: {e}")))?;
    let decoded = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| SpriteError::decode(format!("decode gif frames: {e}")))?;
    if decoded.is_empty() {
        return Err(SpriteError::empty_source("gif has no frames"));
    }

    let mut frames = Vec::with_capacity(decoded.len());
    let mut delays = Vec::with_capacity(decoded.len());
    for frame in decoded {
        let (num, den) = frame.delay().numer_denom_ms();
        let ms = if den == 0 { 0 } else { num / den };
        delays.push(if ms == 0 { GIF_ZERO_DELAY_MS } else { ms });
        frames.push(frame.into_buffer());
    }
    Ok((frames, delays))
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
