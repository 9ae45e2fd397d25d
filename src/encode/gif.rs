use image::RgbaImage;
use image::codecs::gif::{GifEncoder, Repeat};

use crate::foundation::error::{SpriteError, SpriteResult};

/// Per-frame delay in milliseconds for playback at `fps`.
pub fn frame_delay_ms(fps: f64) -> u32 {
    (1000.0 / fps).round().max(1.0) as u32
}

/// Encode frames as an infinitely looping animated GIF played at `fps`.
pub fn encode_gif(frames: &[RgbaImage], fps: f64) -> SpriteResult<Vec<u8>> {
    if frames.is_empty() {
        return Err(SpriteError::empty_source("no frames to encode"));
    }
    if !(fps.is_finite() && fps > 0.0) {
        return Err(SpriteError::validation(format!(
            "gif fps must be a positive number, got {fps}"
        )));
    }

    let delay = image::Delay::from_numer_denom_ms(frame_delay_ms(fps), 1);
    let gif_err =
        |e: image::ImageError| SpriteError::Other(anyhow::Error::new(e).context("encode gif"));

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite).map_err(gif_err)?;
        for rgba in frames {
            let frame = image::Frame::from_parts(rgba.clone(), 0, 0, delay);
            encoder.encode_frame(frame).map_err(gif_err)?;
        }
    }
    tracing::debug!(frames = frames.len(), bytes = buf.len(), "encoded gif");
    Ok(buf)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gif.rs"]
mod tests;
