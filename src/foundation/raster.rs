use image::{ImageEncoder, RgbaImage};

use crate::foundation::error::{SpriteError, SpriteResult};

/// Decode raster bytes (PNG, JPEG, GIF first frame, WebP, ...) into straight-alpha RGBA8.
///
/// Sources without an alpha channel come out fully opaque.
pub fn decode_rgba(bytes: &[u8]) -> SpriteResult<RgbaImage> {
    if bytes.is_empty() {
        return Err(SpriteError::decode("image data is empty"));
    }
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| SpriteError::decode(format!("decode image from memory: {e}")))?;
    Ok(dyn_img.to_rgba8())
}

/// Read only the pixel dimensions of encoded raster bytes.
pub fn image_dimensions(bytes: &[u8]) -> SpriteResult<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SpriteError::decode(format!("sniff image format: {e}")))?;
    reader
        .into_dimensions()
        .map_err(|e| SpriteError::decode(format!("read image dimensions: {e}")))
}

/// Encode RGBA8 pixels as a lossless PNG.
pub fn encode_png(img: &RgbaImage) -> SpriteResult<Vec<u8>> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| SpriteError::Other(anyhow::Error::new(e).context("encode png")))?;
    Ok(buf)
}

/// `true` when the bytes start with a GIF87a/GIF89a signature.
pub fn is_gif(bytes: &[u8]) -> bool {
    bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/raster.rs"]
mod tests;
