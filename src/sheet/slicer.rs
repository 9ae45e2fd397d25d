use image::RgbaImage;

use crate::foundation::core::{Frame, SheetLayout};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::decode_rgba;

/// Decode `bytes` and cut the first `frame_count` tiles of `layout` (default: all).
pub fn slice(
    bytes: &[u8],
    layout: &SheetLayout,
    frame_count: Option<u32>,
) -> SpriteResult<Vec<Frame>> {
    let img = decode_rgba(bytes)?;
    slice_image(&img, layout, frame_count)
}

/// Cut tiles out of an already decoded sheet, row-major from index 0.
///
/// Each frame is an exact, non-overlapping crop at `layout.tile_origin(i)`.
pub fn slice_image(
    img: &RgbaImage,
    layout: &SheetLayout,
    frame_count: Option<u32>,
) -> SpriteResult<Vec<Frame>> {
    let (w, h) = img.dimensions();
    if layout.sheet_width() > w || layout.sheet_height() > h {
        return Err(SpriteError::invalid_grid(format!(
            "grid {} of {}x{} tiles needs {}x{} pixels, image is {w}x{h}",
            layout.grid,
            layout.frame_width,
            layout.frame_height,
            layout.sheet_width(),
            layout.sheet_height()
        )));
    }

    let capacity = layout.grid.capacity();
    let n = frame_count.unwrap_or(capacity);
    if n == 0 || n > capacity {
        return Err(SpriteError::invalid_grid(format!(
            "frame count must be between 1 and {capacity} for grid {}, got {n}",
            layout.grid
        )));
    }

    let frames = (0..n)
        .map(|i| {
            let (x, y) = layout.tile_origin(i);
            let tile =
                image::imageops::crop_imm(img, x, y, layout.frame_width, layout.frame_height)
                    .to_image();
            Frame::original(i, layout.grid, tile)
        })
        .collect();
    tracing::debug!(grid = %layout.grid, frames = n, "sliced sheet");
    Ok(frames)
}

#[cfg(test)]
#[path = "../../tests/unit/sheet/slicer.rs"]
mod tests;
