use image::RgbaImage;
use image::imageops::FilterType;

use crate::foundation::core::{Frame, SheetLayout, Spritesheet, SpritesheetSpec};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::encode_png;

/// Composite frames onto a transparent sheet sized for `layout`.
///
/// Each frame lands at the tile of its own `index`; tiles without a frame stay
/// fully transparent.
pub fn assemble(frames: &[Frame], layout: &SheetLayout) -> SpriteResult<RgbaImage> {
    let capacity = layout.grid.capacity();
    let mut sheet = RgbaImage::new(layout.sheet_width(), layout.sheet_height());

    for frame in frames {
        let (fw, fh) = frame.dimensions();
        if (fw, fh) != (layout.frame_width, layout.frame_height) {
            return Err(SpriteError::dimension_mismatch(format!(
                "frame {} is {fw}x{fh}, expected {}x{}",
                frame.index, layout.frame_width, layout.frame_height
            )));
        }
        if frame.index >= capacity {
            return Err(SpriteError::invalid_grid(format!(
                "frame index {} is outside grid {} ({capacity} tiles)",
                frame.index, layout.grid
            )));
        }
        let (x, y) = layout.tile_origin(frame.index);
        image::imageops::replace(&mut sheet, &frame.image, i64::from(x), i64::from(y));
    }
    Ok(sheet)
}

/// [`assemble`] and encode the result as PNG.
pub fn assemble_png(frames: &[Frame], layout: &SheetLayout) -> SpriteResult<Vec<u8>> {
    encode_png(&assemble(frames, layout)?)
}

/// [`assemble`] and attach sheet metadata.
pub fn assemble_sheet(
    frames: &[Frame],
    layout: &SheetLayout,
    source_filename: &str,
    source_size_bytes: u64,
) -> SpriteResult<Spritesheet> {
    let image = assemble(frames, layout)?;
    let spec = SpritesheetSpec {
        grid: layout.grid,
        frame_width: layout.frame_width,
        frame_height: layout.frame_height,
        frame_count: frames.len() as u32,
        source_filename: source_filename.to_owned(),
        source_size_bytes,
    };
    Ok(Spritesheet::new(image, spec))
}

/// Resize every frame that is not already `width x height` (Lanczos3).
pub fn fit_frames(frames: &mut [Frame], width: u32, height: u32) -> SpriteResult<()> {
    if width == 0 || height == 0 {
        return Err(SpriteError::validation(format!(
            "target frame size must be > 0, got {width}x{height}"
        )));
    }
    for frame in frames.iter_mut().filter(|f| f.dimensions() != (width, height)) {
        frame.image = image::imageops::resize(&frame.image, width, height, FilterType::Lanczos3);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/sheet/assembler.rs"]
mod tests;
