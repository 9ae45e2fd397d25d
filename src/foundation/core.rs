use std::fmt;
use std::str::FromStr;

use image::RgbaImage;

use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::encode_png;
use crate::segment::model::ModelId;

/// `cols x rows` partition of a spritesheet into equal-size tiles.
///
/// Tiles are numbered row-major and zero-based: `index = row * cols + col`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Grid {
    /// Number of tile columns (> 0).
    pub cols: u32,
    /// Number of tile rows (> 0).
    pub rows: u32,
}

impl Grid {
    /// Create a validated grid with non-zero columns and rows whose tile count fits `u32`.
    pub fn new(cols: u32, rows: u32) -> SpriteResult<Self> {
        if cols == 0 || rows == 0 {
            return Err(SpriteError::invalid_grid(format!(
                "grid columns and rows must be > 0, got {cols}x{rows}"
            )));
        }
        if cols.checked_mul(rows).is_none() {
            return Err(SpriteError::invalid_grid(format!(
                "grid {cols}x{rows} has too many tiles"
            )));
        }
        Ok(Self { cols, rows })
    }

    /// Number of tiles in the grid, saturating for grids built without [`Grid::new`].
    pub fn capacity(self) -> u32 {
        self.cols.saturating_mul(self.rows)
    }

    /// `(row, col)` of the tile at `index`.
    pub fn position(self, index: u32) -> (u32, u32) {
        (index / self.cols, index % self.cols)
    }

    /// Row-major index of the tile at `(row, col)`.
    pub fn index_of(self, row: u32, col: u32) -> u32 {
        row * self.cols + col
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl FromStr for Grid {
    type Err = SpriteError;

    /// Parse `"{cols}x{rows}"` (the separator is case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || {
            SpriteError::invalid_grid(format!(
                "grid must be 'COLSxROWS' with positive integers (e.g. '5x2'), got '{s}'"
            ))
        };
        let lower = s.trim().to_ascii_lowercase();
        let (cols, rows) = lower.split_once('x').ok_or_else(bad)?;
        let cols = cols.trim().parse::<u32>().map_err(|_| bad())?;
        let rows = rows.trim().parse::<u32>().map_err(|_| bad())?;
        if cols == 0 || rows == 0 {
            return Err(bad());
        }
        Grid::new(cols, rows)
    }
}

/// Resolved sheet geometry: a grid plus the pixel size of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SheetLayout {
    /// Tile grid.
    pub grid: Grid,
    /// Tile width in pixels.
    pub frame_width: u32,
    /// Tile height in pixels.
    pub frame_height: u32,
}

impl SheetLayout {
    /// Create a layout; frame sizes must be non-zero.
    pub fn new(grid: Grid, frame_width: u32, frame_height: u32) -> SpriteResult<Self> {
        if frame_width == 0 || frame_height == 0 {
            return Err(SpriteError::invalid_grid(format!(
                "frame size must be > 0, got {frame_width}x{frame_height}"
            )));
        }
        if grid.cols.checked_mul(frame_width).is_none()
            || grid.rows.checked_mul(frame_height).is_none()
        {
            return Err(SpriteError::invalid_grid(format!(
                "grid {grid} of {frame_width}x{frame_height} frames is too large"
            )));
        }
        Ok(Self {
            grid,
            frame_width,
            frame_height,
        })
    }

    /// Width of a sheet that exactly holds this layout.
    pub fn sheet_width(&self) -> u32 {
        self.grid.cols * self.frame_width
    }

    /// Height of a sheet that exactly holds this layout.
    pub fn sheet_height(&self) -> u32 {
        self.grid.rows * self.frame_height
    }

    /// Top-left pixel of tile `index`.
    pub fn tile_origin(&self, index: u32) -> (u32, u32) {
        let (row, col) = self.grid.position(index);
        (col * self.frame_width, row * self.frame_height)
    }
}

/// Where a frame's pixels came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Sliced or sampled from the input, untouched.
    Original,
    /// Output of a background-removal model.
    Processed,
}

/// One tile of a spritesheet, or one sampled instant of a video.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Row-major zero-based index.
    pub index: u32,
    /// Grid row.
    pub row: u32,
    /// Grid column.
    pub col: u32,
    /// Straight-alpha RGBA pixels.
    pub image: RgbaImage,
    /// Provenance of `image`.
    pub source: FrameSource,
    /// Model that produced `image`, for processed frames.
    pub model: Option<ModelId>,
}

impl Frame {
    /// Original (unprocessed) frame at `index` of `grid`.
    pub fn original(index: u32, grid: Grid, image: RgbaImage) -> Self {
        let (row, col) = grid.position(index);
        Self {
            index,
            row,
            col,
            image,
            source: FrameSource::Original,
            model: None,
        }
    }

    /// Copy of this frame's placement carrying a model's output.
    pub fn processed(&self, model: ModelId, image: RgbaImage) -> Self {
        Self {
            index: self.index,
            row: self.row,
            col: self.col,
            image,
            source: FrameSource::Processed,
            model: Some(model),
        }
    }

    /// `(width, height)` of the frame image.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Re-derive `row`/`col` of every frame for `grid`, keeping indices.
pub fn relayout(frames: &mut [Frame], grid: Grid) {
    for frame in frames {
        let (row, col) = grid.position(frame.index);
        frame.row = row;
        frame.col = col;
    }
}

/// Descriptive metadata attached to an assembled spritesheet.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SpritesheetSpec {
    /// Grid the sheet was assembled on.
    pub grid: Grid,
    /// Tile width in pixels.
    pub frame_width: u32,
    /// Tile height in pixels.
    pub frame_height: u32,
    /// Number of populated tiles.
    pub frame_count: u32,
    /// File name of the source the frames came from.
    pub source_filename: String,
    /// Byte size of the source the frames came from.
    pub source_size_bytes: u64,
}

/// An assembled sheet and its immutable metadata.
#[derive(Clone, Debug)]
pub struct Spritesheet {
    image: RgbaImage,
    spec: SpritesheetSpec,
}

impl Spritesheet {
    pub(crate) fn new(image: RgbaImage, spec: SpritesheetSpec) -> Self {
        Self { image, spec }
    }

    /// Composite pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Sheet metadata.
    pub fn spec(&self) -> &SpritesheetSpec {
        &self.spec
    }

    /// Encode the sheet as PNG.
    pub fn to_png(&self) -> SpriteResult<Vec<u8>> {
        encode_png(&self.image)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
