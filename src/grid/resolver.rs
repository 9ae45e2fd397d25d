use image::RgbaImage;

use crate::foundation::core::{Grid, SheetLayout};
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::grid::detect::{GridCandidate, detect_candidates};

/// Number of runner-up candidates reported next to an auto-detected grid.
pub const MAX_ALTERNATIVES: usize = 5;

/// Optional caller hints for grid resolution.
///
/// Resolution order (first applicable wins): `grid`, then `frame_width`+`frame_height`
/// (optionally refined by `frames_per_row`), then `frames_per_row` alone, then auto-detection.
/// `frames` caps how many tiles downstream stages use.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridHints {
    /// `"COLSxROWS"`; `"auto"` or empty means no grid hint.
    pub grid: Option<String>,
    /// Explicit tile width in pixels.
    pub frame_width: Option<u32>,
    /// Explicit tile height in pixels.
    pub frame_height: Option<u32>,
    /// Explicit column count.
    pub frames_per_row: Option<u32>,
    /// Number of tiles to use, row-major from the first.
    pub frames: Option<u32>,
}

impl GridHints {
    /// Hints carrying only a grid string.
    pub fn grid(spec: impl Into<String>) -> Self {
        Self {
            grid: Some(spec.into()),
            ..Self::default()
        }
    }

    /// Set the `frames` hint.
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = Some(frames);
        self
    }

    pub(crate) fn grid_spec(&self) -> Option<&str> {
        self.grid
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("auto"))
    }
}

/// Which hint produced the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Parsed from the `grid` hint.
    Explicit,
    /// Derived from `frame_width`/`frame_height`.
    FrameSize,
    /// Derived from `frames_per_row`.
    FramesPerRow,
    /// Chosen by the auto-detection heuristic.
    AutoDetected,
}

/// A resolved grid for a concrete sheet.
#[derive(Clone, Debug, serde::Serialize)]
pub struct GridResolution {
    /// Geometry to slice and assemble with.
    pub layout: SheetLayout,
    /// Tiles to process (`<= layout.grid.capacity()`).
    pub frame_count: u32,
    /// Hint that decided the grid.
    pub method: ResolutionMethod,
    /// 1.0 for explicit hints; heuristic score in `[0, 1]` when auto-detected.
    pub confidence: f32,
    /// Runner-up candidates, best first (auto-detection only).
    pub alternatives: Vec<GridCandidate>,
}

/// Resolve a grid from sheet dimensions alone.
pub fn resolve_grid(dims: (u32, u32), hints: &GridHints) -> SpriteResult<GridResolution> {
    resolve(dims, None, hints)
}

/// Resolve a grid for a decoded sheet; auto-detection also inspects tile contents.
pub fn resolve_grid_for_image(img: &RgbaImage, hints: &GridHints) -> SpriteResult<GridResolution> {
    resolve(img.dimensions(), Some(img), hints)
}

#[tracing::instrument(skip(img), level = "debug")]
fn resolve(
    dims: (u32, u32),
    img: Option<&RgbaImage>,
    hints: &GridHints,
) -> SpriteResult<GridResolution> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return Err(SpriteError::invalid_grid(format!(
            "sheet dimensions must be non-zero, got {w}x{h}"
        )));
    }
    if hints.frames == Some(0) {
        return Err(SpriteError::invalid_grid("frames must be > 0 when set"));
    }

    if let Some(spec) = hints.grid_spec() {
        let grid: Grid = spec.parse()?;
        check_divides(w, grid.cols, "width", "columns")?;
        check_divides(h, grid.rows, "height", "rows")?;
        let layout = SheetLayout::new(grid, w / grid.cols, h / grid.rows)?;
        return finish(layout, hints.frames, ResolutionMethod::Explicit, 1.0, Vec::new());
    }

    match (hints.frame_width, hints.frame_height) {
        (Some(fw), Some(fh)) => return resolve_frame_size(dims, fw, fh, hints),
        (Some(_), None) | (None, Some(_)) => {
            return Err(SpriteError::invalid_grid(
                "frame_width and frame_height must be given together",
            ));
        }
        (None, None) => {}
    }

    if let Some(cols) = hints.frames_per_row {
        if cols == 0 {
            return Err(SpriteError::invalid_grid("frames_per_row must be > 0"));
        }
        check_divides(w, cols, "width", "frames per row")?;
        if let Some(n) = hints.frames {
            let rows = n.div_ceil(cols);
            check_divides(h, rows, "height", "rows")?;
            let layout = SheetLayout::new(Grid::new(cols, rows)?, w / cols, h / rows)?;
            return finish(layout, Some(n), ResolutionMethod::FramesPerRow, 1.0, Vec::new());
        }
        let candidates: Vec<GridCandidate> = detect_candidates(dims, img)
            .into_iter()
            .filter(|c| c.grid.cols == cols)
            .collect();
        let (top, alternatives) = split_top(candidates).ok_or_else(|| {
            SpriteError::invalid_grid(format!(
                "no row count evenly divides height {h} for {cols} frames per row"
            ))
        })?;
        return finish(
            top.layout()?,
            None,
            ResolutionMethod::FramesPerRow,
            top.score,
            alternatives,
        );
    }

    let (top, alternatives) = split_top(detect_candidates(dims, img)).ok_or_else(|| {
        SpriteError::invalid_grid(format!(
            "no grid with a plausible tile count evenly divides {w}x{h}; pass an explicit grid"
        ))
    })?;
    tracing::debug!(grid = %top.grid, score = top.score, "auto-detected grid");
    finish(
        top.layout()?,
        hints.frames,
        ResolutionMethod::AutoDetected,
        top.score,
        alternatives,
    )
}

fn resolve_frame_size(
    (w, h): (u32, u32),
    fw: u32,
    fh: u32,
    hints: &GridHints,
) -> SpriteResult<GridResolution> {
    if fw == 0 || fh == 0 {
        return Err(SpriteError::invalid_grid(format!(
            "frame size must be > 0, got {fw}x{fh}"
        )));
    }
    if fw > w || fh > h {
        return Err(SpriteError::invalid_grid(format!(
            "frame size {fw}x{fh} exceeds sheet size {w}x{h}"
        )));
    }
    check_divides(w, fw, "width", "frame width")?;
    check_divides(h, fh, "height", "frame height")?;

    let fit_cols = w / fw;
    let fit_rows = h / fh;
    let mut cols = fit_cols;
    let mut rows = fit_rows;
    if let Some(fpr) = hints.frames_per_row {
        if fpr == 0 || fpr > fit_cols {
            return Err(SpriteError::invalid_grid(format!(
                "frames_per_row {fpr} must be between 1 and the {fit_cols} columns that fit"
            )));
        }
        cols = fpr;
        if let Some(n) = hints.frames {
            rows = n.div_ceil(cols);
            if rows > fit_rows {
                return Err(SpriteError::invalid_grid(format!(
                    "{n} frames at {cols} per row need {rows} rows; height {h} fits {fit_rows}"
                )));
            }
        }
    }

    let layout = SheetLayout::new(Grid::new(cols, rows)?, fw, fh)?;
    finish(layout, hints.frames, ResolutionMethod::FrameSize, 1.0, Vec::new())
}

fn finish(
    layout: SheetLayout,
    frames: Option<u32>,
    method: ResolutionMethod,
    confidence: f32,
    alternatives: Vec<GridCandidate>,
) -> SpriteResult<GridResolution> {
    let capacity = layout.grid.capacity();
    let frame_count = frames.unwrap_or(capacity);
    if frame_count > capacity {
        return Err(SpriteError::invalid_grid(format!(
            "requested {frame_count} frames but grid {} holds only {capacity}",
            layout.grid
        )));
    }
    Ok(GridResolution {
        layout,
        frame_count,
        method,
        confidence,
        alternatives,
    })
}

fn split_top(mut candidates: Vec<GridCandidate>) -> Option<(GridCandidate, Vec<GridCandidate>)> {
    if candidates.is_empty() {
        return None;
    }
    let top = candidates.remove(0);
    candidates.truncate(MAX_ALTERNATIVES);
    Some((top, candidates))
}

fn check_divides(total: u32, parts: u32, dim: &str, unit: &str) -> SpriteResult<()> {
    if parts == 0 || total % parts != 0 {
        return Err(SpriteError::invalid_grid(format!(
            "sheet {dim} ({total}) is not divisible by {unit} ({parts})"
        )));
    }
    Ok(())
}

/// Near-square grid holding `n` frames: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
pub fn auto_grid_for_count(n: u32) -> SpriteResult<Grid> {
    if n == 0 {
        return Err(SpriteError::invalid_grid("cannot lay out zero frames"));
    }
    let cols = (n - 1).isqrt() + 1;
    Grid::new(cols, n.div_ceil(cols))
}

#[cfg(test)]
#[path = "../../tests/unit/grid/resolver.rs"]
mod tests;
