use image::RgbaImage;

use crate::foundation::core::{Grid, SheetLayout};
use crate::foundation::error::SpriteResult;

/// Smallest tile count auto-detection will propose.
pub const MIN_TILES: u32 = 2;
/// Largest tile count auto-detection will propose.
pub const MAX_TILES: u32 = 64;

const W_ASPECT: f32 = 0.55;
const W_TRAILING: f32 = 0.15;
const W_ORIENTATION: f32 = 0.15;
const W_SIZE: f32 = 0.15;

/// Tiles smaller than this on their short side are implausible as sprite frames.
const MIN_PLAUSIBLE_TILE: u32 = 16;
/// Per-axis sample count when comparing tile contents.
const SAMPLES_PER_AXIS: u32 = 24;
const BLANK_VARIANCE: f32 = 1.0;
const DUPLICATE_DIFF: f32 = 2.0;

/// A scored grid hypothesis for a sheet.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct GridCandidate {
    /// Proposed grid.
    pub grid: Grid,
    /// Tile width in pixels.
    pub frame_width: u32,
    /// Tile height in pixels.
    pub frame_height: u32,
    /// Plausibility in `[0, 1]`.
    pub score: f32,
    /// Tiles that look like real frames (trailing blank or repeated tiles excluded).
    pub suggested_frame_count: u32,
}

impl GridCandidate {
    /// Layout for this candidate.
    pub fn layout(&self) -> SpriteResult<SheetLayout> {
        SheetLayout::new(self.grid, self.frame_width, self.frame_height)
    }
}

/// Enumerate and score every grid whose tiles evenly divide `dims`.
///
/// Results are sorted best first. Ties favor fewer tiles, then more columns.
/// When `img` is given, trailing blank or duplicate tiles lower the score and
/// reduce `suggested_frame_count`.
pub fn detect_candidates(dims: (u32, u32), img: Option<&RgbaImage>) -> Vec<GridCandidate> {
    let (w, h) = dims;
    let mut out = Vec::new();
    if w == 0 || h == 0 {
        return out;
    }

    for cols in divisors(w) {
        for rows in divisors(h) {
            let tiles = cols * rows;
            if !(MIN_TILES..=MAX_TILES).contains(&tiles) {
                continue;
            }
            let Ok(grid) = Grid::new(cols, rows) else {
                continue;
            };
            let fw = w / cols;
            let fh = h / rows;

            let trailing = img.map_or(0, |img| trailing_filler(img, grid, fw, fh));
            let aspect = fw.min(fh) as f32 / fw.max(fh) as f32;
            let orientation = if cols >= rows { 1.0 } else { 0.0 };
            let size = (fw.min(fh) as f32 / MIN_PLAUSIBLE_TILE as f32).min(1.0);
            let filled = 1.0 - trailing as f32 / tiles as f32;

            let score = W_ASPECT * aspect
                + W_TRAILING * filled
                + W_ORIENTATION * orientation
                + W_SIZE * size;

            out.push(GridCandidate {
                grid,
                frame_width: fw,
                frame_height: fh,
                score: score.clamp(0.0, 1.0),
                suggested_frame_count: tiles - trailing,
            });
        }
    }

    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.grid.capacity().cmp(&b.grid.capacity()))
            .then_with(|| b.grid.cols.cmp(&a.grid.cols))
    });
    out
}

/// Simple layout suggestions for sheets where detection is ambiguous.
///
/// Pairs the first five small divisors (up to 20) of each side, keeps layouts of at
/// most 50 tiles, and returns up to ten of them ordered by tile count.
pub fn suggest_layouts(dims: (u32, u32)) -> Vec<GridCandidate> {
    let (w, h) = dims;
    let small = |n: u32| -> Vec<u32> {
        divisors(n)
            .into_iter()
            .filter(|d| *d <= 20)
            .take(5)
            .collect()
    };
    let mut out = Vec::new();
    for cols in small(w) {
        for rows in small(h) {
            let tiles = cols * rows;
            if tiles > 50 {
                continue;
            }
            let Ok(grid) = Grid::new(cols, rows) else {
                continue;
            };
            out.push(GridCandidate {
                grid,
                frame_width: w / cols,
                frame_height: h / rows,
                score: 0.0,
                suggested_frame_count: tiles,
            });
        }
    }
    out.sort_by_key(|c| (c.grid.capacity(), std::cmp::Reverse(c.grid.cols)));
    out.truncate(10);
    out
}

fn divisors(n: u32) -> Vec<u32> {
    (1..=n.min(MAX_TILES)).filter(|d| n % d == 0).collect()
}

/// Count trailing tiles that are blank or repeat their predecessor.
fn trailing_filler(img: &RgbaImage, grid: Grid, fw: u32, fh: u32) -> u32 {
    let tiles = grid.capacity();
    let samples: Vec<Vec<[u8; 4]>> = (0..tiles)
        .map(|i| {
            let (row, col) = grid.position(i);
            sample_tile(img, col * fw, row * fh, fw, fh)
        })
        .collect();

    let mut trailing = 0;
    for i in (1..tiles as usize).rev() {
        let blank = is_blank(&samples[i]);
        let dup = mean_abs_diff(&samples[i], &samples[i - 1]) < DUPLICATE_DIFF;
        if !(blank || dup) {
            break;
        }
        trailing += 1;
    }
    trailing
}

fn sample_tile(img: &RgbaImage, x0: u32, y0: u32, fw: u32, fh: u32) -> Vec<[u8; 4]> {
    let nx = SAMPLES_PER_AXIS.min(fw);
    let ny = SAMPLES_PER_AXIS.min(fh);
    let mut out = Vec::with_capacity((nx * ny) as usize);
    for sy in 0..ny {
        let y = y0 + (sy * 2 + 1) * fh / (ny * 2);
        for sx in 0..nx {
            let x = x0 + (sx * 2 + 1) * fw / (nx * 2);
            out.push(img.get_pixel(x, y).0);
        }
    }
    out
}

fn is_blank(samples: &[[u8; 4]]) -> bool {
    if samples.is_empty() {
        return true;
    }
    if samples.iter().all(|p| p[3] == 0) {
        return true;
    }
    let n = samples.len() as f32;
    (0..4).all(|c| {
        let mean = samples.iter().map(|p| p[c] as f32).sum::<f32>() / n;
        let var = samples
            .iter()
            .map(|p| {
                let d = p[c] as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / n;
        var < BLANK_VARIANCE
    })
}

fn mean_abs_diff(a: &[[u8; 4]], b: &[[u8; 4]]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::MAX;
    }
    let total: u32 = a
        .iter()
        .zip(b)
        .map(|(p, q)| (0..4).map(|c| p[c].abs_diff(q[c]) as u32).sum::<u32>())
        .sum();
    total as f32 / (a.len() * 4) as f32
}

#[cfg(test)]
#[path = "../../tests/unit/grid/detect.rs"]
mod tests;
