//! Grid geometry.

use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;
use crate::scene::GuideLine;

pub const MIN_CELLS: u32 = 1;
pub const MAX_CELLS: u32 = 10;
pub const DEFAULT_GAP: f32 = 10.0;
pub const MAX_GAP: f32 = 50.0;
pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 1.0;

pub const GUIDE_STROKE: &str = "#ff0000";
pub const GUIDE_DASH: [f32; 2] = [5.0, 5.0];

/// Named layouts offered by the editor.
pub const PRESETS: &[(&str, u32, u32)] = &[
    ("twoByTwo", 2, 2),
    ("threeByThree", 3, 3),
    ("twoByOne", 2, 1),
    ("oneByTwo", 1, 2),
    ("threeByOne", 3, 1),
    ("oneByThree", 1, 3),
];

/// Partition of the canvas into `cols × rows` cells.
///
/// ```text
/// pitch  = canvas × scale / count
/// cell   = pitch − gap
/// offset = (canvas − canvas × scale) / 2
/// center = offset + index × pitch + pitch / 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub gap: f32,
    pub scale: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

/// Placement of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeometry {
    pub row: u32,
    pub col: u32,
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
}

impl GridLayout {
    /// Counts are clamped to `[1, 10]`.
    pub fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols: cols.clamp(MIN_CELLS, MAX_CELLS),
            rows: rows.clamp(MIN_CELLS, MAX_CELLS),
            gap: DEFAULT_GAP,
            scale: 1.0,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        PRESETS
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|&(_, cols, rows)| Self::new(cols, rows))
    }

    pub fn with_gap(mut self, gap: f32) -> Self {
        self.gap = if gap.is_finite() { gap.clamp(0.0, MAX_GAP) } else { DEFAULT_GAP };
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = if scale.is_finite() { scale.clamp(MIN_SCALE, MAX_SCALE) } else { 1.0 };
        self
    }

    pub fn cell_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    /// Same cell counts, possibly different gap or scale.
    pub fn same_shape(&self, other: &GridLayout) -> bool {
        self.cols == other.cols && self.rows == other.rows
    }

    /// Row-major index of a cell.
    pub fn index_of(&self, row: u32, col: u32) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| (row * self.cols + col) as usize)
    }

    /// Cell at a row-major index.
    pub fn position_of(&self, index: usize) -> Option<(u32, u32)> {
        (index < self.cell_count()).then(|| (index as u32 / self.cols, index as u32 % self.cols))
    }

    /// Width and height of the scaled block.
    pub fn block_size(&self, canvas: &CanvasConfig) -> (f32, f32) {
        (canvas.width_f() * self.scale, canvas.height_f() * self.scale)
    }

    /// Top-left corner of the scaled block.
    pub fn offset(&self, canvas: &CanvasConfig) -> (f32, f32) {
        let (bw, bh) = self.block_size(canvas);
        ((canvas.width_f() - bw) / 2.0, (canvas.height_f() - bh) / 2.0)
    }

    /// Distance between neighbouring cell centers.
    pub fn pitch(&self, canvas: &CanvasConfig) -> (f32, f32) {
        let (bw, bh) = self.block_size(canvas);
        (bw / self.cols as f32, bh / self.rows as f32)
    }

    pub fn cell_size(&self, canvas: &CanvasConfig) -> (f32, f32) {
        let (pw, ph) = self.pitch(canvas);
        ((pw - self.gap).max(0.0), (ph - self.gap).max(0.0))
    }

    pub fn cell(&self, canvas: &CanvasConfig, row: u32, col: u32) -> Option<CellGeometry> {
        self.index_of(row, col)?;
        let (ox, oy) = self.offset(canvas);
        let (pw, ph) = self.pitch(canvas);
        let (width, height) = self.cell_size(canvas);
        Some(CellGeometry {
            row,
            col,
            center: (ox + col as f32 * pw + pw / 2.0, oy + row as f32 * ph + ph / 2.0),
            width,
            height,
        })
    }

    /// All cells in row-major order.
    pub fn cells(&self, canvas: &CanvasConfig) -> Vec<CellGeometry> {
        (0..self.rows)
            .flat_map(|row| (0..self.cols).map(move |col| (row, col)))
            .filter_map(|(row, col)| self.cell(canvas, row, col))
            .collect()
    }

    /// One dashed line per column boundary, then one per row boundary.
    pub fn guides(&self, canvas: &CanvasConfig) -> Vec<GuideLine> {
        let (ox, oy) = self.offset(canvas);
        let (bw, bh) = self.block_size(canvas);
        let (pw, ph) = self.pitch(canvas);
        let line = |from, to| GuideLine {
            from,
            to,
            stroke: GUIDE_STROKE.to_string(),
            stroke_width: 1.0,
            dash: GUIDE_DASH,
        };

        let verticals = (0..=self.cols).map(|col| {
            let x = ox + col as f32 * pw;
            line((x, oy), (x, oy + bh))
        });
        let horizontals = (0..=self.rows).map(|row| {
            let y = oy + row as f32 * ph;
            line((ox, y), (ox + bw, y))
        });
        verticals.chain(horizontals).collect()
    }
}
