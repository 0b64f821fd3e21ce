//! PNG chart grid summarizing a table.
//!
//! Layout (2 × 3 panels, no text):
//! ```text
//!  ┌────────────┬────────────┬────────────┐
//!  │ histograms │  missing   │ categories │
//!  ├────────────┼────────────┼────────────┤
//!  │ correlation│ magnitude  │   trend    │
//!  └────────────┴────────────┴────────────┘
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{Rgb, RgbImage};
use log::debug;

use crate::color::{correlation_color, generate_palette};
use crate::data::model::{Column, ColumnType, Table, Value};
use crate::data::stats;
use crate::error::ChartError;

/// Produces a chart image for a table and returns where it was written.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, table: &Table, source: &Path) -> Result<PathBuf, ChartError>;
}

const PANEL_W: u32 = 320;
const PANEL_H: u32 = 240;
const COLS: u32 = 3;
const ROWS: u32 = 2;
const MARGIN: u32 = 16;
const HIST_BINS: usize = 30;
const TOP_CATEGORIES: usize = 8;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([200, 200, 200]);
const PLACEHOLDER: Rgb<u8> = Rgb([250, 246, 224]);
const MISSING_BAR: Rgb<u8> = Rgb([240, 128, 128]);
const TREND_LINE: Rgb<u8> = Rgb([70, 130, 180]);

/// Writes `analysis_<stem>_<YYYYmmdd_HHMMSS>.png` into `output_dir`.
#[derive(Debug, Clone)]
pub struct PngChartRenderer {
    pub output_dir: PathBuf,
}

impl PngChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        PngChartRenderer {
            output_dir: output_dir.into(),
        }
    }

    pub fn file_name(source: &Path) -> String {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data");
        format!("analysis_{stem}_{}.png", Local::now().format("%Y%m%d_%H%M%S"))
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, table: &Table, source: &Path) -> Result<PathBuf, ChartError> {
        if table.columns().iter().all(Column::is_empty) {
            return Err(ChartError::EmptyTable);
        }

        let image = draw_grid(table);
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(Self::file_name(source));
        image.save(&path)?;
        debug!("Chart written to {}", path.display());
        Ok(path)
    }
}

/// Draw all six panels onto one image.
pub fn draw_grid(table: &Table) -> RgbImage {
    let mut canvas = Canvas::new(PANEL_W * COLS, PANEL_H * ROWS);
    let panels: [fn(&mut Canvas, Area, &Table) -> bool; 6] = [
        histograms,
        missing_values,
        top_categories,
        correlation_heatmap,
        column_magnitudes,
        trend,
    ];

    for (i, draw) in panels.iter().enumerate() {
        let i = i as u32;
        let cell = Area {
            x: (i % COLS) * PANEL_W,
            y: (i / COLS) * PANEL_H,
            w: PANEL_W,
            h: PANEL_H,
        };
        let plot = cell.inset(MARGIN);
        canvas.outline(plot, FRAME);
        let inner = plot.inset(1);
        if !draw(&mut canvas, inner, table) {
            canvas.fill_rect(inner, PLACEHOLDER);
        }
    }
    canvas.image
}

// ---------------------------------------------------------------------------
// Drawing primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Area {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Area {
    fn inset(self, by: u32) -> Area {
        Area {
            x: self.x + by,
            y: self.y + by,
            w: self.w.saturating_sub(2 * by),
            h: self.h.saturating_sub(2 * by),
        }
    }

    /// Pixel row for a value in `[0, max]`, measured up from the bottom.
    fn bar_top(self, value: f64, max: f64) -> u32 {
        if max <= 0.0 {
            return self.y + self.h;
        }
        let frac = (value / max).clamp(0.0, 1.0);
        self.y + self.h - (frac * self.h as f64).round() as u32
    }
}

struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Canvas {
            image: RgbImage::from_pixel(width, height, BACKGROUND),
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height()
        {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill_rect(&mut self, area: Area, color: Rgb<u8>) {
        for y in area.y..area.y + area.h {
            for x in area.x..area.x + area.w {
                self.put(x as i64, y as i64, color);
            }
        }
    }

    fn outline(&mut self, area: Area, color: Rgb<u8>) {
        let (x0, y0) = (area.x as i64, area.y as i64);
        let (x1, y1) = (x0 + area.w as i64 - 1, y0 + area.h as i64 - 1);
        self.line(x0, y0, x1, y0, color);
        self.line(x0, y1, x1, y1, color);
        self.line(x0, y0, x0, y1, color);
        self.line(x1, y0, x1, y1, color);
    }

    /// Bresenham line.
    fn line(&mut self, mut x0: i64, mut y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Evenly spaced vertical bars, scaled to the largest value.
    fn bars(&mut self, area: Area, values: &[f64], colors: &[Rgb<u8>]) {
        if values.is_empty() || colors.is_empty() {
            return;
        }
        let max = values.iter().copied().fold(0.0_f64, f64::max);
        let slot = area.w / values.len() as u32;
        let gap = (slot / 5).max(1).min(slot.saturating_sub(1));
        for (i, &v) in values.iter().enumerate() {
            let top = area.bar_top(v, max);
            let bar = Area {
                x: area.x + i as u32 * slot + gap / 2,
                y: top,
                w: slot - gap,
                h: area.y + area.h - top,
            };
            self.fill_rect(bar, colors[i % colors.len()]);
        }
    }
}

// ---------------------------------------------------------------------------
// Panels. Each returns `false` when it has nothing to show.
// ---------------------------------------------------------------------------

fn numeric_columns(table: &Table) -> Vec<&Column> {
    table
        .columns()
        .iter()
        .filter(|c| c.dtype.is_numeric())
        .collect()
}

/// Overlaid histograms of the first three numeric columns on a shared range.
fn histograms(canvas: &mut Canvas, area: Area, table: &Table) -> bool {
    let series: Vec<Vec<f64>> = numeric_columns(table)
        .into_iter()
        .take(3)
        .map(Column::numbers)
        .filter(|v| !v.is_empty())
        .collect();
    if series.is_empty() {
        return false;
    }

    let all = series.iter().flatten().copied();
    let min = all.clone().fold(f64::INFINITY, f64::min);
    let max = all.fold(f64::NEG_INFINITY, f64::max);
    let counts: Vec<Vec<usize>> = series
        .iter()
        .map(|v| stats::histogram(v, HIST_BINS, min, max))
        .collect();
    let peak = counts.iter().flatten().copied().max().unwrap_or(0) as f64;

    let colors = generate_palette(series.len());
    let bin_w = area.w / HIST_BINS as u32;
    let sub_w = (bin_w / series.len() as u32).max(1);
    for (s, hist) in counts.iter().enumerate() {
        for (b, &n) in hist.iter().enumerate() {
            let top = area.bar_top(n as f64, peak);
            let bar = Area {
                x: area.x + b as u32 * bin_w + s as u32 * sub_w,
                y: top,
                w: sub_w,
                h: area.y + area.h - top,
            };
            canvas.fill_rect(bar, colors[s]);
        }
    }
    true
}

/// Missing values per column, largest first; only columns with gaps.
fn missing_values(canvas: &mut Canvas, area: Area, table: &Table) -> bool {
    let mut missing: Vec<f64> = table
        .columns()
        .iter()
        .map(|c| c.null_count() as f64)
        .filter(|&n| n > 0.0)
        .collect();
    if missing.is_empty() {
        return false;
    }
    missing.sort_by(|a, b| b.total_cmp(a));
    canvas.bars(area, &missing, &[MISSING_BAR]);
    true
}

/// Most frequent values of the first text column.
fn top_categories(canvas: &mut Canvas, area: Area, table: &Table) -> bool {
    let Some(column) = table
        .columns()
        .iter()
        .find(|c| c.dtype == ColumnType::Text)
    else {
        return false;
    };
    let mut counts: Vec<usize> = stats::value_counts(column).into_values().collect();
    if counts.is_empty() {
        return false;
    }
    counts.sort_by(|a, b| b.cmp(a));
    counts.truncate(TOP_CATEGORIES);
    let values: Vec<f64> = counts.iter().map(|&n| n as f64).collect();
    canvas.bars(area, &values, &generate_palette(values.len()));
    true
}

/// Square heatmap of pairwise correlations between numeric columns.
fn correlation_heatmap(canvas: &mut Canvas, area: Area, table: &Table) -> bool {
    let (names, matrix) = stats::correlation_matrix(table);
    if names.len() < 2 {
        return false;
    }
    let n = names.len() as u32;
    let cell = (area.w.min(area.h) / n).max(1);
    let x0 = area.x + area.w.saturating_sub(cell * n) / 2;
    let y0 = area.y + area.h.saturating_sub(cell * n) / 2;
    for (i, row) in matrix.iter().enumerate() {
        for (j, &r) in row.iter().enumerate() {
            let square = Area {
                x: x0 + j as u32 * cell,
                y: y0 + i as u32 * cell,
                w: cell,
                h: cell,
            };
            canvas.fill_rect(square, correlation_color(r));
        }
    }
    true
}

/// Non-null count for numeric columns, distinct count for the rest.
fn column_magnitudes(canvas: &mut Canvas, area: Area, table: &Table) -> bool {
    let values: Vec<f64> = table
        .columns()
        .iter()
        .map(|c| {
            if c.dtype.is_numeric() {
                c.count() as f64
            } else {
                c.unique_count() as f64
            }
        })
        .collect();
    if values.iter().all(|&v| v == 0.0) {
        return false;
    }
    canvas.bars(area, &values, &generate_palette(values.len()));
    true
}

/// Points of the trend line: first numeric column against the first
/// datetime column (sorted by time), else against row order.
fn trend_points(table: &Table) -> Vec<(f64, f64)> {
    let Some(y) = numeric_columns(table).into_iter().next() else {
        return Vec::new();
    };
    let time = table
        .columns()
        .iter()
        .find(|c| c.dtype == ColumnType::DateTime);

    let mut points: Vec<(f64, f64)> = match time {
        Some(t) => t
            .values
            .iter()
            .zip(&y.values)
            .filter_map(|(tv, yv)| match tv {
                Value::DateTime(d) => {
                    Some((d.and_utc().timestamp() as f64, yv.as_f64()?))
                }
                _ => None,
            })
            .collect(),
        None => y
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((i as f64, v.as_f64()?)))
            .collect(),
    };
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

fn trend(canvas: &mut Canvas, area: Area, table: &Table) -> bool {
    let points = trend_points(table);
    if points.len() < 2 {
        return false;
    }
    let (xmin, xmax) = bounds(points.iter().map(|p| p.0));
    let (ymin, ymax) = bounds(points.iter().map(|p| p.1));
    let to_px = |(x, y): (f64, f64)| -> (i64, i64) {
        let fx = if xmax > xmin { (x - xmin) / (xmax - xmin) } else { 0.5 };
        let fy = if ymax > ymin { (y - ymin) / (ymax - ymin) } else { 0.5 };
        (
            area.x as i64 + (fx * (area.w - 1) as f64).round() as i64,
            (area.y + area.h - 1) as i64 - (fy * (area.h - 1) as f64).round() as i64,
        )
    };
    for pair in points.windows(2) {
        let (x0, y0) = to_px(pair[0]);
        let (x1, y1) = to_px(pair[1]);
        canvas.line(x0, y0, x1, y1, TREND_LINE);
    }
    true
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        Table::new(vec![
            Column::new(
                "amount",
                ColumnType::Float,
                vec![Value::Float(10.0), Value::Float(12.5), Value::Null, Value::Float(9.0)],
            ),
            Column::new(
                "units",
                ColumnType::Integer,
                vec![Value::Integer(1), Value::Integer(3), Value::Integer(2), Value::Integer(1)],
            ),
            Column::new(
                "region",
                ColumnType::Text,
                vec![
                    Value::Text("north".into()),
                    Value::Text("south".into()),
                    Value::Text("north".into()),
                    Value::Text("east".into()),
                ],
            ),
        ])
        .unwrap()
    }

    fn is_placeholder(image: &RgbImage, panel: u32) -> bool {
        let x = (panel % COLS) * PANEL_W + PANEL_W / 2;
        let y = (panel / COLS) * PANEL_H + PANEL_H / 2;
        *image.get_pixel(x, y) == PLACEHOLDER
    }

    #[test]
    fn test_render_writes_png_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path().join("charts"));
        let path = renderer.render(&sales(), Path::new("data/sales.csv")).unwrap();

        assert!(path.starts_with(dir.path().join("charts")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("analysis_sales_"));
        assert!(name.ends_with(".png"));

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), PANEL_W * COLS);
        assert_eq!(img.height(), PANEL_H * ROWS);
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path());
        let empty = Table::new(Vec::new()).unwrap();
        assert!(matches!(
            renderer.render(&empty, Path::new("x.csv")),
            Err(ChartError::EmptyTable)
        ));

        let header_only = Table::new(vec![Column::new("a", ColumnType::Integer, Vec::new())]).unwrap();
        assert!(matches!(
            renderer.render(&header_only, Path::new("x.csv")),
            Err(ChartError::EmptyTable)
        ));
    }

    #[test]
    fn test_panels_without_data_get_placeholder() {
        let text_only = Table::new(vec![Column::new(
            "content",
            ColumnType::Text,
            vec![Value::Text("a".into()), Value::Text("b".into())],
        )])
        .unwrap();
        let image = draw_grid(&text_only);
        // histograms, missing, correlation, trend have nothing to draw
        assert!(is_placeholder(&image, 0));
        assert!(is_placeholder(&image, 1));
        assert!(!is_placeholder(&image, 2));
        assert!(is_placeholder(&image, 3));
        assert!(is_placeholder(&image, 5));
    }

    #[test]
    fn test_trend_falls_back_to_row_order() {
        let points = trend_points(&sales());
        assert_eq!(points, vec![(0.0, 10.0), (1.0, 12.5), (3.0, 9.0)]);
    }
}
