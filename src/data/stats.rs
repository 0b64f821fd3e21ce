use std::collections::BTreeMap;
use std::fmt;

use super::model::{Column, Table, Value};

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Render the first `n` rows as an aligned text grid with a row index,
/// like `DataFrame.head(n).to_string()`.
pub fn preview(table: &Table, n: usize) -> String {
    let mut header = vec![String::new()];
    header.extend(table.column_names());

    if table.columns().is_empty() {
        return "Empty table".to_string();
    }

    let rows: Vec<Vec<String>> = (0..table.row_count().min(n))
        .filter_map(|i| {
            let row = table.row(i)?;
            let mut cells = vec![i.to_string()];
            cells.extend(row.iter().map(|v| v.to_string()));
            Some(cells)
        })
        .collect();
    render_grid(&header, &rows)
}

/// Right-align every column to its widest cell.
pub fn render_grid(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:>w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(header)];
    out.extend(rows.iter().map(|r| line(r.as_slice())));
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Describe
// ---------------------------------------------------------------------------

/// Summary of one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Summary of one non-numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSummary {
    pub name: String,
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: usize,
}

/// Descriptive statistics for a whole table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Description {
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
}

/// Compute count/mean/std/min/quartiles/max for numeric columns and
/// count/unique/top/freq for the rest.
pub fn describe(table: &Table) -> Description {
    let mut desc = Description::default();
    for col in table.columns() {
        if col.dtype.is_numeric() {
            desc.numeric.push(numeric_summary(col));
        } else {
            desc.categorical.push(categorical_summary(col));
        }
    }
    desc
}

fn numeric_summary(col: &Column) -> NumericSummary {
    let mut values = col.numbers();
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let mean = mean(&values).unwrap_or(f64::NAN);

    NumericSummary {
        name: col.name.clone(),
        count,
        mean,
        std: sample_std(&values).unwrap_or(f64::NAN),
        min: values.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&values, 0.25).unwrap_or(f64::NAN),
        median: quantile(&values, 0.5).unwrap_or(f64::NAN),
        q75: quantile(&values, 0.75).unwrap_or(f64::NAN),
        max: values.last().copied().unwrap_or(f64::NAN),
    }
}

fn categorical_summary(col: &Column) -> CategoricalSummary {
    let counts = value_counts(col);
    // Highest count wins; ties go to the smallest value.
    let top = counts
        .iter()
        .map(|(v, n)| (*v, *n))
        .fold(None::<(&Value, usize)>, |best, (v, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((v, n)),
        });

    CategoricalSummary {
        name: col.name.clone(),
        count: col.count(),
        unique: counts.len(),
        top: top.map(|(v, _)| v.to_string()),
        freq: top.map(|(_, n)| n).unwrap_or(0),
    }
}

/// Occurrences of each distinct non-null value.
pub fn value_counts(col: &Column) -> BTreeMap<&Value, usize> {
    let mut counts = BTreeMap::new();
    for v in col.values.iter().filter(|v| !v.is_null()) {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut blocks = Vec::new();

        if !self.numeric.is_empty() {
            let mut header = vec![String::new()];
            header.extend(self.numeric.iter().map(|s| s.name.clone()));
            let fields: [(&str, fn(&NumericSummary) -> f64); 7] = [
                ("mean", |s| s.mean),
                ("std", |s| s.std),
                ("min", |s| s.min),
                ("25%", |s| s.q25),
                ("50%", |s| s.median),
                ("75%", |s| s.q75),
                ("max", |s| s.max),
            ];
            let mut count = vec!["count".to_string()];
            count.extend(self.numeric.iter().map(|s| s.count.to_string()));
            let mut rows = vec![count];
            for (label, pick) in fields {
                let mut row = vec![label.to_string()];
                row.extend(self.numeric.iter().map(|s| {
                    let v = pick(s);
                    if v.is_nan() {
                        "NaN".to_string()
                    } else {
                        format!("{v:.6}")
                    }
                }));
                rows.push(row);
            }
            blocks.push(render_grid(&header, &rows));
        }

        if !self.categorical.is_empty() {
            let mut header = vec![String::new()];
            header.extend(self.categorical.iter().map(|s| s.name.clone()));
            let mut count = vec!["count".to_string()];
            let mut unique = vec!["unique".to_string()];
            let mut top = vec!["top".to_string()];
            let mut freq = vec!["freq".to_string()];
            for s in &self.categorical {
                count.push(s.count.to_string());
                unique.push(s.unique.to_string());
                top.push(s.top.clone().unwrap_or_else(|| "NaN".to_string()));
                freq.push(s.freq.to_string());
            }
            blocks.push(render_grid(&header, &[count, unique, top, freq]));
        }

        if blocks.is_empty() {
            return write!(f, "No columns to describe");
        }
        write!(f, "{}", blocks.join("\n\n"))
    }
}

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linearly interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Pearson correlation over rows where both values are present.
pub fn pearson(a: &Column, b: &Column) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .values
        .iter()
        .zip(&b.values)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let cov: f64 = pairs.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let vx: f64 = pairs.iter().map(|(x, _)| (x - mx).powi(2)).sum();
    let vy: f64 = pairs.iter().map(|(_, y)| (y - my).powi(2)).sum();
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

/// Pairwise correlations between the numeric columns, in column order.
/// Undefined pairs are `NaN`.
pub fn correlation_matrix(table: &Table) -> (Vec<String>, Vec<Vec<f64>>) {
    let numeric: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|c| c.dtype.is_numeric())
        .collect();
    let names = numeric.iter().map(|c| c.name.clone()).collect();
    let matrix = numeric
        .iter()
        .map(|a| {
            numeric
                .iter()
                .map(|b| pearson(a, b).unwrap_or(f64::NAN))
                .collect()
        })
        .collect();
    (names, matrix)
}

/// Bucket values into `bins` equal-width bins over `[min, max]`.
pub fn histogram(values: &[f64], bins: usize, min: f64, max: f64) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }
    let span = max - min;
    for &v in values {
        let idx = if span <= 0.0 {
            0
        } else {
            (((v - min) / span) * bins as f64).floor() as usize
        };
        counts[idx.min(bins - 1)] += 1;
    }
    counts
}

/// Dataset-level quality figures shown in the chart grid and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub duplicate_rows: usize,
    pub missing: usize,
}

pub fn quality(table: &Table) -> QualityMetrics {
    let (rows, cols) = table.shape();
    let cells = rows * cols;
    let missing = table.total_nulls();
    QualityMetrics {
        completeness: if cells == 0 {
            100.0
        } else {
            (cells - missing) as f64 / cells as f64 * 100.0
        },
        duplicate_rows: table.duplicate_rows(),
        missing,
    }
}
