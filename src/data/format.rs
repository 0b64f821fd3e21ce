use std::fmt;
use std::path::Path;

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Format registry
// ---------------------------------------------------------------------------

/// A recognised tabular file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
    /// Delimited text with an unknown separator, see [`txt_strategies`].
    Txt,
    Json,
    Excel,
    Parquet,
}

/// Extensions accepted by [`resolve`], in display order.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "json", "parquet", "tsv", "txt"];

/// Map an extension (with or without the leading dot, any case) to a format.
pub fn resolve(extension: &str) -> Result<Format, LoadError> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Ok(Format::Csv),
        "tsv" => Ok(Format::Tsv),
        "txt" => Ok(Format::Txt),
        "json" => Ok(Format::Json),
        "xlsx" | "xls" => Ok(Format::Excel),
        "parquet" => Ok(Format::Parquet),
        _ => Err(LoadError::UnsupportedFormat {
            extension: ext,
            supported: SUPPORTED_EXTENSIONS.to_vec(),
        }),
    }
}

/// Resolve the format of a path from its extension.
pub fn resolve_path(path: &Path) -> Result<Format, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    resolve(ext)
}

pub fn is_supported(path: &Path) -> bool {
    resolve_path(path).is_ok()
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Csv => "CSV",
            Format::Tsv => "TSV",
            Format::Txt => "text",
            Format::Json => "JSON",
            Format::Excel => "Excel",
            Format::Parquet => "Parquet",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Reader options
// ---------------------------------------------------------------------------

/// Optional knobs passed through to the format handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Encoding label understood by `encoding_rs` (e.g. `latin1`, `gbk`).
    pub encoding: Option<String>,
    /// Field separator for delimited text. Skips the `.txt` delimiter trial.
    pub separator: Option<u8>,
    /// Zero-based worksheet index for Excel files.
    pub sheet: usize,
}

// ---------------------------------------------------------------------------
// Text-file strategies
// ---------------------------------------------------------------------------

/// One way of reading a `.txt` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxtStrategy {
    /// Delimited parse; accepted only if it yields more than one column.
    Delimited(u8),
    /// One `content` column holding every stripped line. Always succeeds.
    Lines,
}

/// Delimiters tried for `.txt` files, highest priority first.
pub const TXT_DELIMITERS: &[u8] = b",\t;| ";

/// Ordered candidate strategies for a `.txt` file. The first delimited
/// strategy that works wins; [`TxtStrategy::Lines`] is always last.
pub fn txt_strategies(options: &ReadOptions) -> Vec<TxtStrategy> {
    match options.separator {
        Some(sep) => vec![TxtStrategy::Delimited(sep), TxtStrategy::Lines],
        None => TXT_DELIMITERS
            .iter()
            .map(|&d| TxtStrategy::Delimited(d))
            .chain(std::iter::once(TxtStrategy::Lines))
            .collect(),
    }
}

impl fmt::Display for TxtStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxtStrategy::Delimited(b'\t') => write!(f, "delimiter '\\t'"),
            TxtStrategy::Delimited(d) => write!(f, "delimiter '{}'", *d as char),
            TxtStrategy::Lines => write!(f, "one line per row"),
        }
    }
}
