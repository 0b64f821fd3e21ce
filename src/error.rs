use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Errors raised while turning a file into a [`Table`](crate::data::model::Table).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file format: .{extension} (supported: {})", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<&'static str>,
    },

    #[error("Failed to parse {}: {message}", .path.display())]
    ParseFailure { path: PathBuf, message: String },
}

impl LoadError {
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        LoadError::ParseFailure {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Violations of the table invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("Column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate column name: '{0}'")]
    DuplicateColumn(String),
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown report template '{name}' (available: {})", .valid.join(", "))]
    UnknownTemplate { name: String, valid: Vec<&'static str> },

    #[error("The custom template needs at least one question")]
    MissingQuestions,
}

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// A failed request to the text-generation endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("API key missing: set {0}")]
    MissingApiKey(String),
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write report {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chart rendering failures. Never fatal for an analysis run.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Table has no rows or columns to chart")]
    EmptyTable,

    #[error("Failed to create chart directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode chart: {0}")]
    Image(#[from] image::ImageError),
}
