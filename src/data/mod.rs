/// Data layer: table types, format detection, loading and statistics.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .txt / .json / .xlsx / .xls / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  format   │  extension → Format (+ .txt delimiter strategies)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (typed by `infer`)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  stats    │  preview, describe, correlations, quality
///   └──────────┘
/// ```

pub mod format;
pub mod infer;
pub mod loader;
pub mod model;
pub mod stats;
