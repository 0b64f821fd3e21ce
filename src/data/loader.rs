use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Value as JsonValue};

use super::format::{self, Format, ReadOptions, TxtStrategy};
use super::infer::{self, column_from_strings, column_from_values};
use super::model::{dedupe_names, Column, ColumnType, Table, Value};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.tsv` – header row plus delimited records
/// * `.txt`          – delimiter trial, falling back to one row per line
/// * `.json`         – records (`[{..}, ..]`) or columns (`{"col": [..]}`)
/// * `.xlsx` / `.xls` – first row of the selected sheet is the header
/// * `.parquet`      – column types taken from the Arrow schema
pub fn load_file(path: &Path, options: &ReadOptions) -> Result<Table, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }
    let format = format::resolve_path(path)?;

    log::info!("Reading {format} file {}", path.display());
    let table = match format {
        Format::Csv => load_delimited(path, options, options.separator.unwrap_or(b',')),
        Format::Tsv => load_delimited(path, options, options.separator.unwrap_or(b'\t')),
        Format::Txt => load_txt(path, options),
        Format::Json => load_json(path, options),
        Format::Excel => load_excel(path, options),
        Format::Parquet => load_parquet(path),
    }
    .map_err(|e| LoadError::parse(path, format!("{e:#}")))?;

    log::info!("Loaded table with shape {:?}", table.shape());
    Ok(table)
}

// ---------------------------------------------------------------------------
// Text decoding
// ---------------------------------------------------------------------------

/// Read a text file. An explicit encoding label wins; otherwise UTF-8 is
/// tried first with Windows-1252 as the fallback.
fn read_text(path: &Path, encoding: Option<&str>) -> Result<String> {
    let bytes = std::fs::read(path).context("reading file")?;

    if let Some(label) = encoding {
        let enc = encoding_rs::Encoding::for_label(label.trim().as_bytes())
            .with_context(|| format!("unknown encoding '{label}'"))?;
        let (decoded, _, had_errors) = enc.decode(&bytes);
        if had_errors {
            log::warn!("{}: invalid {} sequences replaced", path.display(), enc.name());
        }
        return Ok(decoded.into_owned());
    }

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// Delimited text (CSV / TSV / TXT)
// ---------------------------------------------------------------------------

fn load_delimited(path: &Path, options: &ReadOptions, delimiter: u8) -> Result<Table> {
    let content = read_text(path, options.encoding.as_deref())?;
    parse_delimited(&content, delimiter)
}

/// Parse delimited text with a header row. Short rows are padded with nulls;
/// a row longer than the header is an error.
fn parse_delimited(content: &str, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let width = headers.len();
    if width == 0 {
        bail!("no columns to parse");
    }
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {}", row_no + 1))?;
        if record.len() > width {
            bail!(
                "row {}: expected {width} fields, saw {}",
                row_no + 1,
                record.len()
            );
        }
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).map(str::to_string));
        }
    }

    let columns = dedupe_names(headers)
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| column_from_strings(name, raw))
        .collect();
    Ok(Table::new(columns)?)
}

/// Try each `.txt` strategy in priority order; the first delimiter that yields
/// more than one column wins.
fn load_txt(path: &Path, options: &ReadOptions) -> Result<Table> {
    let content = read_text(path, options.encoding.as_deref())?;

    for strategy in format::txt_strategies(options) {
        match strategy {
            TxtStrategy::Delimited(delimiter) => match parse_delimited(&content, delimiter) {
                Ok(table) if table.shape().1 > 1 => {
                    log::debug!("{}: using {strategy}", path.display());
                    return Ok(table);
                }
                Ok(_) => log::debug!("{}: {strategy} yields a single column", path.display()),
                Err(e) => log::debug!("{}: {strategy} failed: {e:#}", path.display()),
            },
            TxtStrategy::Lines => {
                log::debug!("{}: no delimiter matched, reading lines", path.display());
                return lines_table(&content);
            }
        }
    }
    bail!("no text strategy produced a table")
}

fn lines_table(content: &str) -> Result<Table> {
    let values = content
        .lines()
        .map(|line| Value::Text(line.trim().to_string()))
        .collect();
    Ok(Table::new(vec![Column::new("content", ColumnType::Text, values)])?)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Accepted JSON layouts (the common `DataFrame.to_json` orients):
///
/// ```json
/// [ {"name": "A", "score": 1.5}, {"name": "B", "score": 2} ]
/// {"name": ["A", "B"], "score": [1.5, 2]}
/// {"name": {"0": "A", "1": "B"}, "score": {"0": 1.5, "1": 2}}
/// ```
fn load_json(path: &Path, options: &ReadOptions) -> Result<Table> {
    let text = read_text(path, options.encoding.as_deref())?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let columns = match &root {
        JsonValue::Array(records) => records_to_columns(records)?,
        JsonValue::Object(columns) => object_to_columns(columns)?,
        _ => bail!("Expected a top-level JSON array of records or object of columns"),
    };

    let columns = columns
        .into_iter()
        .map(|(name, values)| infer::reinfer_text(column_from_values(name, values)))
        .collect();
    Ok(Table::new(columns)?)
}

fn records_to_columns(records: &[JsonValue]) -> Result<Vec<(String, Vec<Value>)>> {
    let mut names: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
        objects.push(obj);
    }

    Ok(names
        .into_iter()
        .map(|name| {
            let values = objects
                .iter()
                .map(|obj| obj.get(&name).map(json_to_value).unwrap_or(Value::Null))
                .collect();
            (name, values)
        })
        .collect())
}

/// Index-object columns are aligned on their index labels; a label missing
/// from one column becomes a null there.
fn object_to_columns(columns: &Map<String, JsonValue>) -> Result<Vec<(String, Vec<Value>)>> {
    let mut index: Vec<&str> = Vec::new();
    for col in columns.values() {
        if let JsonValue::Object(indexed) = col {
            for key in indexed.keys() {
                if !index.contains(&key.as_str()) {
                    index.push(key.as_str());
                }
            }
        }
    }

    columns
        .iter()
        .map(|(name, col)| {
            let values: Vec<Value> = match col {
                JsonValue::Array(items) => items.iter().map(json_to_value).collect(),
                JsonValue::Object(indexed) => index
                    .iter()
                    .map(|key| indexed.get(*key).map(json_to_value).unwrap_or(Value::Null))
                    .collect(),
                _ => bail!("Column '{name}' is neither an array nor an index object"),
            };
            Ok((name.clone(), values))
        })
        .collect()
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Excel loader
// ---------------------------------------------------------------------------

/// Load one worksheet (`options.sheet`) of an xlsx/xls workbook. The first row
/// holds the column names.
fn load_excel(path: &Path, options: &ReadOptions) -> Result<Table> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).context("opening workbook")?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names.get(options.sheet).with_context(|| {
        format!(
            "sheet index {} out of range (workbook has {} sheets)",
            options.sheet,
            sheet_names.len()
        )
    })?;
    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("reading sheet '{sheet_name}'"))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let names = dedupe_names(headers);

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get(i).map(excel_value).unwrap_or(Value::Null));
        }
    }

    let columns = names
        .into_iter()
        .zip(values)
        .map(|(name, vals)| infer::narrow_integral_floats(column_from_values(name, vals)))
        .collect();
    Ok(Table::new(columns)?)
}

fn excel_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => Value::Float(*f),
        Data::Int(i) => Value::Integer(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::DateTime)
            .unwrap_or(Value::Float(dt.as_f64())),
        Data::DateTimeIso(s) => infer::parse_datetime(s)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file. Column types come from the Arrow schema, so a column
/// keeps its declared type even when every value is null.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| Column::new(f.name().clone(), column_type_for(f.data_type()), Vec::new()))
        .collect();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (i, column) in columns.iter_mut().enumerate() {
            let values = array_values(batch.column(i), column.dtype)
                .with_context(|| format!("column '{}'", column.name))?;
            column.values.extend(values);
        }
    }

    Ok(Table::new(columns)?)
}

// -- Parquet / Arrow helpers --

fn column_type_for(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ColumnType::Integer,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => ColumnType::Float,
        DataType::Boolean => ColumnType::Bool,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ColumnType::Text,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => ColumnType::DateTime,
        _ => ColumnType::Unknown,
    }
}

/// Convert one Arrow column chunk into cell values, casting to the canonical
/// Arrow type of `dtype` first.
fn array_values(array: &ArrayRef, dtype: ColumnType) -> Result<Vec<Value>> {
    let values = match dtype {
        ColumnType::Integer => {
            let cast_array = cast(array.as_ref(), &DataType::Int64)?;
            let ints = cast_array
                .as_primitive_opt::<Int64Type>()
                .context("expected Int64 array")?;
            ints.iter()
                .map(|v| v.map(Value::Integer).unwrap_or(Value::Null))
                .collect()
        }
        ColumnType::Float => {
            let cast_array = cast(array.as_ref(), &DataType::Float64)?;
            let floats = cast_array
                .as_primitive_opt::<Float64Type>()
                .context("expected Float64 array")?;
            floats
                .iter()
                .map(|v| v.map(Value::Float).unwrap_or(Value::Null))
                .collect()
        }
        ColumnType::Bool => {
            let bools = array.as_boolean_opt().context("expected Boolean array")?;
            bools
                .iter()
                .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
                .collect()
        }
        ColumnType::Text => {
            let cast_array = cast(array.as_ref(), &DataType::Utf8)?;
            let strings = cast_array
                .as_string_opt::<i32>()
                .context("expected Utf8 array")?;
            strings
                .iter()
                .map(|v| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null))
                .collect()
        }
        ColumnType::DateTime => {
            let target = DataType::Timestamp(TimeUnit::Microsecond, None);
            let cast_array = cast(array.as_ref(), &target)?;
            let stamps = cast_array
                .as_primitive_opt::<TimestampMicrosecondType>()
                .context("expected Timestamp array")?;
            (0..stamps.len())
                .map(|row| {
                    if stamps.is_null(row) {
                        return Value::Null;
                    }
                    stamps
                        .value_as_datetime(row)
                        .map(Value::DateTime)
                        .unwrap_or(Value::Null)
                })
                .collect()
        }
        ColumnType::Unknown => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            (0..array.len())
                .map(|row| {
                    if array.is_null(row) {
                        Value::Null
                    } else {
                        Value::Text(formatter.value(row).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(values)
}
