//! Column type inference.
//!
//! Delimited text arrives as strings and is typed per column: integer if every
//! non-null value parses as `i64`, float if every one parses as `f64`, bool if
//! every one is `true`/`false`, datetime if one pattern parses them all, and
//! text otherwise. Formats with native types (JSON, Excel) go through
//! [`column_from_values`] instead.

use chrono::{NaiveDate, NaiveDateTime};

use super::model::{Column, ColumnType, Value};

/// Strings read as missing values.
const NULL_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Datetime patterns tried in order; a column must parse fully under one.
const DATETIME_PATTERNS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_PATTERNS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

pub fn is_null_marker(s: &str) -> bool {
    NULL_MARKERS.contains(&s.trim())
}

/// Build a typed column from raw cell strings (`None` for absent cells).
pub fn column_from_strings(name: String, raw: Vec<Option<String>>) -> Column {
    let cells: Vec<Option<&str>> = raw
        .iter()
        .map(|c| c.as_deref().map(str::trim).filter(|s| !is_null_marker(s)))
        .collect();
    let present: Vec<&str> = cells.iter().flatten().copied().collect();

    if present.is_empty() {
        return Column::new(name, ColumnType::Unknown, vec![Value::Null; cells.len()]);
    }

    if present.iter().all(|s| s.parse::<i64>().is_ok()) {
        let values = map_cells(&cells, |s| s.parse::<i64>().ok().map(Value::Integer));
        return Column::new(name, ColumnType::Integer, values);
    }

    if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        let values = map_cells(&cells, |s| s.parse::<f64>().ok().map(Value::Float));
        return Column::new(name, ColumnType::Float, values);
    }

    if present.iter().all(|s| parse_bool(s).is_some()) {
        let values = map_cells(&cells, |s| parse_bool(s).map(Value::Bool));
        return Column::new(name, ColumnType::Bool, values);
    }

    if let Some(parse) = common_datetime_parser(&present) {
        let values = map_cells(&cells, |s| parse(s).map(Value::DateTime));
        return Column::new(name, ColumnType::DateTime, values);
    }

    let values = raw
        .into_iter()
        .map(|c| match c {
            Some(s) if !is_null_marker(&s) => Value::Text(s),
            _ => Value::Null,
        })
        .collect();
    Column::new(name, ColumnType::Text, values)
}

/// Build a column from natively typed values.
///
/// Integer/float mixes widen to float and any other mix is kept as-is under
/// `Unknown`.
pub fn column_from_values(name: String, values: Vec<Value>) -> Column {
    let mut kinds = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Bool(_) => ColumnType::Bool,
            Value::Text(_) => ColumnType::Text,
            Value::DateTime(_) => ColumnType::DateTime,
            Value::Null => ColumnType::Unknown,
        })
        .collect::<Vec<_>>();
    kinds.sort();
    kinds.dedup();

    match kinds.as_slice() {
        [] => Column::new(name, ColumnType::Unknown, vec![Value::Null; values.len()]),
        [ColumnType::Integer, ColumnType::Float] => {
            let widened = values
                .into_iter()
                .map(|v| match v {
                    Value::Integer(i) => Value::Float(i as f64),
                    other => other,
                })
                .collect();
            Column::new(name, ColumnType::Float, widened)
        }
        [single] => Column::new(name, *single, values),
        _ => Column::new(name, ColumnType::Unknown, values),
    }
}

/// Re-type a text column from its string contents, as delimited text is.
/// Columns of any other type are returned unchanged.
pub fn reinfer_text(column: Column) -> Column {
    if column.dtype != ColumnType::Text {
        return column;
    }
    let raw = column
        .values
        .into_iter()
        .map(|v| match v {
            Value::Text(s) => Some(s),
            _ => None,
        })
        .collect();
    column_from_strings(column.name, raw)
}

/// Narrow a float column whose values are all integral to integers.
pub fn narrow_integral_floats(column: Column) -> Column {
    let integral = column.dtype == ColumnType::Float
        && column.values.iter().all(|v| match v {
            Value::Float(f) => f.is_nan() || (f.fract() == 0.0 && f.abs() < 1e15),
            _ => v.is_null(),
        });
    if !integral || column.count() == 0 || column.null_count() > 0 {
        return column;
    }
    let values = column
        .values
        .into_iter()
        .map(|v| match v {
            Value::Float(f) => Value::Integer(f as i64),
            other => other,
        })
        .collect();
    Column::new(column.name, ColumnType::Integer, values)
}

fn map_cells(cells: &[Option<&str>], parse: impl Fn(&str) -> Option<Value>) -> Vec<Value> {
    cells
        .iter()
        .map(|c| c.and_then(&parse).unwrap_or(Value::Null))
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

type DateParser = Box<dyn Fn(&str) -> Option<NaiveDateTime>>;

/// Find the first pattern under which every value parses.
fn common_datetime_parser(values: &[&str]) -> Option<DateParser> {
    for &pattern in DATETIME_PATTERNS {
        if values
            .iter()
            .all(|s| NaiveDateTime::parse_from_str(s, pattern).is_ok())
        {
            return Some(Box::new(move |s: &str| NaiveDateTime::parse_from_str(s, pattern).ok()));
        }
    }
    for &pattern in DATE_PATTERNS {
        if values
            .iter()
            .all(|s| NaiveDate::parse_from_str(s, pattern).is_ok())
        {
            return Some(Box::new(move |s: &str| {
                NaiveDate::parse_from_str(s, pattern)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }));
        }
    }
    None
}

/// Parse a single datetime string under any known pattern (used for
/// ISO strings coming out of spreadsheets).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    common_datetime_parser(&[s]).and_then(|parse| parse(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(vals: &[&str]) -> Vec<Option<String>> {
        vals.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn integers_with_missing_values() {
        let col = column_from_strings("n".into(), strings(&["1", "", "3", "NA"]));
        assert_eq!(col.dtype, ColumnType::Integer);
        assert_eq!(
            col.values,
            vec![Value::Integer(1), Value::Null, Value::Integer(3), Value::Null]
        );
    }

    #[test]
    fn one_float_makes_the_column_float() {
        let col = column_from_strings("x".into(), strings(&["1", "2.5", "-3"]));
        assert_eq!(col.dtype, ColumnType::Float);
        assert_eq!(col.values[0], Value::Float(1.0));
    }

    #[test]
    fn datetimes_need_a_common_pattern() {
        let col = column_from_strings("d".into(), strings(&["2024-01-05", "2024-02-10"]));
        assert_eq!(col.dtype, ColumnType::DateTime);

        let mixed = column_from_strings("d".into(), strings(&["2024-01-05", "05.02.2024"]));
        assert_eq!(mixed.dtype, ColumnType::Text);
    }

    #[test]
    fn bools_are_case_insensitive() {
        let col = column_from_strings("b".into(), strings(&["True", "false"]));
        assert_eq!(col.dtype, ColumnType::Bool);
        assert_eq!(col.values, vec![Value::Bool(true), Value::Bool(false)]);
    }

    #[test]
    fn text_keeps_original_strings() {
        let col = column_from_strings("t".into(), strings(&["a", "1", " b "]));
        assert_eq!(col.dtype, ColumnType::Text);
        assert_eq!(col.values[2], Value::Text(" b ".into()));
    }

    #[test]
    fn all_null_column_is_unknown() {
        let col = column_from_strings("e".into(), vec![None, Some(String::new())]);
        assert_eq!(col.dtype, ColumnType::Unknown);
        assert_eq!(col.count(), 0);
    }

    #[test]
    fn native_values_widen_ints_to_float() {
        let col = column_from_values("v".into(), vec![Value::Integer(1), Value::Float(0.5), Value::Null]);
        assert_eq!(col.dtype, ColumnType::Float);
        assert_eq!(col.values[0], Value::Float(1.0));
    }

    #[test]
    fn json_strings_are_reinferred() {
        let col = column_from_values("v".into(), vec![Value::Text("1".into()), Value::Text("2".into())]);
        assert_eq!(col.dtype, ColumnType::Text);
        let col = reinfer_text(col);
        assert_eq!(col.dtype, ColumnType::Integer);
    }

    #[test]
    fn integral_floats_narrow_unless_missing() {
        let col = Column::new("f", ColumnType::Float, vec![Value::Float(1.0), Value::Float(4.0)]);
        assert_eq!(narrow_integral_floats(col).dtype, ColumnType::Integer);

        let holes = Column::new("f", ColumnType::Float, vec![Value::Float(1.0), Value::Null]);
        assert_eq!(narrow_integral_floats(holes).dtype, ColumnType::Float);
    }

    #[test]
    fn native_mix_is_unknown() {
        let col = column_from_values("v".into(), vec![Value::Integer(1), Value::Text("a".into())]);
        assert_eq!(col.dtype, ColumnType::Unknown);
    }
}
