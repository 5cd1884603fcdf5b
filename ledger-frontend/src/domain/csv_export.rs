//! CSV rendering of raw backend rows.

use serde_json::{Map, Value};
use thiserror::Error;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no records to export")]
    Empty,
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer failed: {0}")]
    Buffer(String),
}

/// Header from the first row's keys; every field quoted; `\n` line ends.
pub fn to_csv(rows: &[Row]) -> Result<String, ExportError> {
    let first = rows.first().ok_or(ExportError::Empty)?;
    let keys: Vec<&String> = first.keys().collect();

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(keys.iter().map(|k| k.as_str()))?;
    for row in rows {
        writer.write_record(keys.iter().map(|k| cell(row.get(*k))))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Buffer(e.to_string()))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}

/// `<table>_<unix-millis>.csv`.
pub fn filename(table: &str, unix_millis: i64) -> String {
    format!("{}_{}.csv", table, unix_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn quotes_everything_and_doubles_quotes() {
        let rows = vec![
            row(json!({"name": "a\"b", "total": 10.5, "pago": true})),
            row(json!({"name": "c", "total": null, "pago": false})),
        ];

        let csv = to_csv(&rows).unwrap();

        assert_eq!(
            csv,
            "\"name\",\"total\",\"pago\"\n\"a\"\"b\",\"10.5\",\"true\"\n\"c\",\"\",\"false\"\n"
        );
    }

    #[test]
    fn header_comes_from_first_row() {
        let rows = vec![
            row(json!({"id": 1})),
            row(json!({"id": 2, "extra": "ignored"})),
        ];

        let csv = to_csv(&rows).unwrap();

        assert_eq!(csv, "\"id\"\n\"1\"\n\"2\"\n");
    }

    #[test]
    fn nested_values_become_json() {
        let rows = vec![row(json!({"meta": {"birthday": "1990-01-01"}}))];

        let csv = to_csv(&rows).unwrap();

        assert!(csv.contains(r#""{""birthday"":""1990-01-01""}""#));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(to_csv(&[]), Err(ExportError::Empty)));
    }

    #[test]
    fn filename_carries_table_and_timestamp() {
        assert_eq!(filename("sales", 1700000000000), "sales_1700000000000.csv");
    }
}
