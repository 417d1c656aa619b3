//! Dynamic financial event records and the column-resolution policies the
//! sinks rely on.
//!
//! The remote API declares no fixed schema, so a record is an ordered JSON
//! map. "Key present but null" and "key absent" are distinct states and the
//! two sinks resolve columns differently: the table sink freezes the schema
//! from the first record, the spreadsheet sink takes the union of all keys
//! in first-seen order.

use serde_json::{Map, Value};

/// One financial event as returned by the API. Key order is preserved.
pub type Record = Map<String, Value>;

/// Header column used when no record carries any key at all.
const RAW_JSON_COLUMN: &str = "raw_json";

/// Columns as the table sink sees them: the keys of the first record only.
pub fn first_record_columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|record| record.keys().cloned().collect())
        .unwrap_or_default()
}

/// Columns as the spreadsheet sink sees them: the union of all keys across
/// all records, in first-seen order.
pub fn union_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Maps a cell value for the spreadsheet sink: absent or null becomes an
/// empty string, nested structures become their JSON text, scalars pass
/// through unchanged.
pub fn normalise_value(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v @ (Value::Object(_) | Value::Array(_))) => Value::String(v.to_string()),
        Some(scalar) => scalar.clone(),
    }
}

/// Builds the header row plus one body row per record, using the union
/// column policy. When no record has any key, falls back to a single
/// `raw_json` column holding each record's JSON text.
pub fn records_to_rows(records: &[Record]) -> Vec<Vec<Value>> {
    let columns = union_columns(records);

    if columns.is_empty() {
        let mut rows = vec![vec![Value::String(RAW_JSON_COLUMN.to_string())]];
        rows.extend(
            records
                .iter()
                .map(|record| vec![Value::String(Value::Object(record.clone()).to_string())]),
        );
        return rows;
    }

    let header = columns
        .iter()
        .map(|c| Value::String(c.clone()))
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header);
    for record in records {
        rows.push(
            columns
                .iter()
                .map(|column| normalise_value(record.get(column)))
                .collect(),
        );
    }
    rows
}
