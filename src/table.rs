//! SQLite sink. The table schema is frozen from the first record ever
//! inserted: later records with extra keys silently lose those keys, later
//! records missing a key get NULL. All rows of a batch go in one transaction.

use log::{debug, info};
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;

use crate::error::SyncError;
use crate::record::{Record, first_record_columns};

/// Inserts the batch into `table`, creating it from the first record's keys
/// when it does not exist yet. Empty batches are a no-op.
pub fn insert_records(
    conn: &mut Connection,
    table: &str,
    records: &[Record],
) -> Result<(), SyncError> {
    if records.is_empty() {
        debug!("no records to insert into {table}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    ensure_table(&tx, table, records)?;

    // Bind against the columns the table actually has, which may predate
    // this batch.
    let columns = table_columns(&tx, table)?;
    let placeholders = vec!["?"; columns.len()].join(",");
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(",");
    let insert_sql = format!(
        "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
        quote_identifier(table)
    );

    {
        let mut statement = tx.prepare(&insert_sql)?;
        for record in records {
            let values: Vec<Option<String>> = columns
                .iter()
                .map(|column| sql_text(record.get(column)))
                .collect();
            statement.execute(params_from_iter(values.iter()))?;
        }
    }
    tx.commit()?;
    info!("inserted {} records into {table}", records.len());
    Ok(())
}

fn ensure_table(conn: &Connection, table: &str, records: &[Record]) -> Result<(), SyncError> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)?;
    if exists {
        return Ok(());
    }

    let columns = first_record_columns(records);
    if columns.is_empty() {
        return Err(SyncError::ApiShape(
            "cannot derive a table schema from a record with no fields",
        ));
    }
    let column_defs = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(",");
    conn.execute(
        &format!("CREATE TABLE {} ({column_defs})", quote_identifier(table)),
        [],
    )?;
    debug!("created table {table} with {} columns", columns.len());
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, SyncError> {
    let mut statement = conn.prepare(&format!(
        "PRAGMA table_info({})",
        quote_identifier(table)
    ))?;
    let columns = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<String>, rusqlite::Error>>()?;
    Ok(columns)
}

/// Text stored for a cell: NULL for absent or null fields, the string itself
/// for string fields, JSON text for everything else.
fn sql_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be a JSON object"),
        }
    }

    fn memory_conn() -> Connection {
        Connection::open_in_memory().expect("open in-memory db")
    }

    #[test]
    fn schema_comes_from_the_first_record_only() {
        let mut conn = memory_conn();
        let records = vec![
            record(json!({"a": "1", "b": "2"})),
            record(json!({"a": "3", "c": "4"})),
        ];
        insert_records(&mut conn, "CR", &records).unwrap();

        let columns = table_columns(&conn, "CR").unwrap();
        assert_eq!(columns, vec!["a", "b"]);

        // Second row: the extra key `c` is dropped and `b` is NULL.
        let (a, b): (String, Option<String>) = conn
            .query_row("SELECT a, b FROM CR WHERE a = '3'", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(a, "3");
        assert!(b.is_none());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM CR", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn rows_are_inserted_in_input_order() {
        let mut conn = memory_conn();
        let records = vec![
            record(json!({"id": "first"})),
            record(json!({"id": "second"})),
            record(json!({"id": "third"})),
        ];
        insert_records(&mut conn, "CR", &records).unwrap();

        let mut statement = conn.prepare("SELECT id FROM CR").unwrap();
        let ids = statement
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn nested_values_stored_as_json_text() {
        let mut conn = memory_conn();
        let records = vec![record(json!({"cliente": {"nome": "ACME"}, "valor": 12.5}))];
        insert_records(&mut conn, "eventos", &records).unwrap();

        let (cliente, valor): (String, String) = conn
            .query_row("SELECT cliente, valor FROM eventos", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(cliente, r#"{"nome":"ACME"}"#);
        assert_eq!(valor, "12.5");
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut conn = memory_conn();
        insert_records(&mut conn, "CR", &[]).unwrap();
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'CR'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 0);
    }

    #[test]
    fn later_batches_reuse_the_existing_schema() {
        let mut conn = memory_conn();
        insert_records(&mut conn, "CR", &[record(json!({"a": "1"}))]).unwrap();
        insert_records(&mut conn, "CR", &[record(json!({"b": "2"}))]).unwrap();

        assert_eq!(table_columns(&conn, "CR").unwrap(), vec!["a"]);
        let second: Option<String> = conn
            .query_row("SELECT a FROM CR LIMIT 1 OFFSET 1", [], |row| row.get(0))
            .unwrap();
        assert!(second.is_none());
    }
}
