use crate::error::{Error, Result};
use crate::value::CellValue;
use rusqlite::{params_from_iter, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// A table read into memory: column names in schema order plus rows in scan order.
/// Raw and canonical record sets are both represented this way.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`, if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// SHA-256 over columns and every cell, tagged by storage class.
    /// Two tables with the same fingerprint hold identical data.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(column.as_bytes());
            hasher.update([0u8]);
        }
        for row in &self.rows {
            hasher.update([0xffu8]);
            for cell in row {
                match cell {
                    CellValue::Null => hasher.update([0u8]),
                    CellValue::Integer(i) => {
                        hasher.update([1u8]);
                        hasher.update(i.to_le_bytes());
                    }
                    CellValue::Real(f) => {
                        hasher.update([2u8]);
                        hasher.update(f.to_bits().to_le_bytes());
                    }
                    CellValue::Text(s) => {
                        hasher.update([3u8]);
                        hasher.update((s.len() as u64).to_le_bytes());
                        hasher.update(s.as_bytes());
                    }
                    CellValue::Blob(b) => {
                        hasher.update([4u8]);
                        hasher.update((b.len() as u64).to_le_bytes());
                        hasher.update(b);
                    }
                }
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Quote an identifier for SQLite. Column names like `size range` need it.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    debug!(path = %path.display(), "opened company store");
    Ok(conn)
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    if !table_exists(conn, table)? {
        return Err(Error::MissingTable(table.to_string()));
    }
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Read every row of `table`, in scan order, together with its column names.
pub fn read_table(conn: &Connection, table: &str) -> Result<Table> {
    if !table_exists(conn, table)? {
        return Err(Error::MissingTable(table.to_string()));
    }

    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, CellValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!(table, rows = rows.len(), columns = width, "read table");

    Ok(Table { columns, rows })
}

/// Replace `table` wholesale with `rows`.
///
/// The new table copies the schema of `template` (column names, order and
/// declared types) via `CREATE TABLE .. AS SELECT * .. LIMIT 0`. Drop, create
/// and inserts run in one transaction, so a reader sees either the old table
/// or the complete new one.
pub fn replace_table(
    conn: &Connection,
    table: &str,
    template: &str,
    rows: &[Vec<CellValue>],
) -> Result<usize> {
    if !table_exists(conn, template)? {
        return Err(Error::MissingTable(template.to_string()));
    }

    let tx = conn.unchecked_transaction()?;

    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
    tx.execute(
        &format!(
            "CREATE TABLE {} AS SELECT * FROM {} LIMIT 0",
            quote_ident(table),
            quote_ident(template)
        ),
        [],
    )?;

    let mut inserted = 0;
    {
        let width = tx
            .prepare(&format!("SELECT * FROM {}", quote_ident(table)))?
            .column_count();
        let placeholders = vec!["?"; width].join(", ");
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(table),
            placeholders
        ))?;

        for row in rows {
            insert.execute(params_from_iter(row.iter()))?;
            inserted += 1;
        }
    }

    tx.commit()?;

    info!(table, template, rows = inserted, "replaced table");

    Ok(inserted)
}
