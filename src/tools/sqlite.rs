//! SQLite structured backend
//!
//! Every call opens its own read-only connection with `query_only` set, so concurrent
//! queries never share state and nothing can be written. Blocking work runs on the
//! blocking pool; if the caller's future is dropped the running statement is
//! interrupted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags};
use serde_json::Value;

use super::backend::{BackendError, ColumnSchema, QueryRows, SchemaSummary, StructuredBackend, TableSchema};

/// Row count and sample rows for one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub table: TableSchema,
    pub row_count: u64,
    pub sample: QueryRows,
}

/// Read-only SQLite database
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
    /// Tables exposed to the tool; empty means all user tables
    tables: Vec<String>,
}

/// Interrupts the connection's running statement when dropped, unless disarmed
struct InterruptOnDrop(Option<InterruptHandle>);

impl InterruptOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            log::debug!("interrupting abandoned sqlite query");
            handle.interrupt();
        }
    }
}

impl SqliteBackend {
    /// Point at an existing database file; fails if it cannot be opened
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        open_read_only(&path)?;
        Ok(Self {
            path,
            tables: Vec::new(),
        })
    }

    /// Restrict the schema to these tables
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with a fresh read-only connection on the blocking pool
    async fn with_connection<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, BackendError> + Send + 'static,
    {
        let conn = open_read_only(&self.path)?;
        let guard = InterruptOnDrop(Some(conn.get_interrupt_handle()));

        let result = tokio::task::spawn_blocking(move || f(&conn))
            .await
            .map_err(|e| BackendError::Unavailable(format!("query task failed: {}", e)))?;

        guard.disarm();
        result
    }

    /// Row counts and up to `sample_rows` rows per table
    pub async fn inspect(&self, sample_rows: usize) -> Result<Vec<TableStats>, BackendError> {
        let tables = self.tables.clone();
        self.with_connection(move |conn| {
            let schema = read_schema(conn, &tables)?;
            let mut stats = Vec::with_capacity(schema.tables.len());
            for table in schema.tables {
                let name = quote_ident(&table.name);
                let row_count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", name), [], |row| row.get(0))
                    .map_err(classify)?;
                let sample = run_query(conn, &format!("SELECT * FROM {}", name), sample_rows)?;
                stats.push(TableStats {
                    table,
                    row_count: row_count.max(0) as u64,
                    sample,
                });
            }
            Ok(stats)
        })
        .await
    }
}

#[async_trait]
impl StructuredBackend for SqliteBackend {
    async fn schema(&self) -> Result<SchemaSummary, BackendError> {
        let tables = self.tables.clone();
        self.with_connection(move |conn| read_schema(conn, &tables)).await
    }

    async fn execute(&self, sql: &str, max_rows: usize) -> Result<QueryRows, BackendError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| run_query(conn, &sql, max_rows)).await
    }

    fn locator(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        format!("sqlite:{}", name)
    }
}

fn open_read_only(path: &Path) -> Result<Connection, BackendError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .map_err(|e| BackendError::Unavailable(format!("{}: {}", path.display(), e)))?;
    conn.execute_batch("PRAGMA query_only = ON")
        .map_err(|e| BackendError::Unavailable(format!("{}: {}", path.display(), e)))?;
    Ok(conn)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_syntax_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("syntax error") || lower.contains("incomplete input") || lower.contains("unrecognized token")
}

fn classify(err: rusqlite::Error) -> BackendError {
    let message = err.to_string();
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::PermissionDenied => BackendError::Unavailable(message),
            _ if is_syntax_message(&message) => BackendError::Syntax(message),
            _ => BackendError::Execution(message),
        },
        rusqlite::Error::MultipleStatement => BackendError::Syntax(message),
        _ if is_syntax_message(&message) => BackendError::Syntax(message),
        _ => BackendError::Execution(message),
    }
}

fn read_schema(conn: &Connection, only: &[String]) -> Result<SchemaSummary, BackendError> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .map_err(classify)?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(classify)?
        .collect::<Result<_, _>>()
        .map_err(classify)?;

    let mut tables = Vec::new();
    for name in names {
        if !only.is_empty() && !only.iter().any(|t| t.eq_ignore_ascii_case(&name)) {
            continue;
        }
        let mut info = conn
            .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(classify)?;
        let columns: Vec<ColumnSchema> = info
            .query_map([&name], |row| {
                Ok(ColumnSchema {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    primary_key: row.get::<_, i64>(3)? != 0,
                })
            })
            .map_err(classify)?
            .collect::<Result<_, _>>()
            .map_err(classify)?;
        tables.push(TableSchema { name, columns });
    }

    Ok(SchemaSummary { tables })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("x'{}'", hex::encode(bytes))),
    }
}

fn run_query(conn: &Connection, sql: &str, max_rows: usize) -> Result<QueryRows, BackendError> {
    let mut stmt = conn.prepare(sql).map_err(classify)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query([]).map_err(classify)?;
    let mut out = Vec::new();
    let mut truncated = false;

    while let Some(row) = rows.next().map_err(classify)? {
        if out.len() == max_rows {
            truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_json(row.get_ref(i).map_err(classify)?));
        }
        out.push(values);
    }

    Ok(QueryRows {
        columns,
        rows: out,
        truncated,
    })
}
