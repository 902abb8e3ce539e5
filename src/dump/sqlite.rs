// dbdump/src/dump/sqlite.rs
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Connection, Row, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::{check_file_name, check_name, prepare_output, quote_ident, DumpRequest, DumpStrategy};
use crate::catalog::{connect_sqlite, sqlite_table_names};
use crate::errors::{redact, DumpError};
use crate::wizard::TableSelection;

/// Writes a plain SQL dump of a SQLite file through the library, no `sqlite3` binary needed.
///
/// The connection's host is the directory holding the database files, and the database name is
/// the file name inside it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteLibraryDump;

#[async_trait]
impl DumpStrategy for SqliteLibraryDump {
    async fn dump(&self, request: &DumpRequest<'_>) -> Result<PathBuf, DumpError> {
        check_name(request.database)?;
        check_file_name(request.database)?;
        let source = Path::new(&request.connection.host).join(request.database);
        let password = request.connection.password.as_str();
        let db_error = |e: sqlx::Error| DumpError::Database(redact(&e.to_string(), password));

        let mut db = connect_sqlite(&source).await.map_err(db_error)?;
        let tables = match request.tables {
            TableSelection::All => sqlite_table_names(&mut db).await.map_err(db_error)?,
            TableSelection::Only(tables) => tables.clone(),
        };

        let output_path = prepare_output(request)?;
        println!(
            "Dumping {} to {}...",
            source.display(),
            output_path.display()
        );

        let io_error = |source: std::io::Error| DumpError::Io {
            path: output_path.clone(),
            source,
        };
        let file = File::create(&output_path).await.map_err(io_error)?;
        let mut out = BufWriter::new(file);

        out.write_all(format!("-- SQLite dump of {}\n", request.database).as_bytes())
            .await
            .map_err(io_error)?;
        out.write_all(b"PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n")
            .await
            .map_err(io_error)?;

        for table in &tables {
            debug!(table = %table, "Dumping SQLite table");
            write_table(&mut db, table, &mut out, &output_path).await?;
        }

        out.write_all(b"COMMIT;\n").await.map_err(io_error)?;
        out.flush().await.map_err(io_error)?;
        let _ = db.close().await;
        Ok(output_path)
    }
}

/// CREATE TABLE, one INSERT per row, then the table's indexes and triggers.
///
/// Rows are streamed into `out` one at a time, never collected.
async fn write_table(
    db: &mut SqliteConnection,
    table: &str,
    out: &mut BufWriter<File>,
    output_path: &Path,
) -> Result<(), DumpError> {
    let db_error = |e: sqlx::Error| DumpError::Database(e.to_string());
    let io_error = |source: std::io::Error| DumpError::Io {
        path: output_path.to_path_buf(),
        source,
    };

    let create = sqlx::query_scalar::<_, String>(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(table)
    .fetch_optional(&mut *db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| DumpError::Database(format!("no such table: {}", table)))?;
    write_line(out, &format!("{};", create)).await.map_err(io_error)?;

    let quoted_table = quote_ident(table);
    let select = format!("SELECT * FROM {}", quoted_table);
    let mut rows = sqlx::query(&select).fetch(&mut *db);
    let mut count: u64 = 0;
    while let Some(row) = rows.try_next().await.map_err(db_error)? {
        let insert = insert_statement(&quoted_table, &row)?;
        write_line(out, &insert).await.map_err(io_error)?;
        count += 1;
    }
    drop(rows);
    debug!(table = %table, rows = count, "Table rows written");

    let extras = sqlx::query_scalar::<_, String>(
        "SELECT sql FROM sqlite_master
         WHERE tbl_name = ? AND type IN ('index', 'trigger') AND sql IS NOT NULL
         ORDER BY type, name",
    )
    .bind(table)
    .fetch_all(&mut *db)
    .await
    .map_err(db_error)?;
    for sql in extras {
        write_line(out, &format!("{};", sql)).await.map_err(io_error)?;
    }
    Ok(())
}

async fn write_line(out: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await
}

fn insert_statement(quoted_table: &str, row: &SqliteRow) -> Result<String, DumpError> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        values.push(sql_literal(row, idx)?);
    }
    Ok(format!("INSERT INTO {} VALUES({});", quoted_table, values.join(",")))
}

/// Renders one column of `row` by the storage class of the value itself, not the declared type.
fn sql_literal(row: &SqliteRow, idx: usize) -> Result<String, DumpError> {
    let db_error = |e: sqlx::Error| DumpError::Database(e.to_string());

    let raw = row.try_get_raw(idx).map_err(db_error)?;
    if raw.is_null() {
        return Ok("NULL".to_string());
    }
    let storage = raw.type_info().name().to_string();

    let literal = match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(idx).map_err(db_error)?.to_string(),
        "REAL" => real_literal(row.try_get::<f64, _>(idx).map_err(db_error)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(idx).map_err(db_error)?;
            format!("X'{}'", hex::encode_upper(bytes))
        }
        _ => text_literal(&row.try_get::<String, _>(idx).map_err(db_error)?),
    };
    Ok(literal)
}

fn text_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn real_literal(value: f64) -> String {
    if value.is_nan() {
        "NULL".to_string()
    } else if value.is_infinite() {
        let literal = if value > 0.0 { "1e999" } else { "-1e999" };
        literal.to_string()
    } else {
        // Debug keeps the fractional part so the value reloads as REAL.
        format!("{:?}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionProfile;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::Executor;

    async fn fixture(dir: &Path, name: &str) -> anyhow::Result<()> {
        let options = SqliteConnectOptions::new()
            .filename(dir.join(name))
            .create_if_missing(true);
        let mut db = SqliteConnection::connect_with(&options).await?;
        db.execute(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, note TEXT, total REAL, raw BLOB);
             CREATE INDEX orders_total ON orders(total);
             INSERT INTO orders VALUES (1, 'it''s fine', 9.5, X'00FF');
             INSERT INTO orders VALUES (2, NULL, 3.0, NULL);
             CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO customers VALUES (7, 'Ada');",
        )
        .await?;
        db.close().await?;
        Ok(())
    }

    fn profile(dir: &Path) -> ConnectionProfile {
        ConnectionProfile {
            tag: "local".into(),
            host: dir.display().to_string(),
            user: String::new(),
            password: String::new(),
            port: None,
            driver: "sqlite".into(),
            default_database: None,
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(text_literal("it's"), "'it''s'");
        assert_eq!(real_literal(3.0), "3.0");
        assert_eq!(real_literal(f64::INFINITY), "1e999");
        assert_eq!(real_literal(f64::NAN), "NULL");
    }

    #[tokio::test]
    async fn test_dump_all_tables() -> anyhow::Result<()> {
        let source = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        fixture(source.path(), "shop.db").await?;
        let conn = profile(source.path());

        let request = DumpRequest {
            connection: &conn,
            database: "shop.db",
            tables: &TableSelection::All,
            destination: target.path(),
            filename: "shop.db-run.sql",
        };
        let path = SqliteLibraryDump.dump(&request).await?;
        assert_eq!(path, target.path().join("shop.db-run.sql"));

        let sql = std::fs::read_to_string(&path)?;
        assert!(sql.starts_with("-- SQLite dump of shop.db\n"));
        assert!(sql.contains("BEGIN TRANSACTION;"));
        assert!(sql.contains("INSERT INTO \"orders\" VALUES(1,'it''s fine',9.5,X'00FF');"));
        assert!(sql.contains("INSERT INTO \"orders\" VALUES(2,NULL,3.0,NULL);"));
        assert!(sql.contains("INSERT INTO \"customers\" VALUES(7,'Ada');"));
        assert!(sql.contains("CREATE INDEX orders_total ON orders(total);"));
        assert!(sql.trim_end().ends_with("COMMIT;"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dump_selected_tables_reloads() -> anyhow::Result<()> {
        let source = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        fixture(source.path(), "shop.db").await?;
        let conn = profile(source.path());
        let tables = TableSelection::Only(vec!["customers".into()]);

        let request = DumpRequest {
            connection: &conn,
            database: "shop.db",
            tables: &tables,
            destination: target.path(),
            filename: "out.sql",
        };
        let path = SqliteLibraryDump.dump(&request).await?;
        let sql = std::fs::read_to_string(&path)?;
        assert!(!sql.contains("orders"));

        let restored = SqliteConnectOptions::new()
            .filename(target.path().join("restored.db"))
            .create_if_missing(true);
        let mut db = SqliteConnection::connect_with(&restored).await?;
        db.execute(sql.as_str()).await?;
        let name: String = sqlx::query_scalar("SELECT name FROM customers WHERE id = 7")
            .fetch_one(&mut db)
            .await?;
        assert_eq!(name, "Ada");
        Ok(())
    }

    #[tokio::test]
    async fn test_large_table_is_written_row_by_row() -> anyhow::Result<()> {
        let source = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        let options = SqliteConnectOptions::new()
            .filename(source.path().join("big.db"))
            .create_if_missing(true);
        let mut db = SqliteConnection::connect_with(&options).await?;
        db.execute(
            "CREATE TABLE counters (n INTEGER);
             INSERT INTO counters(n)
               WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 5000)
               SELECT x FROM c;",
        )
        .await?;
        db.close().await?;

        let conn = profile(source.path());
        let request = DumpRequest {
            connection: &conn,
            database: "big.db",
            tables: &TableSelection::All,
            destination: target.path(),
            filename: "big.sql",
        };
        let path = SqliteLibraryDump.dump(&request).await?;
        let sql = std::fs::read_to_string(&path)?;
        let inserts: Vec<&str> = sql.lines().filter(|l| l.starts_with("INSERT")).collect();
        assert_eq!(inserts.len(), 5000);
        assert_eq!(inserts.last().copied(), Some("INSERT INTO \"counters\" VALUES(5000);"));
        Ok(())
    }

    #[tokio::test]
    async fn test_database_outside_directory_is_refused() -> anyhow::Result<()> {
        let source = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        let conn = profile(source.path());
        let request = DumpRequest {
            connection: &conn,
            database: "../elsewhere.db",
            tables: &TableSelection::All,
            destination: target.path(),
            filename: "out.sql",
        };
        let err = SqliteLibraryDump.dump(&request).await.err();
        assert!(matches!(err, Some(DumpError::InvalidName(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_table_is_database_error() -> anyhow::Result<()> {
        let source = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        fixture(source.path(), "shop.db").await?;
        let conn = profile(source.path());
        let tables = TableSelection::Only(vec!["ghost".into()]);

        let request = DumpRequest {
            connection: &conn,
            database: "shop.db",
            tables: &tables,
            destination: target.path(),
            filename: "out.sql",
        };
        let err = SqliteLibraryDump.dump(&request).await.err();
        assert!(matches!(err, Some(DumpError::Database(msg)) if msg.contains("ghost")));
        Ok(())
    }
}
