// dbdump/src/dump/postgres.rs
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{check_name, prepare_output, quote_ident, run_tool, DumpRequest, DumpStrategy};
use crate::errors::DumpError;
use crate::wizard::TableSelection;

const TOOL: &str = "pg_dump";
const PASSWORD_ENV: &str = "PGPASSWORD";
// The catalog only offers tables from this schema.
const SCHEMA: &str = "public";

/// Shells out to `pg_dump` with plain-SQL output.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgDumpTool;

#[async_trait]
impl DumpStrategy for PgDumpTool {
    async fn dump(&self, request: &DumpRequest<'_>) -> Result<PathBuf, DumpError> {
        let args = pg_dump_args(request, &request.destination.join(request.filename))?;
        let output_path = prepare_output(request)?;
        println!(
            "Dumping {} to {} using pg_dump...",
            request.database,
            output_path.display()
        );
        run_tool(TOOL, args, PASSWORD_ENV, &request.connection.password).await?;
        Ok(output_path)
    }
}

/// Table filters are passed quoted so pg_dump matches names exactly instead of case-folding them.
pub(crate) fn pg_dump_args(
    request: &DumpRequest<'_>,
    output_path: &Path,
) -> Result<Vec<OsString>, DumpError> {
    let conn = request.connection;
    check_name(request.database)?;

    let mut args: Vec<OsString> = Vec::new();
    if !conn.host.is_empty() {
        args.push("--host".into());
        args.push(conn.host.as_str().into());
    }
    if let Some(port) = conn.port {
        args.push("--port".into());
        args.push(port.to_string().into());
    }
    if !conn.user.is_empty() {
        args.push("--username".into());
        args.push(conn.user.as_str().into());
    }
    args.push("--no-password".into());
    args.push("--format=plain".into());
    args.push("--file".into());
    args.push(output_path.as_os_str().to_os_string());

    if let TableSelection::Only(tables) = request.tables {
        for table in tables {
            args.push(format!("--table={}.{}", quote_ident(SCHEMA), quote_ident(table)).into());
        }
    }

    // A bare --dbname value containing `=` would be read as a whole connection string.
    args.push(format!("--dbname=dbname={}", conninfo_value(request.database)).into());
    Ok(args)
}

/// Single-quoted libpq conninfo value with `\` and `'` backslash-escaped.
fn conninfo_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionProfile;

    fn conn() -> ConnectionProfile {
        ConnectionProfile {
            tag: "analytics".into(),
            host: "pg.local".into(),
            user: "reporter".into(),
            password: "s3cret".into(),
            port: Some(5432),
            driver: "postgres".into(),
            default_database: None,
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_all_tables_has_no_table_filter() -> anyhow::Result<()> {
        let conn = conn();
        let tables = TableSelection::All;
        let request = DumpRequest {
            connection: &conn,
            database: "warehouse",
            tables: &tables,
            destination: Path::new("/tmp/out"),
            filename: "warehouse-x.sql",
        };
        let args = strings(pg_dump_args(&request, Path::new("/tmp/out/warehouse-x.sql"))?);
        assert_eq!(
            args,
            vec![
                "--host",
                "pg.local",
                "--port",
                "5432",
                "--username",
                "reporter",
                "--no-password",
                "--format=plain",
                "--file",
                "/tmp/out/warehouse-x.sql",
                "--dbname=dbname='warehouse'",
            ]
        );
        assert!(args.iter().all(|a| !a.contains("s3cret")));
        Ok(())
    }

    #[test]
    fn test_explicit_tables_are_quoted() -> anyhow::Result<()> {
        let conn = conn();
        let tables = TableSelection::Only(vec!["Orders".into(), "we\"ird".into()]);
        let request = DumpRequest {
            connection: &conn,
            database: "warehouse",
            tables: &tables,
            destination: Path::new("/tmp/out"),
            filename: "warehouse-x.sql",
        };
        let args = strings(pg_dump_args(&request, Path::new("/tmp/out/warehouse-x.sql"))?);
        let filters: Vec<&String> = args.iter().filter(|a| a.starts_with("--table=")).collect();
        assert_eq!(
            filters,
            vec![
                "--table=\"public\".\"Orders\"",
                "--table=\"public\".\"we\"\"ird\"",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_conninfo_lookalike_database_stays_a_name() -> anyhow::Result<()> {
        let conn = conn();
        let tables = TableSelection::All;
        let request = DumpRequest {
            connection: &conn,
            database: "host=attacker.example dbname=shop",
            tables: &tables,
            destination: Path::new("/tmp/out"),
            filename: "x.sql",
        };
        let args = strings(pg_dump_args(&request, Path::new("/tmp/out/x.sql"))?);
        assert_eq!(
            args.last().map(String::as_str),
            Some("--dbname=dbname='host=attacker.example dbname=shop'")
        );
        assert!(!args.iter().any(|a| a == "host=attacker.example dbname=shop"));
        Ok(())
    }

    #[test]
    fn test_conninfo_value_escapes_quotes_and_backslashes() {
        assert_eq!(conninfo_value("shop"), "'shop'");
        assert_eq!(conninfo_value("o'brien\\db"), "'o\\'brien\\\\db'");
    }
}
