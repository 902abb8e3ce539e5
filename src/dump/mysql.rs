// dbdump/src/dump/mysql.rs
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{check_name, prepare_output, run_tool, DumpRequest, DumpStrategy};
use crate::errors::DumpError;
use crate::wizard::TableSelection;

const TOOL: &str = "mysqldump";
const PASSWORD_ENV: &str = "MYSQL_PWD";

/// Shells out to `mysqldump`, one invocation per database.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlDumpTool;

#[async_trait]
impl DumpStrategy for MysqlDumpTool {
    async fn dump(&self, request: &DumpRequest<'_>) -> Result<PathBuf, DumpError> {
        let args = mysqldump_args(request, &request.destination.join(request.filename))?;
        let output_path = prepare_output(request)?;
        println!(
            "Dumping {} to {} using mysqldump...",
            request.database,
            output_path.display()
        );
        run_tool(TOOL, args, PASSWORD_ENV, &request.connection.password).await?;
        Ok(output_path)
    }
}

/// `mysqldump [connection options] --result-file=<out> <db> [tables..]`.
/// No table arguments means every table.
pub(crate) fn mysqldump_args(
    request: &DumpRequest<'_>,
    output_path: &Path,
) -> Result<Vec<OsString>, DumpError> {
    let conn = request.connection;
    check_name(request.database)?;

    let mut args: Vec<OsString> = Vec::new();
    if !conn.host.is_empty() {
        args.push(format!("--host={}", conn.host).into());
    }
    if let Some(port) = conn.port {
        args.push(format!("--port={}", port).into());
    }
    if !conn.user.is_empty() {
        args.push(format!("--user={}", conn.user).into());
    }
    args.push("--single-transaction".into());
    args.push("--routines".into());

    let mut result_file = OsString::from("--result-file=");
    result_file.push(output_path.as_os_str());
    args.push(result_file);

    args.push(request.database.into());
    if let TableSelection::Only(tables) = request.tables {
        for table in tables {
            check_name(table)?;
            args.push(table.into());
        }
    }
    Ok(args)
}
