//! Run configuration
//! -----------------
//! Everything the orchestrator needs is resolved once at startup into an
//! explicit `DumpConfig` and passed down by reference; there is no ambient
//! connection or flag state. Connection parameters follow the usual libpq
//! environment fallbacks (PGDATABASE, PGHOST, PGPORT, PGUSER).

use crate::error::{BackupError, BackupResult};

#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub dbname: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Directory the predata/postdata SQL files are written into.
    pub output_dir: String,
    /// Emit a CREATE DATABASE statement at the top of the predata file.
    pub include_database: bool,
}

/// If the environment variable is set and non-empty, return it, else the default.
fn try_env(varname: &str, defval: &str) -> String {
    match std::env::var(varname) {
        Ok(val) if !val.is_empty() => val,
        _ => defval.to_string(),
    }
}

impl DumpConfig {
    /// Resolve the full configuration from explicit CLI values plus
    /// environment fallbacks. A database name must come from somewhere;
    /// failing that is fatal before any connection is attempted.
    pub fn resolve(
        dbname: Option<String>,
        output_dir: Option<String>,
        include_database: bool,
    ) -> BackupResult<Self> {
        let dbname = match dbname {
            Some(name) if !name.is_empty() => name,
            _ => try_env("PGDATABASE", ""),
        };
        if dbname.is_empty() {
            return Err(BackupError::config("no database provided and PGDATABASE not set"));
        }
        let user = try_env("PGUSER", &whoami::username());
        let host = try_env("PGHOST", "localhost");
        let port = try_env("PGPORT", "5432")
            .parse::<u16>()
            .map_err(|_| BackupError::config("PGPORT is not a valid port number"))?;
        Ok(DumpConfig {
            dbname,
            host,
            port,
            user,
            output_dir: output_dir.unwrap_or_else(|| ".".to_string()),
            include_database,
        })
    }
}

/// Timestamp used in dump file names, e.g. 20260824153000.
pub fn current_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}
