//! Unified error model for the backup run.
//! Every fatal condition (bad configuration, unreachable database, failed
//! catalog query, file I/O, internal inconsistency, interrupt) flows through
//! this enum up to the CLI boundary, which maps it to an exit code.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone)]
pub enum BackupError {
    Config { message: String },
    Connect { message: String },
    Query { message: String },
    Io { message: String },
    Internal { message: String },
    Interrupted,
}

impl BackupError {
    pub fn config<S: Into<String>>(msg: S) -> Self { BackupError::Config { message: msg.into() } }
    pub fn connect<S: Into<String>>(msg: S) -> Self { BackupError::Connect { message: msg.into() } }
    pub fn query<S: Into<String>>(msg: S) -> Self { BackupError::Query { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { BackupError::Io { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { BackupError::Internal { message: msg.into() } }

    pub fn message(&self) -> &str {
        match self {
            BackupError::Config { message }
            | BackupError::Connect { message }
            | BackupError::Query { message }
            | BackupError::Io { message }
            | BackupError::Internal { message } => message.as_str(),
            BackupError::Interrupted => "backup interrupted",
        }
    }

    /// Map to a process exit code. 0 is reserved for full success; the
    /// interrupt code is distinct from all other fatal kinds.
    pub fn exit_code(&self) -> i32 {
        match self {
            BackupError::Config { .. } => 1,
            BackupError::Connect { .. } => 2,
            BackupError::Query { .. } => 3,
            BackupError::Io { .. } => 4,
            BackupError::Internal { .. } => 5,
            BackupError::Interrupted => 130,
        }
    }

    fn kind_str(&self) -> &'static str {
        match self {
            BackupError::Config { .. } => "config",
            BackupError::Connect { .. } => "connect",
            BackupError::Query { .. } => "query",
            BackupError::Io { .. } => "io",
            BackupError::Internal { .. } => "internal",
            BackupError::Interrupted => "interrupted",
        }
    }
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind_str(), self.message())
    }
}

impl std::error::Error for BackupError {}

pub type BackupResult<T> = Result<T, BackupError>;

impl From<tokio_postgres::Error> for BackupError {
    fn from(err: tokio_postgres::Error) -> Self {
        let msg = err.to_string();
        // A relation vanishing mid-run means the snapshot raced a DROP; still
        // fatal, but the message should say what disappeared.
        if msg.contains("does not exist") {
            return BackupError::query(format!("relation disappeared during backup: {}", msg));
        }
        BackupError::query(msg)
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        BackupError::io(err.to_string())
    }
}
