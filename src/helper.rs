//! Interaction with the external dump helper.
//!
//! The helper does all of the actual work of dumping and loading indices, as
//! well as moving snapshots to and from cloud storage. All we care about is
//! whether each invocation succeeded, which is decided by its exit code.
use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Operations supported by the helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Backup,
    Restore,
    Push,
    Pull,
}

impl Operation {
    /// Name of the operation as understood by the helper.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Backup => "backup",
            Operation::Restore => "restore",
            Operation::Push => "push",
            Operation::Pull => "pull",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when invoking the helper.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("unable to start {operation} helper: {source}")]
    Spawn {
        operation: Operation,
        #[source]
        source: io::Error,
    },

    #[error("{operation} helper {}", describe_exit(.code))]
    Failed {
        operation: Operation,
        code: Option<i32>,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_owned(),
    }
}

/// The set of operations delegated to the helper.
///
/// Backup and restore operate on a single index of a cluster, whereas push
/// and pull move a full snapshot directory to and from a cloud bucket.
#[async_trait]
pub trait Helper: Send + Sync {
    /// Dumps a single index into the backup directory of a snapshot.
    async fn backup(&self, host: &str, snapshot: &str, index: &str) -> Result<(), HelperError>;

    /// Loads a single index from the restore directory of a snapshot.
    async fn restore(&self, host: &str, snapshot: &str, index: &str) -> Result<(), HelperError>;

    /// Uploads the backup directory of a snapshot to a bucket.
    async fn push(&self, bucket: &str, folder: &str, snapshot: &str) -> Result<(), HelperError>;

    /// Downloads a snapshot from a bucket into the restore directory.
    async fn pull(&self, bucket: &str, folder: &str, snapshot: &str) -> Result<(), HelperError>;
}

/// Helper backed by an executable on the local filesystem.
#[derive(Debug)]
pub struct ScriptHelper {
    program: PathBuf,
}

impl ScriptHelper {
    /// Creates a helper which invokes the provided program.
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs the program for an operation and waits for it to exit.
    ///
    /// Output of the program is passed straight through to our own streams.
    async fn invoke(&self, operation: Operation, args: [&str; 3]) -> Result<(), HelperError> {
        tracing::debug!(
            "Invoking {} {} {}",
            self.program.display(),
            operation,
            args.join(" ")
        );

        let status = Command::new(&self.program)
            .arg(operation.as_str())
            .args(&args)
            .status()
            .await
            .map_err(|source| HelperError::Spawn { operation, source })?;

        if !status.success() {
            return Err(HelperError::Failed {
                operation,
                code: status.code(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Helper for ScriptHelper {
    async fn backup(&self, host: &str, snapshot: &str, index: &str) -> Result<(), HelperError> {
        self.invoke(Operation::Backup, [host, snapshot, index]).await
    }

    async fn restore(&self, host: &str, snapshot: &str, index: &str) -> Result<(), HelperError> {
        self.invoke(Operation::Restore, [host, snapshot, index]).await
    }

    async fn push(&self, bucket: &str, folder: &str, snapshot: &str) -> Result<(), HelperError> {
        self.invoke(Operation::Push, [bucket, folder, snapshot]).await
    }

    async fn pull(&self, bucket: &str, folder: &str, snapshot: &str) -> Result<(), HelperError> {
        self.invoke(Operation::Pull, [bucket, folder, snapshot]).await
    }
}
