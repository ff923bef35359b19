//! Flag parsing and runtime options.
//!
//! Flags are always provided in the form `--key=value`. They're collected
//! into a `FlagSet` first, and then validated into an `Options` struct which
//! is passed through to whichever process is being executed.
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

/// Flags which must be provided for any process to run.
pub const REQUIRED: [&str; 5] = ["process", "host", "bucket", "folder", "snapshot"];

/// Default port used to talk to a cluster.
pub const DEFAULT_PORT: u16 = 9200;

/// Default location of the helper handling the actual dumps.
pub const DEFAULT_HELPER: &str = "./utils.sh";

/// Default base directory for backup snapshots.
pub const DEFAULT_BACKUP_DIR: &str = "/var/dump-backup";

/// Default base directory for restore snapshots.
pub const DEFAULT_RESTORE_DIR: &str = "/var/dump-restore";

/// Default number of seconds to wait between connection attempts.
pub const DEFAULT_RETRY_DELAY: u64 = 10;

/// Errors raised when the provided flags can't be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("--{0} is required")]
    Missing(&'static str),

    #[error("unknown process: {0}")]
    UnknownProcess(String),

    #[error("invalid value for --{flag}: {value}")]
    Invalid { flag: &'static str, value: String },
}

/// The process to carry out against a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Process {
    Backup,
    Restore,
}

impl FromStr for Process {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backup" => Ok(Process::Backup),
            "restore" => Ok(Process::Restore),
            other => Err(UsageError::UnknownProcess(other.to_owned())),
        }
    }
}

/// Raw mapping of flag names to their values.
#[derive(Debug, Default)]
pub struct FlagSet {
    inner: HashMap<String, String>,
}

impl FlagSet {
    /// Parses a set of flags from command line arguments.
    ///
    /// Anything not starting with `--` is skipped, as is anything without
    /// a `=` separator. Values are split on the first `=` only, so they can
    /// contain their own `=` characters. Repeated flags overwrite earlier ones.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = HashMap::new();

        for arg in args {
            let flag = match arg.as_ref().strip_prefix("--") {
                Some(flag) => flag,
                None => continue,
            };

            if let Some((key, value)) = flag.split_once('=') {
                inner.insert(key.to_owned(), value.to_owned());
            }
        }

        Self { inner }
    }

    /// Retrieves the value of a flag, if it was provided.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Retrieves a flag which must have been provided.
    fn require(&self, key: &'static str) -> Result<&str, UsageError> {
        self.get(key).ok_or(UsageError::Missing(key))
    }

    /// Retrieves and parses an optional flag.
    fn parse_opt<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, UsageError> {
        self.get(key)
            .map(|value| {
                value.parse::<T>().map_err(|_| UsageError::Invalid {
                    flag: key,
                    value: value.to_owned(),
                })
            })
            .transpose()
    }
}

/// Validated options for a single run.
#[derive(Clone, Debug)]
pub struct Options {
    pub process: Process,
    pub host: String,
    pub bucket: String,
    pub folder: String,
    pub snapshot: String,
    pub port: u16,
    pub helper: PathBuf,
    pub backup_dir: PathBuf,
    pub restore_dir: PathBuf,
    pub retry_delay: Duration,
    pub retry_limit: Option<usize>,
}

impl Options {
    /// Validates a `FlagSet` into a set of `Options`.
    ///
    /// Required flags are checked first, in order, so the first missing
    /// flag is the one reported back to the user.
    pub fn from_flags(flags: &FlagSet) -> Result<Self, UsageError> {
        for key in REQUIRED.iter().copied() {
            flags.require(key)?;
        }

        let retry_limit = match flags.parse_opt::<usize>("retry-limit")? {
            Some(0) => {
                return Err(UsageError::Invalid {
                    flag: "retry-limit",
                    value: "0".to_owned(),
                })
            }
            limit => limit,
        };

        Ok(Self {
            process: flags.require("process")?.parse()?,
            host: flags.require("host")?.to_owned(),
            bucket: flags.require("bucket")?.to_owned(),
            folder: flags.require("folder")?.to_owned(),
            snapshot: flags.require("snapshot")?.to_owned(),
            port: flags.parse_opt("port")?.unwrap_or(DEFAULT_PORT),
            helper: flags
                .parse_opt("helper")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HELPER)),
            backup_dir: flags
                .parse_opt("backup-dir")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
            restore_dir: flags
                .parse_opt("restore-dir")?
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESTORE_DIR)),
            retry_delay: Duration::from_secs(
                flags
                    .parse_opt("retry-delay")?
                    .unwrap_or(DEFAULT_RETRY_DELAY),
            ),
            retry_limit,
        })
    }

    /// Directory holding the artifacts of a backup run.
    pub fn backup_path(&self) -> PathBuf {
        self.backup_dir.join(&self.snapshot)
    }

    /// Directory holding the artifacts pulled for a restore run.
    pub fn restore_path(&self) -> PathBuf {
        self.restore_dir.join(&self.snapshot)
    }

    /// Retry policy to use when connecting to the cluster.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_delay, self.retry_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<&'static str> {
        vec![
            "--process=backup",
            "--host=es-db",
            "--bucket=dumps",
            "--folder=elasticsearch-es-db",
            "--snapshot=snap-1",
        ]
    }

    #[test]
    fn parsing_skips_non_flags() {
        let flags = FlagSet::parse(vec!["host=a", "-x=1", "--bare", "--host=b"]);

        assert_eq!(flags.get("host"), Some("b"));
        assert_eq!(flags.get("x"), None);
        assert_eq!(flags.get("bare"), None);
    }

    #[test]
    fn parsing_splits_on_first_equals() {
        let flags = FlagSet::parse(vec!["--folder=a=b==c", "--empty="]);

        assert_eq!(flags.get("folder"), Some("a=b==c"));
        assert_eq!(flags.get("empty"), Some(""));
    }

    #[test]
    fn parsing_keeps_last_occurrence() {
        let flags = FlagSet::parse(vec!["--snapshot=one", "--snapshot=two"]);

        assert_eq!(flags.get("snapshot"), Some("two"));
    }

    #[test]
    fn options_require_every_flag() {
        for missing in REQUIRED.iter().copied() {
            let prefix = format!("--{}=", missing);
            let args = required()
                .into_iter()
                .filter(|arg| !arg.starts_with(&prefix));

            let err = Options::from_flags(&FlagSet::parse(args)).unwrap_err();

            assert_eq!(err, UsageError::Missing(missing));
            assert_eq!(err.to_string(), format!("--{} is required", missing));
        }
    }

    #[test]
    fn options_apply_defaults() {
        let options = Options::from_flags(&FlagSet::parse(required())).unwrap();

        assert_eq!(options.process, Process::Backup);
        assert_eq!(options.host, "es-db");
        assert_eq!(options.bucket, "dumps");
        assert_eq!(options.folder, "elasticsearch-es-db");
        assert_eq!(options.port, DEFAULT_PORT);
        assert_eq!(options.helper, PathBuf::from(DEFAULT_HELPER));
        assert_eq!(options.retry_delay, Duration::from_secs(10));
        assert_eq!(options.retry_limit, None);
        assert_eq!(
            options.backup_path(),
            PathBuf::from("/var/dump-backup/snap-1")
        );
        assert_eq!(
            options.restore_path(),
            PathBuf::from("/var/dump-restore/snap-1")
        );
    }

    #[test]
    fn options_accept_overrides() {
        let mut args = required();
        args.extend(vec![
            "--port=9201",
            "--helper=/opt/dump.sh",
            "--restore-dir=/tmp/restore",
            "--retry-delay=2",
            "--retry-limit=5",
        ]);

        let options = Options::from_flags(&FlagSet::parse(args)).unwrap();

        assert_eq!(options.port, 9201);
        assert_eq!(options.helper, PathBuf::from("/opt/dump.sh"));
        assert_eq!(options.restore_path(), PathBuf::from("/tmp/restore/snap-1"));
        assert_eq!(options.retry_delay, Duration::from_secs(2));
        assert_eq!(options.retry_limit, Some(5));
    }

    #[test]
    fn options_reject_unknown_process() {
        let mut args = required();
        args.push("--process=archive");

        let err = Options::from_flags(&FlagSet::parse(args)).unwrap_err();

        assert_eq!(err, UsageError::UnknownProcess("archive".to_owned()));
    }

    #[test]
    fn options_reject_invalid_numbers() {
        for (arg, flag) in &[
            ("--port=http", "port"),
            ("--retry-delay=-1", "retry-delay"),
            ("--retry-limit=0", "retry-limit"),
        ] {
            let mut args = required();
            args.push(*arg);

            let err = Options::from_flags(&FlagSet::parse(args)).unwrap_err();

            assert!(matches!(err, UsageError::Invalid { flag: f, .. } if f == *flag));
        }
    }
}
