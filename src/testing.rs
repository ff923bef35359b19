//! In-memory fakes of the cluster and helper for tests.
use async_trait::async_trait;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::helper::{Helper, HelperError, Operation};
use crate::remote::{Cluster, ClusterError, Connector};

/// Cluster serving a fixed set of indices.
#[derive(Clone, Default)]
pub struct FakeCluster {
    indices: Vec<String>,
    unreachable: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
}

impl FakeCluster {
    pub fn new(indices: &[&str]) -> Self {
        Self {
            indices: indices.iter().map(|index| index.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Fails the first `pings` liveness checks.
    pub fn unreachable(self, pings: usize) -> Self {
        self.unreachable.store(pings, Ordering::SeqCst);
        self
    }

    /// Number of liveness checks received.
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn list_indices(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.indices.clone())
    }

    async fn check_liveness(&self) -> Result<(), ClusterError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        take_one(&self.unreachable)
            .map(|_| Err(ClusterError::Unreachable))
            .unwrap_or(Ok(()))
    }
}

/// Connector handing out a `FakeCluster`.
pub struct FakeConnector {
    cluster: FakeCluster,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new(cluster: FakeCluster) -> Self {
        Self {
            cluster,
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fails the first `attempts` connections with a transient error.
    pub fn failing(self, attempts: usize) -> Self {
        self.failures.store(attempts, Ordering::SeqCst);
        self
    }

    /// Number of connection attempts made.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Cluster = FakeCluster;

    async fn connect(&self) -> Result<FakeCluster, ClusterError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match take_one(&self.failures) {
            Some(_) => Err(ClusterError::Build("connection refused".to_owned())),
            None => Ok(self.cluster.clone()),
        }
    }
}

/// Decrements a counter unless it has already reached zero.
fn take_one(counter: &AtomicUsize) -> Option<usize> {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .ok()
}

type Hook = Box<dyn Fn(&[String]) + Send + Sync>;

/// Helper recording every invocation it receives.
#[derive(Default)]
pub struct RecordingHelper {
    calls: Mutex<Vec<Vec<String>>>,
    failure: Option<(Operation, String)>,
    hook: Option<Hook>,
}

impl RecordingHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails any `operation` invoked with `target` as its final argument.
    pub fn failing(mut self, operation: Operation, target: &str) -> Self {
        self.failure = Some((operation, target.to_owned()));
        self
    }

    /// Runs a hook with the arguments of every invocation.
    pub fn inspecting<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// All invocations received so far, joined with spaces.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.join(" "))
            .collect()
    }

    fn record(&self, operation: Operation, args: [&str; 3]) -> Result<(), HelperError> {
        let mut call = vec![operation.to_string()];
        call.extend(args.iter().map(|arg| arg.to_string()));

        if let Some(hook) = &self.hook {
            hook(&call);
        }

        self.calls.lock().unwrap().push(call);

        match &self.failure {
            Some((op, target)) if *op == operation && target == args[2] => {
                Err(HelperError::Failed {
                    operation,
                    code: Some(1),
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Helper for RecordingHelper {
    async fn backup(&self, host: &str, snapshot: &str, index: &str) -> Result<(), HelperError> {
        self.record(Operation::Backup, [host, snapshot, index])
    }

    async fn restore(&self, host: &str, snapshot: &str, index: &str) -> Result<(), HelperError> {
        self.record(Operation::Restore, [host, snapshot, index])
    }

    async fn push(&self, bucket: &str, folder: &str, snapshot: &str) -> Result<(), HelperError> {
        self.record(Operation::Push, [bucket, folder, snapshot])
    }

    async fn pull(&self, bucket: &str, folder: &str, snapshot: &str) -> Result<(), HelperError> {
        self.record(Operation::Pull, [bucket, folder, snapshot])
    }
}
