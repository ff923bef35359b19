//! Connection handling for both backup and restore processes.
//!
//! A cluster may not be reachable yet when a process starts (for example when
//! both are scheduled at the same time), so connection attempts are retried
//! according to a `RetryPolicy` rather than failing on the first attempt.
use crate::remote::{Cluster, ClusterError, Connector};
use crate::retry::RetryPolicy;

/// Establishes a connection to a cluster.
///
/// Only the construction of the client is retried; anything carried out
/// with the returned cluster afterwards is up to the caller.
pub async fn establish<C>(connector: &C, policy: &RetryPolicy) -> Result<C::Cluster, ClusterError>
where
    C: Connector,
{
    policy.run("connect to cluster", || connector.connect()).await
}

/// Establishes a connection to a cluster which is known to be alive.
///
/// After construction the cluster is pinged until it responds, using the
/// same policy as the connection itself.
pub async fn establish_verified<C>(
    connector: &C,
    policy: &RetryPolicy,
) -> Result<C::Cluster, ClusterError>
where
    C: Connector,
{
    let cluster = establish(connector, policy).await?;

    policy
        .run("ping cluster", || cluster.check_liveness())
        .await?;

    Ok(cluster)
}
