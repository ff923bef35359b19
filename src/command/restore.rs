//! Restore command module.
//!
//! This module pulls a snapshot from a cloud bucket through the helper, and
//! then restores each index listed in its manifest into a cluster. Restoring
//! is not transactional; indices restored before a failure are left as is.
use anyhow::{Context, Result};

use crate::connect;
use crate::helper::Helper;
use crate::manifest;
use crate::options::Options;
use crate::remote::Connector;
use crate::stats::Progress;

/// Executes the restore process.
///
/// The manifest is read before connecting so that a broken snapshot fails
/// straight away rather than after waiting on the cluster to come up.
pub async fn run<C, H>(options: &Options, connector: &C, helper: &H) -> Result<()>
where
    C: Connector,
    H: Helper,
{
    tracing::info!("Restore process starting...");

    helper
        .pull(&options.bucket, &options.folder, &options.snapshot)
        .await
        .context("Fail to pull backup files from cloud")?;

    let indices = manifest::read(&options.restore_path()).await?;

    tracing::info!("Total indices: {}", indices.len());

    // only restore into a cluster which has answered a ping
    connect::establish_verified(connector, &options.retry_policy())
        .await
        .context("Fail to connect to cluster")?;

    let mut progress = Progress::new(indices.len());

    for index in &indices {
        helper
            .restore(&options.host, &options.snapshot, index)
            .await
            .with_context(|| format!("Fail to restore index: {}", index))?;

        tracing::info!("Restored index {} ({})", index, progress.advance());
    }

    Ok(())
}
