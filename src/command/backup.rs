//! Backup command module.
//!
//! This module backs up every index of a cluster into a snapshot directory
//! through the helper, records the indices in a manifest, and then pushes
//! the whole snapshot directory into a cloud bucket.
//!
//! Each snapshot directory starts out empty, so running a backup with the
//! same snapshot name twice will discard the results of the first run.
use anyhow::{Context, Result};
use tokio::fs;

use std::io::ErrorKind;
use std::path::Path;

use crate::connect;
use crate::helper::Helper;
use crate::manifest;
use crate::options::Options;
use crate::remote::{Cluster, Connector};
use crate::stats::Progress;

/// Executes the backup process.
///
/// The first failure of any step halts the process; no further indices are
/// backed up and nothing is pushed to the bucket.
pub async fn run<C, H>(options: &Options, connector: &C, helper: &H) -> Result<()>
where
    C: Connector,
    H: Helper,
{
    tracing::info!("Backup process starting...");

    // connect to the cluster, retrying until it's available
    let cluster = connect::establish(connector, &options.retry_policy())
        .await
        .context("Fail to connect to cluster")?;

    // listing failures are not retried, only the connection itself
    let indices = cluster
        .list_indices()
        .await
        .context("Fail to list cluster indices")?;

    tracing::info!("Total indices: {}", indices.len());

    // start from a clean snapshot directory
    let path = options.backup_path();
    prepare(&path).await?;

    let mut progress = Progress::new(indices.len());

    for index in &indices {
        helper
            .backup(&options.host, &options.snapshot, index)
            .await
            .with_context(|| format!("Fail to take backup for index: {}", index))?;

        tracing::info!("Backed up index {} ({})", index, progress.advance());
    }

    // record the indices only once they've all been backed up
    let manifest = manifest::write(&path, &indices).await?;

    tracing::info!("Wrote manifest to {}", manifest.display());

    helper
        .push(&options.bucket, &options.folder, &options.snapshot)
        .await
        .context("Fail to push backup files to cloud")?;

    tracing::info!(
        "Pushed snapshot {} to {}/{}",
        options.snapshot,
        options.bucket,
        options.folder
    );

    Ok(())
}

/// Removes any existing snapshot directory and creates a fresh one.
async fn prepare(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            return Err(e).with_context(|| format!("unable to clear {}", path.display()));
        }
        _ => (),
    }

    fs::create_dir_all(path)
        .await
        .with_context(|| format!("unable to create {}", path.display()))
}
