//! Reading and writing of snapshot manifests.
//!
//! A manifest is a plain text file inside a snapshot directory which lists
//! the indices included in the snapshot, one per line, in the order they
//! were backed up. It's the only thing a restore knows about a snapshot
//! before it starts restoring indices.
use anyhow::{Context, Result};
use bytelines::*;
use futures::TryStreamExt;
use tokio::fs::{self, File};
use tokio::io::BufReader;

use std::path::{Path, PathBuf};

/// File name of the manifest inside a snapshot directory.
pub const MANIFEST: &str = "indices.txt";

/// Writes a manifest of the provided indices into a snapshot directory.
pub async fn write(dir: &Path, indices: &[String]) -> Result<PathBuf> {
    let path = dir.join(MANIFEST);

    let mut contents = String::new();
    for index in indices {
        contents.push_str(index);
        contents.push('\n');
    }

    fs::write(&path, contents)
        .await
        .with_context(|| format!("unable to write manifest {}", path.display()))?;

    Ok(path)
}

/// Reads the manifest from a snapshot directory.
///
/// Blank lines are skipped, so a trailing newline (or a stray empty line)
/// never turns into an index named `""`.
pub async fn read(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join(MANIFEST);

    let file = File::open(&path)
        .await
        .with_context(|| format!("unable to open manifest {}", path.display()))?;

    // stream the lines without their terminators
    let lines = AsyncByteLines::new(BufReader::new(file))
        .into_stream()
        .try_collect::<Vec<_>>()
        .await
        .with_context(|| format!("unable to read manifest {}", path.display()))?;

    let mut indices = Vec::with_capacity(lines.len());

    for (idx, line) in lines.into_iter().enumerate() {
        let index = String::from_utf8(line)
            .with_context(|| format!("invalid index name on line {} of manifest", idx + 1))?;

        let index = index.trim_end_matches('\r');

        if !index.is_empty() {
            indices.push(index.to_owned());
        }
    }

    Ok(indices)
}
