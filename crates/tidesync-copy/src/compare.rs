//! File equality comparison strategies

use std::path::Path;
use std::time::SystemTime;
use tidesync_types::{ComparisonStrategy, Error, Result};
use tokio::io::AsyncReadExt;
use tracing::warn;

const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Decide whether two existing files are "the same" under a strategy
///
/// `SizeAndDate` requires exact size equality and exact mtime equality
/// (no tolerance window). `HashContent` streams both files through a
/// 256-bit digest; an I/O failure while hashing degrades to the
/// `SizeAndDate` comparison instead of propagating, and the fallback is
/// logged.
pub async fn files_equal(a: &Path, b: &Path, strategy: ComparisonStrategy) -> Result<bool> {
    match strategy {
        ComparisonStrategy::SizeAndDate => {
            let (a_meta, b_meta) = metadata_pair(a, b).await?;
            Ok(a_meta.0 == b_meta.0 && a_meta.1 == b_meta.1)
        }
        ComparisonStrategy::SizeOnly => {
            let (a_meta, b_meta) = metadata_pair(a, b).await?;
            Ok(a_meta.0 == b_meta.0)
        }
        ComparisonStrategy::DateOnly => {
            let (a_meta, b_meta) = metadata_pair(a, b).await?;
            Ok(a_meta.1 == b_meta.1)
        }
        ComparisonStrategy::HashContent => match hash_pair(a, b).await {
            Ok(equal) => Ok(equal),
            Err(e) => {
                warn!(
                    "Content hash of {} / {} failed ({}); falling back to size+date comparison",
                    a.display(),
                    b.display(),
                    e
                );
                Box::pin(files_equal(a, b, ComparisonStrategy::SizeAndDate)).await
            }
        },
    }
}

async fn metadata_pair(a: &Path, b: &Path) -> Result<((u64, SystemTime), (u64, SystemTime))> {
    Ok((size_and_mtime(a).await?, size_and_mtime(b).await?))
}

async fn size_and_mtime(path: &Path) -> Result<(u64, SystemTime)> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io(format!("failed to stat {}: {e}", path.display())))?;
    let mtime = meta
        .modified()
        .map_err(|e| Error::io(format!("no mtime for {}: {e}", path.display())))?;
    Ok((meta.len(), mtime))
}

async fn hash_pair(a: &Path, b: &Path) -> Result<bool> {
    let hash_a = hash_file(a).await?;
    let hash_b = hash_file(b).await?;
    Ok(hash_a == hash_b)
}

/// Stream a file through a BLAKE3 hasher
pub async fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::io(format!("failed to open {}: {e}", path.display())))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io(format!("failed to read {}: {e}", path.display())))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize())
}
