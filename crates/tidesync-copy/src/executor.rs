//! Streaming single-file copy with cooperative cancellation

use std::path::Path;
use tidesync_types::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Buffer size for streaming copies
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copy one file, checking for cancellation at every chunk boundary
///
/// The destination's parent directory is created if missing. After the
/// bytes land, the source's mtime is applied to the destination so that
/// metadata comparisons hold across runs. Cancellation aborts between
/// chunks and leaves whatever was written so far in place.
///
/// Returns the number of bytes copied.
pub async fn copy_file(source: &Path, dest: &Path, token: &CancellationToken) -> Result<u64> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::io(format!(
                "failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let mut reader = tokio::fs::File::open(source).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: source.to_path_buf(),
            }
        } else {
            Error::io(format!("failed to open {}: {e}", source.display()))
        }
    })?;
    let source_meta = reader
        .metadata()
        .await
        .map_err(|e| Error::io(format!("failed to stat {}: {e}", source.display())))?;
    let mut writer = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io(format!("failed to create {}: {e}", dest.display())))?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        if token.is_cancelled() {
            debug!(
                "Copy of {} cancelled after {} bytes",
                source.display(),
                copied
            );
            return Err(Error::Cancelled);
        }
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io(format!("failed to read {}: {e}", source.display())))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(|e| Error::io(format!("failed to write {}: {e}", dest.display())))?;
        copied += read as u64;
        trace!("Copied {} bytes of {}", copied, source.display());
    }

    writer
        .flush()
        .await
        .map_err(|e| Error::io(format!("failed to flush {}: {e}", dest.display())))?;
    drop(writer);

    preserve_mtime(&source_meta, dest)?;

    debug!(
        "Copied {} -> {} ({} bytes)",
        source.display(),
        dest.display(),
        copied
    );
    Ok(copied)
}

fn preserve_mtime(source_meta: &std::fs::Metadata, dest: &Path) -> Result<()> {
    let mtime = source_meta
        .modified()
        .map_err(|e| Error::io(format!("no source mtime: {e}")))?;
    filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime))
        .map_err(|e| Error::io(format!("failed to set mtime on {}: {e}", dest.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_creates_parent_and_preserves_bytes() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        tokio::fs::write(&source, &payload).await.unwrap();

        let dest = dir.path().join("nested").join("deep").join("out.bin");
        let token = CancellationToken::new();
        let copied = copy_file(&source, &dest, &token).await.unwrap();

        assert_eq!(copied, payload.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_copy_preserves_source_mtime() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.txt");
        tokio::fs::write(&source, b"contents").await.unwrap();
        let past = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, past).unwrap();

        let dest = dir.path().join("out.txt");
        copy_file(&source, &dest, &CancellationToken::new())
            .await
            .unwrap();

        let dest_mtime = filetime::FileTime::from_system_time(
            std::fs::metadata(&dest).unwrap().modified().unwrap(),
        );
        assert_eq!(dest_mtime.unix_seconds(), past.unix_seconds());
    }

    #[tokio::test]
    async fn test_copy_empty_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("empty");
        tokio::fs::write(&source, b"").await.unwrap();
        let dest = dir.path().join("empty-copy");

        let copied = copy_file(&source, &dest, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(copied, 0);
        assert!(tokio::fs::metadata(&dest).await.unwrap().is_file());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.txt");
        tokio::fs::write(&source, b"data").await.unwrap();
        let dest = dir.path().join("out.txt");

        let token = CancellationToken::new();
        token.cancel();
        let err = copy_file(&source, &dest, &token).await.unwrap_err();
        assert!(err.is_cancelled());
        // Nothing was written
        assert!(tokio::fs::metadata(&dest).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_source_reported_as_not_found() {
        let dir = TempDir::new().unwrap();
        let err = copy_file(
            &dir.path().join("ghost"),
            &dir.path().join("out"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_overwrite_truncates_previous_contents() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("short.txt");
        let dest = dir.path().join("dest.txt");
        tokio::fs::write(&source, b"new").await.unwrap();
        tokio::fs::write(&dest, b"a much longer previous payload")
            .await
            .unwrap();

        copy_file(&source, &dest, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"new");
    }
}
