//! Per-file duplicate resolution
//!
//! Given a source file and the naive destination path, the resolver
//! applies the task's duplicate policy and comparison strategy and
//! decides what, if anything, should be written where.

use crate::compare::files_equal;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tidesync_types::{ComparisonStrategy, DuplicatePolicy, Error, Result};
use tracing::debug;

/// Upper bound on `_(N)` rename probing before giving up
const MAX_RENAME_ATTEMPTS: u32 = 1000;

/// Why the resolver decided what it decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Nothing exists at the destination yet
    NewFile,
    /// Policy overwrites unconditionally
    PolicyOverwrite,
    /// Source and destination compare equal; nothing to do
    Identical,
    /// Destination exists but differs from the source
    ContentDiffers,
    /// Source mtime is strictly newer than the destination's
    SourceNewer,
    /// Source mtime is not newer than the destination's
    SourceNotNewer,
    /// Contents differ; copying under a generated alternate name
    Renamed,
}

/// The resolver's verdict for one file/destination pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyDecision {
    /// Whether any bytes should be written
    pub copy: bool,
    /// Where to write them (differs from the naive destination when
    /// renamed)
    pub dest: PathBuf,
    /// Why
    pub reason: DecisionReason,
}

impl CopyDecision {
    fn copy_to(dest: PathBuf, reason: DecisionReason) -> Self {
        Self {
            copy: true,
            dest,
            reason,
        }
    }

    fn skip(dest: PathBuf, reason: DecisionReason) -> Self {
        Self {
            copy: false,
            dest,
            reason,
        }
    }

    /// Whether the decision was to copy under an alternate name
    pub fn is_renamed(&self) -> bool {
        self.reason == DecisionReason::Renamed
    }
}

/// Decide what to do for one source file and its naive destination
///
/// `Skip` means skip-if-identical: when the destination exists but
/// differs under the comparison strategy, it is still overwritten.
pub async fn resolve(
    source: &Path,
    naive_dest: &Path,
    policy: DuplicatePolicy,
    comparison: ComparisonStrategy,
) -> Result<CopyDecision> {
    if tokio::fs::metadata(naive_dest).await.is_err() {
        return Ok(CopyDecision::copy_to(
            naive_dest.to_path_buf(),
            DecisionReason::NewFile,
        ));
    }

    match policy {
        DuplicatePolicy::Overwrite => Ok(CopyDecision::copy_to(
            naive_dest.to_path_buf(),
            DecisionReason::PolicyOverwrite,
        )),
        DuplicatePolicy::Skip => {
            if files_equal(source, naive_dest, comparison).await? {
                debug!(
                    "Skipping {}: destination {} is equivalent",
                    source.display(),
                    naive_dest.display()
                );
                Ok(CopyDecision::skip(
                    naive_dest.to_path_buf(),
                    DecisionReason::Identical,
                ))
            } else {
                Ok(CopyDecision::copy_to(
                    naive_dest.to_path_buf(),
                    DecisionReason::ContentDiffers,
                ))
            }
        }
        DuplicatePolicy::OverwriteIfNewer => {
            let source_mtime = mtime(source).await?;
            let dest_mtime = mtime(naive_dest).await?;
            if source_mtime > dest_mtime {
                Ok(CopyDecision::copy_to(
                    naive_dest.to_path_buf(),
                    DecisionReason::SourceNewer,
                ))
            } else {
                Ok(CopyDecision::skip(
                    naive_dest.to_path_buf(),
                    DecisionReason::SourceNotNewer,
                ))
            }
        }
        DuplicatePolicy::RenameNew => {
            if files_equal(source, naive_dest, comparison).await? {
                return Ok(CopyDecision::skip(
                    naive_dest.to_path_buf(),
                    DecisionReason::Identical,
                ));
            }
            let alternate = next_free_name(naive_dest).await?;
            Ok(CopyDecision::copy_to(alternate, DecisionReason::Renamed))
        }
    }
}

async fn mtime(path: &Path) -> Result<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(format!("failed to stat {}: {e}", path.display())))
}

/// Probe `name_(1).ext`, `name_(2).ext`, ... for an unused path
async fn next_free_name(naive_dest: &Path) -> Result<PathBuf> {
    let stem = naive_dest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let extension = naive_dest.extension().and_then(|e| e.to_str());
    let parent = naive_dest.parent().unwrap_or_else(|| Path::new(""));

    for n in 1..=MAX_RENAME_ATTEMPTS {
        let candidate_name = match extension {
            Some(ext) => format!("{stem}_({n}).{ext}"),
            None => format!("{stem}_({n})"),
        };
        let candidate = parent.join(candidate_name);
        if tokio::fs::metadata(&candidate).await.is_err() {
            return Ok(candidate);
        }
    }
    Err(Error::other(format!(
        "no free rename slot for {} after {} attempts",
        naive_dest.display(),
        MAX_RENAME_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(path: &Path, contents: &[u8]) {
        tokio::fs::write(path, contents).await.unwrap();
    }

    fn align_mtimes(a: &Path, b: &Path) {
        let mtime = filetime::FileTime::from_system_time(SystemTime::now());
        filetime::set_file_mtime(a, mtime).unwrap();
        filetime::set_file_mtime(b, mtime).unwrap();
    }

    fn shift_mtime(path: &Path, delta_secs: i64) {
        let current = filetime::FileTime::from_system_time(
            std::fs::metadata(path).unwrap().modified().unwrap(),
        );
        let shifted = filetime::FileTime::from_unix_time(current.unix_seconds() + delta_secs, 0);
        filetime::set_file_mtime(path, shifted).unwrap();
    }

    #[tokio::test]
    async fn test_absent_destination_always_copies() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        write(&source, b"data").await;
        let dest = dir.path().join("out").join("a.txt");

        for policy in [
            DuplicatePolicy::Skip,
            DuplicatePolicy::Overwrite,
            DuplicatePolicy::OverwriteIfNewer,
            DuplicatePolicy::RenameNew,
        ] {
            let decision = resolve(&source, &dest, policy, ComparisonStrategy::SizeAndDate)
                .await
                .unwrap();
            assert!(decision.copy, "{policy:?} should copy to a new path");
            assert_eq!(decision.dest, dest);
            assert_eq!(decision.reason, DecisionReason::NewFile);
        }
    }

    #[tokio::test]
    async fn test_skip_means_skip_if_identical_not_skip_if_exists() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        let dest = dir.path().join("dest_a.txt");
        write(&source, b"0123456789").await;
        write(&dest, b"0123456789").await;
        align_mtimes(&source, &dest);

        // Identical: skipped
        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::Skip,
            ComparisonStrategy::SizeAndDate,
        )
        .await
        .unwrap();
        assert!(!decision.copy);
        assert_eq!(decision.reason, DecisionReason::Identical);

        // Different size: overwritten despite the policy name
        write(&dest, b"different length contents").await;
        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::Skip,
            ComparisonStrategy::SizeAndDate,
        )
        .await
        .unwrap();
        assert!(decision.copy);
        assert_eq!(decision.dest, dest);
        assert_eq!(decision.reason, DecisionReason::ContentDiffers);
    }

    #[tokio::test]
    async fn test_overwrite_if_newer_requires_strictly_newer_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        write(&source, b"src").await;
        write(&dest, b"dst").await;
        align_mtimes(&source, &dest);

        // Equal mtimes: not newer, skip
        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::OverwriteIfNewer,
            ComparisonStrategy::SizeAndDate,
        )
        .await
        .unwrap();
        assert!(!decision.copy);
        assert_eq!(decision.reason, DecisionReason::SourceNotNewer);

        shift_mtime(&source, 120);
        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::OverwriteIfNewer,
            ComparisonStrategy::SizeAndDate,
        )
        .await
        .unwrap();
        assert!(decision.copy);
        assert_eq!(decision.reason, DecisionReason::SourceNewer);
    }

    #[tokio::test]
    async fn test_rename_new_probes_for_free_slot() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        let dest = dir.path().join("dest").join("a.txt");
        tokio::fs::create_dir_all(dest.parent().unwrap())
            .await
            .unwrap();
        write(&source, b"new contents").await;
        write(&dest, b"old").await;
        write(&dest.parent().unwrap().join("a_(1).txt"), b"taken").await;

        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::RenameNew,
            ComparisonStrategy::SizeOnly,
        )
        .await
        .unwrap();
        assert!(decision.copy);
        assert!(decision.is_renamed());
        assert!(decision.dest.ends_with("a_(2).txt"));
        // The chosen name must not already exist
        assert!(tokio::fs::metadata(&decision.dest).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_new_skips_identical_content() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        write(&source, b"same").await;
        write(&dest, b"same").await;

        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::RenameNew,
            ComparisonStrategy::HashContent,
        )
        .await
        .unwrap();
        assert!(!decision.copy);
        assert_eq!(decision.reason, DecisionReason::Identical);
    }

    #[tokio::test]
    async fn test_rename_without_extension() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("LICENSE");
        let dest = dir.path().join("out-LICENSE");
        write(&source, b"new").await;
        write(&dest, b"different").await;

        let decision = resolve(
            &source,
            &dest,
            DuplicatePolicy::RenameNew,
            ComparisonStrategy::SizeOnly,
        )
        .await
        .unwrap();
        assert!(decision.dest.ends_with("out-LICENSE_(1)"));
    }

    #[tokio::test]
    async fn test_skip_hash_content_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        let dest = dir.path().join("copy.txt");
        write(&source, b"stable contents").await;
        tokio::fs::copy(&source, &dest).await.unwrap();

        // Unchanged source resolved twice: second run copies nothing
        for _ in 0..2 {
            let decision = resolve(
                &source,
                &dest,
                DuplicatePolicy::Skip,
                ComparisonStrategy::HashContent,
            )
            .await
            .unwrap();
            assert!(!decision.copy);
        }
    }
}
