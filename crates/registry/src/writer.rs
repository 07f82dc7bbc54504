//! All-or-nothing artifact writes.
//!
//! Every changed artifact is staged next to its target as `<name>.tmp`
//! before any target is touched. Staging failures remove what was staged.
//! Targets are then swapped in one at a time, each previous file kept as
//! `<name>.bak` until the whole set is in place; a failed swap puts the
//! earlier targets back.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// One generated file, path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub contents: String,
}

impl Artifact {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<String>,
    /// Already up to date; left untouched
    pub unchanged: Vec<String>,
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

async fn is_current(path: &Path, contents: &str) -> bool {
    match tokio::fs::read(path).await {
        Ok(existing) => existing == contents.as_bytes(),
        Err(_) => false,
    }
}

async fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(e) = tokio::fs::remove_file(tmp).await {
            log::debug!("Failed to remove staged file {}: {e}", tmp.display());
        }
    }
}

/// Move `tmp` onto `target`, returning where the previous target went.
async fn swap_in(tmp: &Path, target: &Path) -> std::io::Result<Option<PathBuf>> {
    let backup = if tokio::fs::metadata(target).await.is_ok() {
        let backup = sibling_path(target, ".bak");
        tokio::fs::rename(target, &backup).await?;
        Some(backup)
    } else {
        None
    };
    if let Err(e) = tokio::fs::rename(tmp, target).await {
        if let Some(backup) = &backup {
            if let Err(restore) = tokio::fs::rename(backup, target).await {
                log::warn!("Failed to restore {}: {restore}", target.display());
            }
        }
        return Err(e);
    }
    Ok(backup)
}

/// Undo completed swaps, newest first.
async fn roll_back(swapped: &[(PathBuf, Option<PathBuf>)]) {
    for (target, backup) in swapped.iter().rev() {
        let restored = match backup {
            Some(backup) => tokio::fs::rename(backup, target).await,
            None => tokio::fs::remove_file(target).await,
        };
        if let Err(e) = restored {
            log::warn!("Failed to restore {}: {e}", target.display());
        }
    }
}

/// Write artifacts below `root` as one set.
pub async fn write_artifacts(root: &Path, artifacts: &[Artifact]) -> Result<WriteReport> {
    let mut report = WriteReport::default();
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

    for artifact in artifacts {
        let target = root.join(&artifact.path);
        if is_current(&target, &artifact.contents).await {
            report.unchanged.push(artifact.path.clone());
            continue;
        }

        let tmp = sibling_path(&target, ".tmp");
        let staged_ok = async {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&tmp, artifact.contents.as_bytes()).await
        }
        .await;

        if let Err(e) = staged_ok {
            log::warn!("Failed to stage {}: {e}", artifact.path);
            discard(&staged).await;
            return Err(e.into());
        }
        staged.push((tmp, target));
        report.written.push(artifact.path.clone());
    }

    let mut swapped: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(staged.len());
    for (index, (tmp, target)) in staged.iter().enumerate() {
        match swap_in(tmp, target).await {
            Ok(backup) => swapped.push((target.clone(), backup)),
            Err(e) => {
                log::warn!("Failed to replace {}: {e}", target.display());
                roll_back(&swapped).await;
                discard(&staged[index..]).await;
                return Err(e.into());
            }
        }
    }
    for backup in swapped.iter().filter_map(|(_, backup)| backup.as_ref()) {
        if let Err(e) = tokio::fs::remove_file(backup).await {
            log::debug!("Failed to remove backup {}: {e}", backup.display());
        }
    }

    log::info!(
        "Wrote {} artifacts ({} unchanged)",
        report.written.len(),
        report.unchanged.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_then_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let artifacts = vec![
            Artifact::new("out/a.ts", "export {};\n"),
            Artifact::new("out/b.json", "{}\n"),
        ];

        let first = write_artifacts(dir.path(), &artifacts).await.unwrap();
        assert_eq!(first.written, vec!["out/a.ts", "out/b.json"]);
        assert!(first.unchanged.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out/a.ts")).unwrap(),
            "export {};\n"
        );
        assert!(!dir.path().join("out/a.ts.tmp").exists());

        let second = write_artifacts(dir.path(), &artifacts).await.unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged.len(), 2);
    }

    #[tokio::test]
    async fn staging_failure_leaves_targets_untouched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "old\n").unwrap();
        // A file where a directory is needed makes staging of the second artifact fail
        std::fs::write(dir.path().join("blocked"), "").unwrap();

        let artifacts = vec![
            Artifact::new("a.ts", "new\n"),
            Artifact::new("blocked/b.ts", "new\n"),
        ];
        assert!(write_artifacts(dir.path(), &artifacts).await.is_err());

        assert_eq!(std::fs::read_to_string(dir.path().join("a.ts")).unwrap(), "old\n");
        assert!(!dir.path().join("a.ts.tmp").exists());
    }

    #[tokio::test]
    async fn failed_swap_restores_earlier_targets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "old a\n").unwrap();
        std::fs::write(dir.path().join("c.ts"), "old c\n").unwrap();
        // A directory in the way of c.ts's backup makes its swap fail after a.ts and b.ts are in
        std::fs::create_dir_all(dir.path().join("c.ts.bak/keep")).unwrap();

        let artifacts = vec![
            Artifact::new("a.ts", "new a\n"),
            Artifact::new("b.ts", "new b\n"),
            Artifact::new("c.ts", "new c\n"),
        ];
        assert!(write_artifacts(dir.path(), &artifacts).await.is_err());

        assert_eq!(std::fs::read_to_string(dir.path().join("a.ts")).unwrap(), "old a\n");
        assert!(!dir.path().join("b.ts").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("c.ts")).unwrap(), "old c\n");
        for leftover in ["a.ts.tmp", "b.ts.tmp", "c.ts.tmp", "a.ts.bak"] {
            assert!(!dir.path().join(leftover).exists(), "{leftover} left behind");
        }
    }

    #[tokio::test]
    async fn replaced_targets_leave_no_backups() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "old\n").unwrap();

        let report = write_artifacts(dir.path(), &[Artifact::new("a.ts", "new\n")])
            .await
            .unwrap();

        assert_eq!(report.written, vec!["a.ts"]);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.ts")).unwrap(), "new\n");
        assert!(!dir.path().join("a.ts.bak").exists());
    }
}
