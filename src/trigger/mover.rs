//! File-relocation trigger
//!
//! Moves a finished record's file into a directory derived from its name: a
//! selector regex captures the interesting parts, a target template turns the
//! captures into a directory path. Optionally resolves the directory
//! case-insensitively or creates it when missing.

use super::Trigger;
use crate::config::MoverConfig;
use crate::error::{Error, Result};
use crate::transfer::Transfer;
use crate::utils::substitute;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Trigger that relocates finished files whose name matches a selector
pub struct MoverTrigger {
    selector: Regex,
    target: String,
    insensitive: bool,
    create: bool,
}

impl MoverTrigger {
    /// Build a mover from its configuration; fails if the selector is invalid
    pub fn new(config: &MoverConfig) -> Result<Self> {
        let selector = Regex::new(&config.selector).map_err(|e| Error::Config {
            message: format!("mover selector does not compile: {e}"),
            key: Some("selector".to_string()),
        })?;
        Ok(Self {
            selector,
            target: config.target.clone(),
            insensitive: config.insensitive,
            create: config.create,
        })
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Walk the path component by component, matching missing pieces against
/// directory entries case-insensitively. Returns None when any component has
/// no match at all.
async fn resolve_insensitive(target: &Path) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in target.components() {
        match component {
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                if tokio::fs::metadata(&candidate).await.is_ok() {
                    resolved = candidate;
                    continue;
                }
                let parent = if resolved.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    resolved.as_path()
                };
                let want = name.to_string_lossy().to_lowercase();
                let mut entries = tokio::fs::read_dir(parent).await.ok()?;
                let mut found = None;
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_name().to_string_lossy().to_lowercase() == want {
                        found = Some(entry.file_name());
                        break;
                    }
                }
                resolved = resolved.join(found?);
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Some(resolved)
}

#[async_trait]
impl Trigger for MoverTrigger {
    async fn on_finished(&self, transfer: &Transfer) -> Result<bool> {
        let Some(path) = transfer.filename() else {
            return Ok(false);
        };
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Ok(false);
        };
        let Some(captures) = self.selector.captures(&file_name) else {
            return Ok(false);
        };

        let groups: Vec<String> = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        let mut target = PathBuf::from(substitute(&self.target, &groups));

        if !is_dir(&target).await && self.insensitive {
            if let Some(found) = resolve_insensitive(&target).await {
                target = found;
            }
        }

        if !is_dir(&target).await && self.create {
            tracing::debug!(target = %target.display(), "creating target directory");
            tokio::fs::create_dir_all(&target).await?;
        }

        if is_dir(&target).await {
            let dest = transfer.relocate(&target).await?;
            tracing::info!(dest = %dest.display(), "moved finished file");
            return Ok(true);
        }
        Ok(false)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_transfer, recording_events};
    use crate::transfer::Transfer;
    use crate::types::TransferOptions;
    use std::sync::Arc;

    const NAME: &str = "Halt.and.Catch.Fire.S02E01.PROPER.HDTV.x264-KILLERS.mp4";
    const SUBDIR: &str = "Halt.and.Catch.Fire";

    fn mover(root: &Path, insensitive: bool, create: bool) -> MoverTrigger {
        MoverTrigger::new(&MoverConfig {
            selector: "(.*)\\.S[0-9]+E[0-9]+(-E[0-9]+)?\\..*".to_string(),
            target: root.join("$0$").display().to_string(),
            insensitive,
            create,
        })
        .unwrap()
    }

    /// A finished record with a real file on disk under `root`
    async fn finished_transfer(root: &Path, name: &str) -> Arc<Transfer> {
        let (events, _rx) = recording_events();
        let transfer = new_transfer(
            "fake",
            "x",
            root,
            TransferOptions {
                name: Some(name.to_string()),
                ..Default::default()
            },
            events,
        );
        transfer.open().await.unwrap();
        transfer.write(&[0u8; 1024]).await.unwrap();
        transfer.close().await.unwrap();
        transfer
    }

    #[tokio::test]
    async fn no_move_when_target_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = finished_transfer(dir.path(), NAME).await;

        let moved = mover(dir.path(), false, false)
            .on_finished(&transfer)
            .await
            .unwrap();

        assert!(!moved);
        assert!(dir.path().join(NAME).is_file(), "file must stay in place");
        assert!(!dir.path().join(SUBDIR).join(NAME).exists());
    }

    #[tokio::test]
    async fn simple_move_into_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(SUBDIR)).unwrap();
        let transfer = finished_transfer(dir.path(), NAME).await;

        let moved = mover(dir.path(), false, false)
            .on_finished(&transfer)
            .await
            .unwrap();

        assert!(moved);
        assert!(dir.path().join(SUBDIR).join(NAME).is_file());
        assert!(!dir.path().join(NAME).exists());
        // The record's destination follows the file
        assert_eq!(
            transfer.filename().unwrap(),
            dir.path().join(SUBDIR).join(NAME)
        );
    }

    #[tokio::test]
    async fn insensitive_move_finds_differently_cased_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(SUBDIR)).unwrap();
        // Capture group yields "Halt.And.Catch.Fire" (different case)
        let name = "Halt.And.Catch.Fire.S02E01.PROPER.HDTV.x264-KILLERS.mp4";
        let transfer = finished_transfer(dir.path(), name).await;

        let moved = mover(dir.path(), true, false)
            .on_finished(&transfer)
            .await
            .unwrap();

        assert!(moved);
        assert!(dir.path().join(SUBDIR).join(name).is_file());
    }

    #[tokio::test]
    async fn create_option_makes_the_target_directory() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = finished_transfer(dir.path(), NAME).await;

        let moved = mover(dir.path(), false, true)
            .on_finished(&transfer)
            .await
            .unwrap();

        assert!(moved);
        assert!(dir.path().join(SUBDIR).join(NAME).is_file());
    }

    #[tokio::test]
    async fn unmatched_name_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let transfer = finished_transfer(dir.path(), "notes.txt").await;

        let moved = mover(dir.path(), true, true)
            .on_finished(&transfer)
            .await
            .unwrap();

        assert!(!moved);
        assert!(dir.path().join("notes.txt").is_file());
    }
}
