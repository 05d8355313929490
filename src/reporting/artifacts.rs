// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! On-disk layout for run artifacts:
//!
//! ```text
//! <root>/screenshots/*.png
//! <root>/screenshots/index.html
//! <root>/responses/*.html
//! ```

use crate::errors::{FuzzError, FuzzResult};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps generated file names well under common filesystem limits
const MAX_STEM_LEN: usize = 150;

pub const SCREENSHOT_INDEX: &str = "index.html";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub fn responses_dir(&self) -> PathBuf {
        self.root.join("responses")
    }

    /// Create the directories the enabled features write into
    pub async fn prepare(&self, screenshots: bool, responses: bool) -> FuzzResult<()> {
        let mut dirs = Vec::new();
        if screenshots {
            dirs.push(self.screenshots_dir());
        }
        if responses {
            dirs.push(self.responses_dir());
        }

        for dir in dirs {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| FuzzError::io(&dir, e))?;
            debug!("[Artifacts] Using {}", dir.display());
        }
        Ok(())
    }

    pub fn screenshot_path(&self, seed: &str) -> PathBuf {
        self.screenshots_dir().join(format!("{}.png", file_stem(seed)))
    }

    pub fn screenshot_index_path(&self) -> PathBuf {
        self.screenshots_dir().join(SCREENSHOT_INDEX)
    }

    pub async fn save_response(&self, seed: &str, content: &str) -> FuzzResult<PathBuf> {
        let path = self.responses_dir().join(format!("{}.html", file_stem(seed)));
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| FuzzError::io(&path, e))?;
        Ok(path)
    }

    pub async fn write_screenshot_index(&self, html: &str) -> FuzzResult<PathBuf> {
        let path = self.screenshot_index_path();
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| FuzzError::io(&path, e))?;
        Ok(path)
    }
}

/// Lowercase, non-alphanumerics replaced by `_`, length-capped.
/// Over-long seeds keep a hash of the full seed so distinct seeds never
/// share a stem.
pub fn file_stem(seed: &str) -> String {
    let stem: String = seed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if stem.len() <= MAX_STEM_LEN {
        return stem;
    }

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let digest = format!("{:016x}", hasher.finish());
    // Keep the tail too, it carries the batch and pass numbers
    let tail_len = 24;
    let head_len = MAX_STEM_LEN - digest.len() - tail_len - 2;
    format!(
        "{}_{}_{}",
        &stem[..head_len],
        &stem[stem.len() - tail_len..],
        digest
    )
}
