// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Line-delimited input lists (parameter names, target URLs)

use crate::errors::{FuzzError, FuzzResult};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Trimmed, non-empty, de-duplicated lines in first-seen order
pub fn parse_lines(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

/// Read a list file. Missing, unreadable or empty files are configuration errors.
pub async fn load_list(path: &Path, what: &str) -> FuzzResult<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        FuzzError::Configuration(format!(
            "cannot read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })?;

    let total = content.lines().filter(|l| !l.trim().is_empty()).count();
    let items = parse_lines(&content);
    if items.is_empty() {
        return Err(FuzzError::Configuration(format!(
            "{} file {} is empty",
            what,
            path.display()
        )));
    }

    if items.len() < total {
        debug!(
            "[Inputs] Dropped {} duplicate {} entries from {}",
            total - items.len(),
            what,
            path.display()
        );
    }
    Ok(items)
}

/// Load and sanity-check target URLs
pub async fn load_targets(path: &Path) -> FuzzResult<Vec<String>> {
    let targets = load_list(path, "URL").await?;
    for target in &targets {
        match url::Url::parse(target) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(u) => warn!("[Inputs] Unusual scheme '{}' in target {}", u.scheme(), target),
            Err(e) => {
                return Err(FuzzError::Configuration(format!(
                    "invalid target URL '{}': {}",
                    target, e
                )))
            }
        }
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_lines() {
        let content = "id\r\n\r\n  q  \nid\nuser[id]\n\n";
        assert_eq!(parse_lines(content), vec!["id", "q", "user[id]"]);
    }

    #[tokio::test]
    async fn test_load_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a\nb\r\na\n").unwrap();
        let items = load_list(file.path(), "parameter").await.unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_and_missing_files_are_configuration_errors() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            load_list(file.path(), "parameter").await,
            Err(FuzzError::Configuration(_))
        ));

        let missing = file.path().with_extension("nope");
        let err = load_list(&missing, "URL").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_load_targets_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com/search").unwrap();
        writeln!(file, "not a url").unwrap();
        assert!(load_targets(file.path()).await.is_err());
    }
}
