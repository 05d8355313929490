// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::errors::{FuzzError, FuzzResult};

/// Default marker prefix. Has no self-overlap, so markers cannot alias
/// each other unless one parameter name contains another.
pub const DEFAULT_MARKER_PREFIX: &str = "XSSFOUND123";

/// Builds per-parameter reflection markers and the query entries carrying them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCodec {
    prefix: String,
}

impl Default for MarkerCodec {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_MARKER_PREFIX.to_string(),
        }
    }
}

impl MarkerCodec {
    pub fn new(prefix: &str) -> FuzzResult<Self> {
        if prefix.is_empty() {
            return Err(FuzzError::Configuration(
                "marker prefix cannot be empty".to_string(),
            ));
        }

        if let Some(border) = self_overlap(prefix) {
            return Err(FuzzError::Configuration(format!(
                "marker prefix '{}' overlaps itself ('{}' is both a prefix and a suffix)",
                prefix, border
            )));
        }

        Ok(Self {
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn encode(&self, parameter: &str) -> String {
        format!("{}{}", self.prefix, parameter)
    }

    /// Literal substring search. Content is never parsed.
    pub fn matches(content: &str, marker: &str) -> bool {
        content.contains(marker)
    }

    pub fn is_reflected(&self, content: &str, parameter: &str) -> bool {
        Self::matches(content, &self.encode(parameter))
    }

    /// `name=marker` exactly as it appears in the query string
    pub fn entry(&self, parameter: &str) -> String {
        format!(
            "{}={}",
            urlencoding::encode(parameter),
            urlencoding::encode(&self.encode(parameter))
        )
    }

    /// Full test URL: base, then every entry, control parameter last
    pub fn build_url(&self, base_url: &str, params: &[String], control: Option<&str>) -> String {
        let entries: Vec<String> = params
            .iter()
            .map(|p| p.as_str())
            .chain(control)
            .map(|p| self.entry(p))
            .collect();

        if entries.is_empty() {
            return base_url.to_string();
        }

        format!("{}{}{}", base_url, query_separator(base_url), entries.join("&"))
    }

    /// Reject candidate names that contain the prefix; their markers could
    /// otherwise alias markers of unrelated parameters.
    pub fn validate_parameters(&self, params: &[String]) -> FuzzResult<()> {
        let offending: Vec<&str> = params
            .iter()
            .filter(|p| p.contains(&self.prefix))
            .map(|p| p.as_str())
            .collect();

        if offending.is_empty() {
            Ok(())
        } else {
            Err(FuzzError::Configuration(format!(
                "marker prefix '{}' occurs inside parameter names: {}",
                self.prefix,
                offending.join(", ")
            )))
        }
    }
}

pub fn query_separator(base_url: &str) -> char {
    if base_url.contains('?') {
        '&'
    } else {
        '?'
    }
}

/// Longest proper prefix of `s` that is also a suffix of it
fn self_overlap(s: &str) -> Option<&str> {
    (1..s.len())
        .rev()
        .filter(|&len| s.is_char_boundary(len) && s.is_char_boundary(s.len() - len))
        .find(|&len| s[..len] == s[s.len() - len..])
        .map(|len| &s[..len])
}
