// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use super::marker::MarkerCodec;

/// Decides which members of a batch are independently reflected.
///
/// When `id` and `idx` share a batch, `XSSFOUND123idx` contains
/// `XSSFOUND123id`. A shorter parameter therefore only counts as reflected
/// when no longer member containing it has its own marker in the content.
#[derive(Debug, Clone, Default)]
pub struct ReflectionDetector {
    codec: MarkerCodec,
}

impl ReflectionDetector {
    pub fn new(codec: MarkerCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &MarkerCodec {
        &self.codec
    }

    /// `parameter` need not be a member of `batch` (the control parameter is not).
    pub fn reflected(&self, parameter: &str, batch: &[String], content: &str) -> bool {
        let members = batch.iter().map(|s| s.as_str());
        !self.shadowed(parameter, members, content) && self.codec.is_reflected(content, parameter)
    }

    /// Reflected members, in batch order
    pub fn reflected_parameters(&self, batch: &[String], content: &str) -> Vec<String> {
        self.reflected_parameters_with(batch, None, content)
    }

    /// Reflected members when `extra` is sent alongside the batch. `extra`
    /// shadows members it contains but is never reported itself.
    pub fn reflected_parameters_with(
        &self,
        batch: &[String],
        extra: Option<&str>,
        content: &str,
    ) -> Vec<String> {
        // Cheap pre-filter: nothing can be reflected without the prefix
        if !content.contains(self.codec.prefix()) {
            return Vec::new();
        }

        batch
            .iter()
            .filter(|p| {
                let sent = batch.iter().map(|s| s.as_str()).chain(extra);
                !self.shadowed(p, sent, content) && self.codec.is_reflected(content, p)
            })
            .cloned()
            .collect()
    }

    fn shadowed<'a>(
        &self,
        parameter: &str,
        sent: impl Iterator<Item = &'a str>,
        content: &str,
    ) -> bool {
        sent.filter(|other| other.len() > parameter.len() && other.contains(parameter))
            .any(|other| self.codec.is_reflected(content, other))
    }
}
