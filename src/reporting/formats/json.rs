// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::types::RunReport;
use anyhow::{Context, Result};
use std::path::Path;

pub struct JsonReportGenerator;

impl JsonReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, report: &RunReport) -> Result<Vec<u8>> {
        let json = serde_json::to_string_pretty(report)?;
        Ok(json.into_bytes())
    }

    pub async fn write(&self, report: &RunReport, path: &Path) -> Result<()> {
        let bytes = self.generate(report)?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}

impl Default for JsonReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}
