// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod artifacts;
pub mod formats;

pub use artifacts::ArtifactStore;
pub use formats::html::{HtmlReportGenerator, ScreenshotRow};
pub use formats::json::JsonReportGenerator;
