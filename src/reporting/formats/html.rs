// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::types::RunReport;

/// One table row: labelled metadata next to a thumbnail
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotRow {
    pub fields: Vec<(String, String)>,
    /// Image path relative to the report file
    pub image: String,
}

pub struct HtmlReportGenerator;

impl HtmlReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, title: &str, rows: &[ScreenshotRow]) -> String {
        let body: String = rows.iter().map(|row| self.generate_row(row)).collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
  <style>
{css}
  </style>
</head>
<body>
  <h1>{title}</h1>
  <table>
    <tr><th>Data</th><th>Screenshot</th></tr>
{body}  </table>
</body>
</html>
"#,
            title = self.escape_html(title),
            css = self.get_css(),
            body = body
        )
    }

    /// Rows for every reflection screenshot of a fuzzing run
    pub fn rows_from_run(report: &RunReport) -> Vec<ScreenshotRow> {
        report
            .targets
            .iter()
            .flat_map(|target| {
                target.screenshots.iter().map(move |hit| ScreenshotRow {
                    fields: vec![
                        ("Target".to_string(), target.target.clone()),
                        ("URL".to_string(), hit.url.clone()),
                        ("Reflected".to_string(), hit.parameters.join(", ")),
                    ],
                    image: hit.image.clone(),
                })
            })
            .collect()
    }

    fn generate_row(&self, row: &ScreenshotRow) -> String {
        let meta = row
            .fields
            .iter()
            .map(|(label, value)| {
                format!(
                    "<strong>{}:</strong> {}",
                    self.escape_html(label),
                    self.escape_html(value)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let image = self.escape_html(&row.image);

        format!(
            r#"    <tr>
      <td class="meta">{meta}</td>
      <td class="image"><a href="{image}" target="_blank"><img src="{image}" alt="Screenshot"></a></td>
    </tr>
"#
        )
    }

    fn get_css(&self) -> &'static str {
        r#"    body { font-family: Arial, sans-serif; margin: 20px; }
    table { border-collapse: collapse; width: 100%; table-layout: fixed; }
    th, td { border: 1px solid #ccc; padding: 16px; vertical-align: top; word-wrap: break-word; }
    td.meta { font-family: monospace; font-size: 16px; text-align: left; white-space: pre-wrap; width: 60%; }
    td.meta strong { display: inline-block; width: 110px; color: #333; }
    td.image { text-align: center; vertical-align: middle; }
    img { max-width: 200px; border: 1px solid #ddd; border-radius: 4px; transition: transform 0.2s; }
    img:hover { transform: scale(1.5); }
    a { text-decoration: none; color: #0066cc; }"#
    }

    fn escape_html(&self, text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#x27;")
    }
}

impl Default for HtmlReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FuzzMode, ScreenshotHit, TargetReport};

    #[test]
    fn test_values_are_escaped() {
        let row = ScreenshotRow {
            fields: vec![(
                "Title".to_string(),
                "<script>alert('x')</script> & co".to_string(),
            )],
            image: "a\"b.png".to_string(),
        };
        let html = HtmlReportGenerator::new().generate("Report <1>", &[row]);

        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt; &amp; co"));
        assert!(html.contains("a&quot;b.png"));
        assert!(html.contains("<title>Report &lt;1&gt;</title>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_rows_from_run() {
        let mut target = TargetReport::new("http://t/");
        target.screenshots.push(ScreenshotHit {
            parameters: vec!["q".into(), "lang".into()],
            url: "http://t/?q=XSSFOUND123q".into(),
            image: "shot.png".into(),
        });
        let report = RunReport {
            mode: FuzzMode::Reflection,
            started_at: String::new(),
            finished_at: String::new(),
            parameters_loaded: 2,
            targets: vec![target, TargetReport::new("http://u/")],
        };

        let rows = HtmlReportGenerator::rows_from_run(&report);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].image, "shot.png");
        assert!(rows[0].fields.contains(&("Reflected".to_string(), "q, lang".to_string())));
    }
}
