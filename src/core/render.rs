//! Renderer module
//!
//! Renders a RunReport to different output formats: jsonl, json, md, text

use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use crate::core::model::{CountMethod, RecordStatus, RunReport, TokenCount};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
    pub color: bool,
}

impl RenderConfig {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            pretty: false,
            color: false,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

/// Closing line of the jsonl stream
#[derive(Serialize)]
struct Summary<'a> {
    kind: &'static str,
    source: &'a str,
    scan_root: &'a str,
    collapsed: bool,
    matched_file_count: usize,
    processed_file_count: usize,
    failed_file_count: usize,
    token_count: &'a TokenCount,
    artifact_name: &'a str,
    warning_count: usize,
    generated_at: String,
}

/// Renderer for run reports
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a report to a string
    pub fn render(&self, report: &RunReport) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(report),
            OutputFormat::Json => self.render_json(report),
            OutputFormat::Markdown => self.render_markdown(report),
            OutputFormat::Text => report.combined_text.clone(),
        }
    }

    /// Render to a writer, newline-terminated unless there is nothing to print
    pub fn render_to<W: Write>(&self, report: &RunReport, mut writer: W) -> std::io::Result<()> {
        let output = self.render(report);
        writer.write_all(output.as_bytes())?;
        if !output.is_empty() && !output.ends_with('\n') {
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Option<String> {
        if self.config.pretty {
            serde_json::to_string_pretty(value).ok()
        } else {
            serde_json::to_string(value).ok()
        }
    }

    /// One line per record, then one summary line
    fn render_jsonl(&self, report: &RunReport) -> String {
        let summary = Summary {
            kind: "summary",
            source: &report.source,
            scan_root: &report.scan_root,
            collapsed: report.collapsed,
            matched_file_count: report.matched_file_count,
            processed_file_count: report.processed_file_count,
            failed_file_count: report.failed_file_count(),
            token_count: &report.token_count,
            artifact_name: &report.artifact_name,
            warning_count: report.warnings.len(),
            generated_at: report.generated_at.to_rfc3339(),
        };

        report
            .records
            .iter()
            .filter_map(|record| self.to_json(record))
            .chain(self.to_json(&summary))
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    fn render_json(&self, report: &RunReport) -> String {
        self.to_json(report).unwrap_or_else(|| "{}".to_string())
    }

    fn heading(&self, text: &str) -> String {
        if self.config.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn flag(&self, text: &str) -> String {
        if self.config.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    /// Human summary
    fn render_markdown(&self, report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&self.heading(&format!("# {}", report.source)));
        output.push_str("\n\n");

        let root_note = if report.collapsed { " (single folder)" } else { "" };
        output.push_str(&format!("- **Scan root**: `{}`{}\n", report.scan_root, root_note));
        output.push_str(&format!("- **Files matched**: {}\n", report.matched_file_count));
        output.push_str(&format!(
            "- **Files processed**: {}\n",
            report.processed_file_count
        ));
        if report.failed_file_count() > 0 {
            output.push_str(&self.flag(&format!(
                "- **Files failed**: {}",
                report.failed_file_count()
            )));
            output.push('\n');
        }

        let tc = &report.token_count;
        let method = match &tc.method {
            CountMethod::Exact { encoding } => encoding.clone(),
            CountMethod::Approximate => "approximate".to_string(),
            CountMethod::Unavailable => "unavailable".to_string(),
        };
        output.push_str(&format!(
            "- **Tokens**: {} ({}, {})\n",
            tc.tokens, tc.model, method
        ));
        if !report.combined_text.is_empty() {
            output.push_str(&format!("- **Artifact**: `{}`\n", report.artifact_name));
        }
        output.push('\n');

        if !report.records.is_empty() {
            output.push_str(&self.heading("## Files"));
            output.push_str("\n\n");
            for record in &report.records {
                match record.status {
                    RecordStatus::Ok => {
                        output.push_str(&format!("- `{}`", record.path));
                        if let Some(enc) = &record.encoding {
                            output.push_str(&format!(" ({})", enc));
                        }
                        if record.fallback {
                            output.push_str(" - latin-1 fallback");
                        } else if record.lossy {
                            output.push_str(" - lossy decode");
                        }
                        output.push('\n');
                    }
                    RecordStatus::Failed => {
                        let error = record.error.as_deref().unwrap_or("failed");
                        output.push_str(&self.flag(&format!("- `{}` {}", record.path, error)));
                        output.push('\n');
                    }
                }
            }
            output.push('\n');
        }

        if !report.warnings.is_empty() {
            output.push_str(&self.heading("## Warnings"));
            output.push_str("\n\n");
            for warning in &report.warnings {
                output.push_str(&format!("- {}\n", warning));
            }
            output.push('\n');
        }

        output
    }
}
