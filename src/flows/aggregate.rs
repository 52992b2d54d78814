//! Content aggregation
//!
//! Reads every matched file in discovery order and joins them into one text,
//! each body preceded by a header naming its path relative to the scan root:
//!
//! ```text
//!
//! ========== File: src/a.py ==========
//!
//! x=1
//! ```
//!
//! A file that cannot be read contributes its header and an inline error
//! marker instead of a body. Nothing a single file does can stop the batch.

use std::path::Path;

use crate::core::file_reader::read_file_detected;
use crate::core::model::{AggregatedRecord, Aggregation, MatchedFile, Warning, WarningCode};
use crate::core::paths::make_relative;
use crate::core::progress::Observer;

const RULE: &str = "==========";

/// Header emitted before each file body
pub fn file_header(relative_path: &str) -> String {
    format!("\n{RULE} File: {relative_path} {RULE}\n\n")
}

/// Block emitted in place of header + body when a path is not under the scan root
fn path_error_block(name: &str, description: &str) -> String {
    format!("\n{RULE} Error processing path: {name} {RULE}\n[Error: {description}]\n")
}

/// Read and concatenate `files`, with paths relative to `scan_root`
pub fn aggregate(files: &[MatchedFile], scan_root: &Path, observer: &mut dyn Observer) -> Aggregation {
    let total = files.len();
    let mut agg = Aggregation {
        records: Vec::with_capacity(total),
        ..Default::default()
    };

    tracing::info!(total, "reading files");

    for (i, file) in files.iter().enumerate() {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.path.display().to_string());

        let relative = match make_relative(&file.path, scan_root) {
            Some(r) => r,
            None => {
                observer.on_progress(i + 1, total, &name);
                let description = format!(
                    "{} is not under {}",
                    file.path.display(),
                    scan_root.display()
                );
                let warning = Warning::new(
                    WarningCode::RelativePath,
                    format!("Error creating relative path: {}", description),
                )
                .with_path(name.clone());
                tracing::error!("{}", warning);
                observer.on_warning(&warning);
                agg.warnings.push(warning);
                agg.combined_text.push_str(&path_error_block(&name, &description));
                agg.records.push(AggregatedRecord::failure(name, description));
                continue;
            }
        };

        observer.on_progress(i + 1, total, &relative);
        agg.combined_text.push_str(&file_header(&relative));

        let read = read_file_detected(&file.path, &relative);
        for warning in &read.warnings {
            observer.on_warning(warning);
        }
        agg.warnings.extend(read.warnings.iter().cloned());

        match (read.content, read.error_marker) {
            (Some(content), _) => {
                agg.combined_text.push_str(&content);
                agg.combined_text.push('\n');
                agg.processed += 1;
                agg.records.push(
                    AggregatedRecord::success(
                        relative,
                        read.encoding.unwrap_or_default(),
                        read.lossy,
                        content,
                    )
                    .with_fallback(read.fallback),
                );
            }
            (None, marker) => {
                let marker = marker.unwrap_or_else(|| "[Error reading file]".to_string());
                agg.combined_text.push_str(&marker);
                agg.combined_text.push('\n');
                agg.records.push(AggregatedRecord::failure(relative, marker));
            }
        }
    }

    tracing::info!(
        processed = agg.processed,
        total,
        "finished reading files"
    );
    if agg.failed() > 0 {
        tracing::warn!(errors = agg.failed(), "encountered errors during file reading");
    }

    agg
}
