pub mod types;

pub use types::{PrSummary, RcaResult};

use crate::store::{ChatEntry, Role};
use chrono::{Local, TimeZone};
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(result), fields(title = %result.pr_summary.title))]
pub fn output(result: &RcaResult, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(result);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(result, path)
        }
    }
}

/// Print the report with a coloured PR header:
///
/// PR: "Fix bug"
/// Author: Ann | https://bitbucket.org/ws/repo/pull-requests/1
///
/// ═══ Root Cause Analysis ═══
/// ...
fn print_terminal_report(result: &RcaResult) {
    let summary = &result.pr_summary;
    println!();
    println!("PR: \"{}\"", summary.title.bold());
    println!("Author: {} | {}", summary.author, summary.url.underline());
    println!();
    println!("{}", "═══ Root Cause Analysis ═══".cyan().bold());
    println!();
    println!("{}", result.report_markdown);
    println!();
}

fn write_markdown_report(result: &RcaResult, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, result.to_chat_message())?;
    Ok(())
}

/// Print stored conversation entries, oldest first.
pub fn print_history(entries: &[ChatEntry]) {
    if entries.is_empty() {
        println!("No conversation history.");
        return;
    }

    for entry in entries {
        let when = Local
            .timestamp_millis_opt(entry.timestamp)
            .single()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let label = match (entry.role, entry.is_error) {
            (_, true) => "error".red().bold(),
            (Role::User, false) => "you".blue().bold(),
            (Role::Assistant, false) => "rca".green().bold(),
        };
        println!("[{}] {}", when.dimmed(), label);
        println!("{}", entry.content);
        println!();
    }
}
