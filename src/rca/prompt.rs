use chrono::{DateTime, Local};

use crate::pr::diff::extract_changed_files;
use crate::pr::PrRecord;

/// Diff budget in characters.
pub const MAX_DIFF_CHARS: usize = 8000;

pub const TRUNCATION_MARKER: &str = "\n\n... (diff truncated for length)";

const NO_FILES_CHANGED: &str = "No files changed";

const CREATED_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Each placeholder is substituted once, at its first occurrence.
pub const RCA_PROMPT_TEMPLATE: &str = r#"Read the code changes below and rewrite the content under each section in clear, simple language that non-technical users can understand.

STRICT RULES:
- Do NOT change, rename, reorder, or remove any section headers.
- Keep the exact output structure and section order.
- Only rewrite the content under each header.
- Do NOT add new sections or extra explanations.
- Keep all existing information, but make it more human-readable.
- Be concise and clear.

Pull Request: {{title}}
Author: {{author}}
Created: {{created}}
Link: {{fix_url}}

Description:
{{description}}

---
**Bug Summary**
Explain the issue or feature in simple, non-technical terms.

**Root Cause Analysis**
Explain why the issue occurred or why the change was required, in plain language.

**Fix Description**
Explain what was changed to resolve the issue or add the feature, simply and clearly.

**Files Changed**
{{files}}

**Testing Details**
Explain how the change was verified or tested, in easy-to-understand terms.

**Impact on Related Areas**
Mention any other areas that could be affected by this change, if applicable.

**End-User Impact**
Explain how this change improves the user experience or behavior.

**Code Changes:**
{{diff}}
"#;

/// Fill the RCA template from a fetched PR.
pub fn build_prompt(record: &PrRecord, source_url: &str) -> String {
    let files = extract_changed_files(&record.diff);
    let files_text = if files.is_empty() {
        NO_FILES_CHANGED.to_string()
    } else {
        files
            .iter()
            .map(|file| format!("- {file}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    RCA_PROMPT_TEMPLATE
        .replacen("{{title}}", &record.title, 1)
        .replacen("{{description}}", &record.description, 1)
        .replacen("{{author}}", &record.author, 1)
        .replacen("{{created}}", &format_created(record.created.as_deref()), 1)
        .replacen("{{files}}", &files_text, 1)
        .replacen("{{diff}}", &truncate(&record.diff, MAX_DIFF_CHARS), 1)
        .replacen("{{fix_url}}", source_url, 1)
}

/// Cut `text` to `max_chars` characters and append TRUNCATION_MARKER.
/// Text that already fits is returned unchanged. The cut ignores line
/// boundaries.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Render Bitbucket's `created_on` in the local time zone.
fn format_created(created: Option<&str>) -> String {
    match created {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Local).format(CREATED_FORMAT).to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => "Unknown".to_string(),
    }
}
