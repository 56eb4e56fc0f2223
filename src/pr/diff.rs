use regex::Regex;
use std::sync::OnceLock;

const FILE_HEADER_PREFIX: &str = "diff --git";

fn file_header_regex() -> &'static Regex {
    static FILE_HEADER: OnceLock<Regex> = OnceLock::new();
    FILE_HEADER.get_or_init(|| {
        Regex::new(r"diff --git a/(.+) b/([^\r\n]+)").expect("file header pattern is valid")
    })
}

/// Extract the changed file paths from a unified diff.
///
/// Each file section starts with:
///   diff --git a/{path} b/{path}
///
/// The `b/` (post-change) path is collected for every header, in the order
/// the headers appear. Repeated paths are kept.
pub fn extract_changed_files(raw_diff: &str) -> Vec<String> {
    raw_diff
        .split('\n')
        .filter(|line| line.starts_with(FILE_HEADER_PREFIX))
        .filter_map(|line| file_header_regex().captures(line))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().to_string()))
        .collect()
}
