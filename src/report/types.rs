use crate::pr::PrRecord;

/// The PR fields shown next to a generated report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSummary {
    pub title: String,
    pub author: String,
    pub url: String,
}

impl From<&PrRecord> for PrSummary {
    fn from(record: &PrRecord) -> Self {
        Self {
            title: record.title.clone(),
            author: record.author.clone(),
            url: record.url.clone(),
        }
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcaResult {
    /// Markdown report with surrounding whitespace trimmed
    pub report_markdown: String,
    pub pr_summary: PrSummary,
}

impl RcaResult {
    /// Report followed by a footer linking back to the PR, as stored in the
    /// conversation history.
    pub fn to_chat_message(&self) -> String {
        format!(
            "{}---\n\n**PR:** [{}]({})\n**Author:** {}\n\n",
            self.report_markdown, self.pr_summary.title, self.pr_summary.url, self.pr_summary.author
        )
    }
}
