use serde::Deserialize;

/// Author name used when Bitbucket omits `author.display_name`.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Description used when the PR has no description.
pub const NO_DESCRIPTION: &str = "No description provided";

/// Represents the parsed components of a Bitbucket PR URL.
/// Extracted by parse_pr_url() in pr/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrReference {
    pub workspace: String,
    pub repo_slug: String,
    /// Kept as the digit string captured from the URL.
    pub pr_id: String,
    /// The URL the reference was parsed from.
    pub url: String,
}

/// A pull request assembled from the metadata and diff endpoints.
/// Note: Not Deserialize — PrRecord is built from the API JSON response
/// (PullRequestResponse) plus the raw diff text.
#[derive(Debug, Clone)]
pub struct PrRecord {
    /// PR title
    pub title: String,
    /// PR description, or NO_DESCRIPTION
    pub description: String,
    /// Author's display name, or UNKNOWN_AUTHOR
    pub author: String,
    /// Raw `created_on` timestamp as returned by Bitbucket
    pub created: Option<String>,
    /// PR state (OPEN, MERGED, DECLINED, ...)
    pub state: Option<String>,
    pub source_branch: Option<String>,
    pub destination_branch: Option<String>,
    /// Unified diff text; empty when the PR has no changes
    pub diff: String,
    /// URL the record was fetched for
    pub url: String,
}

impl PrRecord {
    /// Merge the metadata response and the diff text into a normalized record.
    pub fn from_parts(details: PullRequestResponse, diff: String, url: &str) -> Self {
        let description = details
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let author = details
            .author
            .and_then(|a| a.display_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        PrRecord {
            title: details.title.unwrap_or_default(),
            description,
            author,
            created: details.created_on,
            state: details.state,
            source_branch: details.source.and_then(BranchEndpoint::into_name),
            destination_branch: details.destination.and_then(BranchEndpoint::into_name),
            diff,
            url: url.to_string(),
        }
    }
}

/// Subset of `GET /repositories/{ws}/{repo}/pullrequests/{id}` that we read.
/// Every field is optional; defaults are applied in PrRecord::from_parts.
#[derive(Debug, Default, Deserialize)]
pub struct PullRequestResponse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<Account>,
    pub created_on: Option<String>,
    pub state: Option<String>,
    pub source: Option<BranchEndpoint>,
    pub destination: Option<BranchEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Account {
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BranchEndpoint {
    pub branch: Option<Branch>,
}

impl BranchEndpoint {
    fn into_name(self) -> Option<String> {
        self.branch.and_then(|b| b.name)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Branch {
    pub name: Option<String>,
}
