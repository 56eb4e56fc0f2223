pub mod diff;
pub mod types;

pub use types::{PrRecord, PrReference};

use regex::Regex;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, instrument};

use types::PullRequestResponse;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Bitbucket API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid Bitbucket PR URL: {0}")]
    InvalidUrl(String),

    #[error(
        "Failed to fetch {resource}: {status}. This might be a private repository. \
         Please configure your Atlassian email and API token with `bitbucket-rca config set-bitbucket`."
    )]
    PrivateRepoCredentialsNeeded { resource: PrResource, status: u16 },

    #[error("Failed to fetch {resource}: {status} {body}")]
    FetchFailed {
        resource: PrResource,
        status: u16,
        body: String,
    },
}

/// Which of the two PR endpoints a request targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrResource {
    Details,
    Diff,
}

impl fmt::Display for PrResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrResource::Details => write!(f, "PR details"),
            PrResource::Diff => write!(f, "PR diff"),
        }
    }
}

fn pr_url_regex() -> &'static Regex {
    static PR_URL: OnceLock<Regex> = OnceLock::new();
    PR_URL.get_or_init(|| {
        Regex::new(r"^https?://bitbucket\.org/([^/]+)/([^/]+)/pull-requests/([0-9]+)")
            .expect("PR URL pattern is valid")
    })
}

/// Parse a Bitbucket PR URL into its component parts.
///
/// Expected format: https://bitbucket.org/{workspace}/{repo}/pull-requests/{id}
/// The match is anchored at the start only, so trailing segments such as
/// `/diff` or `/overview` are accepted. Returns None for anything else.
pub fn parse_pr_url(url: &str) -> Option<PrReference> {
    let caps = pr_url_regex().captures(url)?;
    Some(PrReference {
        workspace: caps[1].to_string(),
        repo_slug: caps[2].to_string(),
        pr_id: caps[3].to_string(),
        url: url.to_string(),
    })
}

pub fn is_valid_pr_url(url: &str) -> bool {
    pr_url_regex().is_match(url)
}

/// Basic-auth pair, present only when both halves are non-empty.
fn basic_auth_pair<'a>(
    email: Option<&'a str>,
    token: Option<&'a str>,
) -> Option<(&'a str, &'a str)> {
    match (email, token) {
        (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
            Some((email, token))
        }
        _ => None,
    }
}

/// Client for the Bitbucket Cloud 2.0 REST API.
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: reqwest::Client,
    api_base: String,
}

impl BitbucketClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }

    /// Fetch PR metadata and diff concurrently and merge them into a PrRecord.
    ///
    /// Credentials are attached as basic auth only when both email and token
    /// are given. If either request fails the whole fetch fails with that error.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_pr_data(
        &self,
        url: &str,
        email: Option<&str>,
        token: Option<&str>,
    ) -> Result<PrRecord, PrError> {
        let reference = parse_pr_url(url).ok_or_else(|| PrError::InvalidUrl(url.to_string()))?;
        debug!(
            workspace = %reference.workspace,
            repo = %reference.repo_slug,
            pr = %reference.pr_id,
            "parsed PR URL"
        );

        let auth = basic_auth_pair(email, token);
        debug!(authenticated = auth.is_some(), "fetching PR details and diff");
        let (details, diff) = tokio::try_join!(
            self.fetch_details(&reference, auth),
            self.fetch_diff(&reference, auth),
        )?;
        debug!(diff_bytes = diff.len(), "received PR details and diff");

        Ok(PrRecord::from_parts(details, diff, &reference.url))
    }

    fn pull_request_endpoint(&self, reference: &PrReference) -> String {
        format!(
            "{}/repositories/{}/{}/pullrequests/{}",
            self.api_base.trim_end_matches('/'),
            reference.workspace,
            reference.repo_slug,
            reference.pr_id
        )
    }

    async fn fetch_details(
        &self,
        reference: &PrReference,
        auth: Option<(&str, &str)>,
    ) -> Result<PullRequestResponse, PrError> {
        let endpoint = self.pull_request_endpoint(reference);
        let response = self
            .get(&endpoint, "application/json", auth, PrResource::Details)
            .await?;
        Ok(response.json::<PullRequestResponse>().await?)
    }

    async fn fetch_diff(
        &self,
        reference: &PrReference,
        auth: Option<(&str, &str)>,
    ) -> Result<String, PrError> {
        let endpoint = format!("{}/diff", self.pull_request_endpoint(reference));
        let response = self.get(&endpoint, "text/plain", auth, PrResource::Diff).await?;
        Ok(response.text().await?)
    }

    async fn get(
        &self,
        endpoint: &str,
        accept: &str,
        auth: Option<(&str, &str)>,
        resource: PrResource,
    ) -> Result<reqwest::Response, PrError> {
        let mut request = self.http.get(endpoint).header(ACCEPT, accept);
        if let Some((email, token)) = auth {
            request = request.basic_auth(email, Some(token));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(text) => text,
            Err(_) => status.canonical_reason().unwrap_or_default().to_string(),
        };
        debug!(%resource, status = status.as_u16(), "Bitbucket request failed");

        let unauthorized = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
        if unauthorized && auth.is_none() {
            return Err(PrError::PrivateRepoCredentialsNeeded {
                resource,
                status: status.as_u16(),
            });
        }

        Err(PrError::FetchFailed {
            resource,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PR_URL: &str = "https://bitbucket.org/teamA/repoB/pull-requests/42";
    const DETAILS_PATH: &str = "/repositories/teamA/repoB/pullrequests/42";
    const DIFF_PATH: &str = "/repositories/teamA/repoB/pullrequests/42/diff";

    fn client_for(server: &MockServer) -> BitbucketClient {
        BitbucketClient::new(reqwest::Client::new(), server.uri())
    }

    async fn mount_diff(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(DIFF_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_details(server: &MockServer, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(DETAILS_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_valid_pr_url() {
        let reference = parse_pr_url(PR_URL).unwrap();
        assert_eq!(reference.workspace, "teamA");
        assert_eq!(reference.repo_slug, "repoB");
        assert_eq!(reference.pr_id, "42");
        assert_eq!(reference.url, PR_URL);
        assert!(is_valid_pr_url(PR_URL));
    }

    #[test]
    fn test_parse_accepts_http_and_trailing_segments() {
        let reference = parse_pr_url("http://bitbucket.org/ws/repo/pull-requests/7/diff").unwrap();
        assert_eq!(reference.pr_id, "7");
        assert!(is_valid_pr_url("https://bitbucket.org/ws/repo/pull-requests/7/overview"));
    }

    #[test]
    fn test_parse_invalid_pr_url() {
        let invalid = [
            "",
            "not-a-url",
            "https://example.com",
            "https://github.com/org/repo/pull/42",
            "https://bitbucket.org/ws/repo/pull-requests/abc",
            "https://bitbucket.org/ws/pull-requests/42",
            "ftp://bitbucket.org/ws/repo/pull-requests/42",
            " https://bitbucket.org/ws/repo/pull-requests/42",
            "https://bitbucket.org/ws/repo/pull-requests/٤٢",
        ];
        for url in invalid {
            assert!(parse_pr_url(url).is_none(), "{url} should not parse");
            assert!(!is_valid_pr_url(url), "{url} should not be valid");
        }
    }

    #[test]
    fn test_basic_auth_requires_both_halves() {
        assert_eq!(basic_auth_pair(Some("a"), Some("b")), Some(("a", "b")));
        assert_eq!(basic_auth_pair(Some("a"), None), None);
        assert_eq!(basic_auth_pair(None, Some("b")), None);
        assert_eq!(basic_auth_pair(Some(""), Some("b")), None);
    }

    #[tokio::test]
    async fn test_fetch_merges_details_and_diff() {
        let server = MockServer::start().await;
        mount_details(
            &server,
            200,
            serde_json::json!({
                "title": "Fix bug",
                "author": { "display_name": "Ann" },
                "created_on": "2024-05-01T10:00:00+00:00",
                "state": "OPEN",
                "source": { "branch": { "name": "fix" } },
                "destination": { "branch": { "name": "main" } }
            }),
        )
        .await;
        mount_diff(&server, 200, "diff --git a/a.rs b/a.rs\n").await;

        let record = client_for(&server).fetch_pr_data(PR_URL, None, None).await.unwrap();
        assert_eq!(record.title, "Fix bug");
        assert_eq!(record.author, "Ann");
        assert_eq!(record.description, types::NO_DESCRIPTION);
        assert_eq!(record.source_branch.as_deref(), Some("fix"));
        assert_eq!(record.diff, "diff --git a/a.rs b/a.rs\n");
        assert_eq!(record.url, PR_URL);
    }

    #[tokio::test]
    async fn test_fetch_sends_basic_auth_when_credentials_present() {
        let server = MockServer::start().await;
        let expected = "Basic YW5uQGV4YW1wbGUuY29tOmFwcC10b2tlbg==";
        Mock::given(method("GET"))
            .and(path(DETAILS_PATH))
            .and(header("authorization", expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"title": "t"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DIFF_PATH))
            .and(header("authorization", expected))
            .and(header("accept", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let record = client_for(&server)
            .fetch_pr_data(PR_URL, Some("ann@example.com"), Some("app-token"))
            .await
            .unwrap();
        assert_eq!(record.title, "t");
        assert!(record.diff.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_without_credentials_is_private_repo() {
        let server = MockServer::start().await;
        mount_details(&server, 401, serde_json::json!({"type": "error"})).await;
        mount_diff(&server, 401, "unauthorized").await;

        let err = client_for(&server)
            .fetch_pr_data(PR_URL, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PrError::PrivateRepoCredentialsNeeded { status: 401, .. }
        ));
        assert!(err.to_string().contains("private repository"));
    }

    #[tokio::test]
    async fn test_forbidden_with_partial_credentials_is_private_repo() {
        let server = MockServer::start().await;
        mount_details(&server, 403, serde_json::json!({})).await;
        mount_diff(&server, 403, "forbidden").await;

        let err = client_for(&server)
            .fetch_pr_data(PR_URL, Some("ann@example.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PrError::PrivateRepoCredentialsNeeded { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_with_credentials_is_fetch_failed() {
        let server = MockServer::start().await;
        mount_details(&server, 401, serde_json::json!({})).await;
        mount_diff(&server, 401, "bad token").await;

        let err = client_for(&server)
            .fetch_pr_data(PR_URL, Some("ann@example.com"), Some("app-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrError::FetchFailed { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_diff_failure_fails_whole_fetch() {
        let server = MockServer::start().await;
        mount_details(&server, 200, serde_json::json!({"title": "ok"})).await;
        mount_diff(&server, 500, "boom").await;

        let err = client_for(&server)
            .fetch_pr_data(PR_URL, None, None)
            .await
            .unwrap_err();
        match err {
            PrError::FetchFailed {
                resource,
                status,
                body,
            } => {
                assert_eq!(resource, PrResource::Diff);
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_url_issues_no_request() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .fetch_pr_data("https://example.com/nope", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PrError::InvalidUrl(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
