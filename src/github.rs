use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};

use crate::types::{Branch, Forge, PullRequest, Repo};

const PER_PAGE: u8 = 100;

// Upper bound on pages followed for a single listing.
const MAX_PAGES: u32 = 20;

/// Creates an authenticated GitHub client.
pub fn setup_github_client(token: &str) -> Result<Octocrab> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .context("Failed to create GitHub client")
}

/// [`Forge`] backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHub {
    octocrab: Octocrab,
}

impl GitHub {
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    pub fn with_token(token: &str) -> Result<Self> {
        Ok(Self::new(setup_github_client(token)?))
    }
}

#[derive(Debug, Serialize)]
struct IssueListParams<'a> {
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a str>,
    per_page: u8,
    page: u32,
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct RestUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RestLabel {
    name: String,
}

/// An entry of the issues listing. Pull requests are the entries that carry
/// a `pull_request` member.
#[derive(Debug, Deserialize)]
struct RestIssue {
    number: u64,
    title: String,
    html_url: String,
    repository_url: String,
    user: Option<RestUser>,
    #[serde(default)]
    assignees: Vec<RestUser>,
    #[serde(default)]
    labels: Vec<RestLabel>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RestCommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RestBranch {
    name: String,
    commit: RestCommitRef,
}

#[derive(Debug, Deserialize)]
struct RestComparison {
    ahead_by: u64,
}

fn convert_issue(issue: RestIssue) -> PullRequest {
    PullRequest {
        repository_url: issue.repository_url,
        number: issue.number,
        title: issue.title,
        url: issue.html_url,
        author_login: issue
            .user
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
        assignees: issue.assignees.into_iter().map(|u| u.login).collect(),
        labels: issue.labels.into_iter().map(|l| l.name).collect(),
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn list_open_pull_requests(
        &self,
        repo: &Repo,
        labels: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        let route = format!("/repos/{}/{}/issues", repo.owner(), repo.name());
        let mut prs = Vec::new();

        for page in 1..=MAX_PAGES {
            let params = IssueListParams {
                state: "open",
                labels,
                per_page: PER_PAGE,
                page,
            };
            let issues: Vec<RestIssue> = self
                .octocrab
                .get(&route, Some(&params))
                .await
                .with_context(|| format!("Failed to list open issues for {repo}"))?;

            let count = issues.len();
            prs.extend(
                issues
                    .into_iter()
                    .filter(|issue| issue.pull_request.is_some())
                    .map(convert_issue),
            );

            if count < PER_PAGE as usize {
                break;
            }
        }

        tracing::debug!("{repo}: {} open pull requests", prs.len());
        Ok(prs)
    }

    async fn branch_head(&self, repo: &Repo, branch: &str) -> Result<String> {
        let route = format!(
            "/repos/{}/{}/branches/{}",
            repo.owner(),
            repo.name(),
            urlencoding::encode(branch)
        );
        let branch: RestBranch = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .with_context(|| format!("Failed to get branch '{branch}' of {repo}"))?;
        Ok(branch.commit.sha)
    }

    async fn list_branches(&self, repo: &Repo) -> Result<Vec<Branch>> {
        let route = format!("/repos/{}/{}/branches", repo.owner(), repo.name());
        let mut branches = Vec::new();

        for page in 1..=MAX_PAGES {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<RestBranch> = self
                .octocrab
                .get(&route, Some(&params))
                .await
                .with_context(|| format!("Failed to list branches of {repo}"))?;

            let count = batch.len();
            branches.extend(batch.into_iter().map(|b| Branch {
                name: b.name,
                sha: b.commit.sha,
            }));

            if count < PER_PAGE as usize {
                break;
            }
        }

        Ok(branches)
    }

    async fn ahead_by(&self, repo: &Repo, base: &str, head: &str) -> Result<u64> {
        let route = format!(
            "/repos/{}/{}/compare/{}...{}",
            repo.owner(),
            repo.name(),
            base,
            head
        );
        let comparison: RestComparison = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .with_context(|| format!("Failed to compare {base}...{head} in {repo}"))?;
        Ok(comparison.ahead_by)
    }
}
