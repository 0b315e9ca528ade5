use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Prefix GitHub puts in front of `owner/repo` in `repository_url` fields.
pub const API_REPOS_PREFIX: &str = "https://api.github.com/repos/";

/// Branch compared against when a repository has no base-branch override.
pub const DEFAULT_BASE_BRANCH: &str = "master";

/// Branch that is never reported as diverging.
pub const DEV_BRANCH: &str = "dev";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("repository must be in format 'owner/repo', got '{0}'")]
    InvalidFormat(String),
}

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(RepoError::InvalidFormat(format!("{owner}/{name}")));
        }
        Ok(Self { owner, name })
    }

    pub fn parse(repo: &str) -> Result<Self, RepoError> {
        let repo = repo.trim();
        match repo.split_once('/') {
            Some((owner, name)) => {
                Self::new(owner, name).map_err(|_| RepoError::InvalidFormat(repo.to_string()))
            }
            None => Err(RepoError::InvalidFormat(repo.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The exact `owner/repo` key used by the override maps.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Snapshot of an open pull request as listed by the hosting API.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub repository_url: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub author_login: String,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
}

impl PullRequest {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Repository in `owner/repo` form, derived from the API repository URL.
    pub fn repo_name(&self) -> &str {
        self.repository_url
            .strip_prefix(API_REPOS_PREFIX)
            .unwrap_or(&self.repository_url)
    }
}

/// How far a branch has moved past its repository's base branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchComparison {
    pub repo: String,
    pub branch: String,
    pub base_branch: String,
    pub ahead_by: u64,
}

impl BranchComparison {
    pub fn tree_url(&self) -> String {
        format!("https://github.com/{}/tree/{}", self.repo, self.branch)
    }
}

/// A branch as returned by the branch listing: name plus head commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub sha: String,
}

/// Result of polling the hosting API for pull requests.
///
/// `Unavailable` is the degraded value handed to the report builder when the
/// upstream call failed; the error itself has already been logged.
#[derive(Debug, Clone, PartialEq)]
pub enum PullRequests {
    Fetched(Vec<PullRequest>),
    Unavailable,
}

impl PullRequests {
    pub fn empty() -> Self {
        PullRequests::Fetched(Vec::new())
    }
}

/// Status bucket a whitelisted pull request is sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Blocked,
    NeedsReview,
    InProgress,
}

/// Read-only operations against the source-control host.
#[async_trait]
pub trait Forge {
    /// Lists open pull requests, optionally restricted server-side by label.
    async fn list_open_pull_requests(
        &self,
        repo: &Repo,
        labels: Option<&str>,
    ) -> Result<Vec<PullRequest>>;

    /// Returns the head commit SHA of `branch`.
    async fn branch_head(&self, repo: &Repo, branch: &str) -> Result<String>;

    async fn list_branches(&self, repo: &Repo) -> Result<Vec<Branch>>;

    /// Number of commits `head` has that `base` does not.
    async fn ahead_by(&self, repo: &Repo, base: &str, head: &str) -> Result<u64>;
}
