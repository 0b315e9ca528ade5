//! Polls the forge for open pull requests and diverging branches.

use std::{future::Future, time::Duration};

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::{FetchError, RepoBranchesError},
    types::{BranchComparison, DEV_BRANCH, Forge, PullRequest, PullRequests, Repo},
};

/// Bounds one forge call by `timeout`, turning failures into [`FetchError`].
async fn bounded<T, Fut>(
    operation: &'static str,
    repo: &Repo,
    timeout: Duration,
    call: Fut,
) -> Result<T, FetchError>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(FetchError::Upstream {
            operation,
            repo: repo.to_string(),
            source,
        }),
        Err(_) => Err(FetchError::Timeout {
            operation,
            repo: repo.to_string(),
            timeout,
        }),
    }
}

/// Lists open pull requests across every configured repository.
///
/// Any failing repository degrades the whole result to
/// [`PullRequests::Unavailable`]; the error is logged here and not returned.
pub async fn fetch_pull_requests<F>(forge: &F, config: &Config) -> PullRequests
where
    F: Forge + Sync + ?Sized,
{
    info!("Checking for pull requests…");

    let label_filter = config.label_filter.as_deref();
    let results = join_all(config.repos.iter().map(|repo| {
        bounded(
            "listing pull requests",
            repo,
            config.request_timeout,
            forge.list_open_pull_requests(repo, label_filter),
        )
    }))
    .await;

    let mut prs: Vec<PullRequest> = Vec::new();
    for result in results {
        match result {
            Ok(repo_prs) => prs.extend(repo_prs),
            Err(err) => {
                error!("{err}");
                return PullRequests::Unavailable;
            }
        }
    }

    PullRequests::Fetched(prs)
}

/// Compares every branch of `repo` against its base branch.
///
/// The base branch and `dev` are skipped. A branch whose comparison fails is
/// recorded as zero commits ahead; failing to resolve the base branch or to
/// list branches fails the whole repository.
pub async fn fetch_repo_branches<F>(
    forge: &F,
    config: &Config,
    repo: &Repo,
) -> Result<Vec<BranchComparison>, RepoBranchesError>
where
    F: Forge + Sync + ?Sized,
{
    let timeout = config.request_timeout;
    let base_branch = config.base_branch_for(repo);

    let base_sha = bounded(
        "getting base branch",
        repo,
        timeout,
        forge.branch_head(repo, &base_branch),
    )
    .await
    .map_err(|source| RepoBranchesError::BaseBranch {
        repo: repo.to_string(),
        base_branch: base_branch.clone(),
        source,
    })?;

    let base_ref = match config.compare_override_for(repo) {
        Some(alternate) => format!("{alternate}:{base_sha}"),
        None => base_sha,
    };

    let branches = bounded("listing branches", repo, timeout, forge.list_branches(repo))
        .await
        .map_err(|source| RepoBranchesError::Listing {
            repo: repo.to_string(),
            source,
        })?;

    let candidates: Vec<_> = branches
        .into_iter()
        .filter(|b| b.name != base_branch && b.name != DEV_BRANCH)
        .collect();

    let comparisons = join_all(candidates.iter().map(|branch| {
        let base_ref = base_ref.as_str();
        let base_branch = base_branch.as_str();
        async move {
            let ahead_by = match bounded(
                "comparing branches",
                repo,
                timeout,
                forge.ahead_by(repo, base_ref, &branch.sha),
            )
            .await
            {
                Ok(ahead_by) => ahead_by,
                Err(err) => {
                    warn!("error occurred while analyzing {repo}#{}: {err}", branch.name);
                    0
                }
            };
            BranchComparison {
                repo: repo.full_name(),
                branch: branch.name.clone(),
                base_branch: base_branch.to_string(),
                ahead_by,
            }
        }
    }))
    .await;

    Ok(comparisons)
}

/// Collects branch comparisons for every configured repository, in
/// configuration order. Repositories that fail as a whole are logged and
/// contribute nothing.
pub async fn fetch_active_branches<F>(forge: &F, config: &Config) -> Vec<BranchComparison>
where
    F: Forge + Sync + ?Sized,
{
    info!("fetching branches");

    let per_repo = join_all(
        config
            .repos
            .iter()
            .map(|repo| fetch_repo_branches(forge, config, repo)),
    )
    .await;

    let mut branches = Vec::new();
    for result in per_repo {
        match result {
            Ok(repo_branches) => branches.extend(repo_branches),
            Err(err) => error!("{err}"),
        }
    }

    info!("done fetching branches");
    branches
}
