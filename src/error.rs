//! Error taxonomy shared by the fetcher, notifiers and configuration loader.

use std::time::Duration;

/// An upstream hosting-API call failed or did not answer in time.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{operation} for {repo} failed: {source:#}")]
    Upstream {
        operation: &'static str,
        repo: String,
        source: anyhow::Error,
    },

    #[error("{operation} for {repo} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        repo: String,
        timeout: Duration,
    },
}

/// Branch divergence could not be computed for a repository at all.
#[derive(Debug, thiserror::Error)]
pub enum RepoBranchesError {
    #[error("couldn't find commit in {base_branch} in {repo}: {source}")]
    BaseBranch {
        repo: String,
        base_branch: String,
        source: FetchError,
    },

    #[error("couldn't list branches of {repo}: {source}")]
    Listing { repo: String, source: FetchError },
}

/// Delivery to one destination failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("posting to {destination} failed: {source:#}")]
    Chat {
        destination: String,
        source: anyhow::Error,
    },

    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook returned HTTP {status}")]
    Status { status: reqwest::StatusCode },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("{key}: invalid repository '{value}' (expected owner/repo)")]
    InvalidRepo { key: &'static str, value: String },

    #[error("{key}: invalid override '{value}' (expected repo:value)")]
    InvalidOverride { key: &'static str, value: String },

    #[error("DAYS_TO_RUN: unknown weekday '{0}'")]
    InvalidDay(String),

    #[error("TIMES_TO_RUN: invalid time '{0}' (expected HMM or HHMM)")]
    InvalidTime(String),

    #[error("{key}: invalid number '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key}: invalid URL '{value}'")]
    InvalidUrl { key: &'static str, value: String },

    #[error("{key}: invalid socket address '{value}'")]
    InvalidAddress { key: &'static str, value: String },
}
