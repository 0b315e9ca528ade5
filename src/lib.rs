//! pr-police: reports open pull requests and unmerged branches.
//!
//! Polls GitHub for the open pull requests and active branches of a set of
//! repositories, sorts pull requests into status buckets, renders a report
//! for Slack or Microsoft Teams and delivers it on a schedule, on demand in
//! chat, or once from the command line.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod github;
pub mod markup;
pub mod notify;
pub mod report;
pub mod schedule;
pub mod slack;
pub mod types;

pub use app::App;
pub use cli::{Mode, parse_args};
pub use config::Config;
pub use error::{ConfigError, DeliveryError, FetchError, RepoBranchesError};
pub use github::GitHub;
pub use markup::{Markup, SlackMarkup, TeamsMarkup};
pub use notify::{ChatNotifier, Notifier, WebhookNotifier};
pub use report::ReportBuilder;
pub use slack::{ChatPlatform, SlackClient};
pub use types::{BranchComparison, Forge, PullRequest, PullRequests, Repo, RepoError};
