//! The fetch → build → notify pipeline shared by every trigger.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::DeliveryError,
    fetch::{fetch_active_branches, fetch_pull_requests},
    notify::Notifier,
    report::ReportBuilder,
    schedule::Scheduler,
    types::{Forge, PullRequests},
};

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct App {
    config: Arc<Config>,
    forge: Arc<dyn Forge + Send + Sync>,
    reports: ReportBuilder,
}

impl App {
    pub fn new(config: Arc<Config>, forge: Arc<dyn Forge + Send + Sync>) -> Self {
        let reports = ReportBuilder::for_config(&config);
        Self::with_reports(config, forge, reports)
    }

    pub fn with_reports(
        config: Arc<Config>,
        forge: Arc<dyn Forge + Send + Sync>,
        reports: ReportBuilder,
    ) -> Self {
        Self {
            config,
            forge,
            reports,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn fetch_pull_requests(&self) -> PullRequests {
        fetch_pull_requests(self.forge.as_ref(), &self.config).await
    }

    /// Fetches open pull requests and renders them for the configured
    /// broadcast target, optionally scoped to one user.
    pub async fn pull_request_report(&self, scope_user: Option<&str>) -> String {
        let prs = self.fetch_pull_requests().await;
        self.reports.build(&prs, &[], scope_user)
    }

    /// Fetches branch divergence and renders it.
    pub async fn branch_report(&self) -> String {
        let branches = fetch_active_branches(self.forge.as_ref(), &self.config).await;
        self.reports.build(&PullRequests::empty(), &branches, None)
    }

    /// One serverless run: the pull request report, then the branch report,
    /// each delivered separately.
    pub async fn run_serverless<N>(&self, notifier: &N) -> Vec<DeliveryError>
    where
        N: Notifier + Sync + ?Sized,
    {
        let (branches, prs) = tokio::join!(
            fetch_active_branches(self.forge.as_ref(), &self.config),
            fetch_pull_requests(self.forge.as_ref(), &self.config)
        );

        let mut failures = notifier.notify(&self.reports.build(&prs, &[], None)).await;
        let branches_message = self.reports.build(&PullRequests::empty(), &branches, None);
        failures.extend(notifier.notify(&branches_message).await);
        failures
    }

    /// Sends the unscoped pull request report once and returns the failed
    /// deliveries.
    pub async fn broadcast<N>(&self, notifier: &N) -> Vec<DeliveryError>
    where
        N: Notifier + Sync + ?Sized,
    {
        let report = self.pull_request_report(None).await;
        let failures = notifier.notify(&report).await;
        if !failures.is_empty() {
            warn!("scheduled report missed {} destination(s)", failures.len());
        }
        failures
    }

    /// Broadcasts the unscoped pull request report whenever a configured
    /// slot comes due. Never returns.
    pub async fn run_schedule<N>(&self, notifier: &N)
    where
        N: Notifier + Sync + ?Sized,
    {
        let mut scheduler = Scheduler::new(
            self.config.schedule.clone(),
            chrono::Local::now().naive_local(),
        );
        let mut interval = tokio::time::interval(CHECK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let now = chrono::Local::now().naive_local();
            let due = scheduler.tick(now);
            if due.is_empty() {
                debug!("{} matches no scheduled slot", now.format("%A %H:%M"));
                continue;
            }

            info!("{}", now.format("%A %Y-%m-%d %-I:%M %p"));
            self.broadcast(notifier).await;
        }
    }
}
