//! Thin client for the few Slack Web API methods the bot uses.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SlackConfig;

const SLACK_API: &str = "https://slack.com/api";

/// Delivery and lookup operations on the chat platform.
#[async_trait]
pub trait ChatPlatform {
    /// Posts `text` to a channel, private group or DM conversation.
    async fn post_message(&self, channel: &str, text: &str) -> Result<()>;

    /// Resolves a platform user id to the user's handle.
    async fn user_name(&self, user_id: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    ok: bool,
    error: Option<String>,
    user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    name: String,
}

/// Slack returns HTTP 200 with `ok: false` for API-level failures.
fn check_ok(method: &str, ok: bool, error: Option<String>) -> Result<()> {
    if ok {
        Ok(())
    } else {
        anyhow::bail!(
            "Slack {} failed: {}",
            method,
            error.as_deref().unwrap_or("unknown error")
        )
    }
}

pub struct SlackClient {
    client: reqwest::Client,
    token: String,
    bot_name: String,
    bot_icon: Option<String>,
}

impl SlackClient {
    pub fn new(token: &str, config: &SlackConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create Slack HTTP client")?;
        Ok(Self {
            client,
            token: token.to_string(),
            bot_name: config.bot_name.clone(),
            bot_icon: config.bot_icon.clone(),
        })
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        debug!("posting {} bytes to {channel}", text.len());
        let body = PostMessage {
            channel,
            text,
            username: &self.bot_name,
            icon_url: self.bot_icon.as_deref(),
        };
        let response: ApiResponse = self
            .client
            .post(format!("{SLACK_API}/chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("Failed to reach Slack")?
            .error_for_status()?
            .json()
            .await
            .context("Invalid chat.postMessage response")?;
        check_ok("chat.postMessage", response.ok, response.error)
    }

    async fn user_name(&self, user_id: &str) -> Result<String> {
        let response: UserInfoResponse = self
            .client
            .get(format!("{SLACK_API}/users.info"))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await
            .context("Failed to reach Slack")?
            .error_for_status()?
            .json()
            .await
            .context("Invalid users.info response")?;
        check_ok("users.info", response.ok, response.error)?;
        response
            .user
            .map(|u| u.name)
            .with_context(|| format!("users.info returned no user for {user_id}"))
    }
}
