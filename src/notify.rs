//! Delivers rendered reports to their destinations.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::{
    config::Config,
    error::DeliveryError,
    slack::ChatPlatform,
};

/// Sends report text somewhere. Every destination is attempted; failures are
/// logged and returned, never retried.
#[async_trait]
pub trait Notifier {
    async fn notify(&self, text: &str) -> Vec<DeliveryError>;
}

/// A broadcast target on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Channel(String),
    Group(String),
}

impl Destination {
    pub fn id(&self) -> &str {
        match self {
            Destination::Channel(id) | Destination::Group(id) => id,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Channel(id) => write!(f, "channel {id}"),
            Destination::Group(id) => write!(f, "group {id}"),
        }
    }
}

/// Broadcasts to the configured chat channels and groups.
pub struct ChatNotifier<C: ?Sized> {
    chat: Arc<C>,
    destinations: Vec<Destination>,
}

impl<C: ChatPlatform + Send + Sync + ?Sized> ChatNotifier<C> {
    pub fn new(chat: Arc<C>, destinations: Vec<Destination>) -> Self {
        Self { chat, destinations }
    }

    pub fn from_config(chat: Arc<C>, config: &Config) -> Self {
        let destinations = config
            .slack
            .channels
            .iter()
            .cloned()
            .map(Destination::Channel)
            .chain(config.slack.groups.iter().cloned().map(Destination::Group))
            .collect();
        Self::new(chat, destinations)
    }
}

#[async_trait]
impl<C: ChatPlatform + Send + Sync + ?Sized> Notifier for ChatNotifier<C> {
    async fn notify(&self, text: &str) -> Vec<DeliveryError> {
        let mut failures = Vec::new();
        for destination in &self.destinations {
            match self.chat.post_message(destination.id(), text).await {
                Ok(()) => info!("report posted to {destination}"),
                Err(source) => {
                    let err = DeliveryError::Chat {
                        destination: destination.to_string(),
                        source,
                    };
                    warn!("{err}");
                    failures.push(err);
                }
            }
        }
        failures
    }
}

/// Wraps report text in the MessageCard envelope Teams incoming webhooks
/// accept.
pub fn message_card(bot_name: &str, text: &str, date: NaiveDate) -> serde_json::Value {
    serde_json::json!({
        "@context": "https://schema.org/extensions",
        "@type": "MessageCard",
        "themeColor": "0072C6",
        "title": format!("{} report for {}", bot_name, date.format("%Y-%m-%d")),
        "text": text.replace('_', "\\_"),
        "potentialAction": [],
    })
}

/// Pushes reports to a Teams incoming webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    bot_name: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, bot_name: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            bot_name: bot_name.to_string(),
        })
    }

    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let card = message_card(&self.bot_name, text, chrono::Local::now().date_naive());
        let response = self.client.post(&self.url).json(&card).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status { status });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Vec<DeliveryError> {
        info!("sending message to MS Teams");
        match self.send(text).await {
            Ok(()) => Vec::new(),
            Err(err) => {
                warn!("{err}");
                vec![err]
            }
        }
    }
}
