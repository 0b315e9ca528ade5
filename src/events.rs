//! Interactive trigger: answers Slack Events API callbacks.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{app::App, markup::SlackMarkup, report::ReportBuilder, slack::ChatPlatform};

pub const USAGE: &str = "Hi! Mention me or send me a direct message:
• `help` shows this message
• `me` lists the pull requests assigned to you
• anything else lists every open pull request that needs attention";

/// What a chat message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Mine,
    Report,
}

/// Reads the request out of free text. `help` wins over `me`.
pub fn parse_command(text: &str) -> Command {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.contains(&"help") {
        Command::Help
    } else if words.iter().any(|w| matches!(*w, "me" | "my" | "mine")) {
        Command::Mine
    } else {
        Command::Report
    }
}

/// Body of an Events API request.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    UrlVerification {
        challenge: String,
        #[serde(default)]
        token: Option<String>,
    },
    EventCallback {
        #[serde(default)]
        token: Option<String>,
        event: MessageEvent,
    },
    #[serde(other)]
    Other,
}

impl Envelope {
    fn token(&self) -> Option<&str> {
        match self {
            Envelope::UrlVerification { token, .. } | Envelope::EventCallback { token, .. } => {
                token.as_deref()
            }
            Envelope::Other => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: Option<String>,
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

impl MessageEvent {
    pub fn is_direct_message(&self) -> bool {
        self.channel.as_deref().is_some_and(|c| c.starts_with('D'))
    }

    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }

    /// Mentions arrive as `app_mention`; direct messages as `message` in a
    /// `D…` channel. Anything a bot posted, including our own replies, is
    /// ignored.
    pub fn wants_reply(&self) -> bool {
        if self.is_from_bot() || self.channel.is_none() {
            return false;
        }
        match self.kind.as_str() {
            "app_mention" => true,
            "message" => self.is_direct_message() && self.subtype.is_none(),
            _ => false,
        }
    }
}

/// Replies are always rendered for Slack, whatever dialect the scheduled
/// broadcast uses.
pub struct EventsState {
    app: Arc<App>,
    chat: Arc<dyn ChatPlatform + Send + Sync>,
    reports: ReportBuilder,
    verification_token: Option<String>,
}

impl EventsState {
    pub fn new(app: Arc<App>, chat: Arc<dyn ChatPlatform + Send + Sync>) -> Self {
        let config = app.config();
        let reports = ReportBuilder::new(config.labels.clone(), Box::new(SlackMarkup));
        let verification_token = config.slack.verification_token.clone();
        Self {
            app,
            chat,
            reports,
            verification_token,
        }
    }

    fn accepts(&self, token: Option<&str>) -> bool {
        match &self.verification_token {
            Some(expected) => token == Some(expected.as_str()),
            None => true,
        }
    }

    /// Builds the reply text for one message.
    pub async fn reply_text(&self, event: &MessageEvent) -> String {
        match parse_command(&event.text) {
            Command::Help => USAGE.to_string(),
            Command::Report => self.report(None).await,
            Command::Mine => {
                let name = match event.user.as_deref() {
                    Some(user) => match self.chat.user_name(user).await {
                        Ok(name) => Some(name),
                        Err(err) => {
                            warn!("couldn't resolve user {user}: {err:#}");
                            None
                        }
                    },
                    None => None,
                };
                self.report(name.as_deref()).await
            }
        }
    }

    async fn report(&self, scope_user: Option<&str>) -> String {
        let prs = self.app.fetch_pull_requests().await;
        self.reports.build(&prs, &[], scope_user)
    }

    async fn reply(&self, event: MessageEvent) {
        let Some(channel) = event.channel.as_deref() else {
            return;
        };
        let text = self.reply_text(&event).await;
        if let Err(err) = self.chat.post_message(channel, &text).await {
            warn!("replying in {channel} failed: {err:#}");
        }
    }
}

async fn slack_events(
    State(state): State<Arc<EventsState>>,
    Json(envelope): Json<Envelope>,
) -> Response {
    if !state.accepts(envelope.token()) {
        warn!("rejected event with unexpected verification token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match envelope {
        Envelope::UrlVerification { challenge, .. } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        Envelope::EventCallback { event, .. } => {
            if event.wants_reply() {
                debug!("replying to {} in {:?}", event.kind, event.channel);
                // Slack expects an acknowledgement within three seconds, so
                // the reply is posted separately.
                let state = Arc::clone(&state);
                tokio::spawn(async move { state.reply(event).await });
            }
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}

pub fn router(state: Arc<EventsState>) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<EventsState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("listening for Slack events on http://{addr}/slack/events");
    axum::serve(listener, router(state))
        .await
        .context("Slack events server failed")
}
