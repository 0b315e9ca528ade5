use std::sync::Arc;

use anyhow::Context;
use pr_police::{
    App, ChatNotifier, ChatPlatform, Config, ConfigError, GitHub, Mode, Notifier, SlackClient,
    WebhookNotifier,
    cli::usage,
    events::{self, EventsState},
    parse_args,
};
use tracing::info;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Teams when a webhook is configured, otherwise the Slack channels and groups.
fn scheduled_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier + Send + Sync>> {
    if let Some(url) = &config.teams_webhook {
        let notifier = WebhookNotifier::new(url, &config.slack.bot_name, config.request_timeout)?;
        return Ok(Arc::new(notifier));
    }

    let token = config
        .require_slack()
        .map_err(|_| ConfigError::Missing("MS_TEAMS_WEBHOOK"))?;
    let chat = Arc::new(SlackClient::new(token, &config.slack, config.request_timeout)?);
    Ok(Arc::new(ChatNotifier::from_config(chat, config)))
}

async fn run_bot(app: Arc<App>, config: &Config) -> anyhow::Result<()> {
    let token = config.require_slack()?;
    let chat: Arc<dyn ChatPlatform + Send + Sync> = Arc::new(SlackClient::new(
        token,
        &config.slack,
        config.request_timeout,
    )?);

    let notifier: Arc<dyn Notifier + Send + Sync> = match &config.teams_webhook {
        Some(url) => Arc::new(WebhookNotifier::new(
            url,
            &config.slack.bot_name,
            config.request_timeout,
        )?),
        None => Arc::new(ChatNotifier::from_config(Arc::clone(&chat), config)),
    };

    let scheduled = Arc::clone(&app);
    tokio::spawn(async move { scheduled.run_schedule(notifier.as_ref()).await });

    info!("{} is on patrol", config.slack.bot_name);
    events::serve(config.slack.events_addr, Arc::new(EventsState::new(app, chat))).await
}

fn load_app() -> anyhow::Result<(Arc<Config>, Arc<App>)> {
    let config = Arc::new(Config::from_env()?);
    let token = config.require_github()?;
    let forge = Arc::new(GitHub::with_token(token).context("Failed to create GitHub client")?);
    let app = Arc::new(App::new(Arc::clone(&config), forge));
    Ok((config, app))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mode = match parse_args(std::env::args()) {
        Ok(mode) => mode,
        Err(clap_err) => handle_clap_help_version(&clap_err),
    };

    match mode {
        Mode::Usage => {
            eprint!("{}", usage());
            std::process::exit(1);
        }
        Mode::Once => {
            let (_, app) = load_app()?;
            println!("{}", app.pull_request_report(None).await);
        }
        Mode::Serverless => {
            let (config, app) = load_app()?;
            let notifier = scheduled_notifier(&config)?;
            let failures = app.run_serverless(notifier.as_ref()).await;
            if !failures.is_empty() {
                anyhow::bail!("{} report deliveries failed", failures.len());
            }
        }
        Mode::Bot => {
            let (config, app) = load_app()?;
            run_bot(app, &config).await?;
        }
    }

    Ok(())
}
