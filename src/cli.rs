use clap::{CommandFactory, Parser};

#[derive(Parser, Debug, Default)]
#[command(
    name = "pr-police",
    version,
    about = "Reports open pull requests and unmerged branches to Slack or Microsoft Teams",
    after_help = "Without flags, runs the long-running bot: answers Slack mentions and direct \
                  messages, and broadcasts the report on the configured schedule."
)]
struct CliArgs {
    /// Run once and print the pull request report to stdout
    #[arg(long)]
    pub cli: bool,

    /// Fetch, build and push the scheduled reports once, then exit
    #[arg(long)]
    pub serverless: bool,

    #[arg(hide = true)]
    pub stray: Vec<String>,
}

/// How the process should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Once,
    Serverless,
    Bot,
    /// Unrecognised arguments: print usage and fail.
    Usage,
}

/// Parses command-line arguments into a run mode. Help and version requests
/// come back as `clap::Error`s for the caller to print.
pub fn parse_args<I, T>(args: I) -> Result<Mode, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    Ok(if cli.cli {
        Mode::Once
    } else if cli.serverless {
        Mode::Serverless
    } else if !cli.stray.is_empty() {
        Mode::Usage
    } else {
        Mode::Bot
    })
}

pub fn usage() -> String {
    CliArgs::command().render_help().to_string()
}
