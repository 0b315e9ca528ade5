//! Process-wide configuration, read once at startup from environment-style
//! key/value pairs and passed explicitly to every component.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use chrono::{NaiveTime, Weekday};

use crate::{error::ConfigError, types::Repo};

const DEFAULT_BOT_NAME: &str = "Pr. Police";
const DEFAULT_DAYS_TO_RUN: &str = "Monday,Tuesday,Wednesday,Thursday,Friday";
const DEFAULT_TIMES_TO_RUN: &str = "900";
const DEFAULT_EVENTS_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Label policy used by the report builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelConfig {
    pub excluded: Vec<String>,
    pub blocked: Option<String>,
    pub wip: Option<String>,
}

impl LabelConfig {
    pub fn is_excluded(&self, label: &str) -> bool {
        self.excluded.iter().any(|l| l == label)
    }
}

/// Days and times at which the scheduled report is broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub days: Vec<Weekday>,
    pub times: Vec<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlackConfig {
    pub token: Option<String>,
    pub bot_name: String,
    pub bot_icon: Option<String>,
    pub channels: Vec<String>,
    pub groups: Vec<String>,
    pub verification_token: Option<String>,
    pub events_addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub github_token: Option<String>,
    pub repos: Vec<Repo>,
    pub label_filter: Option<String>,
    pub labels: LabelConfig,
    pub base_branch_overrides: HashMap<String, String>,
    pub compare_branch_overrides: HashMap<String, String>,
    pub request_timeout: Duration,
    pub schedule: ScheduleConfig,
    pub slack: SlackConfig,
    pub teams_webhook: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment, reading a `.env`
    /// file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let repos = split_list(get("GH_REPOS").as_deref())
            .into_iter()
            .map(|r| {
                Repo::parse(&r).map_err(|_| ConfigError::InvalidRepo {
                    key: "GH_REPOS",
                    value: r,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request_timeout = match get("GH_REQUEST_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(value.trim().parse().map_err(|_| {
                ConfigError::InvalidNumber {
                    key: "GH_REQUEST_TIMEOUT_SECS",
                    value: value.clone(),
                }
            })?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let events_addr_raw = get("SLACK_EVENTS_ADDR").unwrap_or_else(|| DEFAULT_EVENTS_ADDR.into());
        let events_addr: SocketAddr =
            events_addr_raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAddress {
                    key: "SLACK_EVENTS_ADDR",
                    value: events_addr_raw.clone(),
                })?;

        let teams_webhook = get("MS_TEAMS_WEBHOOK")
            .map(|raw| {
                url::Url::parse(raw.trim())
                    .map(|_| raw.trim().to_string())
                    .map_err(|_| ConfigError::InvalidUrl {
                        key: "MS_TEAMS_WEBHOOK",
                        value: raw.clone(),
                    })
            })
            .transpose()?;

        Ok(Config {
            github_token: get("GH_TOKEN").or_else(|| get("GITHUB_TOKEN")),
            repos,
            label_filter: get("GH_LABELS"),
            labels: LabelConfig {
                excluded: split_list(get("GH_EXCLUDE_LABELS").as_deref()),
                blocked: get("GH_BLOCKED_LABEL"),
                wip: get("GH_WIP_LABEL"),
            },
            base_branch_overrides: parse_overrides(
                "BASE_BRANCH_OVERRIDES",
                get("BASE_BRANCH_OVERRIDES").as_deref(),
            )?,
            compare_branch_overrides: parse_overrides(
                "COMPARE_BRANCH_OVERRIDES",
                get("COMPARE_BRANCH_OVERRIDES").as_deref(),
            )?,
            request_timeout,
            schedule: ScheduleConfig {
                days: parse_days(&get("DAYS_TO_RUN").unwrap_or_else(|| DEFAULT_DAYS_TO_RUN.into()))?,
                times: parse_times(
                    &get("TIMES_TO_RUN").unwrap_or_else(|| DEFAULT_TIMES_TO_RUN.into()),
                )?,
            },
            slack: SlackConfig {
                token: get("SLACK_TOKEN"),
                bot_name: get("SLACK_BOT_NAME").unwrap_or_else(|| DEFAULT_BOT_NAME.into()),
                bot_icon: get("SLACK_BOT_ICON"),
                channels: split_list(get("SLACK_CHANNELS").as_deref()),
                groups: split_list(get("SLACK_GROUPS").as_deref()),
                verification_token: get("SLACK_VERIFICATION_TOKEN"),
                events_addr,
            },
            teams_webhook,
        })
    }

    /// Checks what every mode needs: a token and at least one repository.
    pub fn require_github(&self) -> Result<&str, ConfigError> {
        if self.repos.is_empty() {
            return Err(ConfigError::Missing("GH_REPOS"));
        }
        self.github_token
            .as_deref()
            .ok_or(ConfigError::Missing("GH_TOKEN"))
    }

    /// Checks what the long-running bot needs on top of GitHub access.
    pub fn require_slack(&self) -> Result<&str, ConfigError> {
        self.slack
            .token
            .as_deref()
            .ok_or(ConfigError::Missing("SLACK_TOKEN"))
    }

    pub fn base_branch_for(&self, repo: &Repo) -> String {
        self.base_branch_overrides
            .get(&repo.full_name())
            .cloned()
            .unwrap_or_else(|| crate::types::DEFAULT_BASE_BRANCH.to_string())
    }

    pub fn compare_override_for(&self, repo: &Repo) -> Option<&str> {
        self.compare_branch_overrides
            .get(&repo.full_name())
            .map(String::as_str)
    }

    /// Reports are rendered for Teams whenever a Teams webhook is configured.
    pub fn formats_for_teams(&self) -> bool {
        self.teams_webhook.is_some()
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses `key1:value1,key2:value2` into a lookup.
fn parse_overrides(
    key: &'static str,
    value: Option<&str>,
) -> Result<HashMap<String, String>, ConfigError> {
    split_list(value)
        .into_iter()
        .map(|pair| match pair.split_once(':') {
            Some((repo, value)) if !repo.trim().is_empty() && !value.trim().is_empty() => {
                Ok((repo.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidOverride {
                key,
                value: pair.clone(),
            }),
        })
        .collect()
}

fn parse_days(value: &str) -> Result<Vec<Weekday>, ConfigError> {
    split_list(Some(value))
        .into_iter()
        .map(|day| day.parse::<Weekday>().map_err(|_| ConfigError::InvalidDay(day)))
        .collect()
}

/// Parses `900,1330` style times (hours without a leading zero, then two
/// minute digits).
fn parse_times(value: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    split_list(Some(value))
        .into_iter()
        .map(|raw| {
            let invalid = || ConfigError::InvalidTime(raw.clone());
            if raw.len() < 3 || raw.len() > 4 || !raw.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let (hours, minutes) = raw.split_at(raw.len() - 2);
            let hours: u32 = hours.parse().map_err(|_| invalid())?;
            let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
            NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.repos.is_empty());
        assert_eq!(config.slack.bot_name, "Pr. Police");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(
            config.schedule.days,
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri
            ]
        );
        assert_eq!(
            config.schedule.times,
            vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()]
        );
        assert_eq!(config.slack.events_addr.port(), 3000);
        assert!(!config.formats_for_teams());
    }

    #[test]
    fn test_lists_and_labels() {
        let config = config_from(&[
            ("GH_REPOS", "octo/widgets, octo/gadgets"),
            ("GH_EXCLUDE_LABELS", "wontfix,duplicate"),
            ("GH_BLOCKED_LABEL", "blocked"),
            ("GH_WIP_LABEL", "wip"),
            ("SLACK_CHANNELS", "general,,dev"),
        ])
        .unwrap();

        assert_eq!(
            config.repos,
            vec![
                Repo::new("octo", "widgets").unwrap(),
                Repo::new("octo", "gadgets").unwrap()
            ]
        );
        assert!(config.labels.is_excluded("wontfix"));
        assert!(!config.labels.is_excluded("bug"));
        assert_eq!(config.labels.blocked.as_deref(), Some("blocked"));
        assert_eq!(config.labels.wip.as_deref(), Some("wip"));
        assert_eq!(config.slack.channels, vec!["general", "dev"]);
    }

    #[test]
    fn test_branch_overrides() {
        let config = config_from(&[
            ("GH_REPOS", "octo/widgets,octo/gadgets"),
            ("BASE_BRANCH_OVERRIDES", "octo/widgets:main"),
            ("COMPARE_BRANCH_OVERRIDES", "octo/gadgets:upstream"),
        ])
        .unwrap();

        let widgets = Repo::new("octo", "widgets").unwrap();
        let gadgets = Repo::new("octo", "gadgets").unwrap();
        assert_eq!(config.base_branch_for(&widgets), "main");
        assert_eq!(config.base_branch_for(&gadgets), "master");
        assert_eq!(config.compare_override_for(&gadgets), Some("upstream"));
        assert_eq!(config.compare_override_for(&widgets), None);
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let err = config_from(&[("BASE_BRANCH_OVERRIDES", "octo/widgets")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidOverride {
                key: "BASE_BRANCH_OVERRIDES",
                value: "octo/widgets".to_string()
            }
        );
    }

    #[test]
    fn test_schedule_parsing() {
        let config = config_from(&[
            ("DAYS_TO_RUN", "monday,Saturday"),
            ("TIMES_TO_RUN", "900,1330,0005"),
        ])
        .unwrap();
        assert_eq!(config.schedule.days, vec![Weekday::Mon, Weekday::Sat]);
        assert_eq!(
            config.schedule.times,
            vec![
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_invalid_schedule() {
        assert_eq!(
            config_from(&[("DAYS_TO_RUN", "Funday")]).unwrap_err(),
            ConfigError::InvalidDay("Funday".to_string())
        );
        for bad in ["9", "2400", "960", "12345", "9am"] {
            assert_eq!(
                config_from(&[("TIMES_TO_RUN", bad)]).unwrap_err(),
                ConfigError::InvalidTime(bad.to_string())
            );
        }
    }

    #[test]
    fn test_required_keys() {
        let config = config_from(&[("GH_REPOS", "octo/widgets")]).unwrap();
        assert_eq!(
            config.require_github().unwrap_err(),
            ConfigError::Missing("GH_TOKEN")
        );
        assert_eq!(
            config.require_slack().unwrap_err(),
            ConfigError::Missing("SLACK_TOKEN")
        );

        let config = config_from(&[("GITHUB_TOKEN", "t")]).unwrap();
        assert_eq!(
            config.require_github().unwrap_err(),
            ConfigError::Missing("GH_REPOS")
        );

        let config = config_from(&[("GH_REPOS", "octo/widgets"), ("GH_TOKEN", "t")]).unwrap();
        assert_eq!(config.require_github().unwrap(), "t");
    }

    #[test]
    fn test_teams_webhook_selects_teams_markup() {
        let config =
            config_from(&[("MS_TEAMS_WEBHOOK", "https://example.webhook.office.com/hook")])
                .unwrap();
        assert!(config.formats_for_teams());

        assert!(config_from(&[("MS_TEAMS_WEBHOOK", "not a url")]).is_err());
    }
}
