//! Rendering dialects for the two delivery targets.

/// Glyphs used in reports. Slack renders its `:shortcode:` names, Teams gets
/// the literal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emoji {
    Chains,
    ConstructionWorker,
    Eyes,
    RotatingLight,
    Shrug,
    Tada,
    Warning,
    Zero,
}

impl Emoji {
    pub fn unicode(&self) -> &'static str {
        match self {
            Emoji::Chains => "⛓️",
            Emoji::ConstructionWorker => "👷",
            Emoji::Eyes => "👀",
            Emoji::RotatingLight => "🚨",
            Emoji::Shrug => "🤷",
            Emoji::Tada => "🎉",
            Emoji::Warning => "⚠️",
            Emoji::Zero => "0️⃣",
        }
    }

    pub fn slack_shortcode(&self) -> &'static str {
        match self {
            Emoji::Chains => ":chains:",
            Emoji::ConstructionWorker => ":construction_worker:",
            Emoji::Eyes => ":eyes:",
            Emoji::RotatingLight => ":rotating_light:",
            Emoji::Shrug => ":shrug:",
            Emoji::Tada => ":tada:",
            Emoji::Warning => ":warning:",
            Emoji::Zero => ":zero:",
        }
    }
}

/// Formatting primitives the report builder renders with.
pub trait Markup: Send + Sync {
    fn line_break(&self) -> &'static str;
    fn bold(&self, text: &str) -> String;
    fn link(&self, text: &str, url: &str) -> String;
    fn emoji(&self, emoji: Emoji) -> &'static str;
}

/// Slack `mrkdwn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlackMarkup;

impl Markup for SlackMarkup {
    fn line_break(&self) -> &'static str {
        "\n"
    }

    fn bold(&self, text: &str) -> String {
        format!("*{text}*")
    }

    fn link(&self, text: &str, url: &str) -> String {
        format!("<{url}|{text}>")
    }

    fn emoji(&self, emoji: Emoji) -> &'static str {
        emoji.slack_shortcode()
    }
}

/// MessageCard text for Teams webhooks: HTML line breaks and bold,
/// markdown links.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamsMarkup;

impl Markup for TeamsMarkup {
    fn line_break(&self) -> &'static str {
        "<br/>"
    }

    fn bold(&self, text: &str) -> String {
        format!("<b>{text}</b>")
    }

    fn link(&self, text: &str, url: &str) -> String {
        format!("[{text}]({url})")
    }

    fn emoji(&self, emoji: Emoji) -> &'static str {
        emoji.unicode()
    }
}
