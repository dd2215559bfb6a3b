use std::{fmt::Write, time::Duration};

use anyhow::{anyhow, Context};
use chrono::format::{Item, StrftimeItems};
use talkback_api::{ArticleId, CommentsQuery, PageCursor, Time};

use crate::texts;

const DEFAULT_ABSOLUTE_FORMAT: &str = "%I:%M %p";
const DEFAULT_LOGIN_URL: &str = "/login";
const DEFAULT_PAGINATION_SETTLE_MS: u64 = 200;

/// Host-provided configuration of one widget instance
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub article_id: ArticleId,
    pub url: String,
    pub title: String,

    #[serde(default)]
    pub section: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub datetime_format: DatetimeFormat,

    /// Height in pixels the widget should fit in, if the host constrains it
    #[serde(default)]
    pub height: Option<u32>,

    #[serde(default = "default_login_url")]
    pub login_url: String,

    #[serde(default)]
    pub message_overrides: Vec<MessageOverride>,

    #[serde(default = "default_pagination_settle_ms")]
    pub pagination_settle_ms: u64,
}

fn default_login_url() -> String {
    String::from(DEFAULT_LOGIN_URL)
}

fn default_pagination_settle_ms() -> u64 {
    DEFAULT_PAGINATION_SETTLE_MS
}

impl WidgetConfig {
    pub fn new(article_id: ArticleId, url: String, title: String) -> WidgetConfig {
        WidgetConfig {
            article_id,
            url,
            title,
            section: None,
            tags: Vec::new(),
            datetime_format: DatetimeFormat::default(),
            height: None,
            login_url: default_login_url(),
            message_overrides: Vec::new(),
            pagination_settle_ms: DEFAULT_PAGINATION_SETTLE_MS,
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<WidgetConfig> {
        let config: WidgetConfig =
            serde_json::from_str(json).context("parsing widget configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        macro_rules! non_empty {
            ($field:expr, $name:expr) => {
                if $field.trim().is_empty() {
                    return Err(anyhow!("widget configuration is missing {}", $name));
                }
            };
        }
        non_empty!(self.article_id.0, "articleId");
        non_empty!(self.url, "url");
        non_empty!(self.title, "title");
        self.datetime_format
            .validate()
            .context("validating datetimeFormat")?;
        MessageOverrides::compile(&self.message_overrides)
            .context("validating messageOverrides")?;
        Ok(())
    }

    /// Query for one page of this article's collection
    pub fn query(&self, page: Option<PageCursor>) -> CommentsQuery {
        CommentsQuery {
            article_id: self.article_id.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            section: self.section.clone(),
            tags: self.tags.clone(),
            stream: page.is_none(),
            page,
        }
    }

    pub fn pagination_settle_delay(&self) -> Duration {
        Duration::from_millis(self.pagination_settle_ms)
    }
}

/// How comment timestamps are displayed
///
/// Deserializes either from a bare absolute format string or from an object
/// with `minutesUntilAbsoluteTime` and `absoluteFormat`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
#[serde(from = "RawDatetimeFormat")]
pub struct DatetimeFormat {
    /// -1 means always absolute, N >= 0 shows a relative time for N minutes
    /// after posting
    pub minutes_until_absolute_time: i64,

    /// strftime-style format, rendered in UTC
    pub absolute_format: String,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawDatetimeFormat {
    Absolute(String),
    Full(FullDatetimeFormat),
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullDatetimeFormat {
    #[serde(default = "default_minutes_until_absolute_time")]
    minutes_until_absolute_time: i64,

    #[serde(default = "default_absolute_format")]
    absolute_format: String,
}

fn default_minutes_until_absolute_time() -> i64 {
    -1
}

fn default_absolute_format() -> String {
    String::from(DEFAULT_ABSOLUTE_FORMAT)
}

impl From<RawDatetimeFormat> for DatetimeFormat {
    fn from(raw: RawDatetimeFormat) -> DatetimeFormat {
        match raw {
            RawDatetimeFormat::Absolute(absolute_format) => DatetimeFormat {
                minutes_until_absolute_time: default_minutes_until_absolute_time(),
                absolute_format,
            },
            RawDatetimeFormat::Full(f) => DatetimeFormat {
                minutes_until_absolute_time: f.minutes_until_absolute_time,
                absolute_format: f.absolute_format,
            },
        }
    }
}

impl Default for DatetimeFormat {
    fn default() -> DatetimeFormat {
        DatetimeFormat {
            minutes_until_absolute_time: default_minutes_until_absolute_time(),
            absolute_format: default_absolute_format(),
        }
    }
}

impl DatetimeFormat {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.minutes_until_absolute_time < -1 {
            return Err(anyhow!(
                "minutesUntilAbsoluteTime must be -1 or positive, got {}",
                self.minutes_until_absolute_time
            ));
        }
        if StrftimeItems::new(&self.absolute_format).any(|i| matches!(i, Item::Error)) {
            return Err(anyhow!(
                "invalid absolute date format {:?}",
                self.absolute_format
            ));
        }
        Ok(())
    }

    /// Whether `t` is still recent enough, at `now`, to be shown as a relative time
    pub fn is_relative(&self, t: Time, now: Time) -> bool {
        if self.minutes_until_absolute_time < 0 {
            return false;
        }
        (now - t).num_minutes() <= self.minutes_until_absolute_time
    }

    pub fn absolute(&self, t: Time) -> String {
        let mut res = String::new();
        if write!(res, "{}", t.format(&self.absolute_format)).is_err() {
            // Only reachable with an unvalidated configuration
            tracing::warn!(format = %self.absolute_format, "invalid absolute date format");
            return t.to_rfc3339();
        }
        res
    }

    /// Relative form of `t`, eg. "5 minutes ago"
    pub fn relative(t: Time, now: Time) -> String {
        let elapsed = now - t;
        macro_rules! ago {
            ($n:expr, $unit:expr) => {
                match $n {
                    1 => format!("1 {} ago", $unit),
                    n => format!("{} {}s ago", n, $unit),
                }
            };
        }
        if elapsed.num_minutes() < 1 {
            String::from("just now")
        } else if elapsed.num_hours() < 1 {
            ago!(elapsed.num_minutes(), "minute")
        } else if elapsed.num_days() < 1 {
            ago!(elapsed.num_hours(), "hour")
        } else {
            ago!(elapsed.num_days(), "day")
        }
    }

    /// Display form of `t` at `now`, following the cutover rule
    pub fn format(&self, t: Time, now: Time) -> String {
        match self.is_relative(t, now) {
            true => DatetimeFormat::relative(t, now),
            false => self.absolute(t),
        }
    }
}

/// Replaces a service message matching `pattern` with `message`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MessageOverride {
    pub pattern: String,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct MessageOverrides(Vec<(regex::Regex, MessageOverride)>);

impl MessageOverrides {
    pub fn compile(overrides: &[MessageOverride]) -> anyhow::Result<MessageOverrides> {
        let mut res = Vec::with_capacity(overrides.len());
        for o in overrides {
            let re = regex::Regex::new(&o.pattern)
                .with_context(|| format!("compiling message override {:?}", o.pattern))?;
            res.push((re, o.clone()));
        }
        Ok(MessageOverrides(res))
    }

    /// Message to show for an error the service described as `message`
    ///
    /// The last matching override wins, a non-matching message is shown
    /// verbatim and a missing one falls back to the generic error.
    pub fn service_message(&self, message: Option<&str>) -> String {
        let message = match message.map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => return String::from(texts::GENERIC_ERROR),
        };
        self.0
            .iter()
            .rev()
            .find(|(re, _)| re.is_match(message))
            .map(|(_, o)| o.message.clone())
            .unwrap_or_else(|| String::from(message))
    }

    /// Override registered for exactly this error key
    pub fn exact(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(_, o)| o.pattern == key)
            .map(|(_, o)| &o.message as &str)
    }
}
