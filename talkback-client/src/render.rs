use talkback_api::{truncate_display_name, Comment, CommentId, Time, Visibility};

use crate::DatetimeFormat;

/// A comment ready to be handed to the UI renderer
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderedComment {
    pub id: CommentId,
    pub content: String,

    /// At most MAX_DISPLAY_NAME_LEN characters
    pub author_display_name: String,

    pub timestamp: Time,

    /// RFC 3339 form of `timestamp`, for machine-readable markup
    pub datetime: String,

    /// Always the absolute form
    pub date_to_show: String,

    /// Set while the comment is recent enough to show a relative time
    pub relative_time: Option<String>,

    pub visibility: Visibility,
    pub is_own: bool,
}

impl RenderedComment {
    pub fn new(format: &DatetimeFormat, c: Comment, is_own: bool, now: Time) -> RenderedComment {
        let relative_time = format
            .is_relative(c.timestamp, now)
            .then(|| DatetimeFormat::relative(c.timestamp, now));
        RenderedComment {
            id: c.id,
            author_display_name: String::from(truncate_display_name(&c.author.display_name)),
            datetime: c.timestamp.to_rfc3339(),
            date_to_show: format.absolute(c.timestamp),
            relative_time,
            timestamp: c.timestamp,
            content: c.content,
            visibility: c.visibility,
            is_own,
        }
    }

    /// What the reader sees as the comment date
    pub fn displayed_time(&self) -> &str {
        self.relative_time.as_deref().unwrap_or(&self.date_to_show)
    }
}
