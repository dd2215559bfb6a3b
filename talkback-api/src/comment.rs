use std::fmt;

use crate::Time;

/// Display names are cut to this many characters before being shown
pub const MAX_DISPLAY_NAME_LEN: usize = 50;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Moderation state of a comment, carried on the wire as an integer code
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Visibility {
    Visible,

    /// Banned by a moderator, only its author can still see it
    Blocked,

    /// Awaiting moderation
    Pending,
}

impl Default for Visibility {
    fn default() -> Visibility {
        Visibility::Visible
    }
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

impl TryFrom<u8> for Visibility {
    type Error = String;

    fn try_from(code: u8) -> Result<Visibility, String> {
        match code {
            1 => Ok(Visibility::Visible),
            2 => Ok(Visibility::Blocked),
            3 => Ok(Visibility::Pending),
            c => Err(format!("unknown visibility code {c}")),
        }
    }
}

impl From<Visibility> for u8 {
    fn from(v: Visibility) -> u8 {
        match v {
            Visibility::Visible => 1,
            Visibility::Blocked => 2,
            Visibility::Pending => 3,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub display_name: String,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    #[serde(rename = "commentId")]
    pub id: CommentId,

    /// HTML-safe body, as rendered by the service
    pub content: String,

    pub timestamp: Time,
    pub author: Author,

    /// Unknown codes read as no visibility information
    #[serde(default, deserialize_with = "lenient_visibility")]
    pub visibility: Visibility,
}

fn lenient_visibility<'de, D>(deserializer: D) -> Result<Visibility, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let code = match <Option<i64> as serde::Deserialize>::deserialize(deserializer)? {
        Some(code) => code,
        None => return Ok(Visibility::default()),
    };
    match u8::try_from(code)
        .map_err(|e| e.to_string())
        .and_then(Visibility::try_from)
    {
        Ok(v) => Ok(v),
        Err(err) => {
            tracing::debug!(?err, "ignoring unknown comment visibility code");
            Ok(Visibility::default())
        }
    }
}

/// Cuts `name` to at most MAX_DISPLAY_NAME_LEN characters, on a char boundary
pub fn truncate_display_name(name: &str) -> &str {
    match name.char_indices().nth(MAX_DISPLAY_NAME_LEN) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}
