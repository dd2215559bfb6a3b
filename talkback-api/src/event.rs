use crate::{Author, Comment, CommentId, Time, Visibility};

/// A push from the live stream, exactly as the service sends it
///
/// Which operation it describes depends on which keys are present, see
/// `talkback_client::stream::normalize`.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RawStreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<RawStreamComment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<RawStreamCollection>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStreamComment {
    #[serde(default)]
    pub comment_id: Option<CommentId>,

    #[serde(default)]
    pub deleted: Option<bool>,

    #[serde(default)]
    pub updated: Option<bool>,

    #[serde(default)]
    pub content: Option<String>,

    /// Integer visibility code, see `Visibility`
    #[serde(default)]
    pub visibility: Option<u8>,

    #[serde(default)]
    pub author: Option<Author>,

    #[serde(default)]
    pub timestamp: Option<Time>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStreamCollection {
    #[serde(default)]
    pub comments_enabled: Option<bool>,
}

impl RawStreamEvent {
    pub fn new_comment(c: Comment) -> RawStreamEvent {
        RawStreamEvent {
            comment: Some(RawStreamComment {
                comment_id: Some(c.id),
                content: Some(c.content),
                visibility: Some(c.visibility.into()),
                author: Some(c.author),
                timestamp: Some(c.timestamp),
                ..RawStreamComment::default()
            }),
            collection: None,
        }
    }

    pub fn deleted(id: CommentId) -> RawStreamEvent {
        RawStreamEvent {
            comment: Some(RawStreamComment {
                comment_id: Some(id),
                deleted: Some(true),
                ..RawStreamComment::default()
            }),
            collection: None,
        }
    }

    pub fn updated(
        id: CommentId,
        content: Option<String>,
        visibility: Option<Visibility>,
    ) -> RawStreamEvent {
        RawStreamEvent {
            comment: Some(RawStreamComment {
                comment_id: Some(id),
                updated: Some(true),
                content,
                visibility: visibility.map(u8::from),
                ..RawStreamComment::default()
            }),
            collection: None,
        }
    }

    pub fn comments_enabled(enabled: bool) -> RawStreamEvent {
        RawStreamEvent {
            comment: None,
            collection: Some(RawStreamCollection {
                comments_enabled: Some(enabled),
            }),
        }
    }
}

/// Messages received on the websocket comment feed
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum FeedMessage {
    Pong,
    Event(RawStreamEvent),
}
