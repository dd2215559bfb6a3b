//! Typed view of the raw live-stream pushes

use talkback_api::{Comment, CommentId, RawStreamComment, RawStreamEvent, Visibility};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamEvent {
    NewComment(Comment),
    CommentUpdated {
        id: CommentId,
        body: Option<String>,
        visibility: Option<Visibility>,
    },
    CommentDeleted(CommentId),
    CollectionOpened,
    CollectionClosed,
}

fn visibility(code: Option<u8>) -> Option<Visibility> {
    let code = code?;
    match Visibility::try_from(code) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::debug!(?err, "ignoring unknown visibility code");
            None
        }
    }
}

fn normalize_comment(c: RawStreamComment) -> Option<StreamEvent> {
    let id = c.comment_id?;
    if c.deleted == Some(true) {
        return Some(StreamEvent::CommentDeleted(id));
    }
    if c.updated == Some(true) {
        return Some(StreamEvent::CommentUpdated {
            id,
            body: c.content,
            visibility: visibility(c.visibility),
        });
    }
    match (c.content, c.author, c.timestamp) {
        (Some(content), Some(author), Some(timestamp)) => Some(StreamEvent::NewComment(Comment {
            id,
            content,
            timestamp,
            author,
            visibility: visibility(c.visibility).unwrap_or_default(),
        })),
        _ => {
            tracing::debug!(%id, "dropping incomplete new comment push");
            None
        }
    }
}

/// Converts one raw push into the operations it describes
///
/// A comment operation comes before a collection operation, unrecognized
/// shapes yield nothing.
pub fn normalize(event: RawStreamEvent) -> Vec<StreamEvent> {
    let mut res = Vec::with_capacity(2);
    if let Some(c) = event.comment {
        res.extend(normalize_comment(c));
    }
    if let Some(c) = event.collection {
        match c.comments_enabled {
            Some(true) => res.push(StreamEvent::CollectionOpened),
            Some(false) => res.push(StreamEvent::CollectionClosed),
            None => (),
        }
    }
    res
}
