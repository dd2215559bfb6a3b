use chrono::Utc;

pub type Time = chrono::DateTime<Utc>;

mod action;
pub use action::{DeleteComment, DeleteCommentResult, NewComment, PostCommentResult};

mod auth;
pub use auth::{AuthData, AuthQuery, AuthToken, UserUpdate};

mod comment;
pub use comment::{
    truncate_display_name, Author, Comment, CommentId, Visibility, MAX_DISPLAY_NAME_LEN,
};

mod error;
pub use error::{ServiceError, UpdateUserError};

mod event;
pub use event::{FeedMessage, RawStreamCollection, RawStreamComment, RawStreamEvent};

mod query;
pub use query::{ArticleId, CollectionId, CollectionPage, CommentsQuery, PageCursor};

mod service;
pub use service::DataService;

pub fn validate_string(s: &str) -> Result<(), ServiceError> {
    match s.contains('\0') {
        true => Err(ServiceError::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}

pub(crate) fn default_true() -> bool {
    true
}
