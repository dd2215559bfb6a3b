use async_trait::async_trait;
use futures::stream::LocalBoxStream;

use crate::{
    AuthData, AuthQuery, CollectionId, CollectionPage, CommentsQuery, DeleteComment,
    DeleteCommentResult, NewComment, PostCommentResult, RawStreamEvent, ServiceError,
    UpdateUserError, UserUpdate,
};

/// Everything the widget needs from the commenting backend
///
/// Implementations run on a single-threaded executor, so neither the trait
/// objects nor the returned futures need to be `Send`.
#[async_trait(?Send)]
pub trait DataService {
    async fn get_comments(&self, query: &CommentsQuery) -> Result<CollectionPage, ServiceError>;

    /// Live pushes for a collection, in delivery order
    fn comment_stream(&self, collection: &CollectionId) -> LocalBoxStream<'static, RawStreamEvent>;

    async fn post_comment(&self, comment: &NewComment) -> Result<PostCommentResult, ServiceError>;

    async fn delete_comment(
        &self,
        req: &DeleteComment,
    ) -> Result<DeleteCommentResult, ServiceError>;

    /// Returns None when the service knows nothing about the current user
    async fn get_auth(&self, query: AuthQuery) -> Result<Option<AuthData>, ServiceError>;

    async fn update_user(&self, update: &UserUpdate) -> Result<(), UpdateUserError>;

    /// Drops any auth information cached by the service
    fn forget_auth(&self) {}
}
