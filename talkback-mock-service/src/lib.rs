use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use async_trait::async_trait;
use chrono::Utc;
use futures::{
    channel::{mpsc, oneshot},
    future::{FutureExt, Shared},
    stream::LocalBoxStream,
    StreamExt,
};
use talkback_client::api::{
    AuthData, AuthQuery, AuthToken, CollectionId, CollectionPage, CommentId, CommentsQuery,
    DataService, DeleteComment, DeleteCommentResult, NewComment, PostCommentResult,
    RawStreamEvent, ServiceError, UpdateUserError, UserUpdate,
};

mod dialogs;
pub use dialogs::ScriptedDialogs;

mod ui;
pub use ui::{RecordingUi, UiCall};

/// One call received by the mock, in arrival order
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    GetComments(CommentsQuery),
    CommentStream(CollectionId),
    PostComment(NewComment),
    DeleteComment(DeleteComment),
    GetAuth(AuthQuery),
    UpdateUser(UserUpdate),
    ForgetAuth,
}

/// In-memory data service
///
/// Answers are scripted per operation and consumed in order. Once a script is
/// exhausted the mock behaves like a healthy service: posts and deletes
/// succeed, pseudonym updates log the user in.
pub struct MockService {
    pages: RefCell<VecDeque<Result<CollectionPage, ServiceError>>>,
    posts: RefCell<VecDeque<Result<PostCommentResult, ServiceError>>>,
    deletes: RefCell<VecDeque<Result<DeleteCommentResult, ServiceError>>>,
    updates: RefCell<VecDeque<Result<(), UpdateUserError>>>,
    auth: RefCell<Option<AuthData>>,
    auth_error: RefCell<Option<ServiceError>>,
    feeds: RefCell<Vec<mpsc::UnboundedSender<RawStreamEvent>>>,
    calls: RefCell<Vec<Call>>,
    gate: RefCell<Option<(oneshot::Sender<()>, Shared<oneshot::Receiver<()>>)>>,
    next_comment_id: Cell<u64>,
}

impl Default for MockService {
    fn default() -> MockService {
        MockService::new()
    }
}

impl MockService {
    pub fn new() -> MockService {
        MockService {
            pages: RefCell::new(VecDeque::new()),
            posts: RefCell::new(VecDeque::new()),
            deletes: RefCell::new(VecDeque::new()),
            updates: RefCell::new(VecDeque::new()),
            auth: RefCell::new(None),
            auth_error: RefCell::new(None),
            feeds: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            gate: RefCell::new(None),
            next_comment_id: Cell::new(1000),
        }
    }

    pub fn push_page(&self, page: Result<CollectionPage, ServiceError>) {
        self.pages.borrow_mut().push_back(page);
    }

    pub fn push_post_result(&self, res: Result<PostCommentResult, ServiceError>) {
        self.posts.borrow_mut().push_back(res);
    }

    pub fn push_delete_result(&self, res: Result<DeleteCommentResult, ServiceError>) {
        self.deletes.borrow_mut().push_back(res);
    }

    pub fn push_update_result(&self, res: Result<(), UpdateUserError>) {
        self.updates.borrow_mut().push_back(res);
    }

    pub fn set_auth(&self, auth: Option<AuthData>) {
        *self.auth.borrow_mut() = auth;
    }

    /// Makes auth queries fail until called again with None
    pub fn set_auth_error(&self, err: Option<ServiceError>) {
        *self.auth_error.borrow_mut() = err;
    }

    /// Relays a live push to every open comment stream
    pub fn push_event(&self, e: RawStreamEvent) {
        self.feeds
            .borrow_mut()
            .retain(|f| f.unbounded_send(e.clone()).is_ok());
    }

    /// Makes every following call wait until `resume` is called
    pub fn pause(&self) {
        let (sender, receiver) = oneshot::channel();
        *self.gate.borrow_mut() = Some((sender, receiver.shared()));
    }

    pub fn resume(&self) {
        if let Some((sender, _)) = self.gate.borrow_mut().take() {
            let _ = sender.send(());
        }
    }

    pub fn test_calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn test_num_posts(&self) -> usize {
        self.count(|c| matches!(c, Call::PostComment(_)))
    }

    pub fn test_num_deletes(&self) -> usize {
        self.count(|c| matches!(c, Call::DeleteComment(_)))
    }

    pub fn test_num_page_fetches(&self) -> usize {
        self.count(|c| matches!(c, Call::GetComments(_)))
    }

    pub fn test_num_forget_auth(&self) -> usize {
        self.count(|c| matches!(c, Call::ForgetAuth))
    }

    fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| f(c)).count()
    }

    async fn enter(&self, call: Call) {
        tracing::trace!(?call, "mock service call");
        self.calls.borrow_mut().push(call);
        let gate = self.gate.borrow().as_ref().map(|(_, r)| r.clone());
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }
}

#[async_trait(?Send)]
impl DataService for MockService {
    async fn get_comments(&self, query: &CommentsQuery) -> Result<CollectionPage, ServiceError> {
        self.enter(Call::GetComments(query.clone())).await;
        self.pages
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport(String::from("no page scripted"))))
    }

    fn comment_stream(&self, collection: &CollectionId) -> LocalBoxStream<'static, RawStreamEvent> {
        self.calls
            .borrow_mut()
            .push(Call::CommentStream(collection.clone()));
        let (sender, receiver) = mpsc::unbounded();
        self.feeds.borrow_mut().push(sender);
        receiver.boxed_local()
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<PostCommentResult, ServiceError> {
        self.enter(Call::PostComment(comment.clone())).await;
        if let Some(res) = self.posts.borrow_mut().pop_front() {
            return res;
        }
        let id = self.next_comment_id.get();
        self.next_comment_id.set(id + 1);
        Ok(PostCommentResult::posted(
            CommentId(id),
            format!("<p>{}</p>", comment.body.trim()),
            Utc::now(),
        ))
    }

    async fn delete_comment(
        &self,
        req: &DeleteComment,
    ) -> Result<DeleteCommentResult, ServiceError> {
        self.enter(Call::DeleteComment(req.clone())).await;
        self.deletes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(DeleteCommentResult::deleted()))
    }

    async fn get_auth(&self, query: AuthQuery) -> Result<Option<AuthData>, ServiceError> {
        self.enter(Call::GetAuth(query)).await;
        if let Some(err) = self.auth_error.borrow().clone() {
            return Err(err);
        }
        Ok(self.auth.borrow().clone())
    }

    async fn update_user(&self, update: &UserUpdate) -> Result<(), UpdateUserError> {
        self.enter(Call::UpdateUser(update.clone())).await;
        self.updates.borrow_mut().pop_front().unwrap_or(Ok(()))?;
        if let Some(pseudonym) = &update.pseudonym {
            let token = self
                .auth
                .borrow()
                .as_ref()
                .and_then(|a| a.token.clone())
                .unwrap_or_else(AuthToken::stub);
            *self.auth.borrow_mut() = Some(AuthData::logged_in(token, pseudonym.clone()));
        }
        Ok(())
    }

    fn forget_auth(&self) {
        self.calls.borrow_mut().push(Call::ForgetAuth);
    }
}
