use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
    task::Poll,
};

use async_recursion::async_recursion;
use chrono::Utc;
use futures::{
    channel::oneshot,
    future,
    select,
    stream::{FuturesUnordered, LocalBoxStream},
    FutureExt, Stream, StreamExt,
};
use talkback_api::{
    truncate_display_name, AuthData, AuthQuery, Author, CollectionId, Comment, CommentId,
    DataService, DeleteComment, NewComment, PageCursor, PostCommentResult, RawStreamEvent,
    Visibility,
};

use crate::{
    dialogs::{self, Dialogs, PseudonymDialog},
    stream, texts, AuthError, BadgeKind, DraftStorage, DraftStore, EventEmitter,
    IdentitySession, LoadError, MessageOverrides, RenderedComment, SessionEvent, StreamEvent,
    Subscription, UiEvent, UiRenderer, UnavailableReason, WidgetConfig, WidgetError,
};

/// Bails out of the current operation if the widget was destroyed while it
/// was suspended
macro_rules! alive {
    ($self:expr) => {
        if $self.is_destroyed() {
            tracing::debug!("widget destroyed, dropping continuation");
            return Ok(());
        }
    };
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
    Unavailable,
    Destroyed,
}

/// Tracking events, for the host's analytics
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WidgetEvent {
    Ready {
        collection_id: CollectionId,
    },
    RenderComplete,
    LoadFailed(UnavailableReason),
    CommentPosted {
        collection_id: CollectionId,
        comment_id: CommentId,
        body: Option<String>,
        author: Option<String>,
    },
    CommentDeleted {
        collection_id: CollectionId,
        comment_id: CommentId,
    },
}

/// Everything the controller talks to
pub struct Collaborators {
    pub service: Rc<dyn DataService>,
    pub ui: Rc<dyn UiRenderer>,
    pub dialogs: Rc<dyn Dialogs>,
    pub session: Rc<IdentitySession>,

    /// Backend of the draft store, None if the host has no session storage
    pub storage: Option<Rc<dyn DraftStorage>>,
}

impl Collaborators {
    /// Builds the collaborators with a fresh identity session set up from `config`
    pub fn new(
        config: &WidgetConfig,
        service: Rc<dyn DataService>,
        ui: Rc<dyn UiRenderer>,
        dialogs: Rc<dyn Dialogs>,
        storage: Option<Rc<dyn DraftStorage>>,
    ) -> anyhow::Result<Collaborators> {
        let overrides = MessageOverrides::compile(&config.message_overrides)?;
        let session = Rc::new(IdentitySession::new(
            service.clone(),
            dialogs.clone(),
            overrides,
            config.login_url.clone(),
        ));
        Ok(Collaborators {
            service,
            ui,
            dialogs,
            session,
            storage,
        })
    }
}

struct WidgetState {
    phase: Phase,
    collection_id: Option<CollectionId>,
    drafts: DraftStore,
    next_page: Option<PageCursor>,
    has_more_pages: bool,
    fetch_in_progress: bool,
    logged_in: bool,
    is_admin: bool,

    /// Already truncated
    display_name: Option<String>,

    /// A draft was found at load, post it as soon as the user is logged in
    force_mode: bool,
    posting: bool,
    service_up: bool,
    comment_ids: HashSet<CommentId>,
    own_comment_ids: HashSet<CommentId>,

    /// Last known visibility of every comment seen, rendered or not
    visibilities: HashMap<CommentId, Visibility>,

    /// Last badge shown per comment
    badges: HashMap<CommentId, BadgeKind>,
    deletes_in_progress: HashSet<CommentId>,
}

impl WidgetState {
    fn is_own(&self, c: &Comment) -> bool {
        self.own_comment_ids.contains(&c.id)
            || self.display_name.as_deref()
                == Some(truncate_display_name(&c.author.display_name))
    }
}

pub struct WidgetController {
    config: WidgetConfig,
    overrides: MessageOverrides,
    service: Rc<dyn DataService>,
    ui: Rc<dyn UiRenderer>,
    dialogs: Rc<dyn Dialogs>,
    session: Rc<IdentitySession>,
    events: EventEmitter<WidgetEvent>,
    session_events: RefCell<Option<Subscription<SessionEvent>>>,
    stream: RefCell<Option<LocalBoxStream<'static, RawStreamEvent>>>,
    destroyed_sender: RefCell<Option<oneshot::Sender<()>>>,
    destroyed: RefCell<Option<oneshot::Receiver<()>>>,

    /// None once destroyed
    state: RefCell<Option<WidgetState>>,
}

fn widget_auth_error(err: AuthError) -> WidgetError {
    match err {
        AuthError::SessionExpired => WidgetError::SessionExpired,
        err => WidgetError::AuthRequired(err),
    }
}

impl WidgetController {
    pub fn new(config: WidgetConfig, collab: Collaborators) -> anyhow::Result<WidgetController> {
        config.validate()?;
        let overrides = MessageOverrides::compile(&config.message_overrides)?;
        let session_events = collab.session.subscribe();
        let (destroyed_sender, destroyed) = oneshot::channel();
        Ok(WidgetController {
            config,
            overrides,
            service: collab.service,
            ui: collab.ui,
            dialogs: collab.dialogs,
            session: collab.session,
            events: EventEmitter::new(),
            session_events: RefCell::new(Some(session_events)),
            stream: RefCell::new(None),
            destroyed_sender: RefCell::new(Some(destroyed_sender)),
            destroyed: RefCell::new(Some(destroyed)),
            state: RefCell::new(Some(WidgetState {
                phase: Phase::Uninitialized,
                collection_id: None,
                drafts: DraftStore::new(collab.storage),
                next_page: None,
                has_more_pages: false,
                fetch_in_progress: false,
                logged_in: false,
                is_admin: false,
                display_name: None,
                force_mode: false,
                posting: false,
                service_up: true,
                comment_ids: HashSet::new(),
                own_comment_ids: HashSet::new(),
                visibilities: HashMap::new(),
                badges: HashMap::new(),
                deletes_in_progress: HashSet::new(),
            })),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WidgetState) -> R) -> Option<R> {
        self.state.borrow_mut().as_mut().map(f)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().is_none()
    }

    pub fn phase(&self) -> Phase {
        self.with_state(|s| s.phase).unwrap_or(Phase::Destroyed)
    }

    pub fn collection_id(&self) -> Option<CollectionId> {
        self.with_state(|s| s.collection_id.clone()).flatten()
    }

    pub fn events(&self) -> &EventEmitter<WidgetEvent> {
        &self.events
    }

    pub fn session(&self) -> &Rc<IdentitySession> {
        &self.session
    }

    pub fn has_comment(&self, id: CommentId) -> bool {
        self.with_state(|s| s.comment_ids.contains(&id))
            .unwrap_or(false)
    }

    pub fn is_own_comment(&self, id: CommentId) -> bool {
        self.with_state(|s| s.own_comment_ids.contains(&id))
            .unwrap_or(false)
    }

    pub fn num_comments(&self) -> usize {
        self.with_state(|s| s.comment_ids.len()).unwrap_or(0)
    }

    pub fn has_more_pages(&self) -> bool {
        self.with_state(|s| s.has_more_pages).unwrap_or(false)
    }

    pub fn force_mode(&self) -> bool {
        self.with_state(|s| s.force_mode).unwrap_or(false)
    }

    pub fn is_posting(&self) -> bool {
        self.with_state(|s| s.posting).unwrap_or(false)
    }

    pub fn is_logged_in(&self) -> bool {
        self.with_state(|s| s.logged_in).unwrap_or(false)
    }

    pub fn has_draft(&self) -> bool {
        self.with_state(|s| match &s.collection_id {
            Some(c) => s.drafts.has(c),
            None => false,
        })
        .unwrap_or(false)
    }

    /// Loads the first page, renders it and logs the user in
    pub async fn initial_load(&self) -> Result<(), WidgetError> {
        self.with_state(|s| s.phase = Phase::Loading);
        let query = self.config.query(None);
        let res = match query.validate() {
            Ok(()) => self.service.get_comments(&query).await,
            Err(err) => Err(err),
        };
        alive!(self);
        let page = match res {
            Ok(page) => page,
            Err(err) => return self.load_failed(LoadError::Service(err)),
        };
        if page.unclassified_article {
            return self.load_failed(LoadError::UnclassifiedArticle);
        }
        if page.not_allowed_to_create_collection {
            return self.load_failed(LoadError::NotAllowedToCreateCollection);
        }
        let collection_id = match page.collection_id {
            Some(c) => c,
            None => return self.load_failed(LoadError::MissingCollection),
        };

        tracing::info!(%collection_id, "collection loaded");
        *self.stream.borrow_mut() = Some(self.service.comment_stream(&collection_id));
        self.with_state(|s| {
            s.phase = Phase::Ready;
            s.collection_id = Some(collection_id.clone());
            s.next_page = page.next_page;
            s.has_more_pages = page.next_page.is_some();
        });
        self.events.emit(WidgetEvent::Ready { collection_id });

        let rendered = self.process_comments(page.comments);
        let (is_admin, has_more_pages) = self
            .with_state(|s| (s.is_admin, s.has_more_pages))
            .unwrap_or_default();
        self.ui.clear_container();
        self.ui.render(&rendered, is_admin, has_more_pages);
        if page.comments_enabled == Some(false) {
            self.ui.close();
        }
        for c in rendered.iter().filter(|c| c.is_own) {
            self.check_badge(c.id);
        }
        self.events.emit(WidgetEvent::RenderComplete);
        self.ui.on_layout_ready();
        if let Some(height) = self.config.height {
            self.ui.adapt_to_height(height);
        }

        self.post_render_auth().await
    }

    fn load_failed(&self, err: LoadError) -> Result<(), WidgetError> {
        tracing::warn!(?err, "failed loading the widget");
        let reason = UnavailableReason::from(&err);
        self.with_state(|s| s.phase = Phase::Unavailable);
        self.ui.clear_container();
        self.ui.show_not_available(reason);
        self.events.emit(WidgetEvent::LoadFailed(reason));
        Err(WidgetError::Load(err))
    }

    /// Records the comments not seen yet and prepares them for rendering
    fn process_comments(&self, comments: Vec<Comment>) -> Vec<RenderedComment> {
        let now = Utc::now();
        let format = &self.config.datetime_format;
        self.with_state(|s| {
            comments
                .into_iter()
                .filter_map(|c| {
                    if !s.comment_ids.insert(c.id) {
                        tracing::debug!(id = %c.id, "skipping already rendered comment");
                        return None;
                    }
                    s.visibilities.insert(c.id, c.visibility);
                    let is_own = s.is_own(&c);
                    if is_own {
                        s.own_comment_ids.insert(c.id);
                    }
                    Some(RenderedComment::new(format, c, is_own, now))
                })
                .collect()
        })
        .unwrap_or_default()
    }

    async fn post_render_auth(&self) -> Result<(), WidgetError> {
        let draft = self
            .with_state(|s| {
                let c = s.collection_id.as_ref()?;
                let body = s.drafts.get(c)?;
                s.force_mode = true;
                Some(body)
            })
            .flatten();
        if draft.is_some() {
            tracing::info!("found a pending draft, forcing the login flow");
        }

        let outcome = self.session.login().await;
        alive!(self);
        self.sync_session().await;
        alive!(self);
        if outcome.logged_in {
            return Ok(());
        }

        let force_mode = self.force_mode();
        match outcome.auth {
            Some(AuthData {
                pseudonym_missing: true,
                ..
            }) => {
                self.ui.hide_sign_in_link();
                if force_mode {
                    let res = self.session.login_required_pseudonym_missing().await;
                    alive!(self);
                    self.sync_session().await;
                    alive!(self);
                    if let Err(err) = res {
                        tracing::debug!(?err, "user did not set a pseudonym");
                        if let Some(body) = draft {
                            self.ui.repopulate_comment_area(&body);
                        }
                    }
                }
            }
            Some(AuthData {
                service_up: false, ..
            }) => {
                tracing::info!("commenting service is down");
                self.with_state(|s| s.service_up = false);
                self.ui.make_read_only();
                self.ui.hide_sign_in_link();
            }
            _ => {
                if let Some(body) = draft {
                    self.ui.repopulate_comment_area(&body);
                }
            }
        }
        Ok(())
    }

    /// Handles the session events that are already pending
    #[async_recursion(?Send)]
    async fn sync_session(&self) {
        loop {
            let event = self
                .session_events
                .borrow_mut()
                .as_mut()
                .and_then(|s| s.try_next());
            match event {
                Some(e) => {
                    if let Err(err) = self.handle_session_event(e).await {
                        tracing::debug!(?err, "session event handling ended with an error");
                    }
                }
                None => return,
            }
        }
    }

    pub async fn handle_session_event(&self, event: SessionEvent) -> Result<(), WidgetError> {
        match event {
            SessionEvent::Login(auth) => self.on_login(auth).await,
            SessionEvent::Logout => {
                self.on_logout();
                Ok(())
            }
            // Both are for the host
            SessionEvent::LoginRequired(_) | SessionEvent::LoginRedirect { .. } => Ok(()),
        }
    }

    async fn on_login(&self, auth: AuthData) -> Result<(), WidgetError> {
        let display_name = auth
            .display_name
            .as_deref()
            .map(|n| String::from(truncate_display_name(n)));
        let is_admin = auth.is_admin();
        let draft = self
            .with_state(|s| {
                s.logged_in = true;
                s.is_admin = is_admin;
                s.display_name = display_name.clone();
                if !s.force_mode || s.posting {
                    return None;
                }
                let c = s.collection_id.clone()?;
                s.force_mode = false;
                let body = s.drafts.get(&c)?;
                s.drafts.clear(&c);
                s.posting = true;
                Some(body)
            })
            .flatten();
        self.ui.login(display_name.as_deref(), is_admin);
        self.ui.add_settings_link();

        if let Some(body) = draft {
            tracing::info!("posting the pending draft after login");
            self.ui.repopulate_comment_area(&body);
            self.ui.make_read_only();
            return self.post_flow(body, true).await;
        }
        Ok(())
    }

    fn on_logout(&self) {
        if self.is_destroyed() {
            return;
        }
        self.with_state(|s| {
            s.logged_in = false;
            s.is_admin = false;
            s.display_name = None;
        });
        self.ui.logout();
        self.ui.remove_settings_link();
    }

    pub async fn submit_comment(&self, body: String) -> Result<(), WidgetError> {
        if self.phase() != Phase::Ready {
            tracing::debug!("ignoring comment submission, widget is not ready");
            return Ok(());
        }
        if body.trim().is_empty() {
            self.ui.set_editor_error(texts::EMPTY_COMMENT);
            return Err(WidgetError::Validation(String::from(texts::EMPTY_COMMENT)));
        }
        let started = self
            .with_state(|s| !std::mem::replace(&mut s.posting, true))
            .unwrap_or(false);
        if !started {
            tracing::debug!("a comment is already being posted");
            return Ok(());
        }
        self.ui.clear_editor_error();
        self.ui.make_read_only();

        let auth = self.service.get_auth(AuthQuery::cached()).await;
        alive!(self);
        let authenticated = matches!(&auth, Ok(Some(a)) if a.has_token());
        if authenticated && !self.session.is_logged_in() {
            self.session.login().await;
            alive!(self);
            self.sync_session().await;
            alive!(self);
        }
        self.post_flow(body, authenticated).await
    }

    /// Posts `body`, going through the login flow first if not `authenticated`,
    /// and gives the editor back once done
    async fn post_flow(&self, body: String, authenticated: bool) -> Result<(), WidgetError> {
        let res = match authenticated {
            true => self.post_comment(body, false).await,
            false => self.login_required_to_post(body, false).await,
        };
        if let Some(service_up) = self.with_state(|s| {
            s.posting = false;
            s.service_up
        }) {
            if service_up {
                self.ui.make_editable();
            }
        }
        res
    }

    async fn login_required_to_post(&self, body: String, force: bool) -> Result<(), WidgetError> {
        let collection_id = match self.collection_id() {
            Some(c) => c,
            None => return Ok(()),
        };
        self.with_state(|s| s.drafts.save(&collection_id, &body));
        tracing::info!("user not logged in, saved the comment as a draft");

        let res = self.session.login_required(force).await;
        alive!(self);
        self.sync_session().await;
        alive!(self);
        match res {
            Ok(_) => {
                self.with_state(|s| {
                    s.drafts.clear(&collection_id);
                    s.force_mode = false;
                });
                self.post_comment(body, true).await
            }
            Err(err) => {
                tracing::debug!(?err, "login required to post failed");
                if err != AuthError::Redirecting {
                    self.with_state(|s| {
                        s.drafts.clear(&collection_id);
                        s.force_mode = false;
                    });
                }
                Err(widget_auth_error(err))
            }
        }
    }

    #[async_recursion(?Send)]
    async fn post_comment(&self, body: String, second_attempt: bool) -> Result<(), WidgetError> {
        let collection_id = match self.collection_id() {
            Some(c) => c,
            None => return Ok(()),
        };
        let req = NewComment {
            collection_id: collection_id.clone(),
            body: body.clone(),
        };
        let res = match req.validate() {
            Ok(()) => self.service.post_comment(&req).await,
            Err(err) => Err(err),
        };
        alive!(self);
        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::warn!(?err, "failed posting comment");
                self.ui.set_editor_error(texts::GENERIC_ERROR);
                return Err(WidgetError::Service(err.to_string()));
            }
        };
        tracing::debug!(?res, "post comment result");

        if res.success {
            return self.comment_posted(collection_id, res).await;
        }
        if res.invalid_session {
            if !second_attempt {
                return self.login_required_to_post(body, true).await;
            }
            // Rejected right after logging in again, the session really is gone
            self.with_state(|s| s.drafts.save(&collection_id, &body));
            let err = self.session.session_expired().await;
            alive!(self);
            self.sync_session().await;
            alive!(self);
            if err != AuthError::Redirecting {
                self.with_state(|s| s.drafts.clear(&collection_id));
            }
            return Err(widget_auth_error(err));
        }
        let message = self.overrides.service_message(res.error_message.as_deref());
        self.ui.set_editor_error(&message);
        Err(WidgetError::Service(message))
    }

    async fn comment_posted(
        &self,
        collection_id: CollectionId,
        res: PostCommentResult,
    ) -> Result<(), WidgetError> {
        self.ui.empty_comment_area();
        let auth = self.service.get_auth(AuthQuery::cached()).await;
        alive!(self);
        let id = match res.comment_id {
            Some(id) => id,
            None => {
                tracing::error!(?res, "service reported a successful post without comment id");
                return Ok(());
            }
        };
        let author = match auth {
            Ok(Some(auth)) => auth.display_name,
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(?err, "failed fetching auth after posting");
                None
            }
        }
        .or_else(|| self.with_state(|s| s.display_name.clone()).flatten());
        tracing::info!(%id, "comment posted");
        self.events.emit(WidgetEvent::CommentPosted {
            collection_id,
            comment_id: id,
            body: res.body_html.clone(),
            author: author.clone(),
        });

        let comment = Comment {
            id,
            content: res.body_html.unwrap_or_default(),
            timestamp: res.created_at.unwrap_or_else(Utc::now),
            author: Author {
                display_name: author.unwrap_or_default(),
            },
            visibility: Visibility::Visible,
        };
        let now = Utc::now();
        let format = &self.config.datetime_format;
        let to_render = self
            .with_state(|s| {
                s.own_comment_ids.insert(id);
                s.visibilities.entry(id).or_insert(Visibility::Visible);
                match s.comment_ids.insert(id) {
                    true => Some((RenderedComment::new(format, comment, true, now), s.is_admin)),
                    false => None,
                }
            })
            .flatten();
        if let Some((rendered, is_admin)) = to_render {
            self.ui.add_comment(&rendered, is_admin);
        }
        self.check_badge(id);
        Ok(())
    }

    /// Shows the moderation badge of an own comment, unless it already is
    fn check_badge(&self, id: CommentId) {
        let kind = self
            .with_state(|s| {
                if !s.own_comment_ids.contains(&id) {
                    return None;
                }
                let kind = match s.visibilities.get(&id)? {
                    Visibility::Visible => return None,
                    Visibility::Blocked => BadgeKind::Blocked,
                    Visibility::Pending => BadgeKind::Pending,
                };
                match s.badges.insert(id, kind) {
                    Some(previous) if previous == kind => None,
                    _ => Some(kind),
                }
            })
            .flatten();
        if let Some(kind) = kind {
            self.ui.show_own_comment_badge(id, kind);
        }
    }

    pub async fn delete_comment(&self, id: CommentId) -> Result<(), WidgetError> {
        if self.phase() != Phase::Ready {
            return Ok(());
        }
        let started = self
            .with_state(|s| s.deletes_in_progress.insert(id))
            .unwrap_or(false);
        if !started {
            tracing::debug!(%id, "comment is already being deleted");
            return Ok(());
        }
        self.ui.mark_delete_in_progress(id);

        let auth = self.service.get_auth(AuthQuery::cached()).await;
        alive!(self);
        let res = match &auth {
            Ok(Some(a)) if a.has_token() => {
                if !self.session.is_logged_in() {
                    self.session.login().await;
                    alive!(self);
                    self.sync_session().await;
                    alive!(self);
                }
                self.try_delete(id, false).await
            }
            _ => self.login_required_to_delete(id, false).await,
        };
        self.with_state(|s| s.deletes_in_progress.remove(&id));
        res
    }

    async fn login_required_to_delete(&self, id: CommentId, force: bool) -> Result<(), WidgetError> {
        let res = self.session.login_required(force).await;
        alive!(self);
        self.sync_session().await;
        alive!(self);
        match res {
            Ok(_) => self.try_delete(id, true).await,
            Err(err) => {
                tracing::debug!(?err, "login required to delete failed");
                self.ui.mark_delete_in_progress_ended(id);
                Err(widget_auth_error(err))
            }
        }
    }

    #[async_recursion(?Send)]
    async fn try_delete(&self, id: CommentId, second_attempt: bool) -> Result<(), WidgetError> {
        let collection_id = match self.collection_id() {
            Some(c) => c,
            None => return Ok(()),
        };
        let res = self
            .service
            .delete_comment(&DeleteComment {
                collection_id: collection_id.clone(),
                comment_id: id,
            })
            .await;
        alive!(self);
        let message = match res {
            Ok(res) if res.success => {
                tracing::info!(%id, "comment deleted");
                self.remove_comment(id);
                self.events.emit(WidgetEvent::CommentDeleted {
                    collection_id,
                    comment_id: id,
                });
                return Ok(());
            }
            Ok(res) if res.invalid_session && !second_attempt => {
                return self.login_required_to_delete(id, true).await;
            }
            Ok(res) => self.overrides.service_message(res.error_message.as_deref()),
            Err(err) => {
                tracing::warn!(?err, %id, "failed deleting comment");
                String::from(texts::GENERIC_ERROR)
            }
        };
        self.ui.mark_delete_in_progress_ended(id);
        self.dialogs
            .show_message(texts::DELETE_COMMENT_TITLE, &message)
            .await;
        Err(WidgetError::Service(message))
    }

    fn remove_comment(&self, id: CommentId) {
        let was_rendered = self
            .with_state(|s| {
                s.own_comment_ids.remove(&id);
                s.visibilities.remove(&id);
                s.badges.remove(&id);
                s.comment_ids.remove(&id)
            })
            .unwrap_or(false);
        if was_rendered {
            self.ui.remove_comment(id);
        }
    }

    pub async fn next_page(&self) -> Result<(), WidgetError> {
        let cursor = self
            .with_state(|s| {
                if s.phase != Phase::Ready || !s.has_more_pages || s.fetch_in_progress {
                    return None;
                }
                s.fetch_in_progress = true;
                s.next_page
            })
            .flatten();
        let cursor = match cursor {
            Some(c) => c,
            None => {
                tracing::debug!("not fetching the next page");
                return Ok(());
            }
        };

        tracing::debug!(?cursor, "fetching next page");
        let res = self.service.get_comments(&self.config.query(Some(cursor))).await;
        alive!(self);
        let page = match res {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(?err, "failed fetching the next page");
                self.with_state(|s| {
                    s.has_more_pages = false;
                    s.fetch_in_progress = false;
                });
                self.ui.disable_pagination();
                return Err(WidgetError::Load(LoadError::Service(err)));
            }
        };

        let (is_admin, has_more_pages) = self
            .with_state(|s| {
                s.next_page = page.next_page;
                s.has_more_pages = page.next_page.is_some();
                (s.is_admin, s.has_more_pages)
            })
            .unwrap_or_default();
        let rendered = self.process_comments(page.comments);
        self.ui
            .add_next_page_comments(&rendered, is_admin, has_more_pages);
        if !has_more_pages {
            self.ui.disable_pagination();
        }
        for c in rendered.iter().filter(|c| c.is_own) {
            self.check_badge(c.id);
        }

        // Let the renderer settle before accepting another trigger
        if let Err(err) = wasm_timer::Delay::new(self.config.pagination_settle_delay()).await {
            tracing::warn!(?err, "failed waiting for the pagination to settle");
        }
        alive!(self);
        self.with_state(|s| s.fetch_in_progress = false);
        Ok(())
    }

    pub fn apply_stream_event(&self, event: StreamEvent) {
        if self.phase() != Phase::Ready {
            return;
        }
        tracing::debug!(?event, "applying stream event");
        match event {
            StreamEvent::NewComment(c) => {
                let id = c.id;
                let known = self
                    .with_state(|s| s.comment_ids.contains(&id) && s.visibilities.contains_key(&id))
                    .unwrap_or(false);
                if known {
                    // Re-push of a rendered comment, only its visibility may have changed
                    return self.apply_stream_event(StreamEvent::CommentUpdated {
                        id,
                        body: None,
                        visibility: Some(c.visibility),
                    });
                }
                let now = Utc::now();
                let format = &self.config.datetime_format;
                let to_render = self
                    .with_state(|s| {
                        s.visibilities.insert(id, c.visibility);
                        let is_own = s.is_own(&c);
                        if is_own {
                            s.own_comment_ids.insert(id);
                        }
                        if !c.visibility.is_visible() || !s.comment_ids.insert(id) {
                            return None;
                        }
                        Some((RenderedComment::new(format, c, is_own, now), s.is_admin))
                    })
                    .flatten();
                if let Some((rendered, is_admin)) = to_render {
                    self.ui.add_comment(&rendered, is_admin);
                }
                self.check_badge(id);
            }
            StreamEvent::CommentUpdated {
                id,
                body,
                visibility,
            } => {
                let (rendered, is_own, previous) = self
                    .with_state(|s| {
                        (
                            s.comment_ids.contains(&id),
                            s.own_comment_ids.contains(&id),
                            s.visibilities.get(&id).copied(),
                        )
                    })
                    .unwrap_or((false, false, None));
                if rendered {
                    if let Some(body) = &body {
                        self.ui.update_comment(id, body);
                    }
                }
                match (visibility, previous) {
                    (Some(v), Some(previous)) if v != previous => {
                        self.with_state(|s| s.visibilities.insert(id, v));
                        self.check_badge(id);
                        if rendered && !is_own && !v.is_visible() {
                            self.remove_comment(id);
                        }
                    }
                    _ => (),
                }
            }
            StreamEvent::CommentDeleted(id) => self.remove_comment(id),
            StreamEvent::CollectionOpened => self.ui.open(),
            StreamEvent::CollectionClosed => self.ui.close(),
        }
    }

    pub async fn sign_in(&self) -> Result<(), WidgetError> {
        let res = self.session.login_required(false).await;
        alive!(self);
        self.sync_session().await;
        res.map(|_| ()).map_err(widget_auth_error)
    }

    /// Lets a logged-in user change their pseudonym
    pub async fn open_settings(&self) -> Result<(), WidgetError> {
        let res = self.session.login_required(false).await;
        alive!(self);
        self.sync_session().await;
        alive!(self);
        res.map_err(widget_auth_error)?;

        let auth = match self.service.get_auth(AuthQuery::cached()).await {
            Ok(Some(auth)) => auth,
            Ok(None) => return Ok(()),
            Err(err) => {
                tracing::warn!(?err, "failed fetching auth for the settings dialog");
                return Ok(());
            }
        };
        alive!(self);
        let dialog = PseudonymDialog::Change {
            current: auth.display_name.unwrap_or_default(),
        };
        let res =
            dialogs::pseudonym_dialog(&*self.dialogs, &*self.service, &self.overrides, dialog)
                .await;
        alive!(self);
        match res {
            Ok(new_auth) if new_auth.has_token() => {
                self.session.logout();
                self.session.login().await;
                alive!(self);
                self.sync_session().await;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(err) => Err(WidgetError::AuthRequired(err.into())),
        }
    }

    pub async fn handle_ui_event(&self, event: UiEvent) -> Result<(), WidgetError> {
        tracing::debug!(?event, "handling ui event");
        match event {
            UiEvent::SubmitComment(body) => self.submit_comment(body).await,
            UiEvent::DeleteComment(id) => self.delete_comment(id).await,
            UiEvent::SignIn => self.sign_in().await,
            UiEvent::NextPage => self.next_page().await,
            UiEvent::OpenSettings => self.open_settings().await,
        }
    }

    /// Tears the widget down, operations still waiting on the network or on
    /// the user will end without effect
    pub fn destroy(&self) {
        let mut state = match self.state.borrow_mut().take() {
            Some(s) => s,
            None => return,
        };
        state.drafts.destroy();
        if let Some(sub) = self.session_events.borrow_mut().take() {
            self.session.events().unsubscribe(sub.id);
        }
        self.stream.borrow_mut().take();
        if let Some(sender) = self.destroyed_sender.borrow_mut().take() {
            let _ = sender.send(());
        }
        self.ui.detach();
        tracing::info!("widget destroyed");
    }

    /// Loads the widget, then handles UI events, session events and live
    /// pushes until the widget is destroyed
    pub async fn run<S>(self: Rc<Self>, ui_events: S) -> Result<(), WidgetError>
    where
        S: Stream<Item = UiEvent> + 'static,
    {
        let mut destroyed = match self.destroyed.borrow_mut().take() {
            Some(d) => d.fuse(),
            None => {
                tracing::warn!("widget event loop started twice");
                return Ok(());
            }
        };
        self.initial_load().await?;

        let mut ui_events = ui_events.boxed_local().fuse();
        let mut in_flight = FuturesUnordered::new();
        while !self.is_destroyed() {
            let stream_event = future::poll_fn(|cx| match self.stream.borrow_mut().as_mut() {
                Some(s) => s.poll_next_unpin(cx),
                None => Poll::Pending,
            })
            .fuse();
            let session_event =
                future::poll_fn(|cx| match self.session_events.borrow_mut().as_mut() {
                    Some(s) => s.poll_next_unpin(cx),
                    None => Poll::Pending,
                })
                .fuse();
            futures::pin_mut!(stream_event, session_event);
            select! {
                _ = destroyed => break,
                event = ui_events.select_next_some() => {
                    let this = self.clone();
                    in_flight.push(async move { this.handle_ui_event(event).await }.boxed_local());
                }
                event = stream_event => match event {
                    Some(event) => {
                        for e in stream::normalize(event) {
                            self.apply_stream_event(e);
                        }
                    }
                    None => {
                        tracing::info!("comment stream ended");
                        self.stream.borrow_mut().take();
                    }
                },
                event = session_event => {
                    if let Some(event) = event {
                        let this = self.clone();
                        in_flight.push(async move { this.handle_session_event(event).await }.boxed_local());
                    }
                }
                res = in_flight.select_next_some() => {
                    if let Err(err) = res {
                        tracing::debug!(?err, "widget operation ended with an error");
                    }
                }
            }
        }
        Ok(())
    }
}
