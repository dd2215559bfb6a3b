use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use futures::channel::oneshot;
use talkback_api::{AuthData, AuthQuery, AuthToken, DataService};

use crate::{
    dialogs::{self, Dialogs, InactivityChoice, PseudonymDialog},
    AuthError, EventEmitter, MessageOverrides, Subscription,
};

/// What the widget knows about the current user
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Session {
    pub logged_in: bool,
    pub token: Option<AuthToken>,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub pseudonym_missing: bool,
}

/// Handed to the host along with `SessionEvent::LoginRequired`, the host
/// resolves it once its own sign-in flow is over
///
/// Dropping every clone without resolving counts as a failure.
#[derive(Clone)]
pub struct AuthAction(Rc<RefCell<Option<oneshot::Sender<bool>>>>);

impl AuthAction {
    fn new() -> (AuthAction, oneshot::Receiver<bool>) {
        let (sender, receiver) = oneshot::channel();
        (AuthAction(Rc::new(RefCell::new(Some(sender)))), receiver)
    }

    pub fn succeed(&self) {
        self.resolve(true)
    }

    pub fn fail(&self) {
        self.resolve(false)
    }

    pub fn is_pending(&self) -> bool {
        self.0.borrow().is_some()
    }

    fn resolve(&self, success: bool) {
        if let Some(sender) = self.0.borrow_mut().take() {
            // The waiting side may already be gone if the widget was destroyed
            let _ = sender.send(success);
        }
    }
}

impl fmt::Debug for AuthAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthAction")
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
    Login(AuthData),
    Logout,

    /// The user has no identity at all, the host has to run its own sign-in
    LoginRequired(AuthAction),

    /// The user asked to sign in again after their session expired
    LoginRedirect { url: String },
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoginOutcome {
    pub logged_in: bool,

    /// None when the service could not be reached or knew nothing
    pub auth: Option<AuthData>,
}

pub struct IdentitySession {
    service: Rc<dyn DataService>,
    dialogs: Rc<dyn Dialogs>,
    overrides: MessageOverrides,
    login_url: String,
    events: EventEmitter<SessionEvent>,
    session: RefCell<Session>,

    /// Whether this user was logged in at some point, an anonymous user who
    /// was is facing an expired session
    had_session: Cell<bool>,
}

impl IdentitySession {
    pub fn new(
        service: Rc<dyn DataService>,
        dialogs: Rc<dyn Dialogs>,
        overrides: MessageOverrides,
        login_url: String,
    ) -> IdentitySession {
        IdentitySession {
            service,
            dialogs,
            overrides,
            login_url,
            events: EventEmitter::new(),
            session: RefCell::new(Session::default()),
            had_session: Cell::new(false),
        }
    }

    pub fn current(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.borrow().logged_in
    }

    pub fn events(&self) -> &EventEmitter<SessionEvent> {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription<SessionEvent> {
        self.events.subscribe()
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub async fn login(&self) -> LoginOutcome {
        match self.service.get_auth(AuthQuery::cached()).await {
            Ok(Some(auth)) => self.apply_auth(auth),
            Ok(None) => LoginOutcome::default(),
            Err(err) => {
                tracing::warn!(?err, "failed fetching auth");
                LoginOutcome::default()
            }
        }
    }

    fn apply_auth(&self, auth: AuthData) -> LoginOutcome {
        if auth.has_token() {
            *self.session.borrow_mut() = Session {
                logged_in: true,
                token: auth.token.clone(),
                display_name: auth.display_name.clone(),
                is_admin: auth.is_admin(),
                pseudonym_missing: false,
            };
            self.had_session.set(true);
            tracing::info!(display_name = ?auth.display_name, "logged in");
            self.events.emit(SessionEvent::Login(auth.clone()));
            return LoginOutcome {
                logged_in: true,
                auth: Some(auth),
            };
        }
        if auth.pseudonym_missing {
            self.session.borrow_mut().pseudonym_missing = true;
        }
        LoginOutcome {
            logged_in: false,
            auth: Some(auth),
        }
    }

    /// Forgets everything about the current user
    ///
    /// Only the transition out of the logged-in state is announced.
    pub fn logout(&self) {
        self.service.forget_auth();
        let previous = std::mem::take(&mut *self.session.borrow_mut());
        if previous.logged_in {
            tracing::info!("logged out");
            self.events.emit(SessionEvent::Logout);
        }
    }

    async fn fetch_auth(&self, force: bool) -> AuthData {
        match self.service.get_auth(AuthQuery { force }).await {
            Ok(Some(auth)) => auth,
            Ok(None) => AuthData::anonymous(),
            Err(err) => {
                tracing::warn!(?err, "failed fetching auth");
                AuthData::anonymous()
            }
        }
    }

    /// Makes sure the user is authenticated and has a pseudonym, prompting
    /// them as needed
    pub async fn login_required(&self, force: bool) -> Result<AuthData, AuthError> {
        let auth = self.fetch_auth(force).await;
        if auth.pseudonym_missing {
            self.session.borrow_mut().pseudonym_missing = true;
            return self.login_required_pseudonym_missing().await;
        }
        if auth.has_token() {
            return Ok(auth_of(self.apply_auth(auth)));
        }
        if auth.session_expired || self.had_session.get() {
            return Err(self.session_expired().await);
        }

        tracing::debug!("asking the host for a login");
        let (action, done) = AuthAction::new();
        self.events.emit(SessionEvent::LoginRequired(action));
        match done.await {
            Ok(true) => (),
            Ok(false) | Err(oneshot::Canceled) => return Err(AuthError::Cancelled),
        }

        let auth = self.fetch_auth(true).await;
        if auth.pseudonym_missing {
            self.session.borrow_mut().pseudonym_missing = true;
            return self.login_required_pseudonym_missing().await;
        }
        match auth.has_token() {
            true => Ok(auth_of(self.apply_auth(auth))),
            false => Err(AuthError::NotAuthenticated),
        }
    }

    pub async fn login_required_pseudonym_missing(&self) -> Result<AuthData, AuthError> {
        dialogs::pseudonym_dialog(
            &*self.dialogs,
            &*self.service,
            &self.overrides,
            PseudonymDialog::Set,
        )
        .await?;
        match self.login().await {
            LoginOutcome {
                logged_in: true,
                auth: Some(auth),
            } => Ok(auth),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    /// Logs out and tells the user their session is over, returning the error
    /// the interrupted operation should end with
    pub async fn session_expired(&self) -> AuthError {
        tracing::info!("session expired");
        self.logout();
        match self.dialogs.inactivity_message().await {
            InactivityChoice::SignIn => {
                self.events.emit(SessionEvent::LoginRedirect {
                    url: self.login_url.clone(),
                });
                AuthError::Redirecting
            }
            InactivityChoice::Dismissed => AuthError::SessionExpired,
        }
    }
}

fn auth_of(outcome: LoginOutcome) -> AuthData {
    outcome.auth.unwrap_or_else(AuthData::anonymous)
}
