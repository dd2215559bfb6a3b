use talkback_api::ServiceError;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DialogError {
    #[error("Dialog closed by the user")]
    Closed,

    #[error("Refreshing auth after the profile update failed")]
    AuthRefresh,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Login was cancelled")]
    Cancelled,

    #[error("User is still not authenticated")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    /// The user chose to sign in again, the host page is navigating away
    #[error("Redirecting to the login page")]
    Redirecting,

    #[error(transparent)]
    Dialog(#[from] DialogError),
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Article is unclassified, comments are not available")]
    UnclassifiedArticle,

    #[error("Not allowed to create a collection for this article")]
    NotAllowedToCreateCollection,

    #[error("Service answered without a collection")]
    MissingCollection,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum WidgetError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Login required: {0}")]
    AuthRequired(#[from] AuthError),

    #[error("Session expired")]
    SessionExpired,

    #[error("Service error: {0}")]
    Service(String),

    #[error("Widget unavailable: {0}")]
    Load(#[from] LoadError),
}
