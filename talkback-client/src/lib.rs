mod config;
pub use config::{DatetimeFormat, MessageOverride, MessageOverrides, WidgetConfig};

pub mod dialogs;
pub use dialogs::{Dialogs, InactivityChoice, PseudonymDialog};

mod draft;
pub use draft::{DraftStorage, DraftStore, MemoryStorage};

mod error;
pub use error::{AuthError, DialogError, LoadError, WidgetError};

mod events;
pub use events::{EventEmitter, Subscription};

mod render;
pub use render::RenderedComment;

mod session;
pub use session::{AuthAction, IdentitySession, LoginOutcome, Session, SessionEvent};

pub mod stream;
pub use stream::StreamEvent;

pub mod texts;

mod ui;
pub use ui::{BadgeKind, UiEvent, UiRenderer, UnavailableReason};

mod widget;
pub use widget::{Collaborators, Phase, WidgetController, WidgetEvent};

pub mod api {
    pub use talkback_api::*;
}
