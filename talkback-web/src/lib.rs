//! Browser host for the commenting widget
//!
//! The embedding page brings its own renderer and dialogs, this crate wires
//! them to the HTTP backend and runs the widget on the page's event loop.

use std::rc::Rc;

use anyhow::Context;
use futures::channel::mpsc;
use talkback_client::{
    Collaborators, Dialogs, DraftStorage, EventEmitter, IdentitySession, UiEvent, UiRenderer,
    WidgetConfig, WidgetController, WidgetEvent,
};

mod api;
pub use api::HttpDataService;

mod feed;

mod storage;
pub use storage::SessionDraftStorage;

pub fn init_logging() {
    if tracing_wasm::try_set_as_global_default().is_err() {
        tracing::debug!("logging was already set up");
    }
}

/// A running widget, as seen by the embedding page
pub struct WidgetHandle {
    widget: Rc<WidgetController>,
    ui_events: mpsc::UnboundedSender<UiEvent>,
}

impl WidgetHandle {
    /// Forwards something the user did in the rendered markup
    pub fn send(&self, event: UiEvent) {
        if self.ui_events.unbounded_send(event).is_err() {
            tracing::debug!("widget event loop is gone, dropping ui event");
        }
    }

    /// Login, logout and login-required notifications for the host
    pub fn session(&self) -> &Rc<IdentitySession> {
        self.widget.session()
    }

    pub fn events(&self) -> &EventEmitter<WidgetEvent> {
        self.widget.events()
    }

    pub fn destroy(&self) {
        self.widget.destroy();
    }
}

/// Parses the host's JSON configuration and starts the widget in the
/// background
pub fn start(
    config_json: &str,
    service_host: String,
    ui: Rc<dyn UiRenderer>,
    dialogs: Rc<dyn Dialogs>,
) -> anyhow::Result<WidgetHandle> {
    let config = WidgetConfig::from_json(config_json).context("parsing widget configuration")?;
    let service = Rc::new(HttpDataService::new(service_host));
    let storage: Rc<dyn DraftStorage> = Rc::new(SessionDraftStorage);
    let collab = Collaborators::new(&config, service, ui, dialogs, Some(storage))
        .context("setting up the widget collaborators")?;
    let widget = Rc::new(WidgetController::new(config, collab).context("creating the widget")?);

    let (ui_events, ui_receiver) = mpsc::unbounded();
    let runner = widget.clone();
    wasm_bindgen_futures::spawn_local(async move {
        match runner.run(ui_receiver).await {
            Ok(()) => tracing::info!("widget stopped"),
            Err(err) => tracing::warn!(?err, "widget failed loading"),
        }
    });
    Ok(WidgetHandle { widget, ui_events })
}
