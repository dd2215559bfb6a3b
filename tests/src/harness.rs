use std::rc::Rc;

use futures::{executor::LocalSpawner, task::LocalSpawnExt, StreamExt};
use talkback_client::{
    api::{
        ArticleId, AuthData, AuthToken, Author, CollectionId, CollectionPage, Comment, CommentId,
        Time, Visibility,
    },
    Collaborators, DraftStorage, IdentitySession, MemoryStorage, SessionEvent, WidgetConfig,
    WidgetController,
};
use talkback_mock_service::{MockService, RecordingUi, ScriptedDialogs};

pub const ARTICLE: &str = "article-1";
pub const DRAFT_KEY: &str = "talkback-draft-stub-collection";

pub fn init_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        // Several tests share the process, only the first one installs it
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }
}

pub fn config() -> WidgetConfig {
    let mut config = WidgetConfig::new(
        ArticleId(String::from(ARTICLE)),
        String::from("https://example.org/article-1"),
        String::from("Article 1"),
    );
    config.pagination_settle_ms = 1;
    config
}

pub fn time() -> Time {
    "2022-11-02T10:00:00Z".parse().expect("parsing test time")
}

pub fn comment(id: u64, author: &str) -> Comment {
    Comment {
        id: CommentId(id),
        content: format!("<p>comment {id}</p>"),
        timestamp: time(),
        author: Author {
            display_name: String::from(author),
        },
        visibility: Visibility::Visible,
    }
}

pub fn page(ids: &[u64]) -> CollectionPage {
    CollectionPage::new(
        CollectionId::stub(),
        ids.iter().map(|id| comment(*id, "bob")).collect(),
    )
}

pub fn logged_in(name: &str) -> AuthData {
    AuthData::logged_in(AuthToken::stub(), String::from(name))
}

pub struct Harness {
    pub service: Rc<MockService>,
    pub ui: Rc<RecordingUi>,
    pub dialogs: Rc<ScriptedDialogs>,
    pub storage: MemoryStorage,
    pub widget: Rc<WidgetController>,
}

impl Harness {
    pub fn new() -> Harness {
        Harness::with(config(), MemoryStorage::new())
    }

    pub fn with(config: WidgetConfig, storage: MemoryStorage) -> Harness {
        init_logging();
        let service = Rc::new(MockService::new());
        let ui = Rc::new(RecordingUi::new());
        let dialogs = Rc::new(ScriptedDialogs::new());
        let backend: Rc<dyn DraftStorage> = Rc::new(storage.clone());
        let collab = Collaborators::new(
            &config,
            service.clone(),
            ui.clone(),
            dialogs.clone(),
            Some(backend),
        )
        .expect("building collaborators");
        let widget =
            Rc::new(WidgetController::new(config, collab).expect("building widget controller"));
        Harness {
            service,
            ui,
            dialogs,
            storage,
            widget,
        }
    }

    pub fn session(&self) -> &IdentitySession {
        self.widget.session()
    }

    pub fn draft(&self) -> Option<String> {
        self.storage
            .get_item(DRAFT_KEY)
            .expect("reading memory storage")
    }

    /// Answers every login request of the widget by logging the user in as
    /// `auth`, or by failing if None
    ///
    /// The drafts seen while the request was pending are recorded in the
    /// returned list.
    pub fn host_answers_login(
        &self,
        spawner: &LocalSpawner,
        auth: Option<AuthData>,
    ) -> Rc<std::cell::RefCell<Vec<Option<String>>>> {
        let mut events = self.session().subscribe();
        let service = self.service.clone();
        let storage = self.storage.clone();
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_in_task = seen.clone();
        spawner
            .spawn_local(async move {
                while let Some(e) = events.next().await {
                    if let SessionEvent::LoginRequired(action) = e {
                        seen_in_task
                            .borrow_mut()
                            .push(storage.get_item(DRAFT_KEY).expect("reading draft"));
                        match &auth {
                            Some(auth) => {
                                service.set_auth(Some(auth.clone()));
                                action.succeed();
                            }
                            None => action.fail(),
                        }
                    }
                }
            })
            .expect("spawning host task");
        seen
    }
}
