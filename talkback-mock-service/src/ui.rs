use std::{cell::RefCell, collections::HashSet};

use talkback_client::{api::CommentId, BadgeKind, RenderedComment, UiRenderer, UnavailableReason};

/// One call received by the recording renderer
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UiCall {
    ClearContainer,
    Render(Vec<RenderedComment>),
    AddComment(RenderedComment),
    AddNextPageComments(Vec<RenderedComment>),
    RemoveComment(CommentId),
    UpdateComment(CommentId, String),
    MarkDeleteInProgress(CommentId),
    MarkDeleteInProgressEnded(CommentId),
    DisablePagination,
    Login(Option<String>),
    Logout,
    AddSettingsLink,
    RemoveSettingsLink,
    HideSignInLink,
    ShowOwnCommentBadge(CommentId, BadgeKind),
    MakeReadOnly,
    MakeEditable,
    EmptyCommentArea,
    RepopulateCommentArea(String),
    SetEditorError(String),
    ClearEditorError,
    ShowNotAvailable(UnavailableReason),
    Open,
    Close,
    AdaptToHeight(u32),
    LayoutReady,
    Detach,
}

/// Renderer that only keeps track of what it was asked to display
#[derive(Default)]
pub struct RecordingUi {
    calls: RefCell<Vec<UiCall>>,
    displayed: RefCell<HashSet<CommentId>>,
    double_renders: RefCell<Vec<CommentId>>,
    editor: RefCell<String>,
}

impl RecordingUi {
    pub fn new() -> RecordingUi {
        RecordingUi::default()
    }

    pub fn test_calls(&self) -> Vec<UiCall> {
        self.calls.borrow().clone()
    }

    pub fn test_count(&self, f: impl Fn(&UiCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| f(c)).count()
    }

    pub fn test_has(&self, call: &UiCall) -> bool {
        self.calls.borrow().contains(call)
    }

    /// Comments currently on screen
    pub fn test_displayed(&self) -> HashSet<CommentId> {
        self.displayed.borrow().clone()
    }

    /// Comments that were inserted while already on screen
    pub fn test_double_renders(&self) -> Vec<CommentId> {
        self.double_renders.borrow().clone()
    }

    pub fn test_editor(&self) -> String {
        self.editor.borrow().clone()
    }

    pub fn test_badges(&self) -> Vec<(CommentId, BadgeKind)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                UiCall::ShowOwnCommentBadge(id, kind) => Some((*id, *kind)),
                _ => None,
            })
            .collect()
    }

    pub fn test_last_editor_error(&self) -> Option<String> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find_map(|c| match c {
                UiCall::SetEditorError(e) => Some(e.clone()),
                UiCall::ClearEditorError => Some(String::new()),
                _ => None,
            })
            .filter(|e| !e.is_empty())
    }

    fn record(&self, call: UiCall) {
        self.calls.borrow_mut().push(call);
    }

    fn display(&self, comments: &[RenderedComment]) {
        let mut displayed = self.displayed.borrow_mut();
        for c in comments {
            if !displayed.insert(c.id) {
                self.double_renders.borrow_mut().push(c.id);
            }
        }
    }
}

impl UiRenderer for RecordingUi {
    fn clear_container(&self) {
        self.displayed.borrow_mut().clear();
        self.record(UiCall::ClearContainer);
    }

    fn render(&self, comments: &[RenderedComment], _is_admin: bool, _has_more_pages: bool) {
        self.display(comments);
        self.record(UiCall::Render(comments.to_vec()));
    }

    fn add_comment(&self, comment: &RenderedComment, _is_admin: bool) {
        self.display(std::slice::from_ref(comment));
        self.record(UiCall::AddComment(comment.clone()));
    }

    fn add_next_page_comments(
        &self,
        comments: &[RenderedComment],
        _is_admin: bool,
        _has_more_pages: bool,
    ) {
        self.display(comments);
        self.record(UiCall::AddNextPageComments(comments.to_vec()));
    }

    fn remove_comment(&self, id: CommentId) {
        self.displayed.borrow_mut().remove(&id);
        self.record(UiCall::RemoveComment(id));
    }

    fn update_comment(&self, id: CommentId, body: &str) {
        self.record(UiCall::UpdateComment(id, String::from(body)));
    }

    fn mark_delete_in_progress(&self, id: CommentId) {
        self.record(UiCall::MarkDeleteInProgress(id));
    }

    fn mark_delete_in_progress_ended(&self, id: CommentId) {
        self.record(UiCall::MarkDeleteInProgressEnded(id));
    }

    fn disable_pagination(&self) {
        self.record(UiCall::DisablePagination);
    }

    fn login(&self, display_name: Option<&str>, _is_admin: bool) {
        self.record(UiCall::Login(display_name.map(String::from)));
    }

    fn logout(&self) {
        self.record(UiCall::Logout);
    }

    fn add_settings_link(&self) {
        self.record(UiCall::AddSettingsLink);
    }

    fn remove_settings_link(&self) {
        self.record(UiCall::RemoveSettingsLink);
    }

    fn hide_sign_in_link(&self) {
        self.record(UiCall::HideSignInLink);
    }

    fn show_own_comment_badge(&self, id: CommentId, kind: BadgeKind) {
        self.record(UiCall::ShowOwnCommentBadge(id, kind));
    }

    fn current_comment(&self) -> String {
        self.editor.borrow().clone()
    }

    fn make_read_only(&self) {
        self.record(UiCall::MakeReadOnly);
    }

    fn make_editable(&self) {
        self.record(UiCall::MakeEditable);
    }

    fn empty_comment_area(&self) {
        self.editor.borrow_mut().clear();
        self.record(UiCall::EmptyCommentArea);
    }

    fn repopulate_comment_area(&self, body: &str) {
        *self.editor.borrow_mut() = String::from(body);
        self.record(UiCall::RepopulateCommentArea(String::from(body)));
    }

    fn set_editor_error(&self, message: &str) {
        self.record(UiCall::SetEditorError(String::from(message)));
    }

    fn clear_editor_error(&self) {
        self.record(UiCall::ClearEditorError);
    }

    fn show_not_available(&self, reason: UnavailableReason) {
        self.record(UiCall::ShowNotAvailable(reason));
    }

    fn open(&self) {
        self.record(UiCall::Open);
    }

    fn close(&self) {
        self.record(UiCall::Close);
    }

    fn adapt_to_height(&self, px: u32) {
        self.record(UiCall::AdaptToHeight(px));
    }

    fn on_layout_ready(&self) {
        self.record(UiCall::LayoutReady);
    }

    fn detach(&self) {
        self.record(UiCall::Detach);
    }
}
