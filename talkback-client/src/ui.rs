use talkback_api::CommentId;

use crate::{LoadError, RenderedComment};

/// Moderation badge shown to the author of a non-visible comment
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BadgeKind {
    Blocked,
    Pending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnavailableReason {
    UnclassifiedArticle,
    NotAllowedToCreateCollection,
    LoadFailed,
}

impl From<&LoadError> for UnavailableReason {
    fn from(err: &LoadError) -> UnavailableReason {
        match err {
            LoadError::UnclassifiedArticle => UnavailableReason::UnclassifiedArticle,
            LoadError::NotAllowedToCreateCollection => {
                UnavailableReason::NotAllowedToCreateCollection
            }
            LoadError::MissingCollection | LoadError::Service(_) => UnavailableReason::LoadFailed,
        }
    }
}

/// What the user did in the rendered widget
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UiEvent {
    SubmitComment(String),
    DeleteComment(CommentId),
    SignIn,
    NextPage,
    OpenSettings,
}

/// Builds and patches the widget markup
///
/// Calls are synchronous and never fail, the renderer owns whatever errors
/// its backend may have.
pub trait UiRenderer {
    fn clear_container(&self);
    fn render(&self, comments: &[RenderedComment], is_admin: bool, has_more_pages: bool);
    fn add_comment(&self, comment: &RenderedComment, is_admin: bool);
    fn add_next_page_comments(
        &self,
        comments: &[RenderedComment],
        is_admin: bool,
        has_more_pages: bool,
    );
    fn remove_comment(&self, id: CommentId);
    fn update_comment(&self, id: CommentId, body: &str);
    fn mark_delete_in_progress(&self, id: CommentId);
    fn mark_delete_in_progress_ended(&self, id: CommentId);
    fn disable_pagination(&self);

    fn login(&self, display_name: Option<&str>, is_admin: bool);
    fn logout(&self);
    fn add_settings_link(&self);
    fn remove_settings_link(&self);
    fn hide_sign_in_link(&self);
    fn show_own_comment_badge(&self, id: CommentId, kind: BadgeKind);

    /// Current contents of the comment editor
    fn current_comment(&self) -> String;
    fn make_read_only(&self);
    fn make_editable(&self);
    fn empty_comment_area(&self);
    fn repopulate_comment_area(&self, body: &str);
    fn set_editor_error(&self, message: &str);
    fn clear_editor_error(&self);

    fn show_not_available(&self, reason: UnavailableReason);
    fn open(&self);
    fn close(&self);
    fn adapt_to_height(&self, px: u32);

    /// Called once the first render is laid out
    fn on_layout_ready(&self) {}

    fn detach(&self);
}
