//! User-facing messages the controller shows on its own behalf

pub const EMPTY_COMMENT: &str = "The comment cannot be empty.";
pub const GENERIC_ERROR: &str = "The service is temporarily unavailable. Please try again later.";
pub const CHANGE_PSEUDONYM_ERROR: &str = "Changing the pseudonym failed. Please try again later.";
pub const PSEUDONYM_BLANK: &str = "The pseudonym cannot be blank.";
pub const DELETE_COMMENT_TITLE: &str = "Delete comment";
