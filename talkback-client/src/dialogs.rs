//! User prompts, and the pseudonym flows built on top of them

use async_trait::async_trait;
use talkback_api::{AuthData, AuthQuery, DataService, UpdateUserError, UserUpdate};

use crate::{texts, DialogError, MessageOverrides};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PseudonymDialog {
    /// First-time choice, the user cannot comment before picking one
    Set,
    Change { current: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InactivityChoice {
    SignIn,
    Dismissed,
}

#[async_trait(?Send)]
pub trait Dialogs {
    /// Shows the pseudonym form, with `error` from the previous submission if
    /// any, and resolves to the submitted fields or None if it was closed
    async fn pseudonym_form(
        &self,
        dialog: &PseudonymDialog,
        error: Option<&str>,
    ) -> Option<UserUpdate>;

    async fn inactivity_message(&self) -> InactivityChoice;

    async fn show_message(&self, title: &str, body: &str);
}

/// Prompts until the service accepts a pseudonym or the user gives up, then
/// returns the refreshed auth data
pub async fn pseudonym_dialog(
    dialogs: &dyn Dialogs,
    service: &dyn DataService,
    overrides: &MessageOverrides,
    dialog: PseudonymDialog,
) -> Result<AuthData, DialogError> {
    let mut error: Option<String> = None;
    loop {
        let mut update = dialogs
            .pseudonym_form(&dialog, error.as_deref())
            .await
            .ok_or(DialogError::Closed)?;
        let pseudonym = update
            .pseudonym
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        if pseudonym.is_empty() {
            error = Some(String::from(texts::PSEUDONYM_BLANK));
            continue;
        }
        update.pseudonym = Some(pseudonym);
        match service.update_user(&update).await {
            Ok(()) => break,
            Err(UpdateUserError::Rejected(key)) => {
                tracing::debug!(%key, "pseudonym rejected by the service");
                error = Some(String::from(overrides.exact(&key).unwrap_or(&key)));
            }
            Err(UpdateUserError::Service(err)) => {
                tracing::warn!(?err, "failed updating the user");
                error = Some(String::from(match dialog {
                    PseudonymDialog::Set => texts::GENERIC_ERROR,
                    PseudonymDialog::Change { .. } => texts::CHANGE_PSEUDONYM_ERROR,
                }));
            }
        }
    }
    match service.get_auth(AuthQuery::forced()).await {
        Ok(Some(auth)) => Ok(auth),
        Ok(None) => {
            tracing::warn!("no auth data after updating the pseudonym");
            Err(DialogError::AuthRefresh)
        }
        Err(err) => {
            tracing::warn!(?err, "failed refreshing auth after updating the pseudonym");
            Err(DialogError::AuthRefresh)
        }
    }
}
