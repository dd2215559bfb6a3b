use gloo_storage::{errors::StorageError, SessionStorage, Storage};
use talkback_client::DraftStorage;

/// Drafts kept in the browser's session storage, so they survive the reload
/// that follows a sign-in
pub struct SessionDraftStorage;

impl DraftStorage for SessionDraftStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        match SessionStorage::get::<String>(key) {
            Ok(body) => Ok(Some(body)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(err.to_string()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        SessionStorage::set(key, value).map_err(|e| e.to_string())
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        // gloo's delete cannot fail
        SessionStorage::delete(key);
        Ok(())
    }
}
