use std::{cell::RefCell, collections::HashMap, rc::Rc};

use talkback_api::CollectionId;

/// Storage keys are this prefix followed by the collection id
const KEY_PREFIX: &str = "talkback-draft-";

/// A string key-value store scoped to the browser session
///
/// Errors are reported as text, the draft store only ever logs them.
pub trait DraftStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove_item(&self, key: &str) -> Result<(), String>;
}

/// In-memory storage, for hosts without session storage and for tests
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(Rc<RefCell<HashMap<String, String>>>);

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl DraftStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.0.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        self.0
            .borrow_mut()
            .insert(String::from(key), String::from(value));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        self.0.borrow_mut().remove(key);
        Ok(())
    }
}

/// One pending comment body per collection, kept across page reloads
///
/// Without a storage backend every operation is a no-op.
pub struct DraftStore {
    storage: Option<Rc<dyn DraftStorage>>,
}

impl DraftStore {
    pub fn new(storage: Option<Rc<dyn DraftStorage>>) -> DraftStore {
        DraftStore { storage }
    }

    fn key(collection: &CollectionId) -> String {
        format!("{KEY_PREFIX}{collection}")
    }

    pub fn save(&self, collection: &CollectionId, body: &str) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.set_item(&DraftStore::key(collection), body) {
                tracing::warn!(?err, %collection, "failed saving draft");
            }
        }
    }

    pub fn get(&self, collection: &CollectionId) -> Option<String> {
        let storage = self.storage.as_ref()?;
        match storage.get_item(&DraftStore::key(collection)) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(?err, %collection, "failed reading draft");
                None
            }
        }
    }

    pub fn has(&self, collection: &CollectionId) -> bool {
        self.get(collection).is_some()
    }

    pub fn clear(&self, collection: &CollectionId) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.remove_item(&DraftStore::key(collection)) {
                tracing::warn!(?err, %collection, "failed clearing draft");
            }
        }
    }

    /// Releases the storage handle, the store behaves as absent afterwards
    pub fn destroy(&mut self) {
        self.storage = None;
    }
}
