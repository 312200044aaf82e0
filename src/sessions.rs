use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-user keyed session storage.
///
/// Pure create/get/delete lifecycle with no business logic. The lock is
/// only taken for the duration of a single map operation and is never
/// held across an await point.
pub struct SessionStore<T> {
    inner: Arc<Mutex<HashMap<String, T>>>,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionStore<T> {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Insert only when the key is free. Returns false (and leaves the
    /// existing entry untouched) when a session is already active.
    pub fn insert_new(&self, key: &str, value: T) -> bool {
        let mut map = self.inner.lock().unwrap();
        if map.contains_key(key) {
            return false;
        }
        map.insert(key.to_string(), value);
        true
    }

    /// Insert unconditionally, superseding any previous session.
    pub fn replace(&self, key: &str, value: T) {
        self.inner.lock().unwrap().insert(key.to_string(), value);
    }

    /// Mutate an existing session in place. Returns false when absent.
    pub fn update<F: FnOnce(&mut T)>(&self, key: &str, f: F) -> bool {
        let mut map = self.inner.lock().unwrap();
        match map.get_mut(key) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.inner.lock().unwrap().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl<T: Clone> SessionStore<T> {
    /// Clone the session out so the caller can work on it without
    /// holding the lock.
    pub fn get(&self, key: &str) -> Option<T> {
        self.inner.lock().unwrap().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_new_rejects_second_session() {
        let store = SessionStore::new();
        assert!(store.insert_new("alice", 1));
        assert!(!store.insert_new("alice", 2));
        assert_eq!(store.get("alice"), Some(1));
    }

    #[test]
    fn test_replace_supersedes() {
        let store = SessionStore::new();
        store.replace("bob", "first");
        store.replace("bob", "second");
        assert_eq!(store.get("bob"), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_and_remove() {
        let store = SessionStore::new();
        assert!(!store.update("carol", |v: &mut i32| *v += 1));
        store.replace("carol", 10);
        assert!(store.update("carol", |v| *v += 1));
        assert_eq!(store.remove("carol"), Some(11));
        assert!(!store.contains("carol"));
    }
}
