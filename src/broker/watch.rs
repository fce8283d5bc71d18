//! Named persistent watch expressions with last-result memoisation.

use indexmap::IndexMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct WatchExpression {
    pub id: String,
    pub source: String,
    pub last_value: Option<String>,
    pub last_error: Option<String>,
    pub last_evaluated_at_ms: Option<i64>,
}

#[derive(Default)]
struct Inner {
    counter: u32,
    records: IndexMap<String, WatchExpression>,
}

#[derive(Clone, Default)]
pub struct WatchStore {
    inner: Arc<Mutex<Inner>>,
}

impl WatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, source: &str) -> WatchExpression {
        let mut inner = self.inner.lock().unwrap();
        inner.counter += 1;
        let id = format!("w-{}", inner.counter);
        let record = WatchExpression {
            id: id.clone(),
            source: source.to_string(),
            last_value: None,
            last_error: None,
            last_evaluated_at_ms: None,
        };
        inner.records.insert(id, record.clone());
        record
    }

    pub fn remove(&self, id: &str) -> Option<WatchExpression> {
        self.inner.lock().unwrap().records.shift_remove(id)
    }

    pub fn list(&self) -> Vec<WatchExpression> {
        self.inner.lock().unwrap().records.values().cloned().collect()
    }

    /// Record a successful evaluation; clears any previous error.
    pub fn note_value(&self, id: &str, value: String) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.get_mut(id) {
            record.last_value = Some(value);
            record.last_error = None;
            record.last_evaluated_at_ms = Some(chrono::Utc::now().timestamp_millis());
        }
    }

    /// Record a failed evaluation; clears any previous value.
    pub fn note_error(&self, id: &str, error: String) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.get_mut(id) {
            record.last_error = Some(error);
            record.last_value = None;
            record.last_evaluated_at_ms = Some(chrono::Utc::now().timestamp_millis());
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_value_and_error_are_exclusive() {
        let store = WatchStore::new();
        let w = store.add("counter + 1");
        assert_eq!(w.id, "w-1");

        store.note_value(&w.id, "42".to_string());
        let listed = &store.list()[0];
        assert_eq!(listed.last_value.as_deref(), Some("42"));
        assert!(listed.last_error.is_none());

        store.note_error(&w.id, "no frame".to_string());
        let listed = &store.list()[0];
        assert!(listed.last_value.is_none());
        assert_eq!(listed.last_error.as_deref(), Some("no frame"));
    }

    #[test]
    fn test_add_remove_round_trip() {
        let store = WatchStore::new();
        let w = store.add("this.items");
        assert_eq!(store.list().len(), 1);
        assert!(store.remove(&w.id).is_some());
        assert!(store.list().is_empty());
        assert!(store.remove(&w.id).is_none());

        // counter keeps counting
        assert_eq!(store.add("x").id, "w-2");
    }
}
