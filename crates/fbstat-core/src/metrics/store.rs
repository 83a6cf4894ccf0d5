//! Shared last-known-value store read by gauge suppliers.

use dashmap::DashMap;

use super::key::{MetricKey, Number};

/// Concurrent `MetricKey -> Number` map.
///
/// Written by the report walker, read by gauge suppliers at scrape time.
/// Entries are only inserted or overwritten, never removed: a key published
/// once stays readable (possibly stale) for the life of the store.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: DashMap<MetricKey, Number>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&self, key: MetricKey, value: Number) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &MetricKey) -> Option<Number> {
        self.values.get(key).map(|v| *v.value())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copies out all entries, sorted by key.
    pub fn snapshot(&self) -> Vec<(MetricKey, Number)> {
        let mut entries: Vec<(MetricKey, Number)> = self
            .values
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::key::MetricGroup;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_overwrites() {
        let store = ValueStore::new();
        let key = MetricKey::header("db", "page_size");
        assert_eq!(store.get(&key), None);
        store.put(key.clone(), Number::Int(4096));
        store.put(key.clone(), Number::Int(8192));
        assert_eq!(store.get(&key), Some(Number::Int(8192)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let store = ValueStore::new();
        store.put(
            MetricKey::object("db", MetricGroup::Index, "I", "depth"),
            Number::Int(1),
        );
        store.put(MetricKey::header("db", "flags"), Number::Int(0));
        let snap = store.snapshot();
        assert_eq!(snap[0].0.group, MetricGroup::Header);
        assert_eq!(snap[1].0.group, MetricGroup::Index);
    }

    #[test]
    fn test_concurrent_readers_see_written_values() {
        let store = Arc::new(ValueStore::new());
        let key = MetricKey::object("db", MetricGroup::Data, "T", "data_pages");

        let writer = {
            let store = store.clone();
            let key = key.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    store.put(key.clone(), Number::Int(i));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(v) = store.get(&key) {
                            assert!(v.as_i64().is_some_and(|n| (0..1000).contains(&n)));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.get(&key), Some(Number::Int(999)));
    }
}
