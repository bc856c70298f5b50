//! Native data store - opaque per-object state owned by native call logic

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::value::BridgeValue;

/// Mutable string-keyed store attached to exactly one bridged object.
///
/// Values are never inspected here. The lock only provides interior
/// mutability through shared object handles; it gives no multi-key
/// atomicity.
#[derive(Debug, Default)]
pub struct NativeDataStore {
    entries: Mutex<HashMap<String, BridgeValue>>,
}

impl NativeDataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with initial bindings
    pub fn with_entries(entries: HashMap<String, BridgeValue>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Store a value, overwriting any previous one
    pub fn put(&self, key: impl Into<String>, value: BridgeValue) {
        let key = key.into();
        tracing::trace!(key = %key, kind = value.type_name(), "native data put");
        self.entries.lock().insert(key, value);
    }

    /// Fetch a value
    pub fn get(&self, key: &str) -> Option<BridgeValue> {
        self.entries.lock().get(key).cloned()
    }

    /// Live, mutable view of the whole mapping.
    ///
    /// The guard holds the store lock; drop it before calling other store
    /// methods on the same object.
    pub fn get_all(&self) -> MutexGuard<'_, HashMap<String, BridgeValue>> {
        self.entries.lock()
    }

    /// Remove a value
    pub fn remove(&self, key: &str) -> Option<BridgeValue> {
        self.entries.lock().remove(key)
    }

    /// Check whether a key is set
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Fetch an opaque native payload of type `T`
    pub fn handle<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.entries
            .lock()
            .get(key)
            .and_then(BridgeValue::as_handle)
            .and_then(|handle| handle.downcast::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NativeHandle;

    #[test]
    fn test_put_get_overwrite() {
        let store = NativeDataStore::new();
        assert_eq!(store.get("name"), None);

        store.put("name", "svc".into());
        assert_eq!(store.get("name"), Some(BridgeValue::from("svc")));

        store.put("name", "svc2".into());
        assert_eq!(store.get("name"), Some(BridgeValue::from("svc2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_all_is_live() {
        let store = NativeDataStore::new();
        store.put("a", 1.into());
        {
            let mut all = store.get_all();
            all.insert("b".to_string(), 2.into());
            all.remove("a");
        }
        assert!(!store.contains("a"));
        assert_eq!(store.get("b"), Some(BridgeValue::Int(2)));
    }

    #[test]
    fn test_typed_handle_lookup() {
        struct StreamObserver {
            id: u32,
        }

        let store = NativeDataStore::new();
        store.put("observer", NativeHandle::new(StreamObserver { id: 9 }).into());
        store.put("plain", 1.into());

        assert_eq!(store.handle::<StreamObserver>("observer").map(|o| o.id), Some(9));
        assert!(store.handle::<String>("observer").is_none());
        assert!(store.handle::<StreamObserver>("plain").is_none());
        assert!(store.handle::<StreamObserver>("missing").is_none());
    }

    #[test]
    fn test_seeded_store() {
        let mut seed = HashMap::new();
        seed.insert("k".to_string(), BridgeValue::Bool(true));
        let store = NativeDataStore::with_entries(seed);
        assert_eq!(store.get("k"), Some(BridgeValue::Bool(true)));
        assert_eq!(store.remove("k"), Some(BridgeValue::Bool(true)));
        assert!(store.is_empty());
    }
}
