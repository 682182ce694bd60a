//! In-process object storage client

use crate::store::object::{ObjectClient, ObjectMeta};
use crate::store::StoreError;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

struct StoredObject {
    data: Vec<u8>,
    meta: ObjectMeta,
}

/// Object client backed by a sorted in-memory map.
///
/// Serves `mem://` paths and stands in for remote object storage in tests.
#[derive(Default)]
pub struct MemoryObjectClient {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    generation: AtomicU64,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects, directory markers included
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn next_meta(&self, key: &str, size: usize) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: size as u64,
            updated: Utc::now(),
            etag: Uuid::new_v4().to_string(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}

impl ObjectClient for MemoryObjectClient {
    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        Ok(self.objects.read().get(key).map(|object| object.meta.clone()))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, data: Vec<u8>) -> Result<ObjectMeta, StoreError> {
        let meta = self.next_meta(key, data.len());
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let data = self.get(src)?;
        self.put(dst, data)?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let objects = self.objects.read();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object.meta.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let client = MemoryObjectClient::new();
        let meta = client.put("bucket/a", b"abc".to_vec()).unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.generation, 1);

        assert_eq!(client.get("bucket/a").unwrap(), b"abc");
        client.delete("bucket/a").unwrap();
        assert!(client.is_empty());
        assert!(matches!(client.get("bucket/a"), Err(StoreError::NotFound(_))));
        assert!(matches!(client.delete("bucket/a"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_by_prefix_is_sorted() {
        let client = MemoryObjectClient::new();
        for key in ["b/2", "a/1", "b/1", "bb/1"] {
            client.put(key, Vec::new()).unwrap();
        }

        let keys: Vec<String> = client.list("b/").unwrap().into_iter().map(|m| m.key).collect();
        assert_eq!(keys, ["b/1", "b/2"]);
        assert_eq!(client.list("").unwrap().len(), 4);
    }

    #[test]
    fn test_overwrite_bumps_generation() {
        let client = MemoryObjectClient::new();
        let first = client.put("k", b"1".to_vec()).unwrap();
        let second = client.put("k", b"22".to_vec()).unwrap();

        assert!(second.generation > first.generation);
        assert_ne!(first.etag, second.etag);
        assert_eq!(client.head("k").unwrap().unwrap().size, 2);
        assert_eq!(client.len(), 1);
    }
}
