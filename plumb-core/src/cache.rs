//! A byte-size-bounded cache for fully delta-resolved pack object payloads,
//! keyed by which pack and byte offset they came from. Resolving a deep
//! delta chain re-reads and re-inflates every base in the chain, so caching
//! the resolved result is the difference between O(1) and O(depth) repeated
//! lookups of the same object.

use crate::obj::ObjType;
use indexmap::IndexMap;

/// Identifies one open pack within a repository's pack list, stable for the
/// lifetime of that list (see `crate::odb`).
pub type PackId = u32;

/// 64 MiB, matching the default named in the resource-knob surface (see
/// `crate::repo`).
pub const DEFAULT_CAPACITY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
struct CachedObj {
    obj_type: ObjType,
    bytes: Vec<u8>,
}

/// Least-recently-used cache over `(pack, offset) -> (kind, resolved bytes)`.
/// Built on `indexmap::IndexMap` rather than a crate like `lru`: insertion
/// order doubles as recency order, so "touch" is a remove-then-reinsert and
/// eviction always pops the front.
pub struct PackObjCache {
    capacity_bytes: u64,
    used_bytes: u64,
    entries: IndexMap<(PackId, u64), CachedObj>,
}

impl Default for PackObjCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_BYTES)
    }
}

impl PackObjCache {
    pub fn new(capacity_bytes: u64) -> Self {
        Self { capacity_bytes, used_bytes: 0, entries: IndexMap::new() }
    }

    pub fn get(&mut self, pack: PackId, offset: u64) -> Option<(ObjType, Vec<u8>)> {
        let cached = self.entries.shift_remove(&(pack, offset))?;
        let result = (cached.obj_type, cached.bytes.clone());
        self.entries.insert((pack, offset), cached);
        Some(result)
    }

    pub fn insert(&mut self, pack: PackId, offset: u64, obj_type: ObjType, bytes: Vec<u8>) {
        let size = bytes.len() as u64;
        if size > self.capacity_bytes {
            // larger than the whole cache; not worth storing
            return;
        }

        if let Some(old) = self.entries.shift_remove(&(pack, offset)) {
            self.used_bytes -= old.bytes.len() as u64;
        }

        while self.used_bytes + size > self.capacity_bytes {
            match self.entries.shift_remove_index(0) {
                Some((_, evicted)) => self.used_bytes -= evicted.bytes.len() as u64,
                None => break,
            }
        }

        self.used_bytes += size;
        self.entries.insert((pack, offset), CachedObj { obj_type, bytes });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_entry_once_over_capacity() {
        let mut cache = PackObjCache::new(10);
        cache.insert(0, 0, ObjType::Blob, vec![0u8; 6]);
        cache.insert(0, 1, ObjType::Blob, vec![0u8; 6]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(0, 0).is_none());
        assert!(cache.get(0, 1).is_some());
    }

    #[test]
    fn touching_an_entry_protects_it_from_eviction() {
        let mut cache = PackObjCache::new(12);
        cache.insert(0, 0, ObjType::Blob, vec![0u8; 6]);
        cache.insert(0, 1, ObjType::Blob, vec![0u8; 6]);
        assert!(cache.get(0, 0).is_some());
        cache.insert(0, 2, ObjType::Blob, vec![0u8; 6]);
        // 0 was just touched, so 1 should be evicted instead
        assert!(cache.get(0, 0).is_some());
        assert!(cache.get(0, 1).is_none());
        assert!(cache.get(0, 2).is_some());
    }

    #[test]
    fn oversized_entry_is_not_cached() {
        let mut cache = PackObjCache::new(4);
        cache.insert(0, 0, ObjType::Blob, vec![0u8; 100]);
        assert!(cache.is_empty());
    }

    #[test]
    fn distinct_packs_with_the_same_offset_are_distinct_keys() {
        let mut cache = PackObjCache::new(1024);
        cache.insert(0, 5, ObjType::Blob, b"a".to_vec());
        cache.insert(1, 5, ObjType::Tree, b"bb".to_vec());
        assert_eq!(cache.get(0, 5).unwrap().0, ObjType::Blob);
        assert_eq!(cache.get(1, 5).unwrap().0, ObjType::Tree);
    }
}
