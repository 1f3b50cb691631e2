use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::FileId;

use crate::registry::ChunkServer;

/// Placement record mapping each uploaded file to the ordered chunk
/// servers holding its shards.
///
/// Position `i` of the value is the server storing shard `i`. Entries are
/// only ever added; there is no delete-file operation.
#[derive(Debug, Default)]
pub struct AllocationMap {
    chunks: RwLock<HashMap<FileId, Vec<Arc<ChunkServer>>>>,
}

impl AllocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, file_id: FileId, servers: Vec<Arc<ChunkServer>>) {
        let mut chunks = self.chunks.write().unwrap();
        chunks.insert(file_id, servers);
    }

    pub fn get(&self, file_id: &FileId) -> Option<Vec<Arc<ChunkServer>>> {
        let chunks = self.chunks.read().unwrap();
        chunks.get(file_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn servers(n: usize) -> Vec<Arc<ChunkServer>> {
        let registry = Registry::new();
        for i in 0..n {
            registry.register(&format!("http://chunkserver{}", i + 1)).unwrap();
        }
        registry.select_underloaded(n).unwrap()
    }

    #[test]
    fn test_add_and_get() {
        let map = AllocationMap::new();
        let file_id = FileId::generate();
        let servers = servers(2);

        map.add(file_id.clone(), servers.clone());

        let stored = map.get(&file_id).unwrap();
        assert_eq!(stored.len(), 2);
        for (stored, original) in stored.iter().zip(&servers) {
            assert!(Arc::ptr_eq(stored, original));
        }
    }

    #[test]
    fn test_get_missing() {
        let map = AllocationMap::new();
        assert!(map.get(&FileId::generate()).is_none());
    }
}
