use crate::error::{Error, Result};
use crate::store::{
    BatchOp, ChunkProcessor, KeyValueBatcher, KeyValueStore, LabelAllocator, VersionedContext,
};
use crate::Label;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store kept entirely in memory. Keys are the context prefix followed by the
/// relative key, so ordering matches the persistent store.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    next_label: Mutex<HashMap<String, Label>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.data
            .read()
            .map_err(|_| Error::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.data
            .write()
            .map_err(|_| Error::Store("memory store lock poisoned".into()))
    }

    /// Number of keys held across all contexts.
    pub fn len(&self) -> usize {
        self.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn full_key(ctx: &VersionedContext, key: &[u8]) -> Vec<u8> {
    let mut out = ctx.key_prefix();
    out.extend_from_slice(key);
    out
}

impl KeyValueStore for MemoryStore {
    fn get(&self, ctx: &VersionedContext, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(&full_key(ctx, key)).cloned())
    }

    fn process_range(
        &self,
        ctx: &VersionedContext,
        beg: &[u8],
        end: &[u8],
        f: &mut ChunkProcessor<'_>,
    ) -> Result<()> {
        let prefix_len = ctx.key_prefix().len();
        // Snapshot the range so callbacks never run under the lock.
        let chunks: Vec<(Vec<u8>, Vec<u8>)> = {
            let data = self.read()?;
            let range = (
                Bound::Included(full_key(ctx, beg)),
                Bound::Included(full_key(ctx, end)),
            );
            data.range(range)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        for (k, v) in &chunks {
            f(&k[prefix_len..], v)?;
        }
        Ok(())
    }

    fn delete_range(&self, ctx: &VersionedContext, beg: &[u8], end: &[u8]) -> Result<()> {
        let mut data = self.write()?;
        let range = (
            Bound::Included(full_key(ctx, beg)),
            Bound::Included(full_key(ctx, end)),
        );
        let doomed: Vec<Vec<u8>> = data.range(range).map(|(k, _)| k.clone()).collect();
        for k in doomed {
            data.remove(&k);
        }
        Ok(())
    }

    fn batcher(&self) -> Option<&dyn KeyValueBatcher> {
        Some(self)
    }
}

impl KeyValueBatcher for MemoryStore {
    fn apply_batch(&self, ctx: &VersionedContext, ops: &[BatchOp]) -> Result<()> {
        let mut data = self.write()?;
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(full_key(ctx, key), value.clone());
                }
                BatchOp::Delete { key } => {
                    data.remove(&full_key(ctx, key));
                }
            }
        }
        Ok(())
    }
}

impl LabelAllocator for MemoryStore {
    fn new_label(&self, ctx: &VersionedContext) -> Result<Label> {
        let mut next = self
            .next_label
            .lock()
            .map_err(|_| Error::Store("label counter lock poisoned".into()))?;
        let slot = next.entry(ctx.instance.clone()).or_insert(1);
        let label = *slot;
        *slot += 1;
        Ok(label)
    }

    fn bump_past(&self, ctx: &VersionedContext, label: Label) -> Result<()> {
        let mut next = self
            .next_label
            .lock()
            .map_err(|_| Error::Store("label counter lock poisoned".into()))?;
        let slot = next.entry(ctx.instance.clone()).or_insert(1);
        *slot = (*slot).max(label.saturating_add(1));
        Ok(())
    }
}
