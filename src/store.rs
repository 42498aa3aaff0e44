use crate::error::Result;
use crate::{Label, VersionId};
use std::fmt;

/// Scope of every read and write: one data instance at one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedContext {
    pub instance: String,
    pub version: VersionId,
}

impl VersionedContext {
    pub fn new(instance: impl Into<String>, version: VersionId) -> Self {
        Self {
            instance: instance.into(),
            version,
        }
    }

    /// Byte prefix isolating this context's keys in a shared keyspace.
    pub fn key_prefix(&self) -> Vec<u8> {
        let name = self.instance.as_bytes();
        let mut out = Vec::with_capacity(2 + name.len() + 4);
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&self.version.to_be_bytes());
        out
    }
}

impl fmt::Display for VersionedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.instance, self.version)
    }
}

/// Per-key callback for [`KeyValueStore::process_range`].
pub type ChunkProcessor<'a> = dyn FnMut(&[u8], &[u8]) -> Result<()> + 'a;

/// Versioned key-value storage.
///
/// Keys passed in and handed to callbacks are relative to the context.
/// Range bounds are inclusive at both ends.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, ctx: &VersionedContext, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Calls `f` for every key in `[beg, end]` in ascending key order. The
    /// first error returned by `f` stops the scan and is returned.
    fn process_range(
        &self,
        ctx: &VersionedContext,
        beg: &[u8],
        end: &[u8],
        f: &mut ChunkProcessor<'_>,
    ) -> Result<()>;

    fn delete_range(&self, ctx: &VersionedContext, beg: &[u8], end: &[u8]) -> Result<()>;

    /// Batch support, if the backend has it.
    fn batcher(&self) -> Option<&dyn KeyValueBatcher> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Stores that can apply a list of puts and deletes atomically.
pub trait KeyValueBatcher: Send + Sync {
    fn apply_batch(&self, ctx: &VersionedContext, ops: &[BatchOp]) -> Result<()>;
}

/// Queued mutations, applied all-or-nothing by [`Batch::commit`].
pub struct Batch<'a> {
    batcher: &'a dyn KeyValueBatcher,
    ctx: VersionedContext,
    ops: Vec<BatchOp>,
}

impl<'a> Batch<'a> {
    pub fn new(batcher: &'a dyn KeyValueBatcher, ctx: &VersionedContext) -> Self {
        Self {
            batcher,
            ctx: ctx.clone(),
            ops: Vec::new(),
        }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn commit(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.batcher.apply_batch(&self.ctx, &self.ops)
    }
}

/// Source of fresh label identifiers.
pub trait LabelAllocator: Send + Sync {
    /// A label never handed out before in this instance's version lineage.
    fn new_label(&self, ctx: &VersionedContext) -> Result<Label>;

    /// Ensure `label` and every label below it are never returned by
    /// [`LabelAllocator::new_label`].
    fn bump_past(&self, ctx: &VersionedContext, label: Label) -> Result<()>;
}
