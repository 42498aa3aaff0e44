use crate::block::{BlockCoord, BlockRles, BlockSize};
use crate::codec::{block_value_pack, block_value_unpack};
use crate::config::InstanceConfig;
use crate::dirty::DirtyLabels;
use crate::error::{Error, Result};
use crate::events::{Delta, EventBus, EventKind, SyncEvent, SyncMessage};
use crate::keys;
use crate::rle::Rles;
use crate::store::{Batch, KeyValueBatcher, KeyValueStore, LabelAllocator, VersionedContext};
use crate::{Label, VersionId};
use std::sync::Arc;

/// A label-volume data instance: every label's voxels as per-block runs.
///
/// The store, label allocator, event bus and dirty registry are supplied by
/// the caller and may be shared with other instances.
pub struct LabelVol {
    config: InstanceConfig,
    store: Arc<dyn KeyValueStore>,
    labels: Arc<dyn LabelAllocator>,
    bus: Arc<EventBus>,
    dirty: Arc<DirtyLabels>,
}

impl LabelVol {
    pub fn new(
        config: InstanceConfig,
        store: Arc<dyn KeyValueStore>,
        labels: Arc<dyn LabelAllocator>,
        bus: Arc<EventBus>,
        dirty: Arc<DirtyLabels>,
    ) -> Self {
        Self {
            config,
            store,
            labels,
            bus,
            dirty,
        }
    }

    /// Use one backend as both store and label allocator.
    pub fn with_store<S>(
        config: InstanceConfig,
        store: Arc<S>,
        bus: Arc<EventBus>,
        dirty: Arc<DirtyLabels>,
    ) -> Self
    where
        S: KeyValueStore + LabelAllocator + 'static,
    {
        Self::new(config, store.clone(), store, bus, dirty)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn block_size(&self) -> BlockSize {
        self.config.block_size
    }

    pub fn dirty(&self) -> &DirtyLabels {
        &self.dirty
    }

    pub(crate) fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub(crate) fn new_label(&self, ctx: &VersionedContext) -> Result<Label> {
        self.labels.new_label(ctx)
    }

    pub fn ctx(&self, v: VersionId) -> VersionedContext {
        VersionedContext::new(self.config.name.clone(), v)
    }

    pub(crate) fn batcher(&self) -> Result<&dyn KeyValueBatcher> {
        self.store
            .batcher()
            .ok_or_else(|| Error::NotBatcher(self.config.name.clone()))
    }

    pub(crate) fn notify(&self, v: VersionId, kind: EventKind, delta: Delta) -> Result<()> {
        let evt = SyncEvent::new(self.config.name.clone(), kind);
        let msg = SyncMessage { version: v, delta };
        self.bus.notify(&evt, &msg)
    }

    /// All blocks of `label` with their runs.
    pub fn get_label_rles(&self, v: VersionId, label: Label) -> Result<BlockRles> {
        let ctx = self.ctx(v);
        let (beg, end) = keys::label_range(label);
        let mut out = BlockRles::new();
        self.store.process_range(&ctx, &beg, &end, &mut |k, val| {
            let (_, block) = keys::decode_index(k)?;
            let rles = block_value_unpack(val).map_err(|e| {
                Error::Decode(format!("label {label} block {block}: {e}"))
            })?;
            out.insert(block, rles);
            Ok(())
        })?;
        Ok(out)
    }

    pub fn label_size(&self, v: VersionId, label: Label) -> Result<u64> {
        Ok(self.get_label_rles(v, label)?.num_voxels())
    }

    /// Runs of `label` across all blocks, in block order.
    ///
    /// Refuses labels that a merge or split is currently modifying.
    pub fn get_sparse_vol(&self, v: VersionId, label: Label) -> Result<Rles> {
        if self.dirty.is_dirty(&self.ctx(v), label) {
            return Err(Error::LabelDirty(label));
        }
        Ok(self.get_label_rles(v, label)?.flatten())
    }

    /// Replace the voxels of `label` with `rles`.
    pub fn put_sparse_vol(&self, v: VersionId, label: Label, rles: &Rles) -> Result<()> {
        self.batcher()?;
        rles.check_bounds()?;
        let ctx = self.ctx(v);
        let _dirty = self.dirty.guard_label(&ctx, label);

        let old_size = self.label_size(v, label)?;
        let blocks = rles.normalized().partition(self.block_size());
        let new_size = blocks.num_voxels();

        tracing::debug!(%ctx, label, old_size, new_size, blocks = blocks.len(), "storing sparse volume");

        let (beg, end) = keys::label_range(label);
        self.store.delete_range(&ctx, &beg, &end)?;
        self.write_label_vol(v, label, &blocks.sorted_keys(), &blocks)?;
        self.labels.bump_past(&ctx, label)?;

        let delta = if old_size == 0 {
            Delta::NewSize {
                label,
                size: new_size,
            }
        } else {
            Delta::ReplaceSize {
                label,
                old_size,
                new_size,
            }
        };
        self.notify(v, EventKind::ChangeSize, delta)
    }

    /// Write the given blocks of `brles` as `label`'s runs in one batch.
    pub(crate) fn write_label_vol(
        &self,
        v: VersionId,
        label: Label,
        blks: &[BlockCoord],
        brles: &BlockRles,
    ) -> Result<()> {
        let ctx = self.ctx(v);
        let mut batch = Batch::new(self.batcher()?, &ctx);
        for blk in blks {
            if let Some(rles) = brles.get(blk) {
                batch.put(keys::new_index(label, blk), block_value_pack(rles));
            }
        }
        batch.commit().inspect_err(|e| {
            tracing::error!(%ctx, label, error = %e, "error on updating RLEs");
        })
    }
}
