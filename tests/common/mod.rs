#![allow(dead_code)]

use crossbeam_channel::Receiver;
use labelvol::{
    BatchOp, BlockSize, ChannelSubscriber, Delta, DirtyLabels, EventBus, EventKind,
    InstanceConfig, KeyValueBatcher, KeyValueStore, Label, LabelAllocator, LabelVol, MemoryStore,
    Rle, Rles, Subscriber, SyncEvent, SyncMessage, VersionedContext,
};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

pub const INSTANCE: &str = "seg";

/// Memory store with switchable batch support and injectable commit failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub no_batches: AtomicBool,
    pub fail_commits: AtomicBool,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, ctx: &VersionedContext, key: &[u8]) -> labelvol::Result<Option<Vec<u8>>> {
        self.inner.get(ctx, key)
    }

    fn process_range(
        &self,
        ctx: &VersionedContext,
        beg: &[u8],
        end: &[u8],
        f: &mut labelvol::store::ChunkProcessor<'_>,
    ) -> labelvol::Result<()> {
        self.inner.process_range(ctx, beg, end, f)
    }

    fn delete_range(&self, ctx: &VersionedContext, beg: &[u8], end: &[u8]) -> labelvol::Result<()> {
        self.inner.delete_range(ctx, beg, end)
    }

    fn batcher(&self) -> Option<&dyn KeyValueBatcher> {
        if self.no_batches.load(Ordering::SeqCst) {
            None
        } else {
            Some(self)
        }
    }
}

impl KeyValueBatcher for FlakyStore {
    fn apply_batch(&self, ctx: &VersionedContext, ops: &[BatchOp]) -> labelvol::Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(labelvol::Error::Store("injected commit failure".into()));
        }
        self.inner.apply_batch(ctx, ops)
    }
}

impl LabelAllocator for FlakyStore {
    fn new_label(&self, ctx: &VersionedContext) -> labelvol::Result<Label> {
        self.inner.new_label(ctx)
    }

    fn bump_past(&self, ctx: &VersionedContext, label: Label) -> labelvol::Result<()> {
        self.inner.bump_past(ctx, label)
    }
}

/// Records, per event, whether each watched label was dirty on delivery.
pub struct DirtyWatch {
    dirty: Arc<DirtyLabels>,
    labels: Vec<Label>,
    seen: Mutex<Vec<(EventKind, Vec<bool>)>>,
}

impl DirtyWatch {
    pub fn new(dirty: Arc<DirtyLabels>, labels: Vec<Label>) -> Arc<Self> {
        Arc::new(Self {
            dirty,
            labels,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<(EventKind, Vec<bool>)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Subscriber for DirtyWatch {
    fn handle(&self, evt: &SyncEvent, msg: &SyncMessage) -> labelvol::Result<()> {
        let iv = VersionedContext::new(evt.instance.clone(), msg.version);
        let flags = self
            .labels
            .iter()
            .map(|&l| self.dirty.is_dirty(&iv, l))
            .collect();
        self.seen.lock().unwrap().push((evt.kind, flags));
        Ok(())
    }
}

pub struct Fixture<S> {
    pub vol: LabelVol,
    pub store: Arc<S>,
    pub bus: Arc<EventBus>,
    pub dirty: Arc<DirtyLabels>,
    pub events: Receiver<(SyncEvent, SyncMessage)>,
}

impl<S: KeyValueStore + LabelAllocator + 'static> Fixture<S> {
    pub fn with(store: S, block_size: i32) -> Self {
        let store = Arc::new(store);
        let bus = Arc::new(EventBus::new());
        let dirty = Arc::new(DirtyLabels::new());
        let vol = LabelVol::with_store(
            InstanceConfig::new(INSTANCE, BlockSize::cubic(block_size).unwrap()),
            store.clone(),
            bus.clone(),
            dirty.clone(),
        );
        let (sub, events) = ChannelSubscriber::unbounded();
        bus.subscribe_all(INSTANCE, Arc::new(sub));
        Self {
            vol,
            store,
            bus,
            dirty,
            events,
        }
    }

    /// Seed a label and forget the events it produced.
    pub fn seed(&self, label: Label, runs: Vec<Rle>) {
        self.vol.put_sparse_vol(1, label, &Rles::from(runs)).unwrap();
        self.drain();
    }

    pub fn drain(&self) -> Vec<(EventKind, Delta)> {
        self.events
            .try_iter()
            .map(|(evt, msg)| (evt.kind, msg.delta))
            .collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.drain().into_iter().map(|(k, _)| k).collect()
    }

    /// Runs of `label` at version 1, flattened and coalesced.
    pub fn runs(&self, label: Label) -> Vec<Rle> {
        self.vol
            .get_label_rles(1, label)
            .unwrap()
            .flatten()
            .normalized()
            .into_vec()
    }
}

pub fn memory(block_size: i32) -> Fixture<MemoryStore> {
    Fixture::with(MemoryStore::new(), block_size)
}

pub fn flaky(block_size: i32) -> Fixture<FlakyStore> {
    Fixture::with(FlakyStore::default(), block_size)
}

pub fn payload(runs: Vec<Rle>) -> Vec<u8> {
    labelvol::sparsevol::encode(&Rles::from(runs))
}
