use crate::merge::MergeOp;
use crate::store::VersionedContext;
use crate::Label;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Labels currently under a merge or split, per instance version.
///
/// Counts are reference counts so overlapping operations on one label nest.
/// Nothing here blocks: readers decide what to do with a dirty label.
#[derive(Debug, Default)]
pub struct DirtyLabels {
    inner: Mutex<HashMap<VersionedContext, HashMap<Label, u32>>>,
}

impl DirtyLabels {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<VersionedContext, HashMap<Label, u32>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn incr(&self, iv: &VersionedContext, label: Label) {
        let mut inner = self.lock();
        *inner
            .entry(iv.clone())
            .or_default()
            .entry(label)
            .or_insert(0) += 1;
    }

    pub fn decr(&self, iv: &VersionedContext, label: Label) {
        let mut inner = self.lock();
        let Some(labels) = inner.get_mut(iv) else {
            tracing::warn!(%iv, label, "decrement of label that is not dirty");
            return;
        };
        match labels.get_mut(&label) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                labels.remove(&label);
            }
            None => tracing::warn!(%iv, label, "decrement of label that is not dirty"),
        }
        if labels.is_empty() {
            inner.remove(iv);
        }
    }

    /// Marks the merge target and every merged label dirty.
    pub fn add_merge(&self, iv: &VersionedContext, op: &MergeOp) {
        for label in op.labels() {
            self.incr(iv, label);
        }
    }

    pub fn remove_merge(&self, iv: &VersionedContext, op: &MergeOp) {
        for label in op.labels() {
            self.decr(iv, label);
        }
    }

    pub fn is_dirty(&self, iv: &VersionedContext, label: Label) -> bool {
        self.lock()
            .get(iv)
            .is_some_and(|labels| labels.contains_key(&label))
    }

    /// Number of dirty labels in `iv`.
    pub fn num_dirty(&self, iv: &VersionedContext) -> usize {
        self.lock().get(iv).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Marks `label` dirty until the returned guard drops.
    pub fn guard_label(&self, iv: &VersionedContext, label: Label) -> DirtyGuard<'_> {
        self.incr(iv, label);
        DirtyGuard {
            tracker: self,
            iv: iv.clone(),
            labels: vec![label],
        }
    }

    /// Marks every label of `op` dirty until the returned guard drops.
    pub fn guard_merge(&self, iv: &VersionedContext, op: &MergeOp) -> DirtyGuard<'_> {
        self.add_merge(iv, op);
        DirtyGuard {
            tracker: self,
            iv: iv.clone(),
            labels: op.labels().collect(),
        }
    }
}

/// Releases its dirty marks on drop, including on early error returns.
#[must_use = "labels are released as soon as the guard is dropped"]
pub struct DirtyGuard<'a> {
    tracker: &'a DirtyLabels,
    iv: VersionedContext,
    labels: Vec<Label>,
}

impl Drop for DirtyGuard<'_> {
    fn drop(&mut self) {
        for &label in &self.labels {
            self.tracker.decr(&self.iv, label);
        }
    }
}
