use crate::block::{BlockCoord, BlockRles};
use crate::error::{Error, Result};
use crate::merge::MergeOp;
use crate::{Label, VersionId};
use crossbeam_channel as chan;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MergeStart,
    MergeBlock,
    MergeEnd,
    SplitStart,
    SplitLabel,
    SplitEnd,
    ChangeSize,
}

/// Payload of a sync message.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    MergeStart(MergeOp),
    /// Blocks of the target that changed.
    MergeBlock {
        op: MergeOp,
        blocks: BTreeSet<BlockCoord>,
    },
    MergeEnd(MergeOp),
    DeleteSize {
        label: Label,
        old_size: u64,
        old_known: bool,
    },
    ReplaceSize {
        label: Label,
        old_size: u64,
        new_size: u64,
    },
    NewSize {
        label: Label,
        size: u64,
    },
    ModSize {
        label: Label,
        size_change: i64,
    },
    SplitStart {
        old_label: Label,
        new_label: Label,
    },
    /// Runs moved to `new_label`, per block, with the blocks in key order.
    Split {
        old_label: Label,
        new_label: Label,
        split: Arc<BlockRles>,
        sorted_blocks: Arc<Vec<BlockCoord>>,
    },
    SplitEnd {
        old_label: Label,
        new_label: Label,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncEvent {
    pub instance: String,
    pub kind: EventKind,
}

impl SyncEvent {
    pub fn new(instance: impl Into<String>, kind: EventKind) -> Self {
        Self {
            instance: instance.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    pub version: VersionId,
    pub delta: Delta,
}

/// Receives sync messages. `handle` returns once the message is processed.
pub trait Subscriber: Send + Sync {
    fn handle(&self, evt: &SyncEvent, msg: &SyncMessage) -> Result<()>;
}

/// Delivers sync messages to the subscribers registered for each event.
///
/// Delivery is synchronous and in registration order; `notify` returns after
/// every subscriber has handled the message.
#[derive(Default)]
pub struct EventBus {
    subs: RwLock<Vec<(SyncEvent, Arc<dyn Subscriber>)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, evt: SyncEvent, sub: Arc<dyn Subscriber>) {
        match self.subs.write() {
            Ok(mut subs) => subs.push((evt, sub)),
            Err(poisoned) => poisoned.into_inner().push((evt, sub)),
        }
    }

    /// Subscribe `sub` to every event kind of `instance`.
    pub fn subscribe_all(&self, instance: &str, sub: Arc<dyn Subscriber>) {
        for kind in [
            EventKind::MergeStart,
            EventKind::MergeBlock,
            EventKind::MergeEnd,
            EventKind::SplitStart,
            EventKind::SplitLabel,
            EventKind::SplitEnd,
            EventKind::ChangeSize,
        ] {
            self.subscribe(SyncEvent::new(instance, kind), sub.clone());
        }
    }

    /// Deliver `msg` to each subscriber of `evt`, stopping at the first error.
    pub fn notify(&self, evt: &SyncEvent, msg: &SyncMessage) -> Result<()> {
        let targets: Vec<Arc<dyn Subscriber>> = {
            let subs = self
                .subs
                .read()
                .map_err(|_| Error::Store("subscriber list lock poisoned".into()))?;
            subs.iter()
                .filter(|(e, _)| e == evt)
                .map(|(_, s)| s.clone())
                .collect()
        };

        for sub in targets {
            if let Err(e) = sub.handle(evt, msg) {
                tracing::error!(instance = %evt.instance, kind = ?evt.kind, error = %e, "subscriber failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Forwards every message into a channel.
pub struct ChannelSubscriber {
    tx: chan::Sender<(SyncEvent, SyncMessage)>,
}

impl ChannelSubscriber {
    pub fn new(tx: chan::Sender<(SyncEvent, SyncMessage)>) -> Self {
        Self { tx }
    }

    /// An unbounded channel and a subscriber feeding it.
    pub fn unbounded() -> (Self, chan::Receiver<(SyncEvent, SyncMessage)>) {
        let (tx, rx) = chan::unbounded();
        (Self::new(tx), rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn handle(&self, evt: &SyncEvent, msg: &SyncMessage) -> Result<()> {
        self.tx
            .send((evt.clone(), msg.clone()))
            .map_err(|_| Error::Subscriber {
                kind: evt.kind,
                reason: "receiver disconnected".into(),
            })
    }
}
