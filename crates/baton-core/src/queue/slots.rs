//! Completion slots: ID -> single-use oneshot pair.
//!
//! `submit` takes the sender half, `await_result` takes the receiver half.
//! Whichever side arrives first creates the pair, so a caller may start
//! waiting before the action is submitted. Once both halves are handed out
//! the entry is removed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::domain::{ActionId, ActionOutcome, QueueError};

type Sender = oneshot::Sender<ActionOutcome>;
type Receiver = oneshot::Receiver<ActionOutcome>;

struct Slot {
    tx: Option<Sender>,
    rx: Option<Receiver>,
}

impl Slot {
    fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    fn is_drained(&self) -> bool {
        self.tx.is_none() && self.rx.is_none()
    }
}

#[derive(Default)]
pub(crate) struct CompletionSlots {
    slots: Mutex<HashMap<ActionId, Slot>>,
}

impl CompletionSlots {
    // ロックは await を跨がない（全操作が同期的に完結する）
    fn lock(&self) -> MutexGuard<'_, HashMap<ActionId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the sender for a submission.
    ///
    /// Fails with `DuplicateAction` if the sender for `id` was already claimed
    /// and its result has not been collected yet.
    pub(crate) fn take_sender(&self, id: ActionId) -> Result<Sender, QueueError> {
        claim_sender(&mut self.lock(), id)
    }

    /// Claim the receiver for a waiting caller.
    ///
    /// When `closed` is set, an ID with no slot is rejected instead of
    /// creating one nobody could ever complete.
    pub(crate) fn take_receiver(&self, id: ActionId, closed: bool) -> Result<Receiver, QueueError> {
        let mut slots = self.lock();
        if closed && !slots.contains_key(&id) {
            return Err(QueueError::Closed);
        }
        let slot = slots.entry(id).or_insert_with(Slot::new);
        let rx = slot.rx.take().ok_or(QueueError::AlreadyAwaited(id))?;
        if slot.is_drained() {
            slots.remove(&id);
        }
        Ok(rx)
    }

    /// Claim a sender whose outcome nobody will collect.
    ///
    /// If a caller is already waiting on `id` it still gets the outcome;
    /// otherwise the receiver is dropped up front and nothing is retained.
    pub(crate) fn take_sender_detached(&self, id: ActionId) -> Result<Sender, QueueError> {
        let mut slots = self.lock();
        if slots.contains_key(&id) {
            return claim_sender(&mut slots, id);
        }
        let (tx, _rx) = oneshot::channel();
        Ok(tx)
    }

    /// Undo a waiter that gave up before `id` was submitted.
    ///
    /// Removes the entry only while its sender is unclaimed and its receiver
    /// is gone; a submitted or still-awaited entry is left alone.
    pub(crate) fn forget(&self, id: ActionId) -> bool {
        let mut slots = self.lock();
        let abandoned = slots
            .get(&id)
            .is_some_and(|slot| slot.tx.is_some() && slot.rx.is_none());
        if abandoned {
            slots.remove(&id);
        }
        abandoned
    }

    /// Drop every sender nobody submitted. Waiters on those IDs wake up
    /// with a closed channel.
    pub(crate) fn abandon_unsubmitted(&self) -> usize {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.tx.is_none());
        before - slots.len()
    }

    /// Entries still holding at least one half.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

fn claim_sender(slots: &mut HashMap<ActionId, Slot>, id: ActionId) -> Result<Sender, QueueError> {
    let slot = slots.entry(id).or_insert_with(Slot::new);
    let tx = slot.tx.take().ok_or(QueueError::DuplicateAction(id))?;
    if slot.is_drained() {
        slots.remove(&id);
    }
    Ok(tx)
}
