use crate::frame::Frame;
use parking_lot::{Condvar, Mutex};
use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The slot was empty.
    Queued,
    /// An unconsumed frame was discarded in favour of this one.
    Replaced,
}

/// Single-slot mailbox between request handlers and the inference worker.
/// Latest frame wins: submitting over an unconsumed frame discards it.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    slot: Mutex<Option<Frame>>,
    ready: Condvar,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks beyond the slot lock; returns as soon as the frame is stored.
    pub fn submit(&self, frame: Frame) -> Submission {
        let previous = self.slot.lock().replace(frame);
        self.ready.notify_one();
        self.received.fetch_add(1, Ordering::Relaxed);

        match previous {
            Some(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Submission::Replaced
            }
            None => Submission::Queued,
        }
    }

    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().take()
    }

    /// Takes the pending frame, waiting up to `timeout` for one to arrive.
    pub fn wait_take(&self, timeout: Duration) -> Option<Frame> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready.wait_for(&mut slot, timeout);
        }
        slot.take()
    }

    /// Like `wait_take`, but raises `busy` before the slot lock is released,
    /// so a reader checking `is_pending` then `busy` never sees both false
    /// while the frame is in flight.
    pub fn wait_claim(&self, timeout: Duration, busy: &AtomicBool) -> Option<Frame> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready.wait_for(&mut slot, timeout);
        }
        let frame = slot.take();
        if frame.is_some() {
            busy.store(true, Ordering::Release);
        }
        frame
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Wakes a waiting consumer without submitting anything.
    pub(crate) fn wake(&self) {
        self.ready.notify_all();
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
