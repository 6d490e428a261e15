// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Apiary Contributors
//
// This file is part of Apiary.
//
// Apiary is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Apiary is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Apiary. If not, see <https://www.gnu.org/licenses/>.

//! The per-cell mailbox
//!
//! ## Design
//! Two lock-free FIFO lanes. Producers (any thread) append; the owning
//! worker is the sole consumer. `dequeue` prefers the priority lane. The
//! activation flag rides along so the send path and the worker can agree,
//! with one CAS, on who schedules the cell next — the enqueue/flag
//! handshake is what makes a wake-up impossible to lose:
//!
//! ```text
//! producer: enqueue(m); if try_schedule() { hand cell to owner; wake }
//! consumer: ...batch...; if is_empty() { release(); if !is_empty() &&
//!           try_schedule() { hand cell back to owner } }
//! ```

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;

use crate::Envelope;

/// Mailbox failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailboxError {
    /// The normal lane reached its configured capacity.
    #[error("mailbox is full")]
    Full,
}

/// Counters maintained by a mailbox.
#[derive(Debug, Default)]
pub struct MailboxStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
}

impl MailboxStats {
    /// Total envelopes accepted across both lanes.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total envelopes handed to the consumer.
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Total envelopes rejected because the normal lane was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Dual-lane MPSC mailbox with the cell's activation flag.
pub struct Mailbox {
    priority: SegQueue<Envelope>,
    normal: SegQueue<Envelope>,
    normal_len: AtomicUsize,
    capacity: usize,
    scheduled: AtomicBool,
    stats: MailboxStats,
}

impl Mailbox {
    /// Mailbox whose normal lane holds at most `capacity` envelopes;
    /// `0` means unbounded. The priority lane is never bounded.
    pub fn new(capacity: usize) -> Self {
        Mailbox {
            priority: SegQueue::new(),
            normal: SegQueue::new(),
            normal_len: AtomicUsize::new(0),
            capacity,
            scheduled: AtomicBool::new(false),
            stats: MailboxStats::default(),
        }
    }

    /// Append to the normal lane.
    pub fn enqueue(&self, envelope: Envelope) -> Result<(), MailboxError> {
        if self.capacity > 0 {
            let mut len = self.normal_len.load(Ordering::Relaxed);
            loop {
                if len >= self.capacity {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    return Err(MailboxError::Full);
                }
                match self.normal_len.compare_exchange_weak(
                    len,
                    len + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(current) => len = current,
                }
            }
        } else {
            self.normal_len.fetch_add(1, Ordering::Relaxed);
        }
        self.normal.push(envelope);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Append to the priority lane (never bounded: control traffic must
    /// get through).
    pub fn enqueue_priority(&self, envelope: Envelope) {
        self.priority.push(envelope);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the next envelope: priority lane first, then one from the
    /// normal lane. Owner-only.
    pub fn dequeue(&self) -> Option<Envelope> {
        if let Some(envelope) = self.priority.pop() {
            self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
            return Some(envelope);
        }
        let envelope = self.normal.pop()?;
        self.normal_len.fetch_sub(1, Ordering::Relaxed);
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(envelope)
    }

    /// Take the next envelope from the priority lane only, leaving the
    /// normal lane untouched. Owner-only; used while a cell is restarting
    /// or stopping, when user traffic must stay queued but control
    /// acknowledgements still have to flow.
    pub fn dequeue_priority(&self) -> Option<Envelope> {
        let envelope = self.priority.pop()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(envelope)
    }

    /// Whether the normal lane has a capacity limit.
    pub fn is_bounded(&self) -> bool {
        self.capacity > 0
    }

    /// Whether the priority lane is empty.
    pub fn priority_is_empty(&self) -> bool {
        self.priority.is_empty()
    }

    /// Whether both lanes are empty.
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.normal.is_empty()
    }

    /// Envelopes currently queued across both lanes.
    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    /// Claim the right to schedule this cell. Returns `true` for exactly
    /// one caller until [`Mailbox::release`] runs.
    pub fn try_schedule(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drop the scheduling claim. The caller must re-check `is_empty`
    /// afterwards and re-claim if producers slipped in.
    pub fn release(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// Whether the cell currently holds a scheduling claim.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> &MailboxStats {
        &self.stats
    }

    /// Drain both lanes without processing, returning what was queued.
    ///
    /// Owner-only; used when a stopping cell forwards leftovers to the
    /// dead-letter sink.
    pub fn drain(&self) -> Vec<Envelope> {
        let mut drained = Vec::new();
        while let Some(envelope) = self.dequeue() {
            drained.push(envelope);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::ActorMessage;
    use std::sync::Arc;

    fn user(tag: i32) -> Envelope {
        Envelope::user(ActorMessage::empty(tag))
    }

    #[test]
    fn test_priority_lane_first() {
        let mailbox = Mailbox::new(0);
        mailbox.enqueue(user(1)).unwrap();
        mailbox.enqueue(user(2)).unwrap();
        mailbox.enqueue_priority(user(100));

        assert_eq!(mailbox.dequeue().unwrap().message.tag(), 100);
        assert_eq!(mailbox.dequeue().unwrap().message.tag(), 1);
        assert_eq!(mailbox.dequeue().unwrap().message.tag(), 2);
        assert!(mailbox.dequeue().is_none());
    }

    #[test]
    fn test_fifo_within_each_lane() {
        let mailbox = Mailbox::new(0);
        for tag in 0..100 {
            mailbox.enqueue(user(tag)).unwrap();
        }
        for tag in 0..100 {
            assert_eq!(mailbox.dequeue().unwrap().message.tag(), tag);
        }
    }

    #[test]
    fn test_capacity_only_bounds_normal_lane() {
        let mailbox = Mailbox::new(2);
        mailbox.enqueue(user(1)).unwrap();
        mailbox.enqueue(user(2)).unwrap();
        assert_eq!(mailbox.enqueue(user(3)), Err(MailboxError::Full));
        assert_eq!(mailbox.stats().dropped(), 1);

        // Control traffic is never rejected.
        mailbox.enqueue_priority(user(4));
        assert_eq!(mailbox.dequeue().unwrap().message.tag(), 4);

        // Freed capacity is reusable.
        assert_eq!(mailbox.dequeue().unwrap().message.tag(), 1);
        mailbox.enqueue(user(5)).unwrap();
    }

    #[test]
    fn test_schedule_claim_is_exclusive() {
        let mailbox = Mailbox::new(0);
        assert!(mailbox.try_schedule());
        assert!(!mailbox.try_schedule());
        mailbox.release();
        assert!(mailbox.try_schedule());
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let mailbox = Arc::new(Mailbox::new(0));
        let producers = 8;
        let per_producer = 1000;

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let mailbox = Arc::clone(&mailbox);
                std::thread::spawn(move || {
                    for i in 0..per_producer {
                        mailbox.enqueue(user(p * per_producer + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut count = 0;
        while mailbox.dequeue().is_some() {
            count += 1;
        }
        assert_eq!(count, (producers * per_producer) as usize);
        assert_eq!(mailbox.stats().enqueued(), (producers * per_producer) as u64);
    }

    #[test]
    fn test_drain_returns_in_order() {
        let mailbox = Mailbox::new(0);
        mailbox.enqueue(user(1)).unwrap();
        mailbox.enqueue_priority(user(0));
        mailbox.enqueue(user(2)).unwrap();

        let drained = mailbox.drain();
        let tags: Vec<i32> = drained.iter().map(|e| e.message.tag()).collect();
        assert_eq!(tags, vec![0, 1, 2]);
        assert!(mailbox.is_empty());
    }
}
