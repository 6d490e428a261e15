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

//! Worker threads
//!
//! Each worker drains its scheduling queue, runs every activated cell for
//! at most the batch budget, then parks until a producer wakes it or a
//! short spin interval elapses. The activation handshake after each batch
//! (`is_empty` → `release` → re-check → `try_schedule`) guarantees that a
//! send completing concurrently cannot be lost: either the worker sees the
//! message, or the producer wins the re-activation CAS and queues the cell
//! again.

use crossbeam_queue::SegQueue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{ActorError, FailureKind};

use crate::cell::AnyCell;
use crate::system::RuntimeCore;

const PARK_INTERVAL: Duration = Duration::from_millis(10);

/// Condvar-based park/unpark pair shared between a worker and the threads
/// that activate its cells.
#[derive(Clone, Debug)]
pub(crate) struct Parker {
    inner: Arc<(parking_lot::Mutex<bool>, parking_lot::Condvar)>,
}

impl Parker {
    pub(crate) fn new() -> Self {
        Parker {
            inner: Arc::new((parking_lot::Mutex::new(false), parking_lot::Condvar::new())),
        }
    }

    /// Park the calling thread until unparked or `timeout` elapses.
    pub(crate) fn park_timeout(&self, timeout: Duration) {
        let (lock, condvar) = &*self.inner;
        let mut notified = lock.lock();
        if !*notified {
            condvar.wait_for(&mut notified, timeout);
        }
        *notified = false;
    }

    /// Wake the parked thread (a pending token wakes the next park).
    pub(crate) fn unpark(&self) {
        let (lock, condvar) = &*self.inner;
        *lock.lock() = true;
        condvar.notify_one();
    }
}

/// State shared between one worker thread and its producers.
pub(crate) struct WorkerShared {
    pub(crate) index: usize,
    pub(crate) queue: SegQueue<Arc<dyn AnyCell>>,
    pub(crate) parker: Parker,
    pub(crate) processed: AtomicU64,
}

impl WorkerShared {
    pub(crate) fn new(index: usize) -> Self {
        WorkerShared {
            index,
            queue: SegQueue::new(),
            parker: Parker::new(),
            processed: AtomicU64::new(0),
        }
    }
}

/// The worker loop: drain activations, run cells, park.
pub(crate) fn worker_loop(
    runtime: Arc<RuntimeCore>,
    shared: Arc<WorkerShared>,
    shutdown: Arc<AtomicBool>,
    throughput: usize,
) {
    tracing::debug!(worker = shared.index, "worker started");
    loop {
        match shared.queue.pop() {
            Some(cell) => {
                let outcome = catch_unwind(AssertUnwindSafe(|| cell.process(&runtime, throughput)));
                if let Err(payload) = outcome {
                    // The cell catches user faults itself; reaching this
                    // point means the runtime internals failed.
                    runtime.failsafe().notify(
                        &ActorError::Panicked(crate::cell::payload_to_string(payload.as_ref())),
                        FailureKind::Actor,
                        Some(cell.id()),
                    );
                }
                shared.processed.fetch_add(1, Ordering::Relaxed);

                // Drop the scheduling claim, then re-check: a producer
                // racing with the release either sees the free claim and
                // queues the cell itself, or loses the CAS to us here.
                // Cells that cannot make progress (waiting on child
                // acknowledgements) are left unscheduled until a control
                // message re-activates them.
                cell.mailbox().release();
                if cell.has_actionable_work() && cell.mailbox().try_schedule() {
                    shared.queue.push(cell);
                }
            }
            None => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                shared.parker.park_timeout(PARK_INTERVAL);
            }
        }
    }
    tracing::debug!(
        worker = shared.index,
        batches = shared.processed.load(Ordering::Relaxed),
        "worker stopped"
    );
}
