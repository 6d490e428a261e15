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

//! Timer service
//!
//! ## Purpose
//! Schedules one-shot and repeating messages. Each shard is one thread
//! over a min-heap of deadlines, sleeping on a condition variable until
//! the earliest deadline or a new entry arrives. Firing produces a fresh
//! copy of the message and sends it through the normal dispatcher path,
//! so timer traffic obeys the same ordering rules as any other send.
//!
//! The system runs one single-shard global timer plus a pool of
//! `parallelism` shards for user scheduling; entries are spread
//! round-robin.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use apiary_core::{ActorMessage, ActorId, TimerError};

use crate::system::RuntimeCore;

/// Destination of a scheduled message, resolved at each fire.
#[derive(Debug, Clone)]
pub(crate) enum TimerDest {
    /// A fixed identity.
    Id(ActorId),
    /// An alias, re-resolved per fire.
    Alias(String),
}

/// Cancellation handle of a scheduled timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new() -> Self {
        TimerHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the timer; an already-fired one-shot is unaffected.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the timer was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct TimerEntry {
    fire_at: Instant,
    seq: u64,
    message: ActorMessage,
    dest: TimerDest,
    period: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, the earliest deadline must
        // surface first. Sequence number breaks ties.
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct TimerShard {
    heap: Mutex<BinaryHeap<TimerEntry>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
}

pub(crate) struct TimerService {
    shards: Vec<Arc<TimerShard>>,
    cursor: AtomicUsize,
    seq: AtomicU64,
    threads: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl TimerService {
    pub(crate) fn new(shard_count: usize) -> Self {
        TimerService {
            shards: (0..shard_count.max(1))
                .map(|_| {
                    Arc::new(TimerShard {
                        heap: Mutex::new(BinaryHeap::new()),
                        wakeup: Condvar::new(),
                        shutdown: AtomicBool::new(false),
                    })
                })
                .collect(),
            cursor: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Spawn one thread per shard. Called once while the system boots.
    pub(crate) fn start(&self, runtime: &Arc<RuntimeCore>, label: &str) {
        let mut threads = self.threads.lock();
        for (index, shard) in self.shards.iter().enumerate() {
            let shard = Arc::clone(shard);
            let runtime = Arc::clone(runtime);
            let handle = std::thread::Builder::new()
                .name(format!("{label}-{index}"))
                .spawn(move || shard_loop(shard, runtime))
                .expect("failed to spawn timer thread");
            threads.push(handle);
        }
    }

    /// Schedule one delivery of `message` to `dest` after `delay`.
    pub(crate) fn schedule_once(
        &self,
        message: ActorMessage,
        dest: TimerDest,
        delay: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.schedule(message, dest, delay, None)
    }

    /// Schedule repeated deliveries: first after `initial_delay`, then
    /// every `period`.
    pub(crate) fn schedule_at_fixed_rate(
        &self,
        message: ActorMessage,
        dest: TimerDest,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.schedule(message, dest, initial_delay, Some(period))
    }

    fn schedule(
        &self,
        message: ActorMessage,
        dest: TimerDest,
        delay: Duration,
        period: Option<Duration>,
    ) -> Result<TimerHandle, TimerError> {
        let shard = &self.shards[self.cursor.fetch_add(1, Ordering::Relaxed) % self.shards.len()];
        if shard.shutdown.load(Ordering::Acquire) {
            return Err(TimerError::Shutdown);
        }
        let handle = TimerHandle::new();
        let entry = TimerEntry {
            fire_at: Instant::now() + delay,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            message,
            dest,
            period,
            cancelled: Arc::clone(&handle.cancelled),
        };
        shard.heap.lock().push(entry);
        shard.wakeup.notify_one();
        Ok(handle)
    }

    /// Cancel everything and stop the shard threads.
    pub(crate) fn shutdown(&self) {
        for shard in &self.shards {
            shard.shutdown.store(true, Ordering::Release);
            let mut heap = shard.heap.lock();
            heap.clear();
            shard.wakeup.notify_all();
        }
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("timer thread terminated abnormally");
            }
        }
    }
}

fn shard_loop(shard: Arc<TimerShard>, runtime: Arc<RuntimeCore>) {
    let mut heap = shard.heap.lock();
    loop {
        if shard.shutdown.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        let next_deadline = match heap.peek() {
            None => None,
            Some(entry) => Some(entry.fire_at),
        };
        match next_deadline {
            None => {
                shard.wakeup.wait(&mut heap);
            }
            Some(deadline) if deadline > now => {
                shard.wakeup.wait_until(&mut heap, deadline);
            }
            Some(_) => {
                let Some(entry) = heap.pop() else { continue };
                if entry.cancelled.load(Ordering::Acquire) {
                    continue;
                }
                // Fire outside the heap lock so sends cannot block the
                // shard.
                drop(heap);
                fire(&runtime, &entry);
                heap = shard.heap.lock();
                if let Some(period) = entry.period {
                    if !entry.cancelled.load(Ordering::Acquire)
                        && !shard.shutdown.load(Ordering::Acquire)
                    {
                        heap.push(TimerEntry {
                            fire_at: entry.fire_at + period,
                            ..entry
                        });
                    }
                }
            }
        }
    }
}

fn fire(runtime: &Arc<RuntimeCore>, entry: &TimerEntry) {
    // Fresh copy per fire.
    let message = entry.message.clone();
    match &entry.dest {
        TimerDest::Id(id) => runtime.dispatch(message.with_dest(*id)),
        TimerDest::Alias(alias) => runtime.send_via_alias(message, alias),
    }
}
