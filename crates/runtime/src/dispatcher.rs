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

//! The dispatcher: cell-to-worker ownership and activation
//!
//! ## Topology
//! A fixed pool of workers, each owning a disjoint partition of cells.
//! Ownership is decided once at registration: by hashing the identity, or
//! by the affinity hint of an [`ActorGroup`](crate::ActorGroup)
//! (distributed groups spread members round-robin, balanced groups pin
//! all members to one worker).
//!
//! ## Activation
//! Delivering a message is `enqueue` + one CAS on the destination's
//! activation flag. The winner of the CAS pushes the cell onto its owning
//! worker's scheduling queue and wakes the worker; everyone else knows
//! the cell is already scheduled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use apiary_core::ActorId;

use crate::actor::{ActorGroup, GroupKind};
use crate::cell::AnyCell;
use crate::system::RuntimeCore;
use crate::worker::{worker_loop, WorkerShared};

pub(crate) struct Dispatcher {
    workers: Vec<Arc<WorkerShared>>,
    shutdown: Arc<AtomicBool>,
    threads: parking_lot::Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl Dispatcher {
    pub(crate) fn new(parallelism: usize) -> Self {
        Dispatcher {
            workers: (0..parallelism.max(1))
                .map(|index| Arc::new(WorkerShared::new(index)))
                .collect(),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker threads. Called once while the system boots.
    pub(crate) fn start(&self, runtime: &Arc<RuntimeCore>, name: &str, throughput: usize) {
        let mut threads = self.threads.lock();
        for shared in &self.workers {
            let runtime = Arc::clone(runtime);
            let shared = Arc::clone(shared);
            let shutdown = Arc::clone(&self.shutdown);
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{}", name, shared.index))
                .spawn(move || worker_loop(runtime, shared, shutdown, throughput))
                .expect("failed to spawn worker thread");
            threads.push(handle);
        }
    }

    /// Pick the owning worker for a new cell.
    pub(crate) fn assign_worker(&self, id: ActorId, group: Option<&ActorGroup>) -> usize {
        let parallelism = self.workers.len();
        match group {
            Some(group) => match group.kind() {
                GroupKind::Distributed => group.next_slot() % parallelism,
                GroupKind::Balanced => (group.id().as_u128() % parallelism as u128) as usize,
            },
            None => (id.as_u128() % parallelism as u128) as usize,
        }
    }

    /// Schedule `cell` on its owning worker if nobody else already has.
    pub(crate) fn activate(&self, cell: Arc<dyn AnyCell>) {
        if cell.mailbox().try_schedule() {
            let worker = &self.workers[cell.worker_index() % self.workers.len()];
            worker.queue.push(cell);
            worker.parker.unpark();
        }
    }

    /// Batches processed per worker, in worker order.
    pub(crate) fn batch_counts(&self) -> Vec<u64> {
        self.workers
            .iter()
            .map(|worker| worker.processed.load(Ordering::Relaxed))
            .collect()
    }

    /// Stop the pool: workers finish their queues, then exit.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.parker.unpark();
        }
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
    }
}
