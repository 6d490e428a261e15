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

//! Resource executor
//!
//! ## Purpose
//! Actors declared as resource actors run blocking or IO-heavy handlers.
//! Their cells use ordinary mailboxes, but execution happens on this
//! cached pool instead of the workers, so a blocked handler can never
//! stall worker-owned cells.
//!
//! Admission is single-flight: the cell's activation flag is claimed
//! before a run is submitted, and the run drains the mailbox before the
//! claim is dropped. Submissions after shutdown are rejected through the
//! failsafe registry (`executer_resource`).

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{ActorError, FailureKind};

use crate::cell::AnyCell;
use crate::system::RuntimeCore;

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub(crate) struct ResourceExecutor {
    injector: Sender<Arc<dyn AnyCell>>,
    backlog: Receiver<Arc<dyn AnyCell>>,
    core_threads: usize,
    max_threads: usize,
    live: Arc<AtomicUsize>,
    idle: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<std::thread::JoinHandle<()>>>,
    label: String,
}

impl ResourceExecutor {
    pub(crate) fn new(core_threads: usize, max_threads: usize, label: &str) -> Self {
        let (injector, backlog) = unbounded();
        ResourceExecutor {
            injector,
            backlog,
            core_threads: core_threads.max(1),
            max_threads: max_threads.max(core_threads.max(1)),
            live: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            label: label.to_string(),
        }
    }

    /// Spawn the resident threads. Called once while the system boots.
    pub(crate) fn start(&self, runtime: &Arc<RuntimeCore>) {
        for _ in 0..self.core_threads {
            self.spawn_thread(runtime, true);
        }
    }

    /// Admit a resource cell for one drain of its mailbox. The activation
    /// claim makes this single-flight: a cell already running or queued
    /// is left alone.
    pub(crate) fn admit(&self, runtime: &Arc<RuntimeCore>, cell: Arc<dyn AnyCell>) {
        if !cell.mailbox().try_schedule() {
            return;
        }
        if self.shutdown.load(Ordering::Acquire) {
            cell.mailbox().release();
            runtime.failsafe().notify(
                &ActorError::InvalidState("resource executor is shut down".into()),
                FailureKind::ExecuterResource,
                Some(cell.id()),
            );
            return;
        }
        let id = cell.id();
        if self.injector.send(cell).is_err() {
            runtime.failsafe().notify(
                &ActorError::InvalidState("resource executor is shut down".into()),
                FailureKind::ExecuterResource,
                Some(id),
            );
            return;
        }
        // Grow beyond the resident threads while there is backlog and no
        // idle thread to pick it up.
        if self.idle.load(Ordering::Acquire) == 0
            && self.live.load(Ordering::Acquire) < self.max_threads
        {
            self.spawn_thread(runtime, false);
        }
    }

    fn spawn_thread(&self, runtime: &Arc<RuntimeCore>, resident: bool) {
        let backlog = self.backlog.clone();
        let live = Arc::clone(&self.live);
        let idle = Arc::clone(&self.idle);
        let shutdown = Arc::clone(&self.shutdown);
        let runtime = Arc::clone(runtime);
        let index = live.fetch_add(1, Ordering::AcqRel);
        let name = format!("{}-resource-{}", self.label, index);
        let live_for_error = Arc::clone(&live);
        let spawned = std::thread::Builder::new().name(name).spawn(move || {
            let mut idle_for = Duration::ZERO;
            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                idle.fetch_add(1, Ordering::AcqRel);
                let received = backlog.recv_timeout(POLL_INTERVAL);
                idle.fetch_sub(1, Ordering::AcqRel);
                match received {
                    Ok(cell) => {
                        idle_for = Duration::ZERO;
                        run_resource_cell(&runtime, cell);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        idle_for += POLL_INTERVAL;
                        // Resident threads stay; extras retire after the
                        // idle timeout.
                        if !resident && idle_for >= IDLE_TIMEOUT {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            live.fetch_sub(1, Ordering::AcqRel);
        });
        match spawned {
            Ok(handle) => self.threads.lock().push(handle),
            Err(error) => {
                live_for_error.fetch_sub(1, Ordering::AcqRel);
                tracing::error!(error = %error, "failed to spawn resource thread");
            }
        }
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("resource thread terminated abnormally");
            }
        }
    }
}

/// One admitted run: drain the cell, then hand the claim back with the
/// same lost-wakeup-free handshake the workers use.
fn run_resource_cell(runtime: &Arc<RuntimeCore>, cell: Arc<dyn AnyCell>) {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    loop {
        let outcome = catch_unwind(AssertUnwindSafe(|| cell.process(runtime, usize::MAX)));
        if let Err(payload) = outcome {
            runtime.failsafe().notify(
                &ActorError::Panicked(crate::cell::payload_to_string(payload.as_ref())),
                FailureKind::Resource,
                Some(cell.id()),
            );
        }
        cell.mailbox().release();
        if cell.has_actionable_work() && cell.mailbox().try_schedule() {
            continue;
        }
        break;
    }
}
