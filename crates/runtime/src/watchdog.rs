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

//! Worker watchdog
//!
//! ## Purpose
//! Periodic liveness probing of the worker pool. One probe actor sits on
//! each worker (a distributed group sized `parallelism *
//! parallelism_factor`); every round the watchdog broadcasts a health
//! check and collects `UP` replies through a pseudo-cell. A worker whose
//! probes all miss the grace window is reported non-responsive.
//!
//! The watchdog only reports — recovery policy is external.

use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use apiary_core::{tags, ActorError, ActorId, FailureKind};
use apiary_mailbox::SystemSignal;

use crate::pseudo::PseudoCell;
use crate::system::RuntimeCore;

pub(crate) struct Watchdog {
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    non_responsive: Arc<Mutex<BTreeSet<usize>>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Watchdog {
    pub(crate) fn new() -> Self {
        Watchdog {
            shutdown: Arc::new((Mutex::new(false), Condvar::new())),
            non_responsive: Arc::new(Mutex::new(BTreeSet::new())),
            thread: Mutex::new(None),
        }
    }

    /// Workers whose probes missed the last round.
    pub(crate) fn non_responsive_workers(&self) -> Vec<usize> {
        self.non_responsive.lock().iter().copied().collect()
    }

    /// Start probing. `probes` maps probe identities to the worker they
    /// sit on.
    pub(crate) fn start(
        &self,
        runtime: &Arc<RuntimeCore>,
        probes: HashMap<ActorId, usize>,
        sync_time: Duration,
    ) {
        let runtime = Arc::clone(runtime);
        let shutdown = Arc::clone(&self.shutdown);
        let non_responsive = Arc::clone(&self.non_responsive);
        let handle = std::thread::Builder::new()
            .name(format!("{}-watchdog", runtime.config().name))
            .spawn(move || watchdog_loop(runtime, probes, sync_time, shutdown, non_responsive))
            .expect("failed to spawn watchdog thread");
        *self.thread.lock() = Some(handle);
    }

    pub(crate) fn shutdown(&self) {
        {
            let (flag, condvar) = &*self.shutdown;
            *flag.lock() = true;
            condvar.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("watchdog thread terminated abnormally");
            }
        }
    }
}

fn watchdog_loop(
    runtime: Arc<RuntimeCore>,
    probes: HashMap<ActorId, usize>,
    sync_time: Duration,
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    non_responsive: Arc<Mutex<BTreeSet<usize>>>,
) {
    loop {
        {
            let (flag, condvar) = &*shutdown;
            let mut stopped = flag.lock();
            if !*stopped {
                condvar.wait_for(&mut stopped, sync_time);
            }
            if *stopped {
                return;
            }
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_round(&runtime, &probes, sync_time, &non_responsive)
        }));
        if let Err(payload) = outcome {
            runtime.failsafe().notify(
                &ActorError::Panicked(crate::cell::payload_to_string(payload.as_ref())),
                FailureKind::Watchdog,
                None,
            );
        }
    }
}

/// One probing round: broadcast, collect within the grace window, report.
fn run_round(
    runtime: &Arc<RuntimeCore>,
    probes: &HashMap<ActorId, usize>,
    grace: Duration,
    non_responsive: &Arc<Mutex<BTreeSet<usize>>>,
) {
    let collector = Arc::new(PseudoCell::new());
    runtime.registry().register_pseudo(Arc::clone(&collector));

    for probe in probes.keys() {
        runtime.send_signal(*probe, SystemSignal::HealthCheck, Some(collector.id()));
    }

    let deadline = Instant::now() + grace;
    let mut pending: BTreeSet<ActorId> = probes.keys().copied().collect();
    while !pending.is_empty() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match collector.take(deadline - now) {
            Some(reply) if reply.tag() == tags::UP => {
                if let Some(source) = reply.source() {
                    pending.remove(&source);
                }
            }
            Some(_) => {}
            None => break,
        }
    }
    runtime.registry().unregister_pseudo(collector.id());

    let silent_workers: BTreeSet<usize> = pending
        .iter()
        .filter_map(|probe| probes.get(probe).copied())
        .collect();
    if !silent_workers.is_empty() {
        metrics::counter!("apiary_watchdog_nonresponsive_total")
            .increment(silent_workers.len() as u64);
        tracing::warn!(workers = ?silent_workers, "non-responsive workers");
    }
    *non_responsive.lock() = silent_workers;
}
