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

//! The actor system
//!
//! ## Purpose
//! [`ActorSystem`] is the user-facing handle: it boots the worker pool,
//! timers, resource executor and watchdog, owns the guardian cells, and
//! exposes registration, sending, synchronous `ask`, alias/path lookup and
//! shutdown.
//!
//! Internally everything shares one [`RuntimeCore`], whose send path is
//! the runtime's spine: resolve the destination (pseudo-cells first, then
//! live cells), enqueue, and activate the owning worker.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use apiary_core::{
    tags, ActorError, ActorId, ActorMessage, ActorSystemConfig, AskError, DeadLetterSink,
    FailsafeManager, FailureKind, LogDeadLetterSink, PersistenceDriver, SupervisorStrategy,
    SystemError, TimerError,
};
use apiary_mailbox::{Envelope, Mailbox, SystemSignal};

use crate::actor::{Actor, ActorGroup};
use crate::cell::{payload_to_string, AnyCell, Cell, CellFlags};
use crate::context::ActorContext;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::Lifecycle;
use crate::pseudo::PseudoCell;
use crate::registry::Registry;
use crate::resource::ResourceExecutor;
use crate::timer::{TimerDest, TimerHandle, TimerService};
use crate::watchdog::Watchdog;

struct Guardians {
    root: ActorId,
    user: ActorId,
    system: ActorId,
}

/// Everything the running system shares: registry, dispatcher, timers,
/// pools, failsafe and configuration.
pub(crate) struct RuntimeCore {
    config: ActorSystemConfig,
    registry: Registry,
    dispatcher: Dispatcher,
    global_timer: TimerService,
    timer_pool: TimerService,
    resource: ResourceExecutor,
    failsafe: FailsafeManager,
    dead_letters: Arc<dyn DeadLetterSink>,
    watchdog: Watchdog,
    pod_controller: PeriodicRunner,
    guardians: OnceLock<Guardians>,
    shutting_down: AtomicBool,
}

impl RuntimeCore {
    fn new(config: ActorSystemConfig) -> Arc<Self> {
        let dead_letters = config
            .dead_letter_sink
            .clone()
            .unwrap_or_else(|| Arc::new(LogDeadLetterSink));
        Arc::new(RuntimeCore {
            dispatcher: Dispatcher::new(config.parallelism),
            global_timer: TimerService::new(1),
            timer_pool: TimerService::new(config.parallelism),
            resource: ResourceExecutor::new(
                config.parallelism,
                config.max_resource_threads,
                &config.name,
            ),
            failsafe: FailsafeManager::new(),
            dead_letters,
            watchdog: Watchdog::new(),
            pod_controller: PeriodicRunner::new(),
            registry: Registry::new(),
            guardians: OnceLock::new(),
            shutting_down: AtomicBool::new(false),
            config,
        })
    }

    pub(crate) fn config(&self) -> &ActorSystemConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn failsafe(&self) -> &FailsafeManager {
        &self.failsafe
    }

    pub(crate) fn global_timer(&self) -> &TimerService {
        &self.global_timer
    }

    pub(crate) fn timer_pool(&self) -> &TimerService {
        &self.timer_pool
    }

    pub(crate) fn default_strategy(&self) -> SupervisorStrategy {
        SupervisorStrategy::new(self.config.max_retries, self.config.within_time_range)
    }

    fn guardians(&self) -> &Guardians {
        self.guardians.get().expect("guardians registered at boot")
    }

    // ---- send path ----

    /// Deliver a user message through the normal lane.
    pub(crate) fn dispatch(self: &Arc<Self>, message: ActorMessage) {
        self.deliver(message, false);
    }

    /// Deliver a user message through the priority lane.
    pub(crate) fn dispatch_priority(self: &Arc<Self>, message: ActorMessage) {
        self.deliver(message, true);
    }

    fn deliver(self: &Arc<Self>, message: ActorMessage, priority: bool) {
        let Some(dest) = message.dest() else {
            self.dead_letter(message);
            return;
        };
        if let Some(pseudo) = self.registry.pseudo(dest) {
            pseudo.deliver(message);
            return;
        }
        let Some(cell) = self.registry.cell(dest) else {
            self.dead_letter(message);
            return;
        };
        if priority {
            cell.mailbox().enqueue_priority(Envelope::user(message));
        } else if cell.mailbox().is_bounded() {
            let backup = message.clone();
            if cell.mailbox().enqueue(Envelope::user(message)).is_err() {
                tracing::warn!(dest = %dest, "mailbox full, message redirected to dead letters");
                self.dead_letter(backup);
                return;
            }
        } else {
            // An unbounded lane accepts unconditionally.
            cell.mailbox().enqueue(Envelope::user(message)).ok();
        }
        self.activate(cell);
    }

    /// Deliver an internal control signal. Returns `false` when the
    /// destination is already gone.
    pub(crate) fn send_signal(
        self: &Arc<Self>,
        dest: ActorId,
        signal: SystemSignal,
        source: Option<ActorId>,
    ) -> bool {
        let Some(cell) = self.registry.cell(dest) else {
            return false;
        };
        let mut message = ActorMessage::empty(signal_tag(&signal)).with_dest(dest);
        if let Some(source) = source {
            message = message.with_source(source);
        }
        cell.mailbox().enqueue_priority(Envelope::signal(signal, message));
        self.activate(cell);
        true
    }

    /// Resolve `alias` and deliver; unbound aliases go to dead letters.
    pub(crate) fn send_via_alias(self: &Arc<Self>, message: ActorMessage, alias: &str) {
        match self.registry.lookup_alias(alias) {
            Some(id) => self.dispatch(message.with_dest(id)),
            None => {
                tracing::debug!(alias = %alias, "alias not bound");
                self.dead_letter(message);
            }
        }
    }

    /// Resolve a path and deliver; unknown paths go to dead letters.
    pub(crate) fn send_via_path(self: &Arc<Self>, message: ActorMessage, path: &str) {
        match self.registry.lookup_path(path) {
            Some(id) => self.dispatch(message.with_dest(id)),
            None => {
                tracing::debug!(path = %path, "path not bound");
                self.dead_letter(message);
            }
        }
    }

    pub(crate) fn dead_letter(&self, message: ActorMessage) {
        metrics::counter!("apiary_dead_letters_total").increment(1);
        self.dead_letters.receive(message);
    }

    fn activate(self: &Arc<Self>, cell: Arc<dyn AnyCell>) {
        if cell.flags().is_resource {
            self.resource.admit(self, cell);
        } else {
            self.dispatcher.activate(cell);
        }
    }

    // ---- registration ----

    pub(crate) fn register_actor<A, F>(
        self: &Arc<Self>,
        parent: Option<ActorId>,
        factory: F,
        flags: CellFlags,
        group: Option<&ActorGroup>,
    ) -> Result<ActorId, SystemError>
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(SystemError::ShuttingDown);
        }
        let factory: Arc<dyn Fn() -> A + Send + Sync> = Arc::new(factory);
        let built = catch_unwind(AssertUnwindSafe(|| (factory)()));
        let actor = match built {
            Ok(actor) => actor,
            Err(payload) => {
                let error = ActorError::Initialization(payload_to_string(payload.as_ref()));
                self.failsafe
                    .notify(&error, FailureKind::Initialization, None);
                return Err(SystemError::Registration(error.to_string()));
            }
        };
        let name = actor.name();
        let strategy = actor
            .supervisor_strategy()
            .unwrap_or_else(|| self.default_strategy());
        let id = ActorId::generate();
        let worker = self.dispatcher.assign_worker(id, group);
        let cell = Arc::new(Cell::new(
            id,
            parent,
            name,
            flags,
            actor,
            factory,
            strategy,
            Mailbox::new(self.config.queue_size),
        ));
        cell.set_worker_index(worker);

        let parent_cell = match parent {
            Some(parent_id) => Some(self.registry.cell(parent_id).ok_or_else(|| {
                SystemError::Registration(format!("parent {parent_id} is not registered"))
            })?),
            None => None,
        };
        let erased: Arc<dyn AnyCell> = cell;
        self.registry.register(parent_cell.as_ref(), Arc::clone(&erased))?;

        metrics::counter!("apiary_actors_created_total").increment(1);
        tracing::info!(
            actor_id = %id,
            path = self.registry.path_of(id).as_deref().unwrap_or(""),
            worker,
            root = erased.flags().is_root,
            user_root = erased.flags().is_root_in_user,
            resource = erased.flags().is_resource,
            "actor registered"
        );
        // First activation runs pre_start on the owner.
        self.activate(erased);
        Ok(id)
    }

    // ---- shutdown ----

    fn shutdown(self: &Arc<Self>, await_termination: bool) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(system = %self.config.name, "actor system shutting down");
        self.watchdog.shutdown();
        self.pod_controller.shutdown();
        self.global_timer.shutdown();
        self.timer_pool.shutdown();
        if let Some(guardians) = self.guardians.get() {
            self.send_signal(guardians.root, SystemSignal::Stop, None);
        }
        if await_termination {
            self.await_termination();
        }
        self.dispatcher.shutdown();
        self.resource.shutdown();
    }

    fn await_termination(&self) {
        let deadline = Instant::now() + self.config.await_termination_timeout;
        while self.registry.count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let remaining = self.registry.count();
        if remaining > 0 {
            tracing::warn!(remaining, "termination deadline expired with live cells");
        }
    }
}

fn signal_tag(signal: &SystemSignal) -> i32 {
    match signal {
        SystemSignal::Stop => tags::STOP,
        SystemSignal::StopSuccess => tags::STOP_SUCCESS,
        SystemSignal::Kill => tags::KILL,
        SystemSignal::Restart | SystemSignal::Failure(_) => tags::RESTART,
        SystemSignal::HealthCheck => tags::HEALTH_CHECK,
        SystemSignal::Activate => tags::ACTIVATE,
        SystemSignal::Deactivate => tags::DEACTIVATE,
    }
}

/// Guardian behavior at the roots of the tree: no user logic, default
/// strategy for its children.
struct Guardian {
    label: Option<&'static str>,
}

impl Actor for Guardian {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn name(&self) -> Option<String> {
        self.label.map(str::to_string)
    }
}

/// Watchdog probe: one per worker, answers health checks at the cell
/// level.
struct HealthProbe {
    index: usize,
}

impl Actor for HealthProbe {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn name(&self) -> Option<String> {
        Some(format!("watchdog-{}", self.index))
    }
}

/// A background thread running a callback at a fixed period.
struct PeriodicRunner {
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl PeriodicRunner {
    fn new() -> Self {
        PeriodicRunner {
            shutdown: Arc::new((Mutex::new(false), Condvar::new())),
            thread: Mutex::new(None),
        }
    }

    fn start(&self, name: String, period: Duration, callback: impl Fn() + Send + 'static) {
        let shutdown = Arc::clone(&self.shutdown);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || loop {
                {
                    let (flag, condvar) = &*shutdown;
                    let mut stopped = flag.lock();
                    if !*stopped {
                        condvar.wait_for(&mut stopped, period);
                    }
                    if *stopped {
                        return;
                    }
                }
                callback();
            })
            .expect("failed to spawn periodic thread");
        *self.thread.lock() = Some(handle);
    }

    fn shutdown(&self) {
        {
            let (flag, condvar) = &*self.shutdown;
            *flag.lock() = true;
            condvar.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                tracing::error!("periodic thread terminated abnormally");
            }
        }
    }
}

/// Handle to a running actor system.
///
/// ## Usage
/// ```no_run
/// use apiary_core::{ActorError, ActorMessage, ActorSystemConfig};
/// use apiary_runtime::{Actor, ActorContext, ActorSystem};
///
/// struct Echo;
///
/// impl Actor for Echo {
///     fn receive(
///         &mut self,
///         ctx: &mut ActorContext<'_, Self>,
///         message: &ActorMessage,
///     ) -> Result<(), ActorError> {
///         if let Some(sender) = message.source() {
///             ctx.forward(message, sender);
///         }
///         Ok(())
///     }
/// }
///
/// let system = ActorSystem::new(ActorSystemConfig::default()).unwrap();
/// let echo = system.add_actor(|| Echo).unwrap();
/// system.send(ActorMessage::new("hi", 1).with_dest(echo));
/// system.shutdown(true);
/// ```
pub struct ActorSystem {
    core: Arc<RuntimeCore>,
}

impl ActorSystem {
    /// Boot a system: workers, timers, resource pool, guardians, and the
    /// watchdog / pod controller when configured.
    pub fn new(config: ActorSystemConfig) -> Result<Self, SystemError> {
        let core = RuntimeCore::new(config);
        let config = core.config().clone();
        core.dispatcher.start(&core, &config.name, config.throughput);
        core.global_timer
            .start(&core, &format!("{}-global-timer", config.name));
        core.timer_pool.start(&core, &format!("{}-timer", config.name));
        core.resource.start(&core);

        let root = core.register_actor(
            None,
            || Guardian { label: None },
            CellFlags {
                is_root: true,
                ..CellFlags::default()
            },
            None,
        )?;
        let user = core.register_actor(
            Some(root),
            || Guardian { label: Some("user") },
            CellFlags {
                is_root_in_user: true,
                ..CellFlags::default()
            },
            None,
        )?;
        let system = core.register_actor(
            Some(root),
            || Guardian {
                label: Some("system"),
            },
            CellFlags::default(),
            None,
        )?;
        if core.guardians.set(Guardians { root, user, system }).is_err() {
            return Err(SystemError::Registration(
                "guardians already registered".into(),
            ));
        }

        if config.watchdog_enabled {
            let group = ActorGroup::distributed();
            let count = config.parallelism * config.parallelism_factor;
            let mut probes = HashMap::with_capacity(count);
            for index in 0..count {
                let id = core.register_actor(
                    Some(system),
                    move || HealthProbe { index },
                    CellFlags::default(),
                    Some(&group),
                )?;
                let worker = core
                    .registry()
                    .cell(id)
                    .map(|cell| cell.worker_index())
                    .unwrap_or(0);
                probes.insert(id, worker);
            }
            core.watchdog.start(&core, probes, config.watchdog_sync_time);
        }

        if config.horizontal_pod_autoscaler_enabled {
            if let Some(controller) = config.pod_controller.clone() {
                let failsafe_core = Arc::clone(&core);
                core.pod_controller.start(
                    format!("{}-replication-controller", config.name),
                    config.horizontal_pod_autoscaler_sync_time,
                    move || {
                        let outcome =
                            catch_unwind(AssertUnwindSafe(|| controller.sync()));
                        if let Err(payload) = outcome {
                            failsafe_core.failsafe().notify(
                                &ActorError::Panicked(payload_to_string(payload.as_ref())),
                                FailureKind::Replication,
                                None,
                            );
                        }
                    },
                );
            }
        }

        if config.persistence_mode {
            tracing::info!(system = %config.name, "persistence mode enabled");
        }
        tracing::info!(
            system = %config.name,
            parallelism = config.parallelism,
            "actor system started"
        );
        Ok(ActorSystem { core })
    }

    /// The system configuration.
    pub fn config(&self) -> &ActorSystemConfig {
        self.core.config()
    }

    /// The configured journaling backend, when persistence mode is on.
    /// The core never journals on its own; persistent actors call the
    /// driver from their own hooks.
    pub fn persistence_driver(&self) -> Option<Arc<dyn PersistenceDriver>> {
        self.core.config().persistence_driver.clone()
    }

    // ---- registration ----

    /// Register a user actor (a child of the user guardian).
    pub fn add_actor<A, F>(&self, factory: F) -> Result<ActorId, SystemError>
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let user = self.core.guardians().user;
        self.core
            .register_actor(Some(user), factory, CellFlags::default(), None)
    }

    /// Register a user actor with a worker-affinity group.
    pub fn add_actor_in_group<A, F>(
        &self,
        factory: F,
        group: &Arc<ActorGroup>,
    ) -> Result<ActorId, SystemError>
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let user = self.core.guardians().user;
        self.core
            .register_actor(Some(user), factory, CellFlags::default(), Some(group))
    }

    /// Register a resource actor: its handlers run on the blocking pool,
    /// never on a worker.
    pub fn add_resource_actor<A, F>(&self, factory: F) -> Result<ActorId, SystemError>
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let user = self.core.guardians().user;
        self.core.register_actor(
            Some(user),
            factory,
            CellFlags {
                is_resource: true,
                ..CellFlags::default()
            },
            None,
        )
    }

    /// Register `count` system actors spread across the workers.
    ///
    /// All-or-nothing: when one registration fails, the instances
    /// registered before it are stopped again and the error is returned.
    pub fn add_system_actor<A, F>(
        &self,
        factory: F,
        count: usize,
    ) -> Result<Vec<ActorId>, SystemError>
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + Clone + 'static,
    {
        let system = self.core.guardians().system;
        let group = ActorGroup::distributed();
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            match self.core.register_actor(
                Some(system),
                factory.clone(),
                CellFlags::default(),
                Some(&group),
            ) {
                Ok(id) => ids.push(id),
                Err(error) => {
                    for id in ids {
                        self.core.send_signal(id, SystemSignal::Stop, None);
                    }
                    return Err(error);
                }
            }
        }
        Ok(ids)
    }

    // ---- messaging ----

    /// Send a message; the destination must be set on the message.
    pub fn send(&self, message: ActorMessage) {
        self.core.dispatch(message);
    }

    /// Send through the priority lane.
    pub fn send_priority(&self, message: ActorMessage) {
        self.core.dispatch_priority(message);
    }

    /// Resolve an alias and send.
    pub fn send_via_alias(&self, message: ActorMessage, alias: &str) {
        self.core.send_via_alias(message, alias);
    }

    /// Resolve a registry path and send.
    pub fn send_via_path(&self, message: ActorMessage, path: &str) {
        self.core.send_via_path(message, path);
    }

    /// Synchronous request/reply through a transient pseudo-cell: sends
    /// `message` with the pseudo-cell as source and blocks for a reply to
    /// it.
    pub fn ask(&self, message: ActorMessage, timeout: Duration) -> Result<ActorMessage, AskError> {
        let Some(dest) = message.dest() else {
            self.core.failsafe().notify(
                &ActorError::InvalidState("ask without destination".into()),
                FailureKind::ExecuterClient,
                None,
            );
            return Err(AskError::DeadLetter);
        };
        if !self.core.registry().contains(dest) {
            self.core.failsafe().notify(
                &ActorError::InvalidState(format!("ask destination {dest} is not registered")),
                FailureKind::ExecuterClient,
                Some(dest),
            );
            self.core.dead_letter(message);
            return Err(AskError::DeadLetter);
        }
        let pseudo = Arc::new(PseudoCell::new());
        self.core.registry().register_pseudo(Arc::clone(&pseudo));
        self.core.dispatch(message.with_source(pseudo.id()));
        let reply = pseudo.take(timeout);
        self.core.registry().unregister_pseudo(pseudo.id());
        reply.ok_or(AskError::Timeout(timeout))
    }

    /// Request a graceful stop of `dest` and its descendants.
    pub fn stop_actor(&self, dest: ActorId) {
        self.core.send_signal(dest, SystemSignal::Stop, None);
    }

    /// Request a restart of `dest` through the supervision protocol.
    pub fn restart_actor(&self, dest: ActorId) {
        self.core.send_signal(dest, SystemSignal::Restart, None);
    }

    /// Forcefully terminate `dest`; supervision treats the kill as a
    /// failure, so the parent's directive applies.
    pub fn kill_actor(&self, dest: ActorId) {
        self.core.send_signal(dest, SystemSignal::Kill, None);
    }

    /// Suspend delivery of user messages to `dest`; control traffic
    /// still flows.
    pub fn deactivate_actor(&self, dest: ActorId) {
        self.core.send_signal(dest, SystemSignal::Deactivate, None);
    }

    /// Resume delivery of user messages to `dest`.
    pub fn activate_actor(&self, dest: ActorId) {
        self.core.send_signal(dest, SystemSignal::Activate, None);
    }

    // ---- registry surface ----

    /// Bind `alias` to `id`. Aliases are many-to-many; resolution among
    /// several bound actors is arbitrary but deterministic.
    pub fn set_alias(&self, id: ActorId, alias: &str) {
        if !alias.is_empty() {
            self.core.registry().set_alias(id, alias);
        }
    }

    /// Remove one alias binding.
    pub fn unset_alias(&self, id: ActorId, alias: &str) {
        self.core.registry().unset_alias(id, alias);
    }

    /// Resolve an alias.
    pub fn get_actor_from_alias(&self, alias: &str) -> Option<ActorId> {
        self.core.registry().lookup_alias(alias)
    }

    /// Resolve a `/`-joined registry path.
    pub fn get_actor_from_path(&self, path: &str) -> Option<ActorId> {
        self.core.registry().lookup_path(path)
    }

    /// The registry path of `id`.
    pub fn path_of(&self, id: ActorId) -> Option<String> {
        self.core.registry().path_of(id)
    }

    /// Current lifecycle state of `id`; `None` once the identity is
    /// released.
    pub fn lifecycle_of(&self, id: ActorId) -> Option<Lifecycle> {
        self.core.registry().cell(id).map(|cell| cell.lifecycle())
    }

    /// The user guardian (parent of actors added with
    /// [`ActorSystem::add_actor`]).
    pub fn user_root(&self) -> ActorId {
        self.core.guardians().user
    }

    /// Number of live cells, guardians included.
    pub fn cell_count(&self) -> usize {
        self.core.registry().count()
    }

    // ---- timers ----

    /// Schedule `message` once to `dest` after `delay`.
    pub fn schedule_once(
        &self,
        message: ActorMessage,
        dest: ActorId,
        delay: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.core
            .timer_pool()
            .schedule_once(message, TimerDest::Id(dest), delay)
    }

    /// Schedule `message` once to whatever `alias` resolves to at fire
    /// time.
    pub fn schedule_once_via_alias(
        &self,
        message: ActorMessage,
        alias: &str,
        delay: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.core
            .timer_pool()
            .schedule_once(message, TimerDest::Alias(alias.to_string()), delay)
    }

    /// Schedule `message` repeatedly to `dest`; a fresh copy per fire.
    pub fn schedule_at_fixed_rate(
        &self,
        message: ActorMessage,
        dest: ActorId,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.core.timer_pool().schedule_at_fixed_rate(
            message,
            TimerDest::Id(dest),
            initial_delay,
            period,
        )
    }

    // ---- observability ----

    /// Replace the failsafe error handler invoked on every unhandled
    /// fault.
    pub fn set_error_handler(&self, handler: Arc<dyn apiary_core::ErrorHandler>) {
        self.core.failsafe().set_handler(handler);
    }

    /// Workers the watchdog reported non-responsive in its last round.
    pub fn non_responsive_workers(&self) -> Vec<usize> {
        self.core.watchdog.non_responsive_workers()
    }

    /// Batches processed per worker since boot.
    pub fn worker_batch_counts(&self) -> Vec<u64> {
        self.core.dispatcher.batch_counts()
    }

    // ---- shutdown ----

    /// Stop the system: cancel timers, cascade a stop through the actor
    /// tree, then release the pools. With `await_termination` the call
    /// blocks until the tree drained or the configured deadline expired.
    pub fn shutdown(&self, await_termination: bool) {
        self.core.shutdown(await_termination);
    }

    /// Block until the actor tree has drained or the configured deadline
    /// expired.
    pub fn await_termination(&self) {
        self.core.await_termination();
    }
}

impl Drop for ActorSystem {
    fn drop(&mut self) {
        self.core.shutdown(false);
    }
}
