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

//! The cell: runtime envelope around one actor
//!
//! ## Purpose
//! A cell owns everything the runtime keeps per actor: the behavior
//! instance and its override stack, the mailbox, the stash, children and
//! watcher sets, the lifecycle slot, the restart window, and the factory
//! used to rebuild the instance on restart.
//!
//! Two layers:
//! - [`Cell<A>`] is typed over the behavior so `become` closures see the
//!   concrete actor type.
//! - [`AnyCell`] is the erased view the registry and dispatcher store;
//!   only the owning worker calls [`AnyCell::process`], which is what
//!   makes a cell a single-threaded island.
//!
//! ## Failure protocol
//! A failing reception call transitions the cell to `Restarting`, runs
//! `pre_restart` (caught), then applies the parent's directive: resume,
//! restart (children stop first, instance rebuilt from the factory,
//! mailbox preserved), stop, or escalate to the grandparent. Restarts are
//! bounded by the parent's sliding window; exhaustion stops the cell.
//!
//! ## Stop protocol
//! Stopping sends a stop signal to every child and waits for their
//! acknowledgements before running `post_stop`, unregistering, notifying
//! watchers and acknowledging its own requesters. While waiting, only the
//! priority lane is consumed, so user traffic cannot overtake the
//! cascade.

use indexmap::IndexSet;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use apiary_core::{tags, ActorError, ActorId, ActorMessage, Directive, FailureKind, SupervisorStrategy};
use apiary_mailbox::{EnvelopeKind, Mailbox, Stash, SystemSignal};

use crate::actor::{Actor, Receive};
use crate::context::{ActorContext, ContextOp};
use crate::lifecycle::{AtomicLifecycle, Lifecycle};
use crate::supervision::RestartWindow;
use crate::system::RuntimeCore;

/// Classification flags of a cell. Pseudo-cells are a separate type with
/// their own registry map, so they carry no flag here.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CellFlags {
    pub(crate) is_root: bool,
    pub(crate) is_root_in_user: bool,
    pub(crate) is_resource: bool,
}

/// Erased cell view stored by the registry and handed between threads.
///
/// Everything here is safe to call from any thread except `process`,
/// which the activation flag funnels through one worker at a time.
pub(crate) trait AnyCell: Send + Sync {
    fn id(&self) -> ActorId;
    fn name(&self) -> Option<&str>;
    fn parent(&self) -> Option<ActorId>;
    fn flags(&self) -> CellFlags;
    fn mailbox(&self) -> &Mailbox;
    fn lifecycle(&self) -> Lifecycle;
    fn strategy(&self) -> &SupervisorStrategy;
    fn worker_index(&self) -> usize;
    fn set_worker_index(&self, index: usize);
    fn children(&self) -> Vec<ActorId>;
    fn add_child_id(&self, child: ActorId);
    fn remove_child_id(&self, child: ActorId);
    /// Register a watcher; `false` means the cell already stopped and the
    /// caller must synthesize the termination notice itself.
    fn add_watcher(&self, watcher: ActorId) -> bool;
    fn remove_watcher(&self, watcher: ActorId);
    /// Whether a worker visit could make progress right now.
    fn has_actionable_work(&self) -> bool;
    /// Run up to `budget` envelopes. Caller must hold the scheduling
    /// claim of the mailbox.
    fn process(&self, runtime: &Arc<RuntimeCore>, budget: usize);
}

enum PendingMode {
    Stop,
    Restart(ActorError),
}

struct CellState<A: Actor> {
    actor: Option<A>,
    behaviors: Vec<Receive<A>>,
    stash: Stash,
    watching: IndexSet<ActorId>,
    restart_window: RestartWindow,
    pending_acks: usize,
    pending_mode: Option<PendingMode>,
    stop_requesters: Vec<ActorId>,
    deactivated: bool,
}

/// Runtime envelope around one actor of type `A`.
pub(crate) struct Cell<A: Actor> {
    id: ActorId,
    parent: Option<ActorId>,
    name: Option<String>,
    flags: CellFlags,
    worker: AtomicUsize,
    mailbox: Mailbox,
    lifecycle: AtomicLifecycle,
    strategy: SupervisorStrategy,
    factory: Arc<dyn Fn() -> A + Send + Sync>,
    children: Mutex<IndexSet<ActorId>>,
    watchers: Mutex<IndexSet<ActorId>>,
    state: Mutex<CellState<A>>,
}

impl<A: Actor> Cell<A> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ActorId,
        parent: Option<ActorId>,
        name: Option<String>,
        flags: CellFlags,
        actor: A,
        factory: Arc<dyn Fn() -> A + Send + Sync>,
        strategy: SupervisorStrategy,
        mailbox: Mailbox,
    ) -> Self {
        Cell {
            id,
            parent,
            name,
            flags,
            worker: AtomicUsize::new(0),
            mailbox,
            lifecycle: AtomicLifecycle::new(Lifecycle::Created),
            strategy,
            factory,
            children: Mutex::new(IndexSet::new()),
            watchers: Mutex::new(IndexSet::new()),
            state: Mutex::new(CellState {
                actor: Some(actor),
                behaviors: Vec::new(),
                stash: Stash::new(),
                watching: IndexSet::new(),
                restart_window: RestartWindow::default(),
                pending_acks: 0,
                pending_mode: None,
                stop_requesters: Vec::new(),
                deactivated: false,
            }),
        }
    }

    fn children_snapshot(&self) -> Vec<ActorId> {
        self.children.lock().iter().copied().collect()
    }

    /// Run `f` on the actor instance with a fresh context, catching
    /// panics. Returns the call's result and the context operations it
    /// recorded.
    fn with_actor_ctx(
        &self,
        runtime: &Arc<RuntimeCore>,
        state: &mut CellState<A>,
        sender: Option<ActorId>,
        f: impl FnOnce(&mut A, &mut ActorContext<'_, A>) -> Result<(), ActorError>,
    ) -> (Result<(), ActorError>, Vec<ContextOp<A>>) {
        let Some(mut actor) = state.actor.take() else {
            return (
                Err(ActorError::InvalidState("no behavior instance".into())),
                Vec::new(),
            );
        };
        let CellState {
            stash, watching, ..
        } = state;
        let mut ctx = ActorContext::new(
            self.id,
            self.parent,
            self.name.as_deref(),
            sender,
            runtime,
            stash,
            watching,
        );
        let result = catch_unwind(AssertUnwindSafe(|| f(&mut actor, &mut ctx)))
            .unwrap_or_else(|payload| {
                Err(ActorError::Panicked(payload_to_string(payload.as_ref())))
            });
        let ops = ctx.take_ops();
        drop(ctx);
        state.actor = Some(actor);
        (result, ops)
    }

    fn apply_ops(
        &self,
        runtime: &Arc<RuntimeCore>,
        state: &mut CellState<A>,
        ops: Vec<ContextOp<A>>,
    ) {
        for op in ops {
            match op {
                ContextOp::Become { behavior, replace } => {
                    if replace {
                        state.behaviors.pop();
                    }
                    state.behaviors.push(behavior);
                }
                ContextOp::Unbecome => {
                    state.behaviors.pop();
                }
                ContextOp::UnbecomeAll => state.behaviors.clear(),
                ContextOp::StopSelf => {
                    if self.lifecycle.load() != Lifecycle::Stopped {
                        self.begin_stop(runtime, state, None);
                    }
                }
            }
        }
    }

    fn run_pre_start(&self, runtime: &Arc<RuntimeCore>, state: &mut CellState<A>) {
        let (result, ops) = self.with_actor_ctx(runtime, state, None, |actor, ctx| {
            actor.pre_start(ctx)
        });
        match result {
            Ok(()) => {
                self.apply_ops(runtime, state, ops);
                self.lifecycle.store(Lifecycle::Started);
                self.lifecycle.store(Lifecycle::Running);
                tracing::debug!(actor_id = %self.id, "actor started");
            }
            Err(error) => {
                let error = ActorError::Initialization(error.to_string());
                tracing::error!(actor_id = %self.id, error = %error, "pre_start failed, actor will not run");
                runtime
                    .failsafe()
                    .notify(&error, FailureKind::Initialization, Some(self.id));
                for child in self.children_snapshot() {
                    runtime.send_signal(child, SystemSignal::Stop, Some(self.id));
                }
                self.lifecycle.store(Lifecycle::Stopped);
                runtime.registry().unregister(self.id);
                self.notify_watchers(runtime);
            }
        }
    }

    fn handle_user(&self, runtime: &Arc<RuntimeCore>, state: &mut CellState<A>, message: ActorMessage) {
        if state.deactivated {
            runtime.dead_letter(message);
            return;
        }
        match self.lifecycle.load() {
            Lifecycle::Running | Lifecycle::Started => self.invoke_user(runtime, state, message),
            _ => runtime.dead_letter(message),
        }
    }

    fn invoke_user(&self, runtime: &Arc<RuntimeCore>, state: &mut CellState<A>, message: ActorMessage) {
        let Some(mut actor) = state.actor.take() else {
            runtime.dead_letter(message);
            return;
        };
        let mut top = state.behaviors.pop();
        let CellState {
            stash, watching, ..
        } = state;
        let mut ctx = ActorContext::new(
            self.id,
            self.parent,
            self.name.as_deref(),
            message.source(),
            runtime,
            stash,
            watching,
        );
        let result = catch_unwind(AssertUnwindSafe(|| match top.as_mut() {
            Some(behavior) => behavior(&mut actor, &mut ctx, &message),
            None => actor.receive(&mut ctx, &message),
        }))
        .unwrap_or_else(|payload| Err(ActorError::Panicked(payload_to_string(payload.as_ref()))));
        let ops = ctx.take_ops();
        drop(ctx);
        state.actor = Some(actor);
        if let Some(behavior) = top {
            state.behaviors.push(behavior);
        }
        self.apply_ops(runtime, state, ops);
        metrics::counter!("apiary_messages_processed_total").increment(1);

        if let Err(error) = result {
            if matches!(
                self.lifecycle.load(),
                Lifecycle::Running | Lifecycle::Started
            ) {
                self.handle_failure(runtime, state, error);
            }
        }
    }

    fn handle_signal(
        &self,
        runtime: &Arc<RuntimeCore>,
        state: &mut CellState<A>,
        signal: SystemSignal,
        message: ActorMessage,
    ) {
        let running = matches!(
            self.lifecycle.load(),
            Lifecycle::Running | Lifecycle::Started
        );
        match signal {
            SystemSignal::Stop => match self.lifecycle.load() {
                Lifecycle::Stopped => {
                    // Late stop request: acknowledge so the requester's
                    // cascade can complete.
                    if let Some(requester) = message.source() {
                        runtime.send_signal(requester, SystemSignal::StopSuccess, Some(self.id));
                    }
                }
                Lifecycle::Stopping => {
                    if let Some(requester) = message.source() {
                        state.stop_requesters.push(requester);
                    }
                }
                Lifecycle::Restarting => {
                    // A stop overrides an in-flight restart.
                    if let Some(requester) = message.source() {
                        state.stop_requesters.push(requester);
                    }
                    state.pending_mode = Some(PendingMode::Stop);
                    self.lifecycle.store(Lifecycle::Stopping);
                    if state.pending_acks == 0 {
                        self.finalize_stop(runtime, state);
                    }
                }
                _ => self.begin_stop(runtime, state, message.source()),
            },
            SystemSignal::StopSuccess => {
                if state.pending_acks > 0 {
                    state.pending_acks -= 1;
                    if state.pending_acks == 0 {
                        match state.pending_mode.take() {
                            Some(PendingMode::Restart(reason)) => {
                                self.complete_restart(runtime, state, reason)
                            }
                            _ => self.finalize_stop(runtime, state),
                        }
                    }
                }
            }
            SystemSignal::Kill => {
                if running {
                    self.handle_failure(runtime, state, ActorError::Killed);
                }
            }
            SystemSignal::Restart => {
                if running {
                    let reason = ActorError::InvalidState("restart requested".into());
                    self.lifecycle.store(Lifecycle::Restarting);
                    let (hook, _ops) = self.with_actor_ctx(runtime, state, None, |actor, ctx| {
                        actor.pre_restart(ctx, &reason)
                    });
                    if let Err(hook_error) = hook {
                        tracing::warn!(actor_id = %self.id, error = %hook_error, "pre_restart failed");
                    }
                    self.stop_children_then(runtime, state, PendingMode::Restart(reason));
                }
            }
            SystemSignal::Failure(error) => {
                if running {
                    self.handle_failure(runtime, state, error);
                }
            }
            SystemSignal::HealthCheck => {
                if let Some(probe) = message.source() {
                    runtime.dispatch(
                        ActorMessage::empty(tags::UP)
                            .with_source(self.id)
                            .with_dest(probe),
                    );
                }
            }
            SystemSignal::Activate => state.deactivated = false,
            SystemSignal::Deactivate => state.deactivated = true,
        }
    }

    /// Resolve a failed reception call: `Restarting`, `pre_restart`, then
    /// the parent's directive with window bookkeeping.
    fn handle_failure(&self, runtime: &Arc<RuntimeCore>, state: &mut CellState<A>, error: ActorError) {
        let kind = if self.flags.is_resource {
            FailureKind::Resource
        } else {
            FailureKind::Actor
        };
        runtime.failsafe().notify(&error, kind, Some(self.id));
        metrics::counter!("apiary_actor_failures_total").increment(1);
        tracing::warn!(actor_id = %self.id, error = %error, "reception failure");

        self.lifecycle.store(Lifecycle::Restarting);
        let (hook, _ops) = self.with_actor_ctx(runtime, state, None, |actor, ctx| {
            actor.pre_restart(ctx, &error)
        });
        if let Err(hook_error) = hook {
            tracing::warn!(actor_id = %self.id, error = %hook_error, "pre_restart failed");
        }

        let strategy = self
            .parent
            .and_then(|parent| runtime.registry().cell(parent))
            .map(|parent| parent.strategy().clone())
            .unwrap_or_else(|| runtime.default_strategy());
        let mut directive = strategy.decide(&error);
        if directive == Directive::Restart
            && !state.restart_window.record(
                Instant::now(),
                strategy.max_retries(),
                strategy.within_time_range(),
            )
        {
            tracing::warn!(
                actor_id = %self.id,
                restarts = state.restart_window.count(),
                "restart budget exhausted, stopping"
            );
            directive = Directive::Stop;
        }

        tracing::debug!(actor_id = %self.id, directive = ?directive, "supervision directive");
        match directive {
            Directive::Resume => self.lifecycle.store(Lifecycle::Running),
            Directive::Restart => self.stop_children_then(runtime, state, PendingMode::Restart(error)),
            Directive::Stop => {
                self.lifecycle.store(Lifecycle::Stopping);
                self.stop_children_then(runtime, state, PendingMode::Stop);
            }
            Directive::Escalate => match self.parent {
                Some(parent)
                    if runtime.send_signal(
                        parent,
                        SystemSignal::Failure(error.clone()),
                        Some(self.id),
                    ) =>
                {
                    // The parent's own failure protocol now owns the
                    // fault; this cell keeps running until the parent
                    // decides (its restart or stop will reach us as a
                    // stop signal).
                    self.lifecycle.store(Lifecycle::Running);
                }
                _ => {
                    self.lifecycle.store(Lifecycle::Stopping);
                    self.stop_children_then(runtime, state, PendingMode::Stop);
                }
            },
        }
    }

    fn begin_stop(
        &self,
        runtime: &Arc<RuntimeCore>,
        state: &mut CellState<A>,
        requester: Option<ActorId>,
    ) {
        self.lifecycle.store(Lifecycle::Stopping);
        if let Some(requester) = requester {
            state.stop_requesters.push(requester);
        }
        self.stop_children_then(runtime, state, PendingMode::Stop);
    }

    /// Signal every child to stop; once all acknowledge, continue with
    /// `mode`. Children that are already gone count as acknowledged.
    fn stop_children_then(
        &self,
        runtime: &Arc<RuntimeCore>,
        state: &mut CellState<A>,
        mode: PendingMode,
    ) {
        let mut acks = 0;
        for child in self.children_snapshot() {
            if runtime.send_signal(child, SystemSignal::Stop, Some(self.id)) {
                acks += 1;
            }
        }
        if acks == 0 {
            match mode {
                PendingMode::Restart(reason) => self.complete_restart(runtime, state, reason),
                PendingMode::Stop => self.finalize_stop(runtime, state),
            }
        } else {
            state.pending_acks = acks;
            state.pending_mode = Some(mode);
        }
    }

    /// Rebuild the behavior instance from the factory and resume. The
    /// mailbox is preserved; behavior overrides and the stash belong to
    /// the dead instance and are discarded.
    fn complete_restart(&self, runtime: &Arc<RuntimeCore>, state: &mut CellState<A>, reason: ActorError) {
        let factory = Arc::clone(&self.factory);
        match catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(actor) => {
                state.actor = Some(actor);
                state.behaviors.clear();
                state.stash = Stash::new();
                state.deactivated = false;
                let (hook, ops) = self.with_actor_ctx(runtime, state, None, |actor, ctx| {
                    actor.post_restart(ctx, &reason)
                });
                match hook {
                    Ok(()) => {
                        self.apply_ops(runtime, state, ops);
                        self.lifecycle.store(Lifecycle::Running);
                        metrics::counter!("apiary_actors_restarted_total").increment(1);
                        tracing::info!(actor_id = %self.id, "actor restarted");
                    }
                    Err(error) => {
                        let error = ActorError::Initialization(error.to_string());
                        runtime
                            .failsafe()
                            .notify(&error, FailureKind::Initialization, Some(self.id));
                        self.lifecycle.store(Lifecycle::Stopping);
                        self.stop_children_then(runtime, state, PendingMode::Stop);
                    }
                }
            }
            Err(payload) => {
                let error = ActorError::Initialization(payload_to_string(payload.as_ref()));
                runtime
                    .failsafe()
                    .notify(&error, FailureKind::Initialization, Some(self.id));
                self.lifecycle.store(Lifecycle::Stopping);
                self.stop_children_then(runtime, state, PendingMode::Stop);
            }
        }
    }

    fn finalize_stop(&self, runtime: &Arc<RuntimeCore>, state: &mut CellState<A>) {
        let (hook, _ops) =
            self.with_actor_ctx(runtime, state, None, |actor, ctx| actor.post_stop(ctx));
        if let Err(error) = hook {
            tracing::warn!(actor_id = %self.id, error = %error, "post_stop failed");
        }
        self.lifecycle.store(Lifecycle::Stopped);

        for watched in state.watching.drain(..).collect::<Vec<_>>() {
            if let Some(cell) = runtime.registry().cell(watched) {
                cell.remove_watcher(self.id);
            }
        }
        runtime.registry().unregister(self.id);
        self.notify_watchers(runtime);

        // Whatever is still queued can no longer be processed.
        for envelope in self.mailbox.drain() {
            match envelope.kind {
                EnvelopeKind::Signal(SystemSignal::Stop) => {
                    if let Some(requester) = envelope.message.source() {
                        runtime.send_signal(requester, SystemSignal::StopSuccess, Some(self.id));
                    }
                }
                EnvelopeKind::Signal(_) => {}
                EnvelopeKind::User => runtime.dead_letter(envelope.message),
            }
        }

        for requester in state.stop_requesters.drain(..) {
            runtime.send_signal(requester, SystemSignal::StopSuccess, Some(self.id));
        }
        metrics::counter!("apiary_actors_stopped_total").increment(1);
        tracing::info!(actor_id = %self.id, "actor stopped");
    }

    fn notify_watchers(&self, runtime: &Arc<RuntimeCore>) {
        let watchers: Vec<ActorId> = self.watchers.lock().drain(..).collect();
        for watcher in watchers {
            runtime.dispatch(
                ActorMessage::empty(tags::TERMINATED)
                    .with_source(self.id)
                    .with_dest(watcher),
            );
        }
    }
}

impl<A: Actor> AnyCell for Cell<A> {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    fn flags(&self) -> CellFlags {
        self.flags
    }

    fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.load()
    }

    fn strategy(&self) -> &SupervisorStrategy {
        &self.strategy
    }

    fn worker_index(&self) -> usize {
        self.worker.load(Ordering::Relaxed)
    }

    fn set_worker_index(&self, index: usize) {
        self.worker.store(index, Ordering::Relaxed);
    }

    fn children(&self) -> Vec<ActorId> {
        self.children_snapshot()
    }

    fn add_child_id(&self, child: ActorId) {
        self.children.lock().insert(child);
    }

    fn remove_child_id(&self, child: ActorId) {
        self.children.lock().shift_remove(&child);
    }

    fn add_watcher(&self, watcher: ActorId) -> bool {
        let mut watchers = self.watchers.lock();
        if self.lifecycle.load() == Lifecycle::Stopped {
            return false;
        }
        watchers.insert(watcher);
        true
    }

    fn remove_watcher(&self, watcher: ActorId) {
        self.watchers.lock().shift_remove(&watcher);
    }

    fn has_actionable_work(&self) -> bool {
        match self.lifecycle.load() {
            Lifecycle::Restarting | Lifecycle::Stopping => !self.mailbox.priority_is_empty(),
            _ => !self.mailbox.is_empty(),
        }
    }

    fn process(&self, runtime: &Arc<RuntimeCore>, budget: usize) {
        let mut state = self.state.lock();
        if self.lifecycle.load() == Lifecycle::Created {
            self.run_pre_start(runtime, &mut state);
        }
        let mut processed = 0;
        while processed < budget {
            // While a cascade is pending, user traffic stays queued and
            // only control acknowledgements flow.
            let envelope = match self.lifecycle.load() {
                Lifecycle::Restarting | Lifecycle::Stopping => self.mailbox.dequeue_priority(),
                _ => self.mailbox.dequeue(),
            };
            let Some(envelope) = envelope else { break };
            processed += 1;
            match envelope.kind {
                EnvelopeKind::Signal(signal) => {
                    self.handle_signal(runtime, &mut state, signal, envelope.message)
                }
                EnvelopeKind::User => self.handle_user(runtime, &mut state, envelope.message),
            }
        }
    }
}

pub(crate) fn payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
