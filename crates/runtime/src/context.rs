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

//! The actor's view of the runtime
//!
//! ## Purpose
//! An [`ActorContext`] is lent to every reception call and lifecycle hook.
//! It is the only surface through which user code sends messages, switches
//! behavior, stashes, spawns children, watches peers or stops itself.
//!
//! Sends take effect immediately. Behavior-stack changes and self-stop are
//! recorded and applied when the current call returns, so the next message
//! observes them.

use indexmap::IndexSet;
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{tags, ActorError, ActorId, ActorMessage, SystemError, TimerError};
use apiary_mailbox::Stash;

use crate::actor::{Actor, Receive};
use crate::cell::CellFlags;
use crate::system::RuntimeCore;
use crate::timer::{TimerDest, TimerHandle};

/// Deferred operation recorded by a context, applied after the current
/// reception call returns.
pub(crate) enum ContextOp<A: Actor> {
    Become { behavior: Receive<A>, replace: bool },
    Unbecome,
    UnbecomeAll,
    StopSelf,
}

/// The facade an actor uses to interact with the runtime.
pub struct ActorContext<'a, A: Actor> {
    id: ActorId,
    parent: Option<ActorId>,
    name: Option<&'a str>,
    sender: Option<ActorId>,
    runtime: &'a Arc<RuntimeCore>,
    stash: &'a mut Stash,
    watching: &'a mut IndexSet<ActorId>,
    ops: Vec<ContextOp<A>>,
}

impl<'a, A: Actor> ActorContext<'a, A> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ActorId,
        parent: Option<ActorId>,
        name: Option<&'a str>,
        sender: Option<ActorId>,
        runtime: &'a Arc<RuntimeCore>,
        stash: &'a mut Stash,
        watching: &'a mut IndexSet<ActorId>,
    ) -> Self {
        ActorContext {
            id,
            parent,
            name,
            sender,
            runtime,
            stash,
            watching,
            ops: Vec::new(),
        }
    }

    pub(crate) fn take_ops(&mut self) -> Vec<ContextOp<A>> {
        std::mem::take(&mut self.ops)
    }

    // ---- identity ----

    /// This actor's identity.
    pub fn self_id(&self) -> ActorId {
        self.id
    }

    /// The parent's identity; absent only on the root guardian.
    pub fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    /// Source of the message currently being processed, when known.
    pub fn sender(&self) -> Option<ActorId> {
        self.sender
    }

    /// This actor's registered name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name
    }

    /// This actor's registry path (`/`-joined names from the root).
    pub fn path(&self) -> Option<String> {
        self.runtime.registry().path_of(self.id)
    }

    /// Current children, in registration order.
    pub fn children(&self) -> Vec<ActorId> {
        self.runtime
            .registry()
            .cell(self.id)
            .map(|cell| cell.children())
            .unwrap_or_default()
    }

    // ---- messaging ----

    /// Send a message. The sender identity is filled in when the message
    /// does not carry one; the destination must already be set.
    pub fn send(&self, message: ActorMessage) {
        self.runtime.dispatch(message.ensure_source(self.id));
    }

    /// Build and send a message to `dest`.
    pub fn tell<T: std::any::Any + Send + Sync>(&self, value: T, tag: i32, dest: ActorId) {
        self.send(ActorMessage::new(value, tag).with_dest(dest));
    }

    /// Resolve `alias` and send; unbound aliases go to dead letters.
    pub fn send_via_alias(&self, message: ActorMessage, alias: &str) {
        self.runtime
            .send_via_alias(message.ensure_source(self.id), alias);
    }

    /// Resolve a registry path and send; unknown paths go to dead letters.
    pub fn send_via_path(&self, message: ActorMessage, path: &str) {
        self.runtime
            .send_via_path(message.ensure_source(self.id), path);
    }

    /// Re-send `message` to `dest`, preserving the original sender.
    pub fn forward(&self, message: &ActorMessage, dest: ActorId) {
        self.runtime.dispatch(message.shallow_copy_to(dest));
    }

    /// Send through the priority lane.
    pub fn priority(&self, message: ActorMessage) {
        self.runtime
            .dispatch_priority(message.ensure_source(self.id));
    }

    /// Build and send a priority message to `dest`.
    pub fn priority_tell<T: std::any::Any + Send + Sync>(&self, value: T, tag: i32, dest: ActorId) {
        self.priority(ActorMessage::new(value, tag).with_dest(dest));
    }

    /// Hand a message this actor does not understand to the dead-letter
    /// sink.
    pub fn unhandled(&self, message: &ActorMessage) {
        self.runtime.dead_letter(message.clone());
    }

    // ---- behavior switching ----

    /// Install `behavior` as the active reception function. With
    /// `replace` the current top of the stack is swapped out; without it
    /// the behavior is pushed on top and [`ActorContext::unbecome`]
    /// returns to the previous one.
    pub fn r#become(
        &mut self,
        behavior: impl FnMut(&mut A, &mut ActorContext<'_, A>, &ActorMessage) -> Result<(), ActorError>
            + Send
            + 'static,
        replace: bool,
    ) {
        self.ops.push(ContextOp::Become {
            behavior: Box::new(behavior),
            replace,
        });
    }

    /// Pop the active behavior, revealing the previous one.
    pub fn unbecome(&mut self) {
        self.ops.push(ContextOp::Unbecome);
    }

    /// Collapse the stack back to the actor's original `receive`.
    pub fn unbecome_all(&mut self) {
        self.ops.push(ContextOp::UnbecomeAll);
    }

    // ---- awaiting ----

    /// Become a behavior that routes only messages matching `filter` to
    /// `action`; everything else is ignored.
    pub fn await_message(
        &mut self,
        filter: impl Fn(&ActorMessage) -> bool + Send + 'static,
        mut action: impl FnMut(&mut A, &mut ActorContext<'_, A>, &ActorMessage) -> Result<(), ActorError>
            + Send
            + 'static,
        replace: bool,
    ) {
        self.r#become(
            move |actor, ctx, message| {
                if filter(message) {
                    action(actor, ctx, message)
                } else {
                    Ok(())
                }
            },
            replace,
        );
    }

    /// Await only messages from `source`.
    pub fn await_source(
        &mut self,
        source: ActorId,
        action: impl FnMut(&mut A, &mut ActorContext<'_, A>, &ActorMessage) -> Result<(), ActorError>
            + Send
            + 'static,
    ) {
        self.await_message(move |message| message.source() == Some(source), action, true);
    }

    /// Await only messages carrying `tag`.
    pub fn await_tag(
        &mut self,
        tag: i32,
        action: impl FnMut(&mut A, &mut ActorContext<'_, A>, &ActorMessage) -> Result<(), ActorError>
            + Send
            + 'static,
    ) {
        self.await_message(move |message| message.tag() == tag, action, true);
    }

    /// Await only messages from `source` carrying `tag`.
    pub fn await_source_tag(
        &mut self,
        source: ActorId,
        tag: i32,
        action: impl FnMut(&mut A, &mut ActorContext<'_, A>, &ActorMessage) -> Result<(), ActorError>
            + Send
            + 'static,
    ) {
        self.await_message(
            move |message| message.source() == Some(source) && message.tag() == tag,
            action,
            true,
        );
    }

    /// Like [`ActorContext::await_message`], with a deadline. A timeout
    /// self-message is scheduled; on the first match it is cancelled and
    /// `action` runs with `Some(message)`. If the deadline fires first,
    /// `action` runs exactly once with `None`.
    pub fn await_with_timeout(
        &mut self,
        filter: impl Fn(&ActorMessage) -> bool + Send + 'static,
        mut action: impl FnMut(&mut A, &mut ActorContext<'_, A>, Option<&ActorMessage>) -> Result<(), ActorError>
            + Send
            + 'static,
        timeout: Duration,
        replace: bool,
    ) {
        let token = ActorId::generate();
        let handle = self
            .runtime
            .global_timer()
            .schedule_once(
                ActorMessage::empty(tags::TIMEOUT)
                    .with_source(self.id)
                    .with_interaction(token),
                TimerDest::Id(self.id),
                timeout,
            )
            .ok();
        let mut resolved = false;
        self.r#become(
            move |actor, ctx, message| {
                if resolved {
                    return Ok(());
                }
                if message.tag() == tags::TIMEOUT && message.interaction() == Some(token) {
                    resolved = true;
                    return action(actor, ctx, None);
                }
                if filter(message) {
                    resolved = true;
                    if let Some(handle) = &handle {
                        handle.cancel();
                    }
                    return action(actor, ctx, Some(message));
                }
                Ok(())
            },
            replace,
        );
    }

    // ---- stashing ----

    /// Put a message aside in the owner-private stash.
    pub fn stash(&mut self, message: &ActorMessage) {
        self.stash.push(message.clone());
    }

    /// Take back the oldest stashed message.
    pub fn unstash(&mut self) -> Option<ActorMessage> {
        self.stash.pop_one()
    }

    /// Number of stashed messages.
    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    // ---- children ----

    /// Register one child under this actor. The child's `pre_start` runs
    /// on its owning worker before its first message.
    pub fn add_child<C, F>(&mut self, factory: F) -> Result<ActorId, SystemError>
    where
        C: Actor,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.runtime
            .register_actor(Some(self.id), factory, CellFlags::default(), None)
    }

    /// Register `instances` children from the same factory.
    ///
    /// All-or-nothing: when one registration fails, the children
    /// registered before it are stopped again and the error is returned.
    pub fn add_children<C, F>(
        &mut self,
        factory: F,
        instances: usize,
    ) -> Result<Vec<ActorId>, SystemError>
    where
        C: Actor,
        F: Fn() -> C + Send + Sync + Clone + 'static,
    {
        let mut ids = Vec::with_capacity(instances);
        for _ in 0..instances {
            match self.runtime.register_actor(
                Some(self.id),
                factory.clone(),
                CellFlags::default(),
                None,
            ) {
                Ok(id) => ids.push(id),
                Err(error) => {
                    for id in ids {
                        self.runtime.send_signal(
                            id,
                            apiary_mailbox::SystemSignal::Stop,
                            Some(self.id),
                        );
                    }
                    return Err(error);
                }
            }
        }
        Ok(ids)
    }

    // ---- watching ----

    /// Subscribe to `dest`'s termination: when it stops, this actor
    /// receives one message with tag [`tags::TERMINATED`] and
    /// `source = dest`. Watching an already-gone actor delivers the
    /// notification immediately.
    pub fn watch(&mut self, dest: ActorId) {
        let registered = self
            .runtime
            .registry()
            .cell(dest)
            .map(|cell| cell.add_watcher(self.id))
            .unwrap_or(false);
        if registered {
            self.watching.insert(dest);
        } else {
            self.runtime.dispatch(
                ActorMessage::empty(tags::TERMINATED)
                    .with_source(dest)
                    .with_dest(self.id),
            );
        }
    }

    /// Drop a termination subscription.
    pub fn unwatch(&mut self, dest: ActorId) {
        self.watching.shift_remove(&dest);
        if let Some(cell) = self.runtime.registry().cell(dest) {
            cell.remove_watcher(self.id);
        }
    }

    // ---- lifecycle ----

    /// Stop this actor once the current message returns. Descendants stop
    /// first; watchers are then notified.
    pub fn stop(&mut self) {
        self.ops.push(ContextOp::StopSelf);
    }

    /// Request a graceful stop of another actor.
    pub fn stop_actor(&mut self, dest: ActorId) {
        if dest == self.id {
            self.stop();
        } else {
            self.runtime
                .send_signal(dest, apiary_mailbox::SystemSignal::Stop, Some(self.id));
        }
    }

    /// Bind an alias to this actor.
    pub fn set_alias(&self, alias: &str) {
        if !alias.is_empty() {
            self.runtime.registry().set_alias(self.id, alias);
        }
    }

    // ---- timers ----

    /// Schedule `message` to `dest` once after `delay`.
    pub fn schedule_once(
        &self,
        message: ActorMessage,
        dest: ActorId,
        delay: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.runtime.timer_pool().schedule_once(
            message.ensure_source(self.id),
            TimerDest::Id(dest),
            delay,
        )
    }

    /// Schedule `message` to `dest` repeatedly; a fresh copy is produced
    /// per fire.
    pub fn schedule_at_fixed_rate(
        &self,
        message: ActorMessage,
        dest: ActorId,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.runtime.timer_pool().schedule_at_fixed_rate(
            message.ensure_source(self.id),
            TimerDest::Id(dest),
            initial_delay,
            period,
        )
    }
}
