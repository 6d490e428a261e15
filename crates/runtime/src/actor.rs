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

//! The actor behavior trait
//!
//! ## Purpose
//! User code implements [`Actor`] and interacts with the runtime only
//! through the [`ActorContext`](crate::ActorContext) handed to every
//! reception call and lifecycle hook. An actor is a single-threaded
//! island: the runtime never runs two of its methods concurrently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use apiary_core::{ActorError, ActorId, ActorMessage, SupervisorStrategy};

use crate::context::ActorContext;

/// A reception function pushed onto the behavior stack with
/// [`ActorContext::become`](ActorContext::r#become). The bottom of the
/// stack is implicit: when no override is installed, [`Actor::receive`]
/// runs.
pub type Receive<A> = Box<
    dyn FnMut(&mut A, &mut ActorContext<'_, A>, &ActorMessage) -> Result<(), ActorError> + Send,
>;

/// Behavior of an actor.
///
/// ## Lifecycle hooks
/// - `pre_start` runs on the owning worker before the first message; spawn
///   children and register aliases here, not in the constructor.
/// - `pre_restart(reason)` runs on the old instance when supervision
///   decided to restart it.
/// - `post_restart(reason)` runs on the freshly built instance; the
///   default delegates to `pre_start`.
/// - `post_stop` runs once when the cell finalizes its stop.
///
/// Hook failures are caught: a failing `pre_start` aborts the actor
/// (initialization failure), failures in the other hooks are logged and
/// reported to the failsafe registry.
pub trait Actor: Send + Sized + 'static {
    /// Handle one message. Errors (and panics) are routed to the parent's
    /// supervision strategy.
    fn receive(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError>;

    /// Initialization hook, run before any message is processed.
    fn pre_start(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs on the failing instance before a restart replaces it.
    fn pre_restart(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        reason: &ActorError,
    ) -> Result<(), ActorError> {
        let _ = (ctx, reason);
        Ok(())
    }

    /// Runs on the new instance after a restart.
    fn post_restart(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        reason: &ActorError,
    ) -> Result<(), ActorError> {
        let _ = reason;
        self.pre_start(ctx)
    }

    /// Runs when the cell stops, after all children have stopped.
    fn post_stop(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        let _ = ctx;
        Ok(())
    }

    /// Strategy this actor applies to its failing children. `None` uses
    /// the system default (restart bounded by the configured window).
    fn supervisor_strategy(&self) -> Option<SupervisorStrategy> {
        None
    }

    /// Optional human-readable name, used in paths and logs.
    fn name(&self) -> Option<String> {
        None
    }
}

/// Worker-affinity hint for a set of actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Spread members across workers round-robin (one per worker for
    /// groups sized to the pool, e.g. watchdog probes).
    Distributed,
    /// Co-locate all members on one worker.
    Balanced,
}

/// A group of actors sharing a placement policy.
///
/// Pass the same group to several registrations; the dispatcher consults
/// it when assigning each member to a worker.
#[derive(Debug)]
pub struct ActorGroup {
    id: ActorId,
    kind: GroupKind,
    cursor: AtomicUsize,
}

impl ActorGroup {
    /// Group whose members are spread across workers.
    pub fn distributed() -> Arc<Self> {
        Arc::new(ActorGroup {
            id: ActorId::generate(),
            kind: GroupKind::Distributed,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Group whose members are co-located on one worker.
    pub fn balanced() -> Arc<Self> {
        Arc::new(ActorGroup {
            id: ActorId::generate(),
            kind: GroupKind::Balanced,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Group identity.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Placement policy.
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub(crate) fn next_slot(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }
}
