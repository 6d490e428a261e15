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

//! Failsafe error-handler registry
//!
//! ## Purpose
//! Every unhandled fault caught by a core thread — worker, timer,
//! watchdog, resource pool — is reported here with a classification and
//! the offending identity. The handler is replaceable at runtime; the
//! default logs through `tracing`.
//!
//! Internal failures never propagate to user actors, and user failures
//! never reach this registry directly (supervision consumes them first and
//! reports here as a side channel).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{ActorError, ActorId};

/// Classification of an unhandled fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// A reception function or lifecycle hook of a worker-owned actor.
    Actor,
    /// A reception function of a resource actor.
    Resource,
    /// An actor factory or `pre_start` hook.
    Initialization,
    /// The watchdog thread itself.
    Watchdog,
    /// The pod replication controller thread.
    Replication,
    /// The resource executor rejected a task.
    ExecuterResource,
    /// A message could not be handed off on behalf of an external client.
    ExecuterClient,
    /// A pseudo-cell (synchronous request/reply surrogate).
    Pseudo,
}

impl FailureKind {
    /// Stable classification string, as reported to handlers.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Actor => "actor",
            FailureKind::Resource => "resource",
            FailureKind::Initialization => "initialization",
            FailureKind::Watchdog => "watchdog",
            FailureKind::Replication => "replication",
            FailureKind::ExecuterResource => "executer_resource",
            FailureKind::ExecuterClient => "executer_client",
            FailureKind::Pseudo => "pseudo",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of fault notifications.
pub trait ErrorHandler: Send + Sync {
    /// Handle one fault. `id` names the offending actor when one is known.
    fn handle(&self, error: &ActorError, kind: FailureKind, id: Option<ActorId>);
}

/// Default handler: structured error logging, nothing else.
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, error: &ActorError, kind: FailureKind, id: Option<ActorId>) {
        match id {
            Some(id) => tracing::error!(
                kind = %kind,
                actor_id = %id,
                error = %error,
                "unhandled fault"
            ),
            None => tracing::error!(kind = %kind, error = %error, "unhandled fault"),
        }
    }
}

/// Registry holding the active [`ErrorHandler`].
pub struct FailsafeManager {
    handler: RwLock<Arc<dyn ErrorHandler>>,
}

impl FailsafeManager {
    /// Registry with the logging handler installed.
    pub fn new() -> Self {
        FailsafeManager {
            handler: RwLock::new(Arc::new(LogErrorHandler)),
        }
    }

    /// Replace the active handler.
    pub fn set_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.handler.write() = handler;
    }

    /// Report a fault to the active handler.
    pub fn notify(&self, error: &ActorError, kind: FailureKind, id: Option<ActorId>) {
        let handler = self.handler.read().clone();
        handler.handle(error, kind, id);
    }
}

impl Default for FailsafeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recording(Mutex<Vec<(FailureKind, Option<ActorId>)>>);

    impl ErrorHandler for Recording {
        fn handle(&self, _error: &ActorError, kind: FailureKind, id: Option<ActorId>) {
            self.0.lock().push((kind, id));
        }
    }

    #[test]
    fn test_classification_strings() {
        assert_eq!(FailureKind::Actor.as_str(), "actor");
        assert_eq!(FailureKind::ExecuterResource.as_str(), "executer_resource");
        assert_eq!(FailureKind::Replication.as_str(), "replication");
        assert_eq!(FailureKind::Pseudo.as_str(), "pseudo");
    }

    #[test]
    fn test_replaced_handler_receives_notifications() {
        let manager = FailsafeManager::new();
        let recorder = Arc::new(Recording(Mutex::new(Vec::new())));
        manager.set_handler(recorder.clone());

        let id = ActorId::generate();
        manager.notify(&ActorError::Killed, FailureKind::Actor, Some(id));
        manager.notify(&ActorError::Killed, FailureKind::Watchdog, None);

        let seen = recorder.0.lock();
        assert_eq!(seen.as_slice(), &[
            (FailureKind::Actor, Some(id)),
            (FailureKind::Watchdog, None),
        ]);
    }
}
