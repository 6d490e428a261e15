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

//! Collaborator interfaces
//!
//! ## Purpose
//! The core treats persistence, pod autoscaling and dead-letter handling
//! as external collaborators: only their interfaces live here. The runtime
//! invokes them at the documented points and owns none of their state.

use thiserror::Error;

use crate::{ActorId, ActorMessage};

/// Failure reported by a persistence driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("persistence driver failure: {0}")]
pub struct PersistenceError(pub String);

/// Journaling backend for persistent actors.
///
/// ## Contract
/// `persist` hands over one event and returns a channel that yields the
/// acknowledgement once the event is durable. `recover` returns a channel
/// streaming the stored events for an actor in order; the driver closes it
/// when the journal is exhausted.
pub trait PersistenceDriver: Send + Sync {
    /// Journal `event` for `actor`; the returned receiver yields the ack.
    fn persist(
        &self,
        event: Vec<u8>,
        actor: ActorId,
    ) -> crossbeam_channel::Receiver<Result<(), PersistenceError>>;

    /// Stream back the journaled events of `actor`.
    fn recover(&self, actor: ActorId) -> crossbeam_channel::Receiver<Vec<u8>>;
}

/// Periodic pod-replication callback.
///
/// Invoked on its own schedule when the horizontal pod autoscaler is
/// enabled; has no other coupling to the core.
pub trait PodController: Send + Sync {
    /// One synchronization round.
    fn sync(&self);
}

/// Sink for messages whose destination could not be resolved.
pub trait DeadLetterSink: Send + Sync {
    /// Receive one undeliverable message, original fields intact.
    fn receive(&self, message: ActorMessage);
}

/// Default sink: log the message and drop it.
pub struct LogDeadLetterSink;

impl DeadLetterSink for LogDeadLetterSink {
    fn receive(&self, message: ActorMessage) {
        tracing::warn!(
            tag = message.tag(),
            source = ?message.source(),
            dest = ?message.dest(),
            "dead letter"
        );
    }
}
