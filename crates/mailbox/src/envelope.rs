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

//! Mailbox envelopes
//!
//! ## Purpose
//! What actually sits in a mailbox. The runtime's control traffic is a
//! distinct envelope kind rather than a range of message tags, so user
//! behavior can never observe or spoof it; a user message that happens to
//! carry a reserved tag is still just a user message.

use apiary_core::{ActorError, ActorMessage};

/// Internal control signal delivered ahead of user traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemSignal {
    /// Begin a graceful stop cascade.
    Stop,
    /// A child finished its stop cascade.
    StopSuccess,
    /// Forceful termination; surfaces as a failure to supervision.
    Kill,
    /// Run the restart protocol.
    Restart,
    /// The current behavior failed (escalated from a child or raised
    /// locally); carries the originating error.
    Failure(ActorError),
    /// Liveness probe; the cell answers `UP` to the probe's source.
    HealthCheck,
    /// Resume delivery of user messages.
    Activate,
    /// Suspend delivery of user messages.
    Deactivate,
}

/// Whether an envelope carries user traffic or a control signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Ordinary message destined for the behavior stack.
    User,
    /// Control signal consumed by the cell itself.
    Signal(SystemSignal),
}

/// One queued unit: the message plus its routing kind.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Routing kind.
    pub kind: EnvelopeKind,
    /// The carried message. For signals this supplies source/interaction
    /// context (e.g. who requested the stop, where `UP` replies go).
    pub message: ActorMessage,
}

impl Envelope {
    /// Envelope for a user message.
    pub fn user(message: ActorMessage) -> Self {
        Envelope {
            kind: EnvelopeKind::User,
            message,
        }
    }

    /// Envelope for a control signal.
    pub fn signal(signal: SystemSignal, message: ActorMessage) -> Self {
        Envelope {
            kind: EnvelopeKind::Signal(signal),
            message,
        }
    }

    /// Whether this envelope is a control signal.
    pub fn is_signal(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Signal(_))
    }
}
