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

//! Error taxonomy
//!
//! ## Purpose
//! Typed errors for the whole runtime. User handler failures are values of
//! [`ActorError`] consumed by supervision — they never abort the process.
//! System-level operations (registration, shutdown) fail with
//! [`SystemError`]; the synchronous request/reply surface fails with
//! [`AskError`].

use thiserror::Error;

/// Failure of an actor: a reception function or lifecycle hook returned an
/// error, panicked, or the actor was killed.
///
/// These errors feed the supervision protocol of the actor's parent and
/// the failsafe registry. Cloneable so a single failure can be reported to
/// both without ceremony.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActorError {
    /// A reception function returned an error.
    #[error("handler failed: {0}")]
    Handler(String),

    /// A reception function or lifecycle hook panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The actor factory or `pre_start` hook failed; the actor never ran.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// The actor received a kill request.
    #[error("actor was killed")]
    Killed,

    /// An operation was attempted in an incompatible lifecycle state.
    #[error("invalid lifecycle state: {0}")]
    InvalidState(String),
}

impl ActorError {
    /// Wrap an arbitrary error value as a handler failure.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        ActorError::Handler(err.to_string())
    }
}

impl From<SystemError> for ActorError {
    fn from(err: SystemError) -> Self {
        ActorError::Initialization(err.to_string())
    }
}

/// Failure of a system-level operation.
#[derive(Debug, Error)]
pub enum SystemError {
    /// An actor could not be registered.
    #[error("registration failed: {0}")]
    Registration(String),

    /// The addressed actor does not exist.
    #[error("no actor registered under {0}")]
    UnknownActor(String),

    /// The system is shutting down and refuses new work.
    #[error("actor system is shutting down")]
    ShuttingDown,
}

/// Failure of a synchronous request/reply (`ask`) interaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AskError {
    /// No reply arrived within the deadline.
    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),

    /// The request could not be delivered.
    #[error("request went to dead letters")]
    DeadLetter,
}

/// Failure of a timer operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The timer service has been shut down.
    #[error("timer service is shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_wraps_display() {
        let err = ActorError::handler("boom");
        assert_eq!(err, ActorError::Handler("boom".into()));
        assert_eq!(err.to_string(), "handler failed: boom");
    }

    #[test]
    fn test_errors_format() {
        assert_eq!(ActorError::Killed.to_string(), "actor was killed");
        assert!(AskError::Timeout(std::time::Duration::from_millis(5))
            .to_string()
            .contains("5ms"));
    }
}
