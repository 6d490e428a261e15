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

//! Core vocabulary types for the Apiary actor runtime
//!
//! This crate carries everything the runtime and user code share without
//! pulling in the scheduling machinery:
//! - Actor identities and protocol tags
//! - The immutable message type
//! - Supervision strategy types
//! - System configuration and its builder
//! - The failsafe (error handler) registry
//! - Collaborator interfaces (persistence driver, pod controller,
//!   dead-letter sink)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collaborators;
mod config;
mod error;
mod failsafe;
mod id;
mod message;
mod supervisor;
pub mod tags;

pub use collaborators::{
    DeadLetterSink, LogDeadLetterSink, PersistenceDriver, PersistenceError, PodController,
};
pub use config::{ActorSystemConfig, ActorSystemConfigBuilder};
pub use error::{ActorError, AskError, SystemError, TimerError};
pub use failsafe::{ErrorHandler, FailsafeManager, FailureKind, LogErrorHandler};
pub use id::ActorId;
pub use message::{ActorMessage, Payload};
pub use supervisor::{Decider, Directive, SupervisorStrategy};
