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

//! Apiary — a worker-pool actor runtime
//!
//! Programs organize concurrent computation as single-threaded actors
//! exchanging asynchronous messages. A fixed pool of worker threads owns
//! the actors; supervision trees contain and recover from faults;
//! blocking work runs on a separate resource executor.
//!
//! This crate is the facade: it re-exports the public API of the member
//! crates. Start with [`ActorSystem`] and the [`Actor`] trait.
//!
//! ```no_run
//! use apiary::prelude::*;
//!
//! struct Counter {
//!     count: u64,
//! }
//!
//! impl Actor for Counter {
//!     fn receive(
//!         &mut self,
//!         _ctx: &mut ActorContext<'_, Self>,
//!         message: &ActorMessage,
//!     ) -> Result<(), ActorError> {
//!         if let Some(n) = message.value_as::<u64>() {
//!             self.count += n;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let system = ActorSystem::new(ActorSystemConfig::default()).unwrap();
//! let counter = system.add_actor(|| Counter { count: 0 }).unwrap();
//! system.send(ActorMessage::new(5u64, 0).with_dest(counter));
//! system.shutdown(true);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use apiary_core::{
    tags, ActorError, ActorId, ActorMessage, ActorSystemConfig, ActorSystemConfigBuilder,
    AskError, DeadLetterSink, Directive, ErrorHandler, FailsafeManager, FailureKind,
    LogDeadLetterSink, LogErrorHandler, Payload, PersistenceDriver, PersistenceError,
    PodController, SupervisorStrategy, SystemError, TimerError,
};
pub use apiary_mailbox::{Envelope, EnvelopeKind, Mailbox, MailboxError, Stash, SystemSignal};
pub use apiary_runtime::{
    Actor, ActorContext, ActorGroup, ActorSystem, GroupKind, Lifecycle, Receive, TimerHandle,
};

/// The common imports for writing actors.
pub mod prelude {
    pub use apiary_core::{
        tags, ActorError, ActorId, ActorMessage, ActorSystemConfig, Directive, SupervisorStrategy,
    };
    pub use apiary_runtime::{Actor, ActorContext, ActorGroup, ActorSystem, Lifecycle};
}
