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

//! Mailboxes for the Apiary actor runtime
//!
//! Per-actor message queues:
//! - a priority lane and a normal lane, both multi-producer/single-consumer
//! - the activation flag that keeps a cell scheduled at most once
//! - the owner-private stash reservoir
//!
//! Dequeue policy: the priority lane is drained before each normal-lane
//! take, and only the owning worker consumes.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod queue;
mod stash;

pub use envelope::{Envelope, EnvelopeKind, SystemSignal};
pub use queue::{Mailbox, MailboxError, MailboxStats};
pub use stash::Stash;
