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

//! The Apiary actor runtime
//!
//! Single-threaded actors on a fixed pool of worker threads:
//! - each worker owns a disjoint set of cells and is the only thread that
//!   ever runs them
//! - sends append to the destination mailbox and wake the owning worker
//!   through a compare-and-swap activation handshake
//! - faults in reception functions are caught and resolved by the parent's
//!   supervision strategy (resume / restart / stop / escalate)
//! - blocking actors run on a separate resource executor, never on workers
//!
//! Entry point is [`ActorSystem`]; actor behavior is written against
//! [`Actor`] and [`ActorContext`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod actor;
mod cell;
mod context;
mod dispatcher;
mod lifecycle;
mod pseudo;
mod registry;
mod resource;
mod supervision;
mod system;
mod timer;
mod watchdog;
mod worker;

pub use actor::{Actor, ActorGroup, GroupKind, Receive};
pub use context::ActorContext;
pub use lifecycle::Lifecycle;
pub use system::ActorSystem;
pub use timer::TimerHandle;
