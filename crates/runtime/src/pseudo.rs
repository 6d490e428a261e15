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

//! Pseudo-cells
//!
//! ## Purpose
//! A pseudo-cell is a transient, addressable endpoint with a completion
//! latch instead of a behavior: replies delivered to its identity are
//! buffered and handed to a thread blocked in [`PseudoCell::take`]. The
//! synchronous `ask` pattern and the watchdog's reply collector are built
//! on it.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use apiary_core::{ActorId, ActorMessage};

pub(crate) struct PseudoCell {
    id: ActorId,
    queue: Mutex<VecDeque<ActorMessage>>,
    available: Condvar,
}

impl PseudoCell {
    pub(crate) fn new() -> Self {
        PseudoCell {
            id: ActorId::generate(),
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> ActorId {
        self.id
    }

    /// Buffer one message and wake a blocked taker. Called from the
    /// dispatcher on any thread.
    pub(crate) fn deliver(&self, message: ActorMessage) {
        self.queue.lock().push_back(message);
        self.available.notify_one();
    }

    /// Block until a message is available or `timeout` elapses.
    pub(crate) fn take(&self, timeout: Duration) -> Option<ActorMessage> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock();
        loop {
            if let Some(message) = queue.pop_front() {
                return Some(message);
            }
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }
}
