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

//! The stash reservoir
//!
//! An actor-private buffer for messages the actor is not ready to handle.
//! The dispatcher never touches it: the owner pushes and pops at will,
//! typically stashing while "busy" and replaying in arrival order after a
//! state change.

use std::collections::VecDeque;

use apiary_core::ActorMessage;

/// Owner-private message reservoir.
#[derive(Debug, Default)]
pub struct Stash {
    messages: VecDeque<ActorMessage>,
}

impl Stash {
    /// Empty stash.
    pub fn new() -> Self {
        Stash {
            messages: VecDeque::new(),
        }
    }

    /// Put a message aside.
    pub fn push(&mut self, message: ActorMessage) {
        self.messages.push_back(message);
    }

    /// Take back the oldest stashed message.
    pub fn pop_one(&mut self) -> Option<ActorMessage> {
        self.messages.pop_front()
    }

    /// Stashed message count.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is stashed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
