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

//! Cell lifecycle states

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a cell.
///
/// Transitions are performed only by the owning worker; reads may come
/// from any thread (registry, watch registration, tests).
///
/// ```text
/// Created -> Started -> Running -> Restarting -> Running
///                              \-> Stopping -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Registered, `pre_start` not yet run.
    Created = 0,
    /// `pre_start` finished.
    Started = 1,
    /// Processing messages.
    Running = 2,
    /// Failure being resolved; children stopping, instance to be rebuilt.
    Restarting = 3,
    /// Stop cascade in progress, waiting for descendants.
    Stopping = 4,
    /// Terminated; watchers notified, identity released.
    Stopped = 5,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Lifecycle {
        match value {
            0 => Lifecycle::Created,
            1 => Lifecycle::Started,
            2 => Lifecycle::Running,
            3 => Lifecycle::Restarting,
            4 => Lifecycle::Stopping,
            _ => Lifecycle::Stopped,
        }
    }
}

/// Atomically readable lifecycle slot.
#[derive(Debug)]
pub(crate) struct AtomicLifecycle(AtomicU8);

impl AtomicLifecycle {
    pub(crate) fn new(initial: Lifecycle) -> Self {
        AtomicLifecycle(AtomicU8::new(initial as u8))
    }

    pub(crate) fn load(&self) -> Lifecycle {
        Lifecycle::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: Lifecycle) {
        self.0.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_states() {
        let states = [
            Lifecycle::Created,
            Lifecycle::Started,
            Lifecycle::Running,
            Lifecycle::Restarting,
            Lifecycle::Stopping,
            Lifecycle::Stopped,
        ];
        let slot = AtomicLifecycle::new(Lifecycle::Created);
        for state in states {
            slot.store(state);
            assert_eq!(slot.load(), state);
        }
    }
}
