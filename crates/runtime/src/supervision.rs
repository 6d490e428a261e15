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

//! Supervision bookkeeping
//!
//! The per-cell side of the supervision protocol: the sliding restart
//! window that turns a `Restart` directive into `Stop` once the parent's
//! budget is exhausted. The protocol itself (hooks, cascades, escalation)
//! runs in the cell; the decision types live in `apiary-core`.

use std::time::{Duration, Instant};

/// Sliding window of restarts, owned by the failing cell and touched only
/// on its worker.
#[derive(Debug, Default)]
pub(crate) struct RestartWindow {
    count: u32,
    window_start: Option<Instant>,
}

impl RestartWindow {
    /// Record one restart attempt at `now`. Returns `true` while the
    /// budget of `max_retries` per `within` holds, `false` once exceeded.
    pub(crate) fn record(&mut self, now: Instant, max_retries: u32, within: Duration) -> bool {
        match self.window_start {
            Some(start) if now.duration_since(start) <= within => {
                self.count += 1;
            }
            _ => {
                self.window_start = Some(now);
                self.count = 1;
            }
        }
        self.count <= max_retries
    }

    /// Restarts recorded in the current window.
    pub(crate) fn count(&self) -> u32 {
        self.count
    }
}
