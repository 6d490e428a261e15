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

//! Supervision strategy types
//!
//! ## Purpose
//! A parent supervises its children: when a child's reception function
//! fails, the parent's strategy maps the error to a [`Directive`]. The
//! default strategy restarts, bounded by a sliding window of
//! `max_retries` restarts per `within_time_range`; exhausting the window
//! stops the child.
//!
//! The strategy object is captured once when an actor is spawned and is
//! immutable afterwards, so a failing child can read its parent's strategy
//! without synchronizing on the parent's state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::ActorError;

/// What a supervisor does with a failed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Drop the offending message, keep the actor's state, keep running.
    Resume,
    /// Recreate the actor's internal state from its factory. Identity,
    /// parent and mailbox are preserved; children are stopped first.
    Restart,
    /// Stop the child (and its descendants).
    Stop,
    /// Treat the parent itself as failed; the grandparent's strategy
    /// decides.
    Escalate,
}

/// Decision function from error to directive.
pub type Decider = Arc<dyn Fn(&ActorError) -> Directive + Send + Sync>;

/// A parent's policy for failed children.
#[derive(Clone)]
pub struct SupervisorStrategy {
    max_retries: u32,
    within_time_range: Duration,
    decider: Option<Decider>,
}

impl SupervisorStrategy {
    /// Strategy that restarts, at most `max_retries` times per
    /// `within_time_range`, then stops.
    pub fn new(max_retries: u32, within_time_range: Duration) -> Self {
        SupervisorStrategy {
            max_retries,
            within_time_range,
            decider: None,
        }
    }

    /// Attach a custom decision function consulted per error.
    ///
    /// The retry window still applies on top: a `Restart` decision turns
    /// into `Stop` once the window is exhausted.
    pub fn with_decider(
        mut self,
        decider: impl Fn(&ActorError) -> Directive + Send + Sync + 'static,
    ) -> Self {
        self.decider = Some(Arc::new(decider));
        self
    }

    /// Map an error to a directive (window bookkeeping is the runtime's
    /// business, not the strategy's). Without a custom decider, kills
    /// stop and everything else restarts.
    pub fn decide(&self, error: &ActorError) -> Directive {
        match &self.decider {
            Some(decider) => decider(error),
            None => match error {
                ActorError::Killed => Directive::Stop,
                _ => Directive::Restart,
            },
        }
    }

    /// Maximum restarts inside one window.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Length of the sliding restart window.
    pub fn within_time_range(&self) -> Duration {
        self.within_time_range
    }
}

impl fmt::Debug for SupervisorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorStrategy")
            .field("max_retries", &self.max_retries)
            .field("within_time_range", &self.within_time_range)
            .field("custom_decider", &self.decider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_decision_restarts_failures_and_stops_kills() {
        let strategy = SupervisorStrategy::new(3, Duration::from_secs(1));
        assert_eq!(
            strategy.decide(&ActorError::Handler("x".into())),
            Directive::Restart
        );
        assert_eq!(
            strategy.decide(&ActorError::Panicked("x".into())),
            Directive::Restart
        );
        assert_eq!(strategy.decide(&ActorError::Killed), Directive::Stop);
    }

    #[test]
    fn test_custom_decider_wins() {
        let strategy =
            SupervisorStrategy::new(3, Duration::from_secs(1)).with_decider(|err| match err {
                ActorError::Killed => Directive::Stop,
                _ => Directive::Resume,
            });
        assert_eq!(strategy.decide(&ActorError::Killed), Directive::Stop);
        assert_eq!(
            strategy.decide(&ActorError::Handler("x".into())),
            Directive::Resume
        );
    }
}
