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

//! Shared helpers for the runtime integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apiary_core::{ActorMessage, ActorSystemConfig, DeadLetterSink};

/// Initialize test logging once; respects `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

/// Small, fast-failing configuration for tests.
pub fn test_config(name: &str, parallelism: usize) -> ActorSystemConfig {
    ActorSystemConfig::builder()
        .name(name)
        .parallelism(parallelism)
        .max_retries(3)
        .within_time_range(Duration::from_secs(5))
        .await_termination_timeout(Duration::from_secs(5))
        .build()
}

/// Dead-letter sink that keeps everything it receives.
#[derive(Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<ActorMessage>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(CollectingSink::default())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn snapshot(&self) -> Vec<ActorMessage> {
        self.messages.lock().clone()
    }
}

impl DeadLetterSink for CollectingSink {
    fn receive(&self, message: ActorMessage) {
        self.messages.lock().push(message);
    }
}
