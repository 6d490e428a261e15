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

//! System configuration
//!
//! ## Purpose
//! All tunables of an actor system, assembled through
//! [`ActorSystemConfigBuilder`]. Values are fixed once the system is
//! constructed.

use std::sync::Arc;
use std::time::Duration;

use crate::{DeadLetterSink, PersistenceDriver, PodController};

/// Configuration of one actor system.
#[derive(Clone)]
pub struct ActorSystemConfig {
    /// System name, used in thread names and logs.
    pub name: String,
    /// Number of worker threads.
    pub parallelism: usize,
    /// Multiplier applied when sizing per-worker actor groups (watchdog
    /// probes, persistence shards).
    pub parallelism_factor: usize,
    /// Per-cell batch budget: messages one worker visit may process.
    pub throughput: usize,
    /// Capacity of each cell's normal mailbox lane; `0` means unbounded.
    pub queue_size: usize,
    /// Sizing hint for worker scheduling queues.
    pub buffer_queue_size: usize,
    /// Upper bound on resource-executor threads.
    pub max_resource_threads: usize,
    /// Default restart budget per supervision window.
    pub max_retries: u32,
    /// Length of the default supervision window.
    pub within_time_range: Duration,
    /// How long shutdown waits for cells and pools to drain.
    pub await_termination_timeout: Duration,
    /// Whether the worker watchdog runs.
    pub watchdog_enabled: bool,
    /// Period of watchdog liveness rounds.
    pub watchdog_sync_time: Duration,
    /// Whether the pod replication controller runs.
    pub horizontal_pod_autoscaler_enabled: bool,
    /// Period of pod controller rounds.
    pub horizontal_pod_autoscaler_sync_time: Duration,
    /// Whether persistence is wired up.
    pub persistence_mode: bool,
    /// Journaling backend, required when `persistence_mode` is set.
    pub persistence_driver: Option<Arc<dyn PersistenceDriver>>,
    /// Pod controller callback, consulted when the autoscaler is enabled.
    pub pod_controller: Option<Arc<dyn PodController>>,
    /// Destination of undeliverable messages; defaults to log-and-drop.
    pub dead_letter_sink: Option<Arc<dyn DeadLetterSink>>,
}

impl ActorSystemConfig {
    /// Builder seeded with defaults.
    pub fn builder() -> ActorSystemConfigBuilder {
        ActorSystemConfigBuilder::new()
    }
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        ActorSystemConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for ActorSystemConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystemConfig")
            .field("name", &self.name)
            .field("parallelism", &self.parallelism)
            .field("parallelism_factor", &self.parallelism_factor)
            .field("throughput", &self.throughput)
            .field("queue_size", &self.queue_size)
            .field("buffer_queue_size", &self.buffer_queue_size)
            .field("max_resource_threads", &self.max_resource_threads)
            .field("max_retries", &self.max_retries)
            .field("within_time_range", &self.within_time_range)
            .field("await_termination_timeout", &self.await_termination_timeout)
            .field("watchdog_enabled", &self.watchdog_enabled)
            .field("watchdog_sync_time", &self.watchdog_sync_time)
            .field(
                "horizontal_pod_autoscaler_enabled",
                &self.horizontal_pod_autoscaler_enabled,
            )
            .field("persistence_mode", &self.persistence_mode)
            .finish()
    }
}

/// Builder for [`ActorSystemConfig`].
pub struct ActorSystemConfigBuilder {
    config: ActorSystemConfig,
}

impl ActorSystemConfigBuilder {
    /// Builder seeded with defaults: one worker per hardware thread, batch
    /// budget 32, bounded mailboxes of 50000, watchdog and autoscaler off.
    pub fn new() -> Self {
        ActorSystemConfigBuilder {
            config: ActorSystemConfig {
                name: "apiary".to_string(),
                parallelism: num_cpus::get(),
                parallelism_factor: 1,
                throughput: 32,
                queue_size: 50_000,
                buffer_queue_size: 10_000,
                max_resource_threads: 200,
                max_retries: 3,
                within_time_range: Duration::from_secs(2),
                await_termination_timeout: Duration::from_secs(5),
                watchdog_enabled: false,
                watchdog_sync_time: Duration::from_secs(5),
                horizontal_pod_autoscaler_enabled: false,
                horizontal_pod_autoscaler_sync_time: Duration::from_secs(15),
                persistence_mode: false,
                persistence_driver: None,
                pod_controller: None,
                dead_letter_sink: None,
            },
        }
    }

    /// Set the system name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the number of worker threads (clamped to at least one).
    pub fn parallelism(mut self, workers: usize) -> Self {
        self.config.parallelism = workers.max(1);
        self
    }

    /// Set the group-sizing multiplier.
    pub fn parallelism_factor(mut self, factor: usize) -> Self {
        self.config.parallelism_factor = factor.max(1);
        self
    }

    /// Set the per-cell batch budget (clamped to at least one).
    pub fn throughput(mut self, budget: usize) -> Self {
        self.config.throughput = budget.max(1);
        self
    }

    /// Set the normal-lane mailbox capacity; `0` means unbounded.
    pub fn queue_size(mut self, capacity: usize) -> Self {
        self.config.queue_size = capacity;
        self
    }

    /// Set the worker scheduling-queue sizing hint.
    pub fn buffer_queue_size(mut self, capacity: usize) -> Self {
        self.config.buffer_queue_size = capacity;
        self
    }

    /// Set the resource executor's maximum thread count.
    pub fn max_resource_threads(mut self, threads: usize) -> Self {
        self.config.max_resource_threads = threads.max(1);
        self
    }

    /// Set the default restart budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the default supervision window.
    pub fn within_time_range(mut self, window: Duration) -> Self {
        self.config.within_time_range = window;
        self
    }

    /// Set the shutdown drain deadline.
    pub fn await_termination_timeout(mut self, timeout: Duration) -> Self {
        self.config.await_termination_timeout = timeout;
        self
    }

    /// Enable or disable the watchdog.
    pub fn watchdog_enabled(mut self, enabled: bool) -> Self {
        self.config.watchdog_enabled = enabled;
        self
    }

    /// Set the watchdog round period.
    pub fn watchdog_sync_time(mut self, period: Duration) -> Self {
        self.config.watchdog_sync_time = period;
        self
    }

    /// Enable or disable the pod replication controller.
    pub fn horizontal_pod_autoscaler_enabled(mut self, enabled: bool) -> Self {
        self.config.horizontal_pod_autoscaler_enabled = enabled;
        self
    }

    /// Set the pod controller round period.
    pub fn horizontal_pod_autoscaler_sync_time(mut self, period: Duration) -> Self {
        self.config.horizontal_pod_autoscaler_sync_time = period;
        self
    }

    /// Wire up a persistence driver and enable persistence mode.
    pub fn persistence_driver(mut self, driver: Arc<dyn PersistenceDriver>) -> Self {
        self.config.persistence_mode = true;
        self.config.persistence_driver = Some(driver);
        self
    }

    /// Wire up a pod controller callback.
    pub fn pod_controller(mut self, controller: Arc<dyn PodController>) -> Self {
        self.config.pod_controller = Some(controller);
        self
    }

    /// Replace the dead-letter sink.
    pub fn dead_letter_sink(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.config.dead_letter_sink = Some(sink);
        self
    }

    /// Finish the build.
    pub fn build(self) -> ActorSystemConfig {
        self.config
    }
}

impl Default for ActorSystemConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ActorSystemConfig::default();
        assert_eq!(config.parallelism, num_cpus::get());
        assert_eq!(config.throughput, 32);
        assert_eq!(config.queue_size, 50_000);
        assert_eq!(config.max_retries, 3);
        assert!(!config.watchdog_enabled);
        assert!(!config.persistence_mode);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ActorSystemConfig::builder()
            .name("test")
            .parallelism(2)
            .throughput(8)
            .queue_size(0)
            .max_retries(5)
            .within_time_range(Duration::from_millis(500))
            .watchdog_enabled(true)
            .watchdog_sync_time(Duration::from_millis(100))
            .build();
        assert_eq!(config.name, "test");
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.throughput, 8);
        assert_eq!(config.queue_size, 0);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.within_time_range, Duration::from_millis(500));
        assert!(config.watchdog_enabled);
    }

    #[test]
    fn test_clamps() {
        let config = ActorSystemConfig::builder()
            .parallelism(0)
            .throughput(0)
            .parallelism_factor(0)
            .build();
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.throughput, 1);
        assert_eq!(config.parallelism_factor, 1);
    }
}
