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

//! Supervision: restart windows, directives, escalation, initialization
//! failures and termination notices.

mod common;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{
    tags, ActorError, ActorId, ActorMessage, Directive, ErrorHandler, FailureKind,
    SupervisorStrategy,
};
use apiary_runtime::{Actor, ActorContext, ActorSystem};

const FAIL: i32 = 13;

struct Recording(Mutex<Vec<(FailureKind, Option<ActorId>)>>);

impl Recording {
    fn new() -> Arc<Self> {
        Arc::new(Recording(Mutex::new(Vec::new())))
    }

    fn kinds(&self) -> Vec<FailureKind> {
        self.0.lock().iter().map(|(kind, _)| *kind).collect()
    }
}

impl ErrorHandler for Recording {
    fn handle(&self, _error: &ActorError, kind: FailureKind, id: Option<ActorId>) {
        self.0.lock().push((kind, id));
    }
}

/// Fails on every message.
struct AlwaysFailing {
    instances: Arc<AtomicU32>,
}

impl AlwaysFailing {
    fn build(instances: &Arc<AtomicU32>) -> Self {
        instances.fetch_add(1, Ordering::SeqCst);
        AlwaysFailing {
            instances: Arc::clone(instances),
        }
    }
}

impl Actor for AlwaysFailing {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        let _ = &self.instances;
        Err(ActorError::Handler("always fails".into()))
    }
}

/// Watches a fixed target and counts termination notices.
struct Watcher {
    target: ActorId,
    terminated: Arc<AtomicU32>,
}

impl Actor for Watcher {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        if message.tag() == tags::TERMINATED && message.source() == Some(self.target) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn pre_start(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        ctx.watch(self.target);
        Ok(())
    }
}

#[test]
fn test_restart_budget_exhaustion_stops_child() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("restart-bound", 2)).unwrap();

    let instances = Arc::new(AtomicU32::new(0));
    let child = {
        let instances = Arc::clone(&instances);
        system
            .add_actor(move || AlwaysFailing::build(&instances))
            .unwrap()
    };
    let terminated = Arc::new(AtomicU32::new(0));
    {
        let terminated = Arc::clone(&terminated);
        system
            .add_actor(move || Watcher {
                target: child,
                terminated: Arc::clone(&terminated),
            })
            .unwrap();
    }

    for _ in 0..10 {
        system.send(ActorMessage::empty(1).with_dest(child));
    }

    assert!(common::wait_until(Duration::from_secs(5), || system
        .lifecycle_of(child)
        .is_none()));
    // Initial instance plus max_retries (3) restarts, then stop.
    assert_eq!(instances.load(Ordering::SeqCst), 4);
    assert!(common::wait_until(Duration::from_secs(2), || terminated
        .load(Ordering::SeqCst)
        == 1));
    // Exactly one notice, ever.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(terminated.load(Ordering::SeqCst), 1);

    system.shutdown(true);
}

/// Child that counts successful messages and fails on [`FAIL`].
struct Flaky {
    count: u64,
    instances: Arc<AtomicU32>,
    observed: Arc<AtomicU64>,
}

impl Flaky {
    fn build(instances: &Arc<AtomicU32>, observed: &Arc<AtomicU64>) -> Self {
        instances.fetch_add(1, Ordering::SeqCst);
        Flaky {
            count: 0,
            instances: Arc::clone(instances),
            observed: Arc::clone(observed),
        }
    }
}

impl Actor for Flaky {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        let _ = &self.instances;
        if message.tag() == FAIL {
            return Err(ActorError::Handler("flaky".into()));
        }
        self.count += 1;
        self.observed.store(self.count, Ordering::SeqCst);
        Ok(())
    }
}

/// Parent applying a fixed directive to failing children, spawning one
/// [`Flaky`] child in `pre_start`.
struct FixedDirectiveParent {
    directive: Directive,
    child_instances: Arc<AtomicU32>,
    child_observed: Arc<AtomicU64>,
    child_id: Arc<Mutex<Option<ActorId>>>,
}

impl Actor for FixedDirectiveParent {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn pre_start(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        let child_instances = Arc::clone(&self.child_instances);
        let child_observed = Arc::clone(&self.child_observed);
        let child = ctx.add_child(move || Flaky::build(&child_instances, &child_observed))?;
        *self.child_id.lock() = Some(child);
        Ok(())
    }

    fn supervisor_strategy(&self) -> Option<SupervisorStrategy> {
        let directive = self.directive;
        Some(
            SupervisorStrategy::new(3, Duration::from_secs(5))
                .with_decider(move |_| directive),
        )
    }
}

fn spawn_parent(
    system: &ActorSystem,
    directive: Directive,
) -> (
    Arc<AtomicU32>,
    Arc<AtomicU32>,
    Arc<AtomicU64>,
    Arc<Mutex<Option<ActorId>>>,
) {
    let instances = Arc::new(AtomicU32::new(0));
    let child_instances = Arc::new(AtomicU32::new(0));
    let child_observed = Arc::new(AtomicU64::new(0));
    let child_id = Arc::new(Mutex::new(None));
    {
        let instances = Arc::clone(&instances);
        let child_instances = Arc::clone(&child_instances);
        let child_observed = Arc::clone(&child_observed);
        let child_id = Arc::clone(&child_id);
        system
            .add_actor(move || {
                instances.fetch_add(1, Ordering::SeqCst);
                FixedDirectiveParent {
                    directive,
                    child_instances: Arc::clone(&child_instances),
                    child_observed: Arc::clone(&child_observed),
                    child_id: Arc::clone(&child_id),
                }
            })
            .unwrap();
    }
    (instances, child_instances, child_observed, child_id)
}

fn child_of(child_id: &Arc<Mutex<Option<ActorId>>>) -> ActorId {
    child_id.lock().expect("child spawned")
}

#[test]
fn test_resume_keeps_state() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("resume", 2)).unwrap();
    let (_parents, child_instances, observed, child_id) = spawn_parent(&system, Directive::Resume);

    assert!(common::wait_until(Duration::from_secs(5), || child_id
        .lock()
        .is_some()));
    let child = child_of(&child_id);

    system.send(ActorMessage::empty(1).with_dest(child));
    system.send(ActorMessage::empty(FAIL).with_dest(child));
    system.send(ActorMessage::empty(2).with_dest(child));

    // The offending message is dropped, the instance and its counter
    // survive.
    assert!(common::wait_until(Duration::from_secs(5), || observed
        .load(Ordering::SeqCst)
        == 2));
    assert_eq!(child_instances.load(Ordering::SeqCst), 1);

    system.shutdown(true);
}

#[test]
fn test_restart_rebuilds_state_and_keeps_mailbox() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("restart", 2)).unwrap();
    let (_parents, child_instances, observed, child_id) = spawn_parent(&system, Directive::Restart);

    assert!(common::wait_until(Duration::from_secs(5), || child_id
        .lock()
        .is_some()));
    let child = child_of(&child_id);

    // Failure first, then queued messages the fresh instance must see.
    system.send(ActorMessage::empty(FAIL).with_dest(child));
    for tag in 1..=3 {
        system.send(ActorMessage::empty(tag).with_dest(child));
    }

    assert!(common::wait_until(Duration::from_secs(5), || observed
        .load(Ordering::SeqCst)
        == 3));
    assert_eq!(child_instances.load(Ordering::SeqCst), 2);
    assert!(system.lifecycle_of(child).is_some());

    system.shutdown(true);
}

#[test]
fn test_stop_directive_terminates_child() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("stop-directive", 2)).unwrap();
    let (_parents, child_instances, _observed, child_id) = spawn_parent(&system, Directive::Stop);

    assert!(common::wait_until(Duration::from_secs(5), || child_id
        .lock()
        .is_some()));
    let child = child_of(&child_id);

    system.send(ActorMessage::empty(FAIL).with_dest(child));

    assert!(common::wait_until(Duration::from_secs(5), || system
        .lifecycle_of(child)
        .is_none()));
    assert_eq!(child_instances.load(Ordering::SeqCst), 1);

    system.shutdown(true);
}

#[test]
fn test_escalate_restarts_parent() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("escalate", 2)).unwrap();
    let (parent_instances, child_instances, _observed, child_id) =
        spawn_parent(&system, Directive::Escalate);

    assert!(common::wait_until(Duration::from_secs(5), || child_id
        .lock()
        .is_some()));
    let child = child_of(&child_id);

    system.send(ActorMessage::empty(FAIL).with_dest(child));

    // The fault travels up: the guardian restarts the parent, which stops
    // the old child and spawns a fresh one.
    assert!(common::wait_until(Duration::from_secs(5), || {
        parent_instances.load(Ordering::SeqCst) == 2
            && child_instances.load(Ordering::SeqCst) == 2
    }));

    system.shutdown(true);
}

struct BrokenInit;

impl Actor for BrokenInit {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn pre_start(&mut self, _ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        Err(ActorError::Handler("broken init".into()))
    }
}

#[test]
fn test_pre_start_failure_reports_initialization() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("broken-init", 2)).unwrap();
    let recording = Recording::new();
    system.set_error_handler(Arc::clone(&recording) as Arc<dyn ErrorHandler>);

    let actor = system.add_actor(|| BrokenInit).unwrap();

    assert!(common::wait_until(Duration::from_secs(5), || system
        .lifecycle_of(actor)
        .is_none()));
    assert!(common::wait_until(Duration::from_secs(2), || recording
        .kinds()
        .contains(&FailureKind::Initialization)));

    system.shutdown(true);
}

#[test]
fn test_handler_panic_is_supervised_like_an_error() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("panic", 2)).unwrap();

    struct Panicking {
        observed: Arc<AtomicU64>,
    }

    impl Actor for Panicking {
        fn receive(
            &mut self,
            _ctx: &mut ActorContext<'_, Self>,
            message: &ActorMessage,
        ) -> Result<(), ActorError> {
            if message.tag() == FAIL {
                panic!("handler blew up");
            }
            self.observed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let instances = Arc::new(AtomicU32::new(0));
    let observed = Arc::new(AtomicU64::new(0));
    let actor = {
        let instances = Arc::clone(&instances);
        let observed = Arc::clone(&observed);
        system
            .add_actor(move || {
                instances.fetch_add(1, Ordering::SeqCst);
                Panicking {
                    observed: Arc::clone(&observed),
                }
            })
            .unwrap()
    };

    system.send(ActorMessage::empty(FAIL).with_dest(actor));
    system.send(ActorMessage::empty(1).with_dest(actor));

    // One restart, then the queued message is processed by the new
    // instance.
    assert!(common::wait_until(Duration::from_secs(5), || observed
        .load(Ordering::SeqCst)
        == 1));
    assert_eq!(instances.load(Ordering::SeqCst), 2);

    system.shutdown(true);
}
