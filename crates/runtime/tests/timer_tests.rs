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

//! Timer service: one-shot delivery, fixed-rate repetition, cancellation
//! and alias destinations.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{ActorError, ActorMessage};
use apiary_runtime::{Actor, ActorContext, ActorSystem};

struct Counter {
    fired: Arc<AtomicU32>,
}

impl Actor for Counter {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        if message.tag() == 1 {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn spawn_counter(system: &ActorSystem) -> (apiary_core::ActorId, Arc<AtomicU32>) {
    let fired = Arc::new(AtomicU32::new(0));
    let id = {
        let fired = Arc::clone(&fired);
        system
            .add_actor(move || Counter {
                fired: Arc::clone(&fired),
            })
            .unwrap()
    };
    (id, fired)
}

#[test]
fn test_schedule_once_fires_once_after_delay() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("timer-once", 2)).unwrap();
    let (actor, fired) = spawn_counter(&system);

    system
        .schedule_once(ActorMessage::empty(1), actor, Duration::from_millis(100))
        .unwrap();

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), 0, "fired before its delay");
    assert!(common::wait_until(Duration::from_secs(2), || fired
        .load(Ordering::SeqCst)
        == 1));
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(fired.load(Ordering::SeqCst), 1, "one-shot fired again");

    system.shutdown(true);
}

#[test]
fn test_fixed_rate_repeats_until_cancelled() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("timer-rate", 2)).unwrap();
    let (actor, fired) = spawn_counter(&system);

    let handle = system
        .schedule_at_fixed_rate(
            ActorMessage::empty(1),
            actor,
            Duration::from_millis(20),
            Duration::from_millis(20),
        )
        .unwrap();

    assert!(common::wait_until(Duration::from_secs(2), || fired
        .load(Ordering::SeqCst)
        >= 3));
    handle.cancel();
    let settled = fired.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(200));
    // At most one in-flight fire races the cancellation.
    assert!(fired.load(Ordering::SeqCst) <= settled + 1);

    system.shutdown(true);
}

#[test]
fn test_schedule_via_alias_resolves_at_fire_time() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("timer-alias", 2)).unwrap();
    let (actor, fired) = spawn_counter(&system);
    system.set_alias(actor, "clock-target");

    system
        .schedule_once_via_alias(
            ActorMessage::empty(1),
            "clock-target",
            Duration::from_millis(50),
        )
        .unwrap();

    assert!(common::wait_until(Duration::from_secs(2), || fired
        .load(Ordering::SeqCst)
        == 1));

    system.shutdown(true);
}

#[test]
fn test_cancel_before_fire_suppresses_delivery() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("timer-cancel", 2)).unwrap();
    let (actor, fired) = spawn_counter(&system);

    let handle = system
        .schedule_once(ActorMessage::empty(1), actor, Duration::from_millis(100))
        .unwrap();
    handle.cancel();
    assert!(handle.is_cancelled());

    std::thread::sleep(Duration::from_millis(250));
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    system.shutdown(true);
}

struct SelfScheduler {
    fired: Arc<AtomicU32>,
}

impl Actor for SelfScheduler {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        if message.tag() == 2 {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn pre_start(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        ctx.schedule_once(
            ActorMessage::empty(2),
            ctx.self_id(),
            Duration::from_millis(30),
        )
        .map_err(|error| ActorError::handler(error))?;
        Ok(())
    }
}

#[test]
fn test_actor_can_schedule_to_itself() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("timer-self", 2)).unwrap();

    let fired = Arc::new(AtomicU32::new(0));
    {
        let fired = Arc::clone(&fired);
        system
            .add_actor(move || SelfScheduler {
                fired: Arc::clone(&fired),
            })
            .unwrap();
    }

    assert!(common::wait_until(Duration::from_secs(2), || fired
        .load(Ordering::SeqCst)
        == 1));

    system.shutdown(true);
}
