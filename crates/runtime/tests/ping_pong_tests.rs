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

//! Two actors exchanging messages until a round budget is spent, then a
//! clean stop; plus request/reply correlation through `ask`.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{ActorError, ActorId, ActorMessage};
use apiary_runtime::{Actor, ActorContext, ActorSystem};

const PING: i32 = 1;
const PONG: i32 = 2;

struct Ping {
    rounds: Arc<AtomicU64>,
    limit: u64,
}

impl Actor for Ping {
    fn receive(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        if message.tag() == PING {
            let seen = self.rounds.fetch_add(1, Ordering::SeqCst) + 1;
            if seen < self.limit {
                ctx.send_via_alias(ActorMessage::empty(PONG), "pong");
            }
        }
        Ok(())
    }
}

struct Pong {
    replies: Arc<AtomicU64>,
}

impl Actor for Pong {
    fn receive(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        if message.tag() == PONG {
            self.replies.fetch_add(1, Ordering::SeqCst);
            if let Some(sender) = message.source() {
                ctx.tell((), PING, sender);
            }
        }
        Ok(())
    }
}

#[test]
fn test_ping_pong_rounds_then_stop() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("ping-pong", 2)).unwrap();

    let rounds = Arc::new(AtomicU64::new(0));
    let replies = Arc::new(AtomicU64::new(0));
    let limit = 100;

    let ping = {
        let rounds = Arc::clone(&rounds);
        system
            .add_actor(move || Ping {
                rounds: Arc::clone(&rounds),
                limit,
            })
            .unwrap()
    };
    let pong = {
        let replies = Arc::clone(&replies);
        system
            .add_actor(move || Pong {
                replies: Arc::clone(&replies),
            })
            .unwrap()
    };
    system.set_alias(pong, "pong");

    system.send(ActorMessage::empty(PING).with_dest(ping));

    assert!(
        common::wait_until(Duration::from_secs(5), || rounds.load(Ordering::SeqCst)
            == limit),
        "expected {} rounds, saw {}",
        limit,
        rounds.load(Ordering::SeqCst)
    );
    assert_eq!(replies.load(Ordering::SeqCst), limit - 1);

    system.stop_actor(ping);
    system.stop_actor(pong);
    assert!(common::wait_until(Duration::from_secs(5), || {
        system.lifecycle_of(ping).is_none() && system.lifecycle_of(pong).is_none()
    }));
    assert_eq!(rounds.load(Ordering::SeqCst), limit);

    system.shutdown(true);
}

struct Echo;

impl Actor for Echo {
    fn receive(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        if let Some(sender) = message.source() {
            // Shallow copy back: payload, tag, interaction, protocol and
            // domain all survive the turnaround.
            ctx.send(message.shallow_copy(ctx.self_id(), sender));
        }
        Ok(())
    }
}

#[test]
fn test_ask_round_trip_preserves_interaction() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("ask", 2)).unwrap();
    let echo = system.add_actor(|| Echo).unwrap();

    let interaction = ActorId::generate();
    let reply = system
        .ask(
            ActorMessage::new(41u32, 7)
                .with_dest(echo)
                .with_interaction(interaction)
                .with_protocol("req")
                .with_domain("math"),
            Duration::from_secs(2),
        )
        .unwrap();

    assert_eq!(reply.tag(), 7);
    assert_eq!(reply.interaction(), Some(interaction));
    assert_eq!(reply.protocol(), Some("req"));
    assert_eq!(reply.domain(), Some("math"));
    assert_eq!(reply.value_as::<u32>(), Some(&41));
    assert_eq!(reply.source(), Some(echo));

    system.shutdown(true);
}
