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

//! Lifecycle: stop cascades, behavior switching, paths, aliases and
//! system shutdown.

mod common;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use apiary_core::{ActorError, ActorMessage};
use apiary_runtime::{Actor, ActorContext, ActorSystem};

/// Spawns `width` children, each of which spawns one grandchild; every
/// node logs its `post_stop`.
struct TreeNode {
    label: String,
    depth: usize,
    width: usize,
    stopped: Arc<Mutex<Vec<String>>>,
}

impl Actor for TreeNode {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn pre_start(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        if self.depth > 0 {
            for index in 0..self.width {
                let label = format!("{}/{}", self.label, index);
                let stopped = Arc::clone(&self.stopped);
                let depth = self.depth - 1;
                let width = self.width;
                ctx.add_child(move || TreeNode {
                    label: label.clone(),
                    depth,
                    width,
                    stopped: Arc::clone(&stopped),
                })?;
            }
        }
        Ok(())
    }

    fn post_stop(&mut self, _ctx: &mut ActorContext<'_, Self>) -> Result<(), ActorError> {
        self.stopped.lock().push(self.label.clone());
        Ok(())
    }
}

#[test]
fn test_stop_cascade_reaches_every_descendant_once() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("cascade", 2)).unwrap();

    let stopped = Arc::new(Mutex::new(Vec::new()));
    let root = {
        let stopped = Arc::clone(&stopped);
        system
            .add_actor(move || TreeNode {
                label: "root".into(),
                depth: 2,
                width: 2,
                stopped: Arc::clone(&stopped),
            })
            .unwrap()
    };

    // root + 2 children + 4 grandchildren
    assert!(common::wait_until(Duration::from_secs(5), || system
        .cell_count()
        >= 3 + 7));

    system.stop_actor(root);

    assert!(common::wait_until(Duration::from_secs(5), || stopped
        .lock()
        .len()
        == 7));
    assert!(system.lifecycle_of(root).is_none());

    let log = stopped.lock().clone();
    // Each node exactly once, the subtree root last.
    let mut unique = log.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 7);
    assert_eq!(log.last().map(String::as_str), Some("root"));
    // No ancestor finalizes before any of its descendants.
    for (index, label) in log.iter().enumerate() {
        for earlier in &log[..index] {
            assert!(
                !label.starts_with(&format!("{earlier}/")),
                "ancestor {earlier} stopped before its descendant {label}"
            );
        }
    }

    system.shutdown(true);
}

const SWAP: i32 = 1;
const BACK: i32 = 2;
const RESET: i32 = 3;

struct Switcher {
    log: Arc<Mutex<Vec<(&'static str, i32)>>>,
}

impl Actor for Switcher {
    fn receive(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        message: &ActorMessage,
    ) -> Result<(), ActorError> {
        self.log.lock().push(("base", message.tag()));
        if message.tag() == SWAP {
            ctx.r#become(
                |actor, ctx, message| {
                    actor.log.lock().push(("alt", message.tag()));
                    match message.tag() {
                        SWAP => {
                            // Push a second override on top.
                            ctx.r#become(
                                |actor, ctx, message| {
                                    actor.log.lock().push(("top", message.tag()));
                                    if message.tag() == RESET {
                                        ctx.unbecome_all();
                                    }
                                    Ok(())
                                },
                                false,
                            );
                        }
                        BACK => ctx.unbecome(),
                        _ => {}
                    }
                    Ok(())
                },
                false,
            );
        }
        Ok(())
    }
}

#[test]
fn test_become_unbecome_returns_to_prior_behavior() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("become", 2)).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let actor = {
        let log = Arc::clone(&log);
        system
            .add_actor(move || Switcher {
                log: Arc::clone(&log),
            })
            .unwrap()
    };

    for tag in [7, SWAP, 8, BACK, 9] {
        system.send(ActorMessage::empty(tag).with_dest(actor));
    }

    assert!(common::wait_until(Duration::from_secs(5), || log.lock().len() == 5));
    assert_eq!(
        log.lock().clone(),
        vec![
            ("base", 7),
            ("base", SWAP),
            ("alt", 8),
            ("alt", BACK),
            ("base", 9),
        ]
    );

    system.shutdown(true);
}

#[test]
fn test_unbecome_all_reveals_original_behavior() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("become-all", 2)).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let actor = {
        let log = Arc::clone(&log);
        system
            .add_actor(move || Switcher {
                log: Arc::clone(&log),
            })
            .unwrap()
    };

    // base -> alt -> top, then collapse straight back to base.
    for tag in [SWAP, SWAP, 8, RESET, 9] {
        system.send(ActorMessage::empty(tag).with_dest(actor));
    }

    assert!(common::wait_until(Duration::from_secs(5), || log.lock().len() == 5));
    assert_eq!(
        log.lock().clone(),
        vec![
            ("base", SWAP),
            ("alt", SWAP),
            ("top", 8),
            ("top", RESET),
            ("base", 9),
        ]
    );

    system.shutdown(true);
}

struct Named {
    name: &'static str,
}

impl Actor for Named {
    fn receive(
        &mut self,
        _ctx: &mut ActorContext<'_, Self>,
        _message: &ActorMessage,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn name(&self) -> Option<String> {
        Some(self.name.to_string())
    }
}

#[test]
fn test_paths_follow_the_tree() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("paths", 2)).unwrap();

    let alpha = system.add_actor(|| Named { name: "alpha" }).unwrap();
    assert_eq!(system.path_of(alpha).as_deref(), Some("/user/alpha"));
    assert_eq!(system.get_actor_from_path("/user/alpha"), Some(alpha));
    assert_eq!(system.get_actor_from_path("/user/beta"), None);
    assert!(system.get_actor_from_path("/user").is_some());
    assert!(system.get_actor_from_path("/").is_some());

    // Names must be unique among siblings.
    assert!(system.add_actor(|| Named { name: "alpha" }).is_err());

    system.stop_actor(alpha);
    assert!(common::wait_until(Duration::from_secs(5), || system
        .get_actor_from_path("/user/alpha")
        .is_none()));

    system.shutdown(true);
}

#[test]
fn test_alias_resolution_is_deterministic() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("aliases", 2)).unwrap();

    let a = system.add_actor(|| Named { name: "a" }).unwrap();
    let b = system.add_actor(|| Named { name: "b" }).unwrap();
    system.set_alias(a, "service");
    system.set_alias(b, "service");

    // Arbitrary but deterministic: the smallest identity wins, however
    // the bindings were inserted.
    let expected = a.min(b);
    for _ in 0..10 {
        assert_eq!(system.get_actor_from_alias("service"), Some(expected));
    }

    system.unset_alias(expected, "service");
    assert_eq!(system.get_actor_from_alias("service"), Some(a.max(b)));

    system.shutdown(true);
}

#[test]
fn test_shutdown_drains_the_tree() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("shutdown", 2)).unwrap();

    for _ in 0..5 {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        system
            .add_actor(move || TreeNode {
                label: "n".into(),
                depth: 0,
                width: 0,
                stopped: Arc::clone(&stopped),
            })
            .unwrap();
    }
    assert!(system.cell_count() >= 8);

    system.shutdown(true);
    assert_eq!(system.cell_count(), 0);
}

#[test]
fn test_system_actors_register_under_system_guardian() {
    common::init_logging();
    let system = ActorSystem::new(common::test_config("system-actors", 2)).unwrap();

    // Two siblings with the same name collide on the path; the bulk
    // registration rolls back the instance that made it in first.
    assert!(system.add_system_actor(|| Named { name: "svc" }, 2).is_err());
    assert!(common::wait_until(Duration::from_secs(5), || system
        .get_actor_from_path("/system/svc")
        .is_none()));

    let ids = system
        .add_system_actor(|| TreeNode {
            label: "svc".into(),
            depth: 0,
            width: 0,
            stopped: Arc::new(Mutex::new(Vec::new())),
        }, 3)
        .unwrap();
    assert_eq!(ids.len(), 3);
    for id in &ids {
        let path = system.path_of(*id).unwrap();
        assert!(path.starts_with("/system/"), "unexpected path {path}");
    }

    system.shutdown(true);
}
