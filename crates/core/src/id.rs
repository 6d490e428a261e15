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

//! Actor identities
//!
//! ## Purpose
//! Every actor is addressed by an opaque 128-bit identity that is unique
//! within the process, cheap to hash and cheap to compare. Identities are
//! also used as interaction (correlation) ids for request/reply.

use std::fmt;
use uuid::Uuid;

/// Opaque, process-unique identity of an actor (or pseudo-actor).
///
/// ## Usage
/// Identities are handed out by the system when an actor is registered and
/// are the only way to address a destination. They are `Copy` and order
/// totally, so they can be used as map keys and for deterministic
/// tie-breaking (e.g. alias resolution).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        ActorId(Uuid::new_v4())
    }

    /// Construct an identity from a raw 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        ActorId(Uuid::from_u128(value))
    }

    /// The raw 128-bit value of this identity.
    pub const fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}
