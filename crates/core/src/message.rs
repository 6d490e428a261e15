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

//! Actor messages
//!
//! ## Purpose
//! The single message type exchanged between actors. Messages are immutable
//! once sent: the two shallow-copy operations produce re-addressed copies
//! that share the payload, tag, interaction id and routing strings.
//!
//! ## Payload
//! The payload is type-erased behind an `Arc`, so copies are cheap and a
//! message can fan out to several destinations without cloning user data.
//! Receivers downcast with [`ActorMessage::value_as`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ActorId;

/// Type-erased, shareable message payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// An immutable message between actors.
///
/// ## Fields
/// - `value`: opaque payload (may be absent for pure-signal messages)
/// - `tag`: signed discriminator; user tags are non-negative, see
///   [`crate::tags`]
/// - `source` / `dest`: identities, either may be absent
/// - `interaction`: correlation id for request/reply
/// - `protocol` / `domain`: short strings for user-level routing
#[derive(Clone)]
pub struct ActorMessage {
    value: Option<Payload>,
    tag: i32,
    source: Option<ActorId>,
    dest: Option<ActorId>,
    interaction: Option<ActorId>,
    protocol: Option<String>,
    domain: Option<String>,
}

impl ActorMessage {
    /// Create a message carrying `value` under `tag`.
    pub fn new<T: Any + Send + Sync>(value: T, tag: i32) -> Self {
        ActorMessage {
            value: Some(Arc::new(value)),
            tag,
            source: None,
            dest: None,
            interaction: None,
            protocol: None,
            domain: None,
        }
    }

    /// Create a payload-less message under `tag`.
    pub fn empty(tag: i32) -> Self {
        ActorMessage {
            value: None,
            tag,
            source: None,
            dest: None,
            interaction: None,
            protocol: None,
            domain: None,
        }
    }

    /// Set the sender identity.
    pub fn with_source(mut self, source: ActorId) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the destination identity.
    pub fn with_dest(mut self, dest: ActorId) -> Self {
        self.dest = Some(dest);
        self
    }

    /// Set the interaction (correlation) id for request/reply.
    pub fn with_interaction(mut self, interaction: ActorId) -> Self {
        self.interaction = Some(interaction);
        self
    }

    /// Set the protocol routing string.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the domain routing string.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// The raw payload, if any.
    pub fn value(&self) -> Option<&Payload> {
        self.value.as_ref()
    }

    /// Downcast the payload to a concrete type.
    ///
    /// ## Returns
    /// `Some(&T)` when a payload is present and is a `T`, `None` otherwise.
    pub fn value_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// The message tag.
    pub fn tag(&self) -> i32 {
        self.tag
    }

    /// The sender identity, if known.
    pub fn source(&self) -> Option<ActorId> {
        self.source
    }

    /// The destination identity, if resolved.
    pub fn dest(&self) -> Option<ActorId> {
        self.dest
    }

    /// The interaction (correlation) id, if any.
    pub fn interaction(&self) -> Option<ActorId> {
        self.interaction
    }

    /// The protocol routing string, if any.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// The domain routing string, if any.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Re-addressed copy with a new source and destination.
    ///
    /// Payload, tag, interaction, protocol and domain are preserved.
    pub fn shallow_copy(&self, source: ActorId, dest: ActorId) -> Self {
        let mut copy = self.clone();
        copy.source = Some(source);
        copy.dest = Some(dest);
        copy
    }

    /// Re-addressed copy with a new destination, keeping the original
    /// source (the forwarding primitive).
    pub fn shallow_copy_to(&self, dest: ActorId) -> Self {
        let mut copy = self.clone();
        copy.dest = Some(dest);
        copy
    }

    /// Fill in `source` when the message does not carry one yet.
    ///
    /// Used on the send path so a handler's reply can still name the
    /// original sender explicitly.
    pub fn ensure_source(mut self, source: ActorId) -> Self {
        if self.source.is_none() {
            self.source = Some(source);
        }
        self
    }
}

impl fmt::Debug for ActorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorMessage")
            .field("tag", &self.tag)
            .field("source", &self.source)
            .field("dest", &self.dest)
            .field("interaction", &self.interaction)
            .field("protocol", &self.protocol)
            .field("domain", &self.domain)
            .field("has_value", &self.value.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_downcast() {
        let msg = ActorMessage::new(42u64, 7);
        assert_eq!(msg.value_as::<u64>(), Some(&42));
        assert_eq!(msg.value_as::<String>(), None);
        assert!(ActorMessage::empty(7).value().is_none());
    }

    #[test]
    fn test_shallow_copy_rewrites_addresses_only() {
        let a = ActorId::generate();
        let b = ActorId::generate();
        let c = ActorId::generate();
        let interaction = ActorId::generate();

        let msg = ActorMessage::new("payload", 3)
            .with_source(a)
            .with_dest(b)
            .with_interaction(interaction)
            .with_protocol("req")
            .with_domain("orders");

        let copy = msg.shallow_copy(b, c);
        assert_eq!(copy.source(), Some(b));
        assert_eq!(copy.dest(), Some(c));
        assert_eq!(copy.tag(), 3);
        assert_eq!(copy.interaction(), Some(interaction));
        assert_eq!(copy.protocol(), Some("req"));
        assert_eq!(copy.domain(), Some("orders"));
        assert_eq!(copy.value_as::<&str>(), Some(&"payload"));
    }

    #[test]
    fn test_forward_copy_keeps_source() {
        let a = ActorId::generate();
        let b = ActorId::generate();
        let c = ActorId::generate();

        let msg = ActorMessage::new(1u8, 0).with_source(a).with_dest(b);
        let fwd = msg.shallow_copy_to(c);
        assert_eq!(fwd.source(), Some(a));
        assert_eq!(fwd.dest(), Some(c));
    }

    #[test]
    fn test_ensure_source_does_not_overwrite() {
        let a = ActorId::generate();
        let b = ActorId::generate();
        let msg = ActorMessage::empty(0).with_source(a).ensure_source(b);
        assert_eq!(msg.source(), Some(a));
        let msg = ActorMessage::empty(0).ensure_source(b);
        assert_eq!(msg.source(), Some(b));
    }
}
