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

//! The actor registry
//!
//! ## Purpose
//! Maps identities to live cells, alias strings to identity sets, path
//! strings to identities, and identities to pseudo-cells. Reads are
//! lock-free; writes take short per-shard sections.
//!
//! ## Visibility contract
//! Registration updates the parent's child set and the path bindings
//! before the cell becomes visible in the identity map. Unregistration
//! removes alias and path bindings before releasing the cell.

use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use apiary_core::{ActorId, SystemError};

use crate::cell::AnyCell;
use crate::pseudo::PseudoCell;

pub(crate) struct Registry {
    cells: DashMap<ActorId, Arc<dyn AnyCell>>,
    aliases: DashMap<String, BTreeSet<ActorId>>,
    aliases_of: DashMap<ActorId, HashSet<String>>,
    paths: DashMap<String, ActorId>,
    paths_of: DashMap<ActorId, String>,
    pseudo: DashMap<ActorId, Arc<PseudoCell>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            cells: DashMap::new(),
            aliases: DashMap::new(),
            aliases_of: DashMap::new(),
            paths: DashMap::new(),
            paths_of: DashMap::new(),
            pseudo: DashMap::new(),
        }
    }

    /// Register `cell` under its parent. The parent's child set and the
    /// path bindings are updated first; the cell is visible to identity
    /// lookups only afterwards.
    pub(crate) fn register(
        &self,
        parent: Option<&Arc<dyn AnyCell>>,
        cell: Arc<dyn AnyCell>,
    ) -> Result<(), SystemError> {
        let id = cell.id();
        let segment = match cell.name() {
            Some(name) => name.to_string(),
            None => id.to_string(),
        };
        let path = match parent {
            Some(parent_cell) => {
                let parent_path = self
                    .paths_of
                    .get(&parent_cell.id())
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| {
                        SystemError::Registration(format!(
                            "parent {} has no path binding",
                            parent_cell.id()
                        ))
                    })?;
                parent_cell.add_child_id(id);
                format!("{}/{}", parent_path.trim_end_matches('/'), segment)
            }
            None => "/".to_string(),
        };

        if self.paths.contains_key(&path) {
            if let Some(parent_cell) = parent {
                parent_cell.remove_child_id(id);
            }
            return Err(SystemError::Registration(format!(
                "path {path} is already bound"
            )));
        }
        self.paths.insert(path.clone(), id);
        self.paths_of.insert(id, path);
        self.cells.insert(id, cell);
        Ok(())
    }

    /// Remove every binding of `id`, detach it from its parent, then
    /// release the cell.
    pub(crate) fn unregister(&self, id: ActorId) {
        if let Some((_, names)) = self.aliases_of.remove(&id) {
            for alias in names {
                if let Some(mut bound) = self.aliases.get_mut(&alias) {
                    bound.remove(&id);
                    if bound.is_empty() {
                        drop(bound);
                        self.aliases.remove_if(&alias, |_, bound| bound.is_empty());
                    }
                }
            }
        }
        if let Some((_, path)) = self.paths_of.remove(&id) {
            self.paths.remove(&path);
        }
        let parent = self.cells.get(&id).and_then(|cell| cell.parent());
        if let Some(parent_cell) = parent.and_then(|p| self.cell(p)) {
            parent_cell.remove_child_id(id);
        }
        self.cells.remove(&id);
    }

    pub(crate) fn cell(&self, id: ActorId) -> Option<Arc<dyn AnyCell>> {
        self.cells.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn contains(&self, id: ActorId) -> bool {
        self.cells.contains_key(&id) || self.pseudo.contains_key(&id)
    }

    pub(crate) fn count(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn set_alias(&self, id: ActorId, alias: &str) {
        self.aliases
            .entry(alias.to_string())
            .or_default()
            .insert(id);
        self.aliases_of
            .entry(id)
            .or_default()
            .insert(alias.to_string());
    }

    pub(crate) fn unset_alias(&self, id: ActorId, alias: &str) {
        if let Some(mut bound) = self.aliases.get_mut(alias) {
            bound.remove(&id);
        }
        if let Some(mut names) = self.aliases_of.get_mut(&id) {
            names.remove(alias);
        }
    }

    /// Resolve an alias. With several actors bound, the choice is
    /// arbitrary but deterministic for equal set contents: the smallest
    /// identity wins.
    pub(crate) fn lookup_alias(&self, alias: &str) -> Option<ActorId> {
        self.aliases
            .get(alias)
            .and_then(|bound| bound.iter().next().copied())
    }

    pub(crate) fn lookup_path(&self, path: &str) -> Option<ActorId> {
        self.paths.get(path).map(|entry| *entry.value())
    }

    pub(crate) fn path_of(&self, id: ActorId) -> Option<String> {
        self.paths_of.get(&id).map(|entry| entry.value().clone())
    }

    pub(crate) fn register_pseudo(&self, pseudo: Arc<PseudoCell>) {
        self.pseudo.insert(pseudo.id(), pseudo);
    }

    pub(crate) fn unregister_pseudo(&self, id: ActorId) {
        self.pseudo.remove(&id);
    }

    pub(crate) fn pseudo(&self, id: ActorId) -> Option<Arc<PseudoCell>> {
        self.pseudo.get(&id).map(|entry| Arc::clone(entry.value()))
    }
}
