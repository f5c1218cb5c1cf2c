// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Mark Registry
//!
//! Allocates the marks that blobs and commits are written out with, and
//! remembers which mark a source stream used for each of them so that later
//! `from`, `merge` and file-change references can be rewritten.
//!
//! One registry lives for a whole run. Separate runs get separate registries
//! unless a caller deliberately hands one over (see
//! [`FastExportFilter::into_registry`](crate::filter::FastExportFilter::into_registry)).

use crate::error::{FilterError, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Stream-local object identifier, written as `:<n>`
pub type Mark = u64;

/// How strictly references are checked before they are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkValidation {
    /// Any mark up to the highest allocated one resolves
    #[default]
    Bounded,
    /// Additionally, a reference must name a mark some earlier record declared
    Declared,
}

/// Sequential mark allocator plus old -> new rename table
#[derive(Debug, Default)]
pub struct MarkRegistry {
    /// Highest mark handed out so far
    count: Mark,
    /// Source mark -> canonical mark, only for marks that changed
    translation: HashMap<Mark, Mark>,
    /// Source marks seen in `mark` lines (only tracked in `Declared` mode)
    declared: HashSet<Mark>,
    validation: MarkValidation,
}

impl MarkRegistry {
    /// Create a registry with bound-only validation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given validation mode
    pub fn with_validation(validation: MarkValidation) -> Self {
        Self {
            validation,
            ..Self::default()
        }
    }

    pub fn validation(&self) -> MarkValidation {
        self.validation
    }

    /// Hand out the next mark, starting at 1
    pub fn allocate(&mut self) -> Mark {
        self.count += 1;
        self.count
    }

    /// Highest mark allocated so far (0 before the first allocation)
    pub fn highest(&self) -> Mark {
        self.count
    }

    /// Number of recorded renames
    pub fn rename_count(&self) -> usize {
        self.translation.len()
    }

    /// Record that references to `old` should be written as `new`.
    ///
    /// Both marks must be within the allocated range. Recording a mark onto
    /// itself stores nothing but still counts as a declaration.
    pub fn record_rename(&mut self, old: Mark, new: Mark) -> Result<()> {
        self.check_bound(old)?;
        self.check_bound(new)?;
        if self.validation == MarkValidation::Declared {
            self.declared.insert(old);
        }
        if old != new {
            self.translation.insert(old, new);
        }
        Ok(())
    }

    /// Resolve a source mark to the mark it should be written as
    pub fn translate(&self, old: Mark) -> Result<Mark> {
        self.check_bound(old)?;
        if self.validation == MarkValidation::Declared && !self.declared.contains(&old) {
            return Err(self.unresolved(old));
        }
        Ok(self.translation.get(&old).copied().unwrap_or(old))
    }

    fn check_bound(&self, mark: Mark) -> Result<()> {
        if mark == 0 || mark > self.count {
            return Err(self.unresolved(mark));
        }
        Ok(())
    }

    fn unresolved(&self, mark: Mark) -> FilterError {
        FilterError::UnresolvedReference {
            mark,
            highest: self.count,
        }
    }
}
