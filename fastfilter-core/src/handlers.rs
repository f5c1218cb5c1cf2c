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

//! Element Handlers
//!
//! Caller-supplied logic run on every parsed element before it is written.
//! There is one optional handler per record kind plus one optional
//! universal handler. For each element the kind-specific handler runs
//! first, then the universal one, both on the calling thread.
//!
//! A context handler runs last. Besides the element it gets a
//! [`FilterContext`], through which it can rename marks in the running
//! registry and write held-back records ahead of the current one. This is
//! what splicing several exports into one history needs.
//!
//! Closures with the matching signature implement the handler traits; the
//! `on_*` builders take them directly:
//!
//! ```rust,ignore
//! let handlers = Handlers::new()
//!     .on_commit(|commit: &mut Commit| {
//!         if commit.branch == "refs/heads/master" {
//!             commit.branch = "refs/heads/slave".to_string();
//!         }
//!     })
//!     .on_every(|kind, _element| {
//!         tracing::debug!(%kind, "seen");
//!     });
//! ```

use crate::elements::{Blob, Commit, ElementMut, Record, RecordKind, Reset};
use crate::error::Result;
use crate::marks::{Mark, MarkRegistry};

/// Runs on every blob
pub trait BlobHandler {
    fn handle_blob(&mut self, blob: &mut Blob);
}

/// Runs on every reset
pub trait ResetHandler {
    fn handle_reset(&mut self, reset: &mut Reset);
}

/// Runs on every commit
pub trait CommitHandler {
    fn handle_commit(&mut self, commit: &mut Commit);
}

/// Runs on every element, after the kind-specific handler
pub trait ElementHandler {
    fn handle_element(&mut self, kind: RecordKind, element: ElementMut<'_>);
}

/// Runs on every element, last, with access to the running filter
pub trait ContextHandler {
    fn handle_in_context(
        &mut self,
        kind: RecordKind,
        element: ElementMut<'_>,
        ctx: &mut FilterContext<'_>,
    ) -> Result<()>;
}

/// What a context handler may change beyond its element
#[derive(Debug)]
pub struct FilterContext<'r> {
    marks: &'r mut MarkRegistry,
    pending: Vec<Record>,
}

impl<'r> FilterContext<'r> {
    pub fn new(marks: &'r mut MarkRegistry) -> Self {
        Self {
            marks,
            pending: Vec::new(),
        }
    }

    pub fn registry(&self) -> &MarkRegistry {
        &*self.marks
    }

    /// Send later references to source mark `old` to canonical mark `new`
    pub fn record_rename(&mut self, old: Mark, new: Mark) -> Result<()> {
        self.marks.record_rename(old, new)
    }

    /// Queue `record` to be written before the element being handled.
    ///
    /// Queued records are written even when skipped; ones already written
    /// are left out.
    pub fn emit_before(&mut self, record: impl Into<Record>) {
        self.pending.push(record.into());
    }

    /// Records queued so far, in queue order
    pub fn into_pending(self) -> Vec<Record> {
        self.pending
    }
}

impl<F: FnMut(&mut Blob)> BlobHandler for F {
    fn handle_blob(&mut self, blob: &mut Blob) {
        self(blob)
    }
}

impl<F: FnMut(&mut Reset)> ResetHandler for F {
    fn handle_reset(&mut self, reset: &mut Reset) {
        self(reset)
    }
}

impl<F: FnMut(&mut Commit)> CommitHandler for F {
    fn handle_commit(&mut self, commit: &mut Commit) {
        self(commit)
    }
}

impl<F: FnMut(RecordKind, ElementMut<'_>)> ElementHandler for F {
    fn handle_element(&mut self, kind: RecordKind, element: ElementMut<'_>) {
        self(kind, element)
    }
}

impl<F> ContextHandler for F
where
    F: FnMut(RecordKind, ElementMut<'_>, &mut FilterContext<'_>) -> Result<()>,
{
    fn handle_in_context(
        &mut self,
        kind: RecordKind,
        element: ElementMut<'_>,
        ctx: &mut FilterContext<'_>,
    ) -> Result<()> {
        self(kind, element, ctx)
    }
}

/// The set of handlers a filter run dispatches to
#[derive(Default)]
pub struct Handlers<'a> {
    blob: Option<Box<dyn BlobHandler + 'a>>,
    reset: Option<Box<dyn ResetHandler + 'a>>,
    commit: Option<Box<dyn CommitHandler + 'a>>,
    every: Option<Box<dyn ElementHandler + 'a>>,
    context: Option<Box<dyn ContextHandler + 'a>>,
}

impl<'a> Handlers<'a> {
    /// No handlers: every element passes through unchanged
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_blob<F>(self, handler: F) -> Self
    where
        F: FnMut(&mut Blob) + 'a,
    {
        self.blob_handler(handler)
    }

    pub fn on_reset<F>(self, handler: F) -> Self
    where
        F: FnMut(&mut Reset) + 'a,
    {
        self.reset_handler(handler)
    }

    pub fn on_commit<F>(self, handler: F) -> Self
    where
        F: FnMut(&mut Commit) + 'a,
    {
        self.commit_handler(handler)
    }

    pub fn on_every<F>(self, handler: F) -> Self
    where
        F: FnMut(RecordKind, ElementMut<'_>) + 'a,
    {
        self.element_handler(handler)
    }

    pub fn on_context<F>(self, handler: F) -> Self
    where
        F: FnMut(RecordKind, ElementMut<'_>, &mut FilterContext<'_>) -> Result<()> + 'a,
    {
        self.context_handler(handler)
    }

    pub fn blob_handler(mut self, handler: impl BlobHandler + 'a) -> Self {
        self.blob = Some(Box::new(handler));
        self
    }

    pub fn reset_handler(mut self, handler: impl ResetHandler + 'a) -> Self {
        self.reset = Some(Box::new(handler));
        self
    }

    pub fn commit_handler(mut self, handler: impl CommitHandler + 'a) -> Self {
        self.commit = Some(Box::new(handler));
        self
    }

    pub fn element_handler(mut self, handler: impl ElementHandler + 'a) -> Self {
        self.every = Some(Box::new(handler));
        self
    }

    pub fn context_handler(mut self, handler: impl ContextHandler + 'a) -> Self {
        self.context = Some(Box::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_none()
            && self.reset.is_none()
            && self.commit.is_none()
            && self.every.is_none()
            && self.context.is_none()
    }

    /// Run the matching handler, then the universal one, on `record`
    pub fn dispatch(&mut self, record: &mut Record) {
        match record {
            Record::Blob(blob) => {
                if let Some(handler) = self.blob.as_mut() {
                    handler.handle_blob(blob);
                }
            }
            Record::Reset(reset) => {
                if let Some(handler) = self.reset.as_mut() {
                    handler.handle_reset(reset);
                }
            }
            Record::Commit(commit) => {
                if let Some(handler) = self.commit.as_mut() {
                    handler.handle_commit(commit);
                }
            }
        }
        if let Some(handler) = self.every.as_mut() {
            let kind = record.kind();
            handler.handle_element(kind, record.as_element_mut());
        }
    }

    /// Run the context handler, if any, on `record`
    pub fn dispatch_in_context(
        &mut self,
        record: &mut Record,
        ctx: &mut FilterContext<'_>,
    ) -> Result<()> {
        match self.context.as_mut() {
            Some(handler) => {
                let kind = record.kind();
                handler.handle_in_context(kind, record.as_element_mut(), ctx)
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Handlers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("blob", &self.blob.is_some())
            .field("reset", &self.reset.is_some())
            .field("commit", &self.commit.is_some())
            .field("every", &self.every.is_some())
            .field("context", &self.context.is_some())
            .finish()
    }
}
