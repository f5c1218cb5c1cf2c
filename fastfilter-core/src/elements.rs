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

//! Stream Elements
//!
//! The three record kinds of the interchange stream (blob, reset, commit)
//! plus the file changes a commit carries. Each element is built from one
//! parsed record, handed to the handlers, written once and dropped.

use crate::error::{FilterError, Result};
use crate::marks::{Mark, MarkRegistry};
use std::fmt;
use std::io::Write;

/// Top-level record kinds the stream parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Blob,
    Reset,
    Commit,
}

impl RecordKind {
    /// Keyword that introduces this record on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Blob => "blob",
            RecordKind::Reset => "reset",
            RecordKind::Commit => "commit",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by every element that can be written to the stream
pub trait Element {
    fn kind(&self) -> RecordKind;

    /// Whether this element has already been written
    fn is_emitted(&self) -> bool;

    /// Whether a handler asked for this element to be dropped
    fn is_skipped(&self) -> bool;

    /// Keep this element out of the filter's own output.
    ///
    /// The element can still be written explicitly, e.g. after a handler
    /// held it back to emit it elsewhere in the stream.
    fn skip(&mut self);

    /// Write the element in wire form. Writing twice is a no-op.
    fn write_to<W: Write + ?Sized>(&mut self, _out: &mut W) -> Result<()> {
        Err(FilterError::UnimplementedSerialization(
            std::any::type_name::<Self>(),
        ))
    }
}

/// Blob - raw file content with its own mark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    mark: Mark,
    original_mark: Option<Mark>,
    /// File content, may be binary
    pub data: Vec<u8>,
    pub(crate) emitted: bool,
    pub(crate) skipped: bool,
    redirect: Option<Mark>,
}

impl Blob {
    /// Create a blob, allocating a fresh mark for it
    pub fn new(marks: &mut MarkRegistry, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mark: marks.allocate(),
            original_mark: None,
            data: data.into(),
            emitted: false,
            skipped: false,
            redirect: None,
        }
    }

    /// Mark this blob is written with
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Mark the source stream declared for this blob, if any
    pub fn original_mark(&self) -> Option<Mark> {
        self.original_mark
    }

    pub(crate) fn set_original_mark(&mut self, mark: Mark) {
        self.original_mark = Some(mark);
    }

    /// Skip this blob and send later references to it to `mark` instead
    pub fn skip_to(&mut self, mark: Mark) {
        self.skipped = true;
        self.redirect = Some(mark);
    }

    /// Where references to a skipped blob end up
    pub fn redirect(&self) -> Option<Mark> {
        self.redirect
    }

    /// Try to get content as UTF-8 text
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reset - point a ref at a commit (or start it from scratch)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reset {
    /// Full ref name, e.g. `refs/heads/main`
    pub reference: String,
    /// Commit the ref should point at, already resolved
    pub from: Option<Mark>,
    pub(crate) emitted: bool,
    pub(crate) skipped: bool,
}

impl Reset {
    pub fn new(reference: impl Into<String>, from: Option<Mark>) -> Self {
        Self {
            reference: reference.into(),
            from,
            emitted: false,
            skipped: false,
        }
    }
}

/// A single path operation inside a commit.
///
/// File changes are only ever written as part of their commit, so the
/// commit's one-shot flag covers them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// Add or modify `path` with the content of blob `blob`
    Modify {
        path: Vec<u8>,
        mode: String,
        blob: Mark,
    },
    /// Remove `path`
    Delete { path: Vec<u8> },
}

impl FileChange {
    /// Build a modify entry; both mode and blob mark are required
    pub fn modify(path: impl Into<Vec<u8>>, mode: impl Into<String>, blob: Mark) -> Result<Self> {
        let path = path.into();
        let mode = mode.into();
        if mode.is_empty() || blob == 0 {
            return Err(FilterError::InvalidFileChangeSpec(format!(
                "file mode and blob mark needed for {}",
                String::from_utf8_lossy(&path)
            )));
        }
        Ok(FileChange::Modify { path, mode, blob })
    }

    pub fn delete(path: impl Into<Vec<u8>>) -> Self {
        FileChange::Delete { path: path.into() }
    }

    /// Raw path bytes
    pub fn path(&self) -> &[u8] {
        match self {
            FileChange::Modify { path, .. } | FileChange::Delete { path } => path,
        }
    }

    /// Path for display, with invalid UTF-8 replaced
    pub fn path_lossy(&self) -> String {
        String::from_utf8_lossy(self.path()).into_owned()
    }

    /// Blob referenced by a modify entry
    pub fn blob(&self) -> Option<Mark> {
        match self {
            FileChange::Modify { blob, .. } => Some(*blob),
            FileChange::Delete { .. } => None,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, FileChange::Delete { .. })
    }
}

/// Author or committer: name, email and the raw date string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    /// Kept exactly as read, e.g. `1112911993 -0700`
    pub when: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when: when.into(),
        }
    }
}

/// Commit - a new revision on a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    mark: Mark,
    original_mark: Option<Mark>,
    /// Ref the commit lands on
    pub branch: String,
    pub author: Identity,
    pub committer: Identity,
    /// Commit message bytes, written with an exact length header
    pub message: Vec<u8>,
    /// Path operations, in stream order
    pub file_changes: Vec<FileChange>,
    /// First parent
    pub from: Option<Mark>,
    /// Additional parents, in stream order
    pub merges: Vec<Mark>,
    pub(crate) emitted: bool,
    pub(crate) skipped: bool,
    redirect: Option<Mark>,
}

impl Commit {
    /// Create a commit, allocating a fresh mark for it.
    ///
    /// Without an explicit author the committer is used for both.
    pub fn new(
        marks: &mut MarkRegistry,
        branch: impl Into<String>,
        author: Option<Identity>,
        committer: Identity,
        message: impl Into<Vec<u8>>,
    ) -> Self {
        let author = author.unwrap_or_else(|| committer.clone());
        Self {
            mark: marks.allocate(),
            original_mark: None,
            branch: branch.into(),
            author,
            committer,
            message: message.into(),
            file_changes: Vec::new(),
            from: None,
            merges: Vec::new(),
            emitted: false,
            skipped: false,
            redirect: None,
        }
    }

    pub fn with_from(mut self, from: Option<Mark>) -> Self {
        self.from = from;
        self
    }

    pub fn with_merges(mut self, merges: Vec<Mark>) -> Self {
        self.merges = merges;
        self
    }

    pub fn with_file_changes(mut self, file_changes: Vec<FileChange>) -> Self {
        self.file_changes = file_changes;
        self
    }

    /// Mark this commit is written with
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Mark the source stream declared for this commit, if any
    pub fn original_mark(&self) -> Option<Mark> {
        self.original_mark
    }

    pub(crate) fn set_original_mark(&mut self, mark: Mark) {
        self.original_mark = Some(mark);
    }

    /// Skip this commit and send later references to it to `mark`.
    ///
    /// A plain [`skip`](Element::skip) sends them to the first parent.
    /// Passing the commit's own mark holds it back: references stay valid
    /// as long as the caller writes the commit later on.
    pub fn skip_to(&mut self, mark: Mark) {
        self.skipped = true;
        self.redirect = Some(mark);
    }

    /// Where references to a skipped commit end up, when set explicitly
    pub fn redirect(&self) -> Option<Mark> {
        self.redirect
    }

    /// Message as text, if it is valid UTF-8
    pub fn message_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.message).ok()
    }

    pub fn is_merge(&self) -> bool {
        !self.merges.is_empty()
    }

    /// All parents, first parent first
    pub fn parents(&self) -> impl Iterator<Item = Mark> + '_ {
        self.from.into_iter().chain(self.merges.iter().copied())
    }
}

/// An owned, freshly parsed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Blob(Blob),
    Reset(Reset),
    Commit(Commit),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Blob(_) => RecordKind::Blob,
            Record::Reset(_) => RecordKind::Reset,
            Record::Commit(_) => RecordKind::Commit,
        }
    }

    pub fn as_element_mut(&mut self) -> ElementMut<'_> {
        match self {
            Record::Blob(blob) => ElementMut::Blob(blob),
            Record::Reset(reset) => ElementMut::Reset(reset),
            Record::Commit(commit) => ElementMut::Commit(commit),
        }
    }

    pub fn is_skipped(&self) -> bool {
        match self {
            Record::Blob(blob) => blob.is_skipped(),
            Record::Reset(reset) => reset.is_skipped(),
            Record::Commit(commit) => commit.is_skipped(),
        }
    }

    pub fn write_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        match self {
            Record::Blob(blob) => blob.write_to(out),
            Record::Reset(reset) => reset.write_to(out),
            Record::Commit(commit) => commit.write_to(out),
        }
    }
}

impl From<Blob> for Record {
    fn from(blob: Blob) -> Self {
        Record::Blob(blob)
    }
}

impl From<Reset> for Record {
    fn from(reset: Reset) -> Self {
        Record::Reset(reset)
    }
}

impl From<Commit> for Record {
    fn from(commit: Commit) -> Self {
        Record::Commit(commit)
    }
}

/// Mutable view of any element, handed to the universal handler
#[derive(Debug)]
pub enum ElementMut<'a> {
    Blob(&'a mut Blob),
    Reset(&'a mut Reset),
    Commit(&'a mut Commit),
}

impl ElementMut<'_> {
    pub fn kind(&self) -> RecordKind {
        match self {
            ElementMut::Blob(_) => RecordKind::Blob,
            ElementMut::Reset(_) => RecordKind::Reset,
            ElementMut::Commit(_) => RecordKind::Commit,
        }
    }

    /// Mark of a blob or commit; resets have none
    pub fn mark(&self) -> Option<Mark> {
        match self {
            ElementMut::Blob(blob) => Some(blob.mark()),
            ElementMut::Reset(_) => None,
            ElementMut::Commit(commit) => Some(commit.mark()),
        }
    }

    pub fn skip(&mut self) {
        match self {
            ElementMut::Blob(blob) => blob.skip(),
            ElementMut::Reset(reset) => reset.skip(),
            ElementMut::Commit(commit) => commit.skip(),
        }
    }
}
