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

//! Filter Engine
//!
//! The read -> parse -> dispatch -> write loop. Records are processed one at
//! a time and strictly in input order: a record is fully written before the
//! next one is read, so every mark is defined in the output before anything
//! refers to it. Records a context handler queues are written just before
//! the record it was handling.

use crate::elements::{Commit, Record, RecordKind};
use crate::error::Result;
use crate::handlers::{FilterContext, Handlers};
use crate::marks::MarkRegistry;
use crate::parser::StreamParser;
use std::io::{BufRead, BufWriter, Write};
use tracing::{debug, info, warn};

/// Counters for one filter run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub blobs: u64,
    pub resets: u64,
    pub commits: u64,
    /// Elements a handler dropped
    pub skipped: u64,
}

impl FilterStats {
    fn count(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Blob => self.blobs += 1,
            RecordKind::Reset => self.resets += 1,
            RecordKind::Commit => self.commits += 1,
        }
    }

    /// Total records read
    pub fn records(&self) -> u64 {
        self.blobs + self.resets + self.commits
    }
}

/// Streaming history filter
///
/// Owns the mark registry for its run. To feed several input streams into
/// one output with a single mark space, recover the registry with
/// [`into_registry`](Self::into_registry) and hand it to the next filter
/// with [`with_registry`](Self::with_registry).
pub struct FastExportFilter<'a> {
    handlers: Handlers<'a>,
    marks: MarkRegistry,
}

impl<'a> FastExportFilter<'a> {
    /// Create a filter with a fresh registry
    pub fn new(handlers: Handlers<'a>) -> Self {
        Self::with_registry(handlers, MarkRegistry::new())
    }

    /// Create a filter that continues an existing mark space
    pub fn with_registry(handlers: Handlers<'a>, marks: MarkRegistry) -> Self {
        Self { handlers, marks }
    }

    pub fn registry(&self) -> &MarkRegistry {
        &self.marks
    }

    pub fn registry_mut(&mut self) -> &mut MarkRegistry {
        &mut self.marks
    }

    pub fn into_registry(self) -> MarkRegistry {
        self.marks
    }

    /// Filter `input` into `output` until the input is exhausted.
    ///
    /// Stops at the first error. Whatever was written before the error
    /// stays written.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: W) -> Result<FilterStats> {
        let mut parser = StreamParser::new(input);
        let mut out = BufWriter::new(output);
        let mut stats = FilterStats::default();

        while let Some(mut record) = parser.next_record(&mut self.marks)? {
            stats.count(record.kind());
            self.handlers.dispatch(&mut record);

            let mut ctx = FilterContext::new(&mut self.marks);
            self.handlers.dispatch_in_context(&mut record, &mut ctx)?;
            for mut queued in ctx.into_pending() {
                debug!(kind = %queued.kind(), "writing queued element");
                queued.write_to(&mut out)?;
            }

            if record.is_skipped() {
                stats.skipped += 1;
                self.redirect_references(&record)?;
                debug!(kind = %record.kind(), "skipped element");
                continue;
            }
            record.write_to(&mut out)?;
        }
        out.flush()?;

        info!(
            blobs = stats.blobs,
            commits = stats.commits,
            resets = stats.resets,
            skipped = stats.skipped,
            highest_mark = self.marks.highest(),
            "filter run complete"
        );
        Ok(stats)
    }

    /// Point later references to a skipped element where its handler asked
    fn redirect_references(&mut self, record: &Record) -> Result<()> {
        match record {
            Record::Blob(blob) => match (blob.original_mark(), blob.redirect()) {
                (Some(original), Some(target)) => self.marks.record_rename(original, target),
                _ => Ok(()),
            },
            Record::Reset(_) => Ok(()),
            Record::Commit(commit) => self.reattach_children(commit),
        }
    }

    /// Point later references to a dropped commit at its redirect target,
    /// or failing that at its first parent
    fn reattach_children(&mut self, commit: &Commit) -> Result<()> {
        let Some(original) = commit.original_mark() else {
            return Ok(());
        };
        match commit.redirect().or(commit.from) {
            Some(parent) => self.marks.record_rename(original, parent),
            None => {
                warn!(
                    mark = original,
                    branch = %commit.branch,
                    "skipped a root commit; later references to it cannot be resolved \
                     by the importer"
                );
                Ok(())
            }
        }
    }
}
