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

//! Wire serialization
//!
//! Writes elements back in the grammar they were read in. Marks written
//! here are the canonical ones: the parser already resolved every reference
//! through the registry.

use crate::elements::{Blob, Commit, Element, FileChange, Identity, RecordKind, Reset};
use crate::error::Result;
use crate::quoting::quote_path;
use std::io::Write;
use tracing::debug;

/// Write a `data <len>` header followed by the exact payload bytes
fn write_data<W: Write + ?Sized>(out: &mut W, payload: &[u8]) -> Result<()> {
    writeln!(out, "data {}", payload.len())?;
    out.write_all(payload)?;
    Ok(())
}

fn write_identity<W: Write + ?Sized>(out: &mut W, role: &str, who: &Identity) -> Result<()> {
    if who.name.is_empty() {
        writeln!(out, "{} <{}> {}", role, who.email, who.when)?;
    } else {
        writeln!(out, "{} {} <{}> {}", role, who.name, who.email, who.when)?;
    }
    Ok(())
}

impl FileChange {
    /// Write this change as an `M` or `D` line
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        match self {
            FileChange::Modify { path, mode, blob } => {
                write!(out, "M {} :{} ", mode, blob)?;
                out.write_all(&quote_path(path))?;
            }
            FileChange::Delete { path } => {
                out.write_all(b"D ")?;
                out.write_all(&quote_path(path))?;
            }
        }
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl Element for Blob {
    fn kind(&self) -> RecordKind {
        RecordKind::Blob
    }

    fn is_emitted(&self) -> bool {
        self.emitted
    }

    fn is_skipped(&self) -> bool {
        self.skipped
    }

    fn skip(&mut self) {
        self.skipped = true;
    }

    fn write_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        if self.emitted {
            debug!(mark = self.mark(), "blob already written");
            return Ok(());
        }
        self.emitted = true;

        writeln!(out, "blob")?;
        writeln!(out, "mark :{}", self.mark())?;
        write_data(out, &self.data)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl Element for Reset {
    fn kind(&self) -> RecordKind {
        RecordKind::Reset
    }

    fn is_emitted(&self) -> bool {
        self.emitted
    }

    fn is_skipped(&self) -> bool {
        self.skipped
    }

    fn skip(&mut self) {
        self.skipped = true;
    }

    fn write_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        if self.emitted {
            debug!(reference = %self.reference, "reset already written");
            return Ok(());
        }
        self.emitted = true;

        writeln!(out, "reset {}", self.reference)?;
        if let Some(from) = self.from {
            writeln!(out, "from :{}", from)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl Element for Commit {
    fn kind(&self) -> RecordKind {
        RecordKind::Commit
    }

    fn is_emitted(&self) -> bool {
        self.emitted
    }

    fn is_skipped(&self) -> bool {
        self.skipped
    }

    fn skip(&mut self) {
        self.skipped = true;
    }

    fn write_to<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        if self.emitted {
            debug!(mark = self.mark(), "commit already written");
            return Ok(());
        }
        self.emitted = true;

        writeln!(out, "commit {}", self.branch)?;
        writeln!(out, "mark :{}", self.mark())?;
        write_identity(out, "author", &self.author)?;
        write_identity(out, "committer", &self.committer)?;
        write_data(out, &self.message)?;
        // The LF after a data payload is optional; add it only when the
        // message does not already end the line
        if !self.message.ends_with(b"\n") {
            out.write_all(b"\n")?;
        }
        if let Some(from) = self.from {
            writeln!(out, "from :{}", from)?;
        }
        for merge in &self.merges {
            writeln!(out, "merge :{}", merge)?;
        }
        for change in &self.file_changes {
            change.write_to(out)?;
        }
        out.write_all(b"\n")?;
        Ok(())
    }
}
