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

//! Stream Parser
//!
//! Single-pass reader over the interchange stream with one line of
//! lookahead. Each call to [`StreamParser::next_record`] consumes exactly
//! one top-level record and returns it as an owned [`Record`].
//!
//! ## Grammar
//!
//! ```text
//! blob                              reset <ref>              commit <ref>
//! mark :<id>?                       from :<id>?              mark :<id>?
//! data <n>                          LF?                      author <name> <<email>> <when>?
//! <n raw bytes> LF?                                          committer <name> <<email>> <when>
//! LF?                                                        data <n>
//!                                                            <n raw bytes> LF?
//!                                                            from :<id>?
//!                                                            merge :<id>*
//!                                                            (M <mode> :<id> <path> | D <path>)*
//!                                                            LF?
//! ```
//!
//! Every `:<id>` reference is resolved through the [`MarkRegistry`] while
//! parsing, so elements only ever hold canonical marks.

use crate::elements::{Blob, Commit, FileChange, Identity, Record, Reset};
use crate::error::{FilterError, Result};
use crate::marks::{Mark, MarkRegistry};
use crate::quoting::unquote_path;
use std::io::{BufRead, Read};
use tracing::debug;

/// Longest slice of an offending line quoted back in error messages
const MAX_QUOTED_LINE: usize = 80;

/// Pull-based record reader
pub struct StreamParser<R> {
    input: R,
    /// Lookahead line, including its trailing LF
    line: Vec<u8>,
    /// 1-based number of the lookahead line
    line_no: usize,
    primed: bool,
    eof: bool,
}

impl<R: BufRead> StreamParser<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: Vec::new(),
            line_no: 0,
            primed: false,
            eof: false,
        }
    }

    /// Line number of the lookahead line
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    /// Parse the next record, or return `None` once the input is exhausted
    pub fn next_record(&mut self, marks: &mut MarkRegistry) -> Result<Option<Record>> {
        if !self.primed {
            self.primed = true;
            self.advance()?;
        }
        if self.eof {
            return Ok(None);
        }

        let line = self.current();
        let record = if line == b"blob" {
            self.parse_blob(marks)?
        } else if line.starts_with(b"reset ") {
            self.parse_reset(marks)?
        } else if line.starts_with(b"commit ") {
            self.parse_commit(marks)?
        } else {
            return Err(self.malformed(format!(
                "unrecognized record: '{}'",
                self.quoted_line()
            )));
        };
        Ok(Some(record))
    }

    fn parse_blob(&mut self, marks: &mut MarkRegistry) -> Result<Record> {
        self.advance()?;
        let original = self.parse_optional_mark()?;
        let data = self.parse_data()?;
        self.skip_blank_line()?;

        let mut blob = Blob::new(marks, data);
        if let Some(original) = original {
            marks.record_rename(original, blob.mark())?;
            blob.set_original_mark(original);
        }
        debug!(mark = blob.mark(), ?original, size = blob.len(), "parsed blob");
        Ok(Record::Blob(blob))
    }

    fn parse_reset(&mut self, marks: &mut MarkRegistry) -> Result<Record> {
        let reference = self.parse_ref_line("reset")?;
        let from = self.parse_optional_reference("from", marks)?;
        self.skip_blank_line()?;

        debug!(%reference, ?from, "parsed reset");
        Ok(Record::Reset(Reset::new(reference, from)))
    }

    fn parse_commit(&mut self, marks: &mut MarkRegistry) -> Result<Record> {
        let branch = self.parse_ref_line("commit")?;
        let original = self.parse_optional_mark()?;

        let author = if self.current().starts_with(b"author ") {
            Some(self.parse_identity("author")?)
        } else {
            None
        };
        let committer = self.parse_identity("committer")?;
        let message = self.parse_data()?;

        let from = self.parse_optional_reference("from", marks)?;
        let mut merges = Vec::new();
        while let Some(merge) = self.parse_optional_reference("merge", marks)? {
            merges.push(merge);
        }
        let mut file_changes = Vec::new();
        while let Some(change) = self.parse_file_change(marks)? {
            file_changes.push(change);
        }
        self.skip_blank_line()?;

        let mut commit = Commit::new(marks, branch, author, committer, message)
            .with_from(from)
            .with_merges(merges)
            .with_file_changes(file_changes);
        if let Some(original) = original {
            marks.record_rename(original, commit.mark())?;
            commit.set_original_mark(original);
        }
        debug!(
            mark = commit.mark(),
            ?original,
            branch = %commit.branch,
            changes = commit.file_changes.len(),
            "parsed commit"
        );
        Ok(Record::Commit(commit))
    }

    /// `<keyword> <ref>`, required
    fn parse_ref_line(&mut self, keyword: &str) -> Result<String> {
        let line = self.current_str(keyword)?;
        let reference = line
            .strip_prefix(keyword)
            .and_then(|rest| rest.strip_prefix(' '))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| self.malformed(format!("malformed {} line: '{}'", keyword, line)))?
            .to_string();
        self.advance()?;
        Ok(reference)
    }

    /// `mark :<id>`, optional
    fn parse_optional_mark(&mut self) -> Result<Option<Mark>> {
        let Some(rest) = self.current().strip_prefix(b"mark ") else {
            return Ok(None);
        };
        let mark = parse_mark_token(rest).ok_or_else(|| {
            self.malformed(format!("malformed mark line: '{}'", self.quoted_line()))
        })?;
        self.advance()?;
        Ok(Some(mark))
    }

    /// `<keyword> :<id>`, optional, resolved through the registry
    fn parse_optional_reference(
        &mut self,
        keyword: &str,
        marks: &MarkRegistry,
    ) -> Result<Option<Mark>> {
        let Some(rest) = self
            .current()
            .strip_prefix(keyword.as_bytes())
            .and_then(|rest| rest.strip_prefix(b" "))
        else {
            return Ok(None);
        };
        let mark = parse_mark_token(rest).ok_or_else(|| {
            self.malformed(format!(
                "{} must reference a mark: '{}'",
                keyword,
                self.quoted_line()
            ))
        })?;
        let resolved = marks.translate(mark)?;
        self.advance()?;
        Ok(Some(resolved))
    }

    /// `<role> <name> <<email>> <when>`, required
    fn parse_identity(&mut self, role: &str) -> Result<Identity> {
        let line = self.current_str(role)?;
        let identity = line
            .strip_prefix(role)
            .and_then(|rest| rest.strip_prefix(' '))
            .and_then(split_identity)
            .ok_or_else(|| self.malformed(format!("expected {} line, got '{}'", role, line)))?;
        self.advance()?;
        Ok(identity)
    }

    /// `data <n>` followed by exactly `n` raw bytes and an optional LF
    fn parse_data(&mut self) -> Result<Vec<u8>> {
        let size = self
            .current()
            .strip_prefix(b"data ")
            .and_then(parse_decimal)
            .ok_or_else(|| {
                if self.eof {
                    self.malformed("unexpected end of stream, expected data block")
                } else {
                    self.malformed(format!("malformed data line: '{}'", self.quoted_line()))
                }
            })?;

        let size = usize::try_from(size)
            .map_err(|_| self.malformed(format!("data block too large: {} bytes", size)))?;
        let mut payload = Vec::with_capacity(size.min(1 << 20));
        (&mut self.input)
            .take(size as u64)
            .read_to_end(&mut payload)?;
        if payload.len() != size {
            return Err(self.malformed(format!(
                "data block truncated: expected {} bytes, got {}",
                size,
                payload.len()
            )));
        }

        let mut newlines = payload.iter().filter(|&&b| b == b'\n').count();
        if self.input.fill_buf()?.first() == Some(&b'\n') {
            self.input.consume(1);
            newlines += 1;
        }
        self.line_no += newlines;
        self.advance()?;
        Ok(payload)
    }

    /// `M <mode> :<id> <path>` or `D <path>`, optional
    fn parse_file_change(&mut self, marks: &MarkRegistry) -> Result<Option<FileChange>> {
        let line = self.current();
        let change = if let Some(rest) = line.strip_prefix(b"M ") {
            let invalid = || {
                FilterError::InvalidFileChangeSpec(String::from_utf8_lossy(line).into_owned())
            };
            let (mode, rest) = split_at_space(rest).ok_or_else(invalid)?;
            let (dataref, path) = split_at_space(rest).ok_or_else(invalid)?;
            if mode.is_empty() || !mode.iter().all(|b| (b'0'..=b'7').contains(b)) {
                return Err(invalid());
            }
            let blob = parse_mark_token(dataref).ok_or_else(invalid)?;
            let blob = marks.translate(blob)?;
            let path = self.decode_path(path)?;
            FileChange::modify(path, String::from_utf8_lossy(mode), blob)?
        } else if let Some(path) = line.strip_prefix(b"D ") {
            FileChange::delete(self.decode_path(path)?)
        } else {
            return Ok(None);
        };
        self.advance()?;
        Ok(Some(change))
    }

    fn decode_path(&self, raw: &[u8]) -> Result<Vec<u8>> {
        if raw.is_empty() {
            return Err(self.malformed("file change without a path"));
        }
        unquote_path(raw).map_err(|reason| self.malformed(reason))
    }

    fn skip_blank_line(&mut self) -> Result<()> {
        if !self.eof && self.current().is_empty() {
            self.advance()?;
        }
        Ok(())
    }

    /// Load the next line into the lookahead slot
    fn advance(&mut self) -> Result<()> {
        self.line.clear();
        if self.input.read_until(b'\n', &mut self.line)? == 0 {
            self.eof = true;
        } else {
            self.line_no += 1;
        }
        Ok(())
    }

    /// Lookahead line without its LF; empty at end of stream
    fn current(&self) -> &[u8] {
        self.line.strip_suffix(b"\n").unwrap_or(&self.line)
    }

    fn current_str(&self, expected: &str) -> Result<&str> {
        if self.eof {
            return Err(self.malformed(format!(
                "unexpected end of stream, expected {} line",
                expected
            )));
        }
        std::str::from_utf8(self.current())
            .map_err(|_| self.malformed(format!("{} line is not valid UTF-8", expected)))
    }

    fn quoted_line(&self) -> String {
        let line = String::from_utf8_lossy(self.current());
        if line.chars().count() > MAX_QUOTED_LINE {
            let cut: String = line.chars().take(MAX_QUOTED_LINE).collect();
            format!("{}...", cut)
        } else {
            line.into_owned()
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> FilterError {
        FilterError::malformed(self.line_no, reason)
    }
}

/// Parse `:<digits>`
fn parse_mark_token(token: &[u8]) -> Option<Mark> {
    token.strip_prefix(b":").and_then(parse_decimal)
}

fn parse_decimal(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn split_at_space(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = bytes.iter().position(|&b| b == b' ')?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

/// Split `<name> <<email>> <when>`; the name may be empty
fn split_identity(rest: &str) -> Option<Identity> {
    let lt = rest.find('<')?;
    let gt = lt + rest[lt..].find("> ")?;
    let name = &rest[..lt];
    let name = name.strip_suffix(' ').unwrap_or(name);
    Some(Identity::new(name, &rest[lt + 1..gt], &rest[gt + 2..]))
}
