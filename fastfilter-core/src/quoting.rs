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

//! Path quoting for file-change lines
//!
//! A path that starts with `"` is a quoted string with backslash escapes.
//! Decoding handles `\"` and `\\` plus the C-style escapes git emits for
//! control characters and octal bytes.
//!
//! Encoding follows git fast-export: bytes outside printable ASCII are
//! written as `\ooo`, and a path containing a space is wrapped in quotes
//! even when nothing in it needs escaping.

/// Decode a path token, unquoting it if it is wrapped in double quotes.
///
/// Returns an error message when a quoted path is not terminated or ends
/// in a dangling escape.
pub fn unquote_path(raw: &[u8]) -> Result<Vec<u8>, String> {
    if raw.first() != Some(&b'"') {
        return Ok(raw.to_vec());
    }
    if raw.len() < 2 || raw.last() != Some(&b'"') {
        return Err(format!(
            "unterminated quoted path: {}",
            String::from_utf8_lossy(raw)
        ));
    }

    let inner = &raw[1..raw.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        let b = inner[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        let Some(&esc) = inner.get(i + 1) else {
            return Err("quoted path ends in a backslash".to_string());
        };
        i += 2;
        let decoded = match esc {
            b'"' => b'"',
            b'\\' => b'\\',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'0'..=b'3' => {
                let digits = inner.get(i..i + 2).unwrap_or_default();
                if digits.len() == 2 && digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                    i += 2;
                    ((esc - b'0') << 6) | ((digits[0] - b'0') << 3) | (digits[1] - b'0')
                } else {
                    out.push(b'\\');
                    esc
                }
            }
            other => {
                // Unknown escapes are kept verbatim
                out.push(b'\\');
                other
            }
        };
        out.push(decoded);
    }
    Ok(out)
}

fn needs_escape(b: u8) -> bool {
    b == b'"' || b == b'\\' || b < 0x20 || b >= 0x7f
}

/// Whether a path has to be written in quoted form
pub fn needs_quoting(path: &[u8]) -> bool {
    path.iter().any(|&b| b == b' ' || needs_escape(b))
}

/// Encode a path for a file-change line, quoting only when required
pub fn quote_path(path: &[u8]) -> Vec<u8> {
    if !needs_quoting(path) {
        return path.to_vec();
    }
    let mut out = Vec::with_capacity(path.len() + 2);
    out.push(b'"');
    for &b in path {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x07 => out.extend_from_slice(b"\\a"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0b => out.extend_from_slice(b"\\v"),
            b if needs_escape(b) => {
                out.extend_from_slice(format!("\\{:03o}", b).as_bytes());
            }
            b => out.push(b),
        }
    }
    out.push(b'"');
    out
}
