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

//! Filter errors
//!
//! Every variant is fatal: the engine stops at the first one and hands it
//! back to the caller. Nothing is retried.

use crate::marks::Mark;
use thiserror::Error;

/// Errors raised while parsing, resolving or writing interchange records
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Unresolved reference: mark :{mark} has not been created yet (highest is {highest})")]
    UnresolvedReference { mark: Mark, highest: Mark },

    #[error("Invalid file change: {0}")]
    InvalidFileChangeSpec(String),

    #[error("No wire form for {0} elements")]
    UnimplementedSerialization(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the content of the stream rather than IO
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            FilterError::MalformedRecord { .. }
                | FilterError::UnresolvedReference { .. }
                | FilterError::InvalidFileChangeSpec(_)
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FilterError>;
