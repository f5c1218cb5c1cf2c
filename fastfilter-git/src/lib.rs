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

//! Fastfilter Git
//!
//! Thin wrappers around the `git` child processes a rewrite pipeline
//! needs: the exporter producing the interchange stream, the importer
//! consuming it, and a commit counter for progress reporting.

pub mod command;
pub mod count;
pub mod error;
pub mod export;
pub mod import;

pub use command::GitInvocation;
pub use count::count_commits;
pub use error::{ProcessError, Result};
pub use export::ExportSource;
pub use import::ImportSink;
