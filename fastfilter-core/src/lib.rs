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

//! Fastfilter Core
//!
//! Streaming rewriter for git fast-export/fast-import interchange streams.
//!
//! Records are parsed one at a time into typed elements ([`Blob`],
//! [`Reset`], [`Commit`]), passed to caller-supplied [`Handlers`], and
//! written back out. A [`MarkRegistry`] renumbers marks as elements are
//! created so output marks are dense and always defined before use.
//!
//! ```rust,ignore
//! use fastfilter_core::{Commit, FastExportFilter, Handlers};
//!
//! let handlers = Handlers::new().on_commit(|commit: &mut Commit| {
//!     if commit.branch == "refs/heads/master" {
//!         commit.branch = "refs/heads/slave".to_string();
//!     }
//! });
//! let stats = FastExportFilter::new(handlers).run(std::io::stdin().lock(), std::io::stdout())?;
//! ```

pub mod config;
pub mod elements;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod marks;
pub mod parser;
pub mod quoting;
pub mod rules;
mod serialize;

pub use config::{BranchRename, FilterConfig, IdentityRewrite, PathFilter, Replacement};
pub use elements::{
    Blob, Commit, Element, ElementMut, FileChange, Identity, Record, RecordKind, Reset,
};
pub use error::{FilterError, Result};
pub use filter::{FastExportFilter, FilterStats};
pub use handlers::{
    BlobHandler, CommitHandler, ContextHandler, ElementHandler, FilterContext, Handlers,
    ResetHandler,
};
pub use marks::{Mark, MarkRegistry, MarkValidation};
pub use parser::StreamParser;
pub use rules::RewriteRules;
