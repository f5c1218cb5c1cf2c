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

//! Configuration for filter runs
//!
//! A TOML document describing which rewrites to apply. Every section is
//! optional; an empty document filters nothing.
//!
//! ```toml
//! validation = "declared"
//! strip_keywords = true
//! drop_blob_contents = ["The launch code is 1-2-3-4."]
//!
//! [drop_paths]
//! suffixes = [".doc"]
//!
//! [[branch_renames]]
//! from = "refs/heads/master"
//! to = "refs/heads/slave"
//!
//! [[identities]]
//! old_name = "Copy N. Paste"
//! new_name = "Ima L. Oser"
//! new_email = "aloser@my.corp"
//!
//! [[email_replacements]]
//! pattern = "@my\\.crp$"
//! replacement = "@my.corp"
//! ```

use crate::error::{FilterError, Result};
use crate::marks::MarkValidation;
use serde::Deserialize;
use std::path::Path;

/// Top-level filter configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// How strictly mark references are checked
    pub validation: MarkValidation,
    /// Exact ref renames for commits and resets
    pub branch_renames: Vec<BranchRename>,
    /// File changes to remove from every commit
    pub drop_paths: PathFilter,
    /// Blobs with exactly this content are dropped
    pub drop_blob_contents: Vec<String>,
    /// Author/committer rewrites
    pub identities: Vec<IdentityRewrite>,
    /// Regex replacements applied to author and committer emails
    pub email_replacements: Vec<Replacement>,
    /// Regex replacements applied to commit messages
    pub message_replacements: Vec<Replacement>,
    /// Collapse `$Keyword: ... $` to `$Keyword$` in blob contents
    pub strip_keywords: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchRename {
    pub from: String,
    pub to: String,
}

/// Paths are matched as raw bytes against each prefix and suffix
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathFilter {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
}

impl PathFilter {
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.suffixes.is_empty()
    }
}

/// Replace an identity; every `old_*` field that is set must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityRewrite {
    pub old_name: Option<String>,
    pub old_email: Option<String>,
    pub new_name: Option<String>,
    pub new_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Replacement {
    pub pattern: String,
    pub replacement: String,
}

impl FilterConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: FilterConfig =
            toml::from_str(text).map_err(|e| FilterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check the parts serde can't
    pub fn validate(&self) -> Result<()> {
        for rename in &self.branch_renames {
            if rename.from.is_empty() || rename.to.is_empty() {
                return Err(FilterError::Config(
                    "branch_renames entries need both `from` and `to`".to_string(),
                ));
            }
        }
        for identity in &self.identities {
            if identity.old_name.is_none() && identity.old_email.is_none() {
                return Err(FilterError::Config(
                    "identities entries need `old_name` or `old_email`".to_string(),
                ));
            }
            if identity.new_name.is_none() && identity.new_email.is_none() {
                return Err(FilterError::Config(
                    "identities entries need `new_name` or `new_email`".to_string(),
                ));
            }
        }
        if self.drop_paths.prefixes.iter().chain(&self.drop_paths.suffixes).any(String::is_empty) {
            return Err(FilterError::Config(
                "drop_paths entries must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// True when no rewrite is configured
    pub fn is_passthrough(&self) -> bool {
        self.branch_renames.is_empty()
            && self.drop_paths.is_empty()
            && self.drop_blob_contents.is_empty()
            && self.identities.is_empty()
            && self.email_replacements.is_empty()
            && self.message_replacements.is_empty()
            && !self.strip_keywords
    }
}
