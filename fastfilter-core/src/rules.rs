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

//! Configured rewrites
//!
//! Compiles a [`FilterConfig`] into handlers. Blob, commit and reset
//! handlers share one rule set so a commit can see which blobs were
//! dropped before it.

use crate::config::{FilterConfig, IdentityRewrite};
use crate::elements::{Blob, Commit, Element, Identity, Reset};
use crate::error::{FilterError, Result};
use crate::handlers::Handlers;
use crate::marks::Mark;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;

/// CVS/RCS expansion keywords such as `$Id: foo.c,v 1.2 $`
const KEYWORD_PATTERN: &str = r"\$(Id|Date|Source|Header|CVSHeader|Author|Revision):[^$\n]*\$";

/// Compiled form of a [`FilterConfig`]
#[derive(Debug)]
pub struct RewriteRules {
    branch_renames: HashMap<String, String>,
    drop_prefixes: Vec<Vec<u8>>,
    drop_suffixes: Vec<Vec<u8>>,
    drop_blob_contents: HashSet<Vec<u8>>,
    identities: Vec<IdentityRewrite>,
    email_replacements: Vec<(Regex, String)>,
    message_replacements: Vec<(BytesRegex, Vec<u8>)>,
    keywords: Option<BytesRegex>,
    /// Marks of blobs dropped so far; their file changes go too
    dropped_blobs: HashSet<Mark>,
}

impl RewriteRules {
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        config.validate()?;

        let email_replacements = config
            .email_replacements
            .iter()
            .map(|r| Ok((compile(&r.pattern)?, r.replacement.clone())))
            .collect::<Result<Vec<_>>>()?;
        let message_replacements = config
            .message_replacements
            .iter()
            .map(|r| Ok((compile_bytes(&r.pattern)?, r.replacement.as_bytes().to_vec())))
            .collect::<Result<Vec<_>>>()?;
        let keywords = if config.strip_keywords {
            Some(compile_bytes(KEYWORD_PATTERN)?)
        } else {
            None
        };

        Ok(Self {
            branch_renames: config
                .branch_renames
                .iter()
                .map(|r| (r.from.clone(), r.to.clone()))
                .collect(),
            drop_prefixes: as_byte_patterns(&config.drop_paths.prefixes),
            drop_suffixes: as_byte_patterns(&config.drop_paths.suffixes),
            drop_blob_contents: config
                .drop_blob_contents
                .iter()
                .map(|c| c.as_bytes().to_vec())
                .collect(),
            identities: config.identities.clone(),
            email_replacements,
            message_replacements,
            keywords,
            dropped_blobs: HashSet::new(),
        })
    }

    pub fn rewrite_blob(&mut self, blob: &mut Blob) {
        if self.drop_blob_contents.contains(&blob.data) {
            debug!(mark = blob.mark(), "dropping blob by content");
            self.dropped_blobs.insert(blob.mark());
            blob.skip();
            return;
        }
        if let Some(keywords) = &self.keywords {
            let stripped = keywords.replace_all(&blob.data, &b"$$${1}$$"[..]).into_owned();
            blob.data = stripped;
        }
    }

    pub fn rewrite_reset(&mut self, reset: &mut Reset) {
        if let Some(to) = self.branch_renames.get(&reset.reference) {
            reset.reference = to.clone();
        }
    }

    pub fn rewrite_commit(&mut self, commit: &mut Commit) {
        if let Some(to) = self.branch_renames.get(&commit.branch) {
            commit.branch = to.clone();
        }

        commit.file_changes.retain(|change| {
            let path = change.path();
            let dropped_path = self.drop_prefixes.iter().any(|p| path.starts_with(p))
                || self.drop_suffixes.iter().any(|s| path.ends_with(s));
            let dropped_blob = change.blob().is_some_and(|m| self.dropped_blobs.contains(&m));
            !(dropped_path || dropped_blob)
        });

        rewrite_identity(&self.identities, &self.email_replacements, &mut commit.author);
        rewrite_identity(&self.identities, &self.email_replacements, &mut commit.committer);

        for (pattern, replacement) in &self.message_replacements {
            let message = pattern.replace_all(&commit.message, replacement.as_slice()).into_owned();
            commit.message = message;
        }
    }

    /// Install these rules as blob, reset and commit handlers
    pub fn into_handlers<'a>(self) -> Handlers<'a> {
        let rules = Rc::new(RefCell::new(self));
        let (blobs, resets, commits) = (rules.clone(), rules.clone(), rules);
        Handlers::new()
            .on_blob(move |blob: &mut Blob| blobs.borrow_mut().rewrite_blob(blob))
            .on_reset(move |reset: &mut Reset| resets.borrow_mut().rewrite_reset(reset))
            .on_commit(move |commit: &mut Commit| commits.borrow_mut().rewrite_commit(commit))
    }
}

fn rewrite_identity(rewrites: &[IdentityRewrite], emails: &[(Regex, String)], who: &mut Identity) {
    let matched = rewrites.iter().find(|r| {
        r.old_name.as_ref().map_or(true, |n| *n == who.name)
            && r.old_email.as_ref().map_or(true, |e| *e == who.email)
    });
    if let Some(rewrite) = matched {
        if let Some(name) = &rewrite.new_name {
            who.name = name.clone();
        }
        if let Some(email) = &rewrite.new_email {
            who.email = email.clone();
        }
    }
    for (pattern, replacement) in emails {
        let replaced = pattern.replace_all(&who.email, replacement.as_str()).into_owned();
        who.email = replaced;
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| FilterError::Config(format!("invalid pattern '{}': {}", pattern, e)))
}

fn as_byte_patterns(patterns: &[String]) -> Vec<Vec<u8>> {
    patterns.iter().map(|p| p.as_bytes().to_vec()).collect()
}

fn compile_bytes(pattern: &str) -> Result<BytesRegex> {
    BytesRegex::new(pattern)
        .map_err(|e| FilterError::Config(format!("invalid pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BranchRename, Replacement};
    use crate::elements::FileChange;
    use crate::marks::MarkRegistry;

    fn rules(config: FilterConfig) -> RewriteRules {
        RewriteRules::from_config(&config).unwrap()
    }

    fn commit(marks: &mut MarkRegistry, branch: &str, changes: Vec<FileChange>) -> Commit {
        let who = Identity::new("Copy N. Paste", "cnp@my.crp", "0 +0000");
        Commit::new(marks, branch, None, who, "Marketing is staffed with pansies\n")
            .with_file_changes(changes)
    }

    #[test]
    fn test_keywords_are_collapsed() {
        let mut rules = rules(FilterConfig {
            strip_keywords: true,
            ..Default::default()
        });
        let mut marks = MarkRegistry::new();
        let mut blob = Blob::new(
            &mut marks,
            "/* $Id: foo.c,v 1.2 2001/01/01 cvs $ and $Date: today $ */\n",
        );
        rules.rewrite_blob(&mut blob);
        assert_eq!(blob.data, b"/* $Id$ and $Date$ */\n");
    }

    #[test]
    fn test_keywords_untouched_when_disabled() {
        let mut rules = rules(FilterConfig::default());
        let mut marks = MarkRegistry::new();
        let mut blob = Blob::new(&mut marks, "$Id: x $");
        rules.rewrite_blob(&mut blob);
        assert_eq!(blob.data, b"$Id: x $");
    }

    #[test]
    fn test_dropped_blob_takes_its_file_changes() {
        let mut rules = rules(FilterConfig {
            drop_blob_contents: vec!["The launch code is 1-2-3-4.".to_string()],
            ..Default::default()
        });
        let mut marks = MarkRegistry::new();
        let mut secret = Blob::new(&mut marks, "The launch code is 1-2-3-4.");
        let mut public = Blob::new(&mut marks, "hello");
        rules.rewrite_blob(&mut secret);
        rules.rewrite_blob(&mut public);
        assert!(secret.is_skipped());
        assert!(!public.is_skipped());

        let mut c = commit(
            &mut marks,
            "refs/heads/master",
            vec![
                FileChange::modify("secret", "100644", secret.mark()).unwrap(),
                FileChange::modify("hello", "100644", public.mark()).unwrap(),
                FileChange::delete("old"),
            ],
        );
        rules.rewrite_commit(&mut c);
        let paths: Vec<_> = c.file_changes.iter().map(|f| f.path_lossy()).collect();
        assert_eq!(paths, vec!["hello", "old"]);
    }

    #[test]
    fn test_drop_paths() {
        let mut config = FilterConfig::default();
        config.drop_paths.suffixes.push(".doc".to_string());
        config.drop_paths.prefixes.push("private/".to_string());
        let mut rules = rules(config);
        let mut marks = MarkRegistry::new();
        marks.allocate();
        let mut c = commit(
            &mut marks,
            "refs/heads/master",
            vec![
                FileChange::modify("report.doc", "100644", 1).unwrap(),
                FileChange::delete("private/key"),
                FileChange::modify("src/main.c", "100644", 1).unwrap(),
            ],
        );
        rules.rewrite_commit(&mut c);
        assert_eq!(c.file_changes.len(), 1);
        assert_eq!(c.file_changes[0].path(), b"src/main.c");
    }

    #[test]
    fn test_branch_rename_applies_to_commits_and_resets() {
        let mut rules = rules(FilterConfig {
            branch_renames: vec![BranchRename {
                from: "refs/heads/master".to_string(),
                to: "refs/heads/slave".to_string(),
            }],
            ..Default::default()
        });
        let mut marks = MarkRegistry::new();
        let mut c = commit(&mut marks, "refs/heads/master", vec![]);
        let mut other = commit(&mut marks, "refs/heads/devel", vec![]);
        let mut reset = Reset::new("refs/heads/master", None);
        rules.rewrite_commit(&mut c);
        rules.rewrite_commit(&mut other);
        rules.rewrite_reset(&mut reset);
        assert_eq!(c.branch, "refs/heads/slave");
        assert_eq!(other.branch, "refs/heads/devel");
        assert_eq!(reset.reference, "refs/heads/slave");
    }

    #[test]
    fn test_identity_and_email_rewrites() {
        let mut rules = rules(FilterConfig {
            identities: vec![IdentityRewrite {
                old_name: Some("Copy N. Paste".to_string()),
                new_name: Some("Ima L. Oser".to_string()),
                ..Default::default()
            }],
            email_replacements: vec![Replacement {
                pattern: r"@my\.crp$".to_string(),
                replacement: "@my.corp".to_string(),
            }],
            ..Default::default()
        });
        let mut marks = MarkRegistry::new();
        let mut c = commit(&mut marks, "refs/heads/master", vec![]);
        rules.rewrite_commit(&mut c);
        assert_eq!(c.author.name, "Ima L. Oser");
        assert_eq!(c.author.email, "cnp@my.corp");
        assert_eq!(c.committer, c.author);
    }

    #[test]
    fn test_message_replacement() {
        let mut rules = rules(FilterConfig {
            message_replacements: vec![Replacement {
                pattern: "staffed with pansies".to_string(),
                replacement: "great".to_string(),
            }],
            ..Default::default()
        });
        let mut marks = MarkRegistry::new();
        let mut c = commit(&mut marks, "refs/heads/master", vec![]);
        rules.rewrite_commit(&mut c);
        assert_eq!(c.message, b"Marketing is great\n");
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let err = RewriteRules::from_config(&FilterConfig {
            message_replacements: vec![Replacement {
                pattern: "(".to_string(),
                replacement: String::new(),
            }],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, FilterError::Config(_)));
    }

    #[test]
    fn test_handlers_share_dropped_blobs() {
        let config = FilterConfig {
            drop_blob_contents: vec!["secret".to_string()],
            ..Default::default()
        };
        let mut handlers = RewriteRules::from_config(&config).unwrap().into_handlers();
        let mut marks = MarkRegistry::new();
        let mut blob = crate::elements::Record::Blob(Blob::new(&mut marks, "secret"));
        handlers.dispatch(&mut blob);
        assert!(blob.is_skipped());

        let mut c = crate::elements::Record::Commit(commit(
            &mut marks,
            "refs/heads/master",
            vec![FileChange::modify("s", "100644", 1).unwrap()],
        ));
        handlers.dispatch(&mut c);
        match c {
            crate::elements::Record::Commit(c) => assert!(c.file_changes.is_empty()),
            _ => unreachable!(),
        }
    }
}
