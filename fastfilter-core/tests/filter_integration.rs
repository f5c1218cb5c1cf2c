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

//! Integration tests for the filter engine

use fastfilter_core::{
    Blob, Commit, Element, ElementMut, FastExportFilter, FilterConfig, FilterError, Handlers,
    Mark, MarkRegistry, MarkValidation, Record, Reset, RewriteRules, StreamParser,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;

const SIMPLE: &str = "blob\nmark :1\ndata 5\nhello\n\n\
commit refs/heads/main\nmark :2\ncommitter A <a@x> 0 +0000\ndata 2\nhi\nM 100644 :1 file.txt\n\n";

fn filter(handlers: Handlers<'_>, input: &[u8]) -> Result<Vec<u8>, FilterError> {
    let mut out = Vec::new();
    FastExportFilter::new(handlers).run(Cursor::new(input), &mut out)?;
    Ok(out)
}

fn parse(input: &[u8]) -> Vec<Record> {
    let mut marks = MarkRegistry::new();
    let mut parser = StreamParser::new(Cursor::new(input));
    let mut records = Vec::new();
    while let Some(record) = parser.next_record(&mut marks).unwrap() {
        records.push(record);
    }
    records
}

/// Passthrough keeps every record and every mark
#[test]
fn test_passthrough_preserves_structure() {
    let out = filter(Handlers::new(), SIMPLE.as_bytes()).unwrap();

    assert_eq!(
        String::from_utf8(out.clone()).unwrap(),
        "blob\nmark :1\ndata 5\nhello\n\
commit refs/heads/main\nmark :2\nauthor A <a@x> 0 +0000\ncommitter A <a@x> 0 +0000\ndata 2\nhi\n\
M 100644 :1 file.txt\n\n"
    );
    assert_eq!(parse(&out), parse(SIMPLE.as_bytes()));
}

/// Filtering already-filtered output changes nothing
#[test]
fn test_output_is_a_fixed_point() {
    let once = filter(Handlers::new(), SIMPLE.as_bytes()).unwrap();
    let twice = filter(Handlers::new(), &once).unwrap();
    assert_eq!(once, twice);
}

/// Data headers follow the payload a handler leaves behind
#[test]
fn test_rewritten_payload_gets_new_length() {
    let handlers = Handlers::new().on_blob(|blob: &mut Blob| {
        blob.data = b"hello, considerably longer world".to_vec();
    });
    let out = String::from_utf8(filter(handlers, SIMPLE.as_bytes()).unwrap()).unwrap();
    assert!(out.starts_with("blob\nmark :1\ndata 32\nhello, considerably longer world\n"));
}

/// Merge parents and file changes keep their stream order
#[test]
fn test_merge_commit_order() {
    let input = "blob\nmark :1\ndata 1\nx\n\
commit refs/heads/main\nmark :2\ncommitter A <a@x> 0 +0000\ndata 0\n\n\
commit refs/heads/a\nmark :3\ncommitter A <a@x> 1 +0000\ndata 0\nfrom :2\n\n\
commit refs/heads/b\nmark :4\ncommitter A <a@x> 2 +0000\ndata 0\nfrom :2\n\n\
commit refs/heads/main\nmark :5\ncommitter A <a@x> 3 +0000\n\
data 6\nmerge\nfrom :2\nmerge :4\nmerge :3\n\
M 100644 :1 z\nD a\n\n";

    let records = parse(input.as_bytes());
    let Record::Commit(merge) = &records[4] else {
        panic!("expected commit");
    };
    assert_eq!(merge.merges, vec![4, 3]);
    assert_eq!(merge.file_changes.len(), 2);
    assert_eq!(merge.file_changes[0].path(), b"z");
    assert!(merge.file_changes[1].is_delete());

    let out = String::from_utf8(filter(Handlers::new(), input.as_bytes()).unwrap()).unwrap();
    assert!(out.contains("from :2\nmerge :4\nmerge :3\nM 100644 :1 z\nD a\n"));
}

/// Quoted paths are decoded on the way in and re-quoted on the way out
#[test]
fn test_quoted_path_round_trip() {
    let input = "blob\nmark :1\ndata 0\n\
commit refs/heads/main\ncommitter A <a@x> 0 +0000\ndata 0\nM 100644 :1 \"a\\\"b.txt\"\n\n";

    let records = parse(input.as_bytes());
    let Record::Commit(commit) = &records[1] else {
        panic!("expected commit");
    };
    assert_eq!(commit.file_changes[0].path(), b"a\"b.txt");

    let out = String::from_utf8(filter(Handlers::new(), input.as_bytes()).unwrap()).unwrap();
    assert!(out.contains("M 100644 :1 \"a\\\"b.txt\"\n"));
}

/// Paths git quotes for non-ASCII bytes or spaces pass through unchanged
#[test]
fn test_git_quoted_paths_pass_through() {
    let input = "blob\nmark :1\ndata 0\n\n\
commit refs/heads/main\nmark :2\nauthor A <a@x> 0 +0000\ncommitter A <a@x> 0 +0000\n\
data 2\nx\nM 100644 :1 \"caf\\303\\251.txt\"\nM 100644 :1 \"sp ace.txt\"\nD \"old name\"\n\n";

    let records = parse(input.as_bytes());
    let Record::Commit(commit) = &records[1] else {
        panic!("expected commit");
    };
    assert_eq!(commit.file_changes[0].path(), "café.txt".as_bytes());
    assert_eq!(commit.file_changes[1].path(), b"sp ace.txt");

    let out = filter(Handlers::new(), input.as_bytes()).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), input);
}

/// Payloads may hold anything, including lines that look like records
#[test]
fn test_payload_bytes_are_opaque() {
    let payload: &[u8] = b"commit refs/heads/evil\n\0\xff\ndata 3\n";
    let mut input = format!("blob\nmark :1\ndata {}\n", payload.len()).into_bytes();
    input.extend_from_slice(payload);
    input.extend_from_slice(b"\nreset refs/heads/main\nfrom :1\n\n");

    let out = filter(Handlers::new(), &input).unwrap();
    let records = parse(&out);
    assert_eq!(records.len(), 2);
    let Record::Blob(blob) = &records[0] else {
        panic!("expected blob");
    };
    assert_eq!(blob.data, payload);
}

/// Skipping an element leaves the marks of later ones alone
#[test]
fn test_skipped_blob_leaves_later_marks() {
    let input = "blob\ndata 1\na\n\
blob\nmark :2\ndata 1\nb\n\
commit refs/heads/main\nmark :3\ncommitter A <a@x> 0 +0000\ndata 0\nM 100644 :2 b\n\n\
reset refs/heads/keep\nfrom :3\n\n";

    let handlers = Handlers::new().on_blob(|blob: &mut Blob| {
        if blob.data == b"a" {
            blob.skip();
        }
    });
    let out = String::from_utf8(filter(handlers, input.as_bytes()).unwrap()).unwrap();
    assert_eq!(
        out,
        "blob\nmark :2\ndata 1\nb\n\
commit refs/heads/main\nmark :3\nauthor A <a@x> 0 +0000\ncommitter A <a@x> 0 +0000\ndata 0\n\n\
M 100644 :2 b\n\n\
reset refs/heads/keep\nfrom :3\n\n"
    );
}

/// Declared validation rejects marks no record ever named
#[test]
fn test_declared_validation_rejects_unnamed_marks() {
    let input = "blob\ndata 1\na\nblob\nmark :2\ndata 1\nb\n\
commit refs/heads/main\ncommitter A <a@x> 0 +0000\ndata 0\nM 100644 :1 a\n\n";

    assert!(filter(Handlers::new(), input.as_bytes()).is_ok());

    let registry = MarkRegistry::with_validation(MarkValidation::Declared);
    let mut out = Vec::new();
    let err = FastExportFilter::with_registry(Handlers::new(), registry)
        .run(Cursor::new(input.as_bytes()), &mut out)
        .unwrap_err();
    assert!(matches!(err, FilterError::UnresolvedReference { mark: 1, highest: 2 }));
}

/// A configuration file drives the same rewrites a handler would
#[test]
fn test_config_driven_rewrite() {
    let config = FilterConfig::from_toml_str(
        r#"
        strip_keywords = true
        drop_blob_contents = ["secret\n"]

        [[branch_renames]]
        from = "refs/heads/master"
        to = "refs/heads/slave"

        [[identities]]
        old_email = "a@x"
        new_name = "Ima L. Oser"
        new_email = "aloser@my.corp"
        "#,
    )
    .unwrap();
    let input = "blob\nmark :1\ndata 7\nsecret\n\n\
blob\nmark :2\ndata 11\n$Id: a.c $\n\n\
commit refs/heads/master\nmark :3\ncommitter A <a@x> 0 +0000\ndata 4\nmsg\n\
M 100644 :1 secret.txt\nM 100644 :2 a.c\n\n";

    let handlers = RewriteRules::from_config(&config).unwrap().into_handlers();
    let out = String::from_utf8(filter(handlers, input.as_bytes()).unwrap()).unwrap();
    assert_eq!(
        out,
        "blob\nmark :2\ndata 5\n$Id$\n\n\
commit refs/heads/slave\nmark :3\n\
author Ima L. Oser <aloser@my.corp> 0 +0000\n\
committer Ima L. Oser <aloser@my.corp> 0 +0000\n\
data 4\nmsg\nM 100644 :2 a.c\n\n"
    );
}

/// Handlers see every commit, in order
#[test]
fn test_commit_handler_sees_each_commit() {
    let mut branches = Vec::new();
    let input = "commit refs/heads/a\ncommitter A <a@x> 0 +0000\ndata 0\n\n\
commit refs/heads/b\ncommitter A <a@x> 0 +0000\ndata 0\n\n";
    {
        let handlers =
            Handlers::new().on_commit(|commit: &mut Commit| branches.push(commit.branch.clone()));
        filter(handlers, input.as_bytes()).unwrap();
    }
    assert_eq!(branches, vec!["refs/heads/a", "refs/heads/b"]);
}

/// Two exports woven into one linear history through a shared registry
#[test]
fn test_splice_two_streams() {
    let first = "blob\nmark :1\ndata 2\nb\n\n\
reset refs/heads/master\n\
commit refs/heads/master\nmark :2\ncommitter B <b@x> 2 +0000\ndata 9\nCommit B\n\
M 100644 :1 b\n\n\
commit refs/heads/master\nmark :3\ncommitter B <b@x> 4 +0000\ndata 9\nCommit D\nfrom :2\n\n";
    let second = "\
commit refs/heads/master\nmark :1\ncommitter A <a@x> 1 +0000\ndata 9\nCommit A\n\n\
commit refs/heads/master\nmark :2\ncommitter A <a@x> 3 +0000\ndata 9\nCommit C\nfrom :1\n\n\
commit refs/heads/master\nmark :3\ncommitter A <a@x> 5 +0000\ndata 9\nCommit E\nfrom :2\n\n";

    // Commits of the first export wait, keyed by the letter in their message
    let held: RefCell<HashMap<u8, Commit>> = RefCell::new(HashMap::new());
    let mut out = Vec::new();

    let holding = Handlers::new()
        .on_reset(|reset: &mut Reset| reset.skip())
        .on_commit(|commit: &mut Commit| {
            commit.skip_to(commit.mark());
            held.borrow_mut().insert(commit.message[7], commit.clone());
        });
    let mut filter = FastExportFilter::new(holding);
    let stats = filter.run(Cursor::new(first.as_bytes()), &mut out).unwrap();
    assert_eq!(stats.skipped, 3);
    assert_eq!(out, b"blob\nmark :1\ndata 2\nb\n\n");
    let registry = filter.into_registry();

    let mut last: Option<Mark> = None;
    let weaving = Handlers::new().on_context(|_, element, ctx| {
        if let ElementMut::Commit(commit) = element {
            let before = commit.message[7] - 1;
            if let Some(mut woven) = held.borrow_mut().remove(&before) {
                woven.from = last;
                commit.from = Some(woven.mark());
                ctx.emit_before(woven);
            }
            last = Some(commit.mark());
        }
        Ok(())
    });
    let mut filter = FastExportFilter::with_registry(weaving, registry);
    filter.run(Cursor::new(second.as_bytes()), &mut out).unwrap();
    assert!(held.borrow().is_empty());

    let out = String::from_utf8(out).unwrap();
    let order: Vec<usize> = ["Commit A", "Commit B", "Commit C", "Commit D", "Commit E"]
        .iter()
        .map(|message| out.find(message).unwrap())
        .collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));

    assert!(out.contains("mark :4\n"));
    assert!(out.contains("Commit B\nfrom :4\nM 100644 :1 b\n"));
    assert!(out.contains("Commit C\nfrom :2\n"));
    assert!(out.contains("Commit D\nfrom :5\n"));
    assert!(out.contains("Commit E\nfrom :3\n"));
}
