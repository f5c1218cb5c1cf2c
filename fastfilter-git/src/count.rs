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

//! Commit counting, for progress reporting

use crate::command::GitInvocation;
use crate::error::{ProcessError, Result};
use std::path::Path;

/// Number of commits reachable from any ref of `repo`
pub fn count_commits(repo: impl AsRef<Path>) -> Result<u64> {
    let invocation = GitInvocation::new(repo, ["rev-list", "--all", "--count"]);
    let output = invocation.run()?;
    parse_count(&output.stdout).ok_or_else(|| ProcessError::UnexpectedOutput {
        command: invocation.to_string(),
        output: String::from_utf8_lossy(&output.stdout).trim().to_string(),
    })
}

fn parse_count(stdout: &[u8]) -> Option<u64> {
    std::str::from_utf8(stdout).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(b"42\n"), Some(42));
        assert_eq!(parse_count(b"0"), Some(0));
        assert_eq!(parse_count(b""), None);
        assert_eq!(parse_count(b"fatal: bad\n"), None);
    }
}
