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

//! Export side of the pipeline

use crate::command::GitInvocation;
use crate::error::{not_piped, ProcessError, Result};
use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdout, Stdio};
use tracing::info;

/// `git fast-export` running in a source repository
pub struct ExportSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    invocation: GitInvocation,
}

/// Arguments for a full, topologically ordered export
pub fn export_args(extra_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "fast-export".to_string(),
        "--all".to_string(),
        "--topo-order".to_string(),
    ];
    args.extend(extra_args.iter().cloned());
    args
}

impl ExportSource {
    /// Start exporting every ref of `repo`.
    ///
    /// The exporter's stderr is passed through so its own diagnostics reach
    /// the user.
    pub fn spawn(repo: impl AsRef<Path>, extra_args: &[String]) -> Result<Self> {
        let invocation = GitInvocation::new(repo, export_args(extra_args));
        let mut child = invocation.spawn(Stdio::null(), Stdio::piped(), Stdio::inherit())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| not_piped("fast-export stdout"))?;
        info!(command = %invocation, "export started");
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            invocation,
        })
    }

    /// The interchange stream
    pub fn reader(&mut self) -> &mut BufReader<ChildStdout> {
        &mut self.stdout
    }

    /// Close the stream and wait for the exporter to exit
    pub fn finish(self) -> Result<()> {
        let ExportSource {
            mut child,
            stdout,
            invocation,
        } = self;
        drop(stdout);
        let status = child.wait()?;
        if !status.success() {
            return Err(ProcessError::Failed {
                command: invocation.to_string(),
                status,
                stderr: String::new(),
            });
        }
        Ok(())
    }
}
