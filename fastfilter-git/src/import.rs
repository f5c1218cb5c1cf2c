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

//! Import side of the pipeline

use crate::command::GitInvocation;
use crate::error::{not_piped, ProcessError, Result};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// `git fast-import` running in a target repository
pub struct ImportSink {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    /// Drains the importer's stderr so it never blocks on a full pipe
    stderr: JoinHandle<Vec<u8>>,
    invocation: GitInvocation,
}

pub fn import_args(extra_args: &[String]) -> Vec<String> {
    let mut args = vec!["fast-import".to_string()];
    args.extend(extra_args.iter().cloned());
    args
}

impl ImportSink {
    /// Start importing into `target`, creating and initializing it first if
    /// it is not a directory yet
    pub fn open(target: impl AsRef<Path>, extra_args: &[String]) -> Result<Self> {
        let target = target.as_ref();
        if !target.is_dir() {
            std::fs::create_dir_all(target)?;
            GitInvocation::new(target, ["init"]).run()?;
            info!(target = %target.display(), "initialized target repository");
        }
        Self::start(GitInvocation::new(target, import_args(extra_args)))
    }

    fn start(invocation: GitInvocation) -> Result<Self> {
        let mut child = invocation.spawn(Stdio::piped(), Stdio::null(), Stdio::piped())?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| not_piped("fast-import stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| not_piped("fast-import stderr"))?;
        let stderr = std::thread::spawn(move || {
            let mut captured = Vec::new();
            // A read error just truncates the captured text
            let _ = stderr.read_to_end(&mut captured);
            captured
        });
        info!(command = %invocation, "import started");

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stderr,
            invocation,
        })
    }

    /// Where the filtered stream goes
    pub fn writer(&mut self) -> &mut BufWriter<ChildStdin> {
        &mut self.stdin
    }

    /// Flush and close the stream, then wait for the importer to exit
    pub fn finish(self) -> Result<()> {
        let ImportSink {
            mut child,
            mut stdin,
            stderr,
            invocation,
        } = self;
        stdin.flush()?;
        drop(stdin);

        let status = child.wait()?;
        let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned();
        if !status.success() {
            return Err(ProcessError::Failed {
                command: invocation.to_string(),
                status,
                stderr,
            });
        }
        debug!(statistics = %stderr.trim(), "import finished");
        Ok(())
    }

    /// Kill the importer before it sees the end of the stream.
    ///
    /// fast-import only updates refs once its input ends, so a killed
    /// importer leaves the target's branches as they were. Used when the
    /// filter fails part way through.
    pub fn abort(self) -> Result<ExitStatus> {
        let ImportSink {
            mut child,
            stdin,
            stderr,
            invocation,
        } = self;
        // Kill first: closing stdin would look like a clean end of stream
        if let Err(err) = child.kill() {
            warn!(command = %invocation, error = %err, "importer already exited");
        }
        let status = child.wait()?;
        drop(stdin);
        let _ = stderr.join();
        warn!(command = %invocation, %status, "import aborted");
        Ok(status)
    }
}
