//! Running external tools as short-lived child processes.
//!
//! Each [`ToolCommand::execute`] spawns one process with stdin closed and
//! both output pipes captured. A process that outlives its deadline is
//! killed, and every failure is reported as [`ms_core::Error::Tool`].

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use ms_core::{Error, Result};
use tokio::process::Command;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What a finished tool wrote to its pipes.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Standard output, decoded lossily as UTF-8.
    pub stdout: String,
    /// Standard error, decoded lossily as UTF-8.
    pub stderr: String,
}

impl ToolOutput {
    /// First non-empty line of stdout, trimmed.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.lines().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Invocation of an external binary with a deadline.
///
/// ```no_run
/// use ms_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ms_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
///     .arg("/library/clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Kill the process if it has not exited after `d` (default 30 s).
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Short name for error messages: the file name, or the whole path.
    fn tool_name(&self) -> String {
        match self.program.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.program.to_string_lossy().into_owned(),
        }
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::tool(self.tool_name(), message)
    }

    /// Run to completion and capture output.
    ///
    /// Spawn failures, a non-zero exit (stderr is included in the message)
    /// and an expired deadline are all errors.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.fail(format!("failed to spawn: {e}")))?;

        tracing::trace!(tool = %self.tool_name(), args = ?self.args, "Spawned tool");

        // On timeout the wait future is dropped with the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| self.fail(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| self.fail(format!("I/O error waiting for process: {e}")))?;

        let output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(self.fail(format!(
                "exited with {}: {}",
                output.status,
                output.stderr.trim()
            )));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout() {
        let out = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo; echo '  ffprobe version 7.0  '"])
            .execute()
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.first_line(), Some("ffprobe version 7.0"));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = ToolCommand::new(PathBuf::from("/nonexistent/bin/ffprobe"))
            .execute()
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("[ffprobe]"), "unexpected error: {msg}");
        assert!(msg.contains("failed to spawn"), "unexpected error: {msg}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo 'moov atom not found' >&2; exit 1"])
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("moov atom not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deadline_kills_process() {
        let started = std::time::Instant::now();
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
