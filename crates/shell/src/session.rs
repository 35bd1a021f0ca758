use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use uuid::Uuid;

use crate::error::{Result, ShellError};
use crate::truncate::maybe_truncate;

#[derive(Debug, Clone, Copy)]
pub struct ShellOptions {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_output_bytes: 30_000,
        }
    }
}

/// Result of a single framed command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A persistent `bash` child with sentinel-framed command execution.
pub struct ShellSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    options: ShellOptions,
    broken: bool,
}

impl ShellSession {
    pub fn spawn(options: ShellOptions) -> Result<Self> {
        let mut child = Command::new("bash")
            .arg("--noprofile")
            .arg("--norc")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ShellError::Spawn)?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
        let stderr = BufReader::new(child.stderr.take().expect("piped stderr"));
        log::debug!("spawned shell pid {:?}", child.id());

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
            options,
            broken: false,
        })
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Kill the current child and start fresh.
    pub async fn restart(&mut self) -> Result<()> {
        self.teardown().await;
        *self = Self::spawn(self.options)?;
        Ok(())
    }

    /// Run `command` with the session cwd applied, framed by a per-call
    /// sentinel. Returns the command's own output and exit code; nothing
    /// bleeds over from earlier commands because each call reads exactly up
    /// to its own sentinel lines.
    pub async fn run(&mut self, command: &str, cwd: &Path) -> Result<CommandOutput> {
        if self.broken || self.child.try_wait()?.is_some() {
            log::debug!("shell unusable, respawning before run");
            self.restart().await?;
        }

        let sentinel = format!("__WORKBENCH_{}__", Uuid::new_v4().simple());
        // The command runs in a subshell so `exit`, `cd`, and environment
        // churn cannot corrupt the long-lived child; the sentinel echoes run
        // in the parent afterwards, with `$?` holding the subshell's code.
        let payload = format!(
            "(cd {} && {}\n)\necho \"{} $?\"\necho \"{}\" 1>&2\n",
            shell_quote(&cwd.display().to_string()),
            command,
            sentinel,
            sentinel,
        );

        if let Err(err) = self.write_payload(payload.as_bytes()).await {
            self.broken = true;
            return Err(ShellError::Broken(format!("failed to send command: {err}")));
        }

        let cap = self.options.max_output_bytes;
        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();
        let stdout_reader = &mut self.stdout;
        let stderr_reader = &mut self.stderr;

        let framed = async {
            tokio::try_join!(
                read_until_sentinel(stdout_reader, &sentinel, &mut stdout_buf, cap),
                read_until_sentinel(stderr_reader, &sentinel, &mut stderr_buf, cap),
            )
        };

        // Bind before matching so the read future (and its borrows of the
        // buffers) is dropped before the arms touch them again.
        let outcome = tokio::time::timeout(self.options.timeout, framed).await;
        match outcome {
            Ok(Ok((exit_code, _))) => Ok(CommandOutput {
                stdout: maybe_truncate(&stdout_buf, cap),
                stderr: maybe_truncate(&stderr_buf, cap),
                exit_code: exit_code.unwrap_or(-1),
            }),
            Ok(Err(err)) => {
                self.broken = true;
                Err(ShellError::Broken(format!("shell stream closed: {err}")))
            }
            Err(_elapsed) => {
                self.broken = true;
                self.teardown().await;
                Err(ShellError::CommandTimeout {
                    timeout_secs: self.options.timeout.as_secs(),
                    stdout: maybe_truncate(&stdout_buf, cap),
                    stderr: maybe_truncate(&stderr_buf, cap),
                })
            }
        }
    }

    async fn write_payload(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stdin.write_all(bytes).await?;
        self.stdin.flush().await
    }

    async fn teardown(&mut self) {
        if let Err(err) = self.child.start_kill() {
            log::debug!("shell kill failed (already gone?): {err}");
        }
        let _ = self.child.wait().await;
    }

    /// Explicit shutdown for session close; `kill_on_drop` covers the rest.
    pub async fn shutdown(mut self) {
        self.teardown().await;
    }
}

/// Read lines into `buf` until one starts with the sentinel. For stdout the
/// sentinel line carries the exit code; stderr's carries nothing. Collection
/// stops a little past the cap but draining continues so the stream stays
/// aligned for the next command.
async fn read_until_sentinel<R>(
    reader: &mut R,
    sentinel: &str,
    buf: &mut String,
    cap: usize,
) -> std::io::Result<Option<i32>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "shell exited mid-command",
            ));
        }
        if let Some(rest) = line.trim_end().strip_prefix(sentinel) {
            return Ok(rest.trim().parse::<i32>().ok());
        }
        if buf.len() <= cap {
            buf.push_str(&line);
        }
    }
}

/// Single-quote a string for bash.
fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(timeout_secs: u64, cap: usize) -> ShellOptions {
        ShellOptions {
            timeout: Duration::from_secs(timeout_secs),
            max_output_bytes: cap,
        }
    }

    #[tokio::test]
    async fn runs_a_command_and_captures_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(ShellOptions::default()).unwrap();
        let out = shell.run("echo hi", tmp.path()).await.unwrap();
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(out.stderr, "");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_codes_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(ShellOptions::default()).unwrap();
        let out = shell.run("exit 3", tmp.path()).await.unwrap();
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn stderr_is_captured_separately() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(ShellOptions::default()).unwrap();
        let out = shell.run("echo oops 1>&2", tmp.path()).await.unwrap();
        assert_eq!(out.stdout, "");
        assert_eq!(out.stderr, "oops\n");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn commands_observe_the_session_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let cwd = tmp.path().canonicalize().unwrap();
        let mut shell = ShellSession::spawn(ShellOptions::default()).unwrap();
        let out = shell.run("pwd", &cwd).await.unwrap();
        assert_eq!(out.stdout.trim(), cwd.display().to_string());
    }

    #[tokio::test]
    async fn no_output_bleed_between_commands() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(ShellOptions::default()).unwrap();
        let first = shell.run("echo first", tmp.path()).await.unwrap();
        let second = shell.run("echo second", tmp.path()).await.unwrap();
        assert_eq!(first.stdout, "first\n");
        assert_eq!(second.stdout, "second\n");
    }

    #[tokio::test]
    async fn timeout_kills_and_marks_broken_then_recovers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(options(1, 30_000)).unwrap();
        let err = shell.run("sleep 30", tmp.path()).await.unwrap_err();
        assert!(matches!(err, ShellError::CommandTimeout { .. }));
        assert!(shell.is_broken());

        // Next run respawns transparently.
        let out = shell.run("echo back", tmp.path()).await.unwrap();
        assert_eq!(out.stdout, "back\n");
        assert!(!shell.is_broken());
    }

    #[tokio::test]
    async fn oversized_output_is_truncated_with_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(options(30, 200)).unwrap();
        let out = shell
            .run("for i in $(seq 1 200); do echo line-$i; done", tmp.path())
            .await
            .unwrap();
        assert!(out.stdout.ends_with(crate::TRUNCATED_MARKER));
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn restart_returns_fresh_shell_without_running_anything() {
        let tmp = tempfile::tempdir().unwrap();
        let mut shell = ShellSession::spawn(ShellOptions::default()).unwrap();
        shell.run("export MARKER=set", tmp.path()).await.unwrap();
        shell.restart().await.unwrap();
        let out = shell.run("echo ${MARKER:-unset}", tmp.path()).await.unwrap();
        assert_eq!(out.stdout, "unset\n");
    }
}
