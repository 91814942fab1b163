//! External command execution with a bounded wait.
//!
//! Every tool talks to the outside world (`flutter`, `file`) through the
//! [`CommandRunner`] trait. The production [`ShellRunner`] runs commands
//! through the platform shell and never fails: spawn errors and timeouts come
//! back as a [`CommandOutput`] with the [`FAILURE_CODE`] sentinel so callers
//! can keep checking and report the text.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use wait_timeout::ChildExt;

/// Default bound on a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code reported when a command timed out or could not be started.
pub const FAILURE_CODE: i32 = -1;

const TIMED_OUT: &str = "Command timed out";

/// Captured result of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code, or [`FAILURE_CODE`].
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Builds the sentinel output for a command that never produced a status.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: FAILURE_CODE,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// First line of stdout, empty when there is none.
    pub fn first_line(&self) -> &str {
        self.stdout.split('\n').next().unwrap_or("").trim_end_matches('\r')
    }
}

/// Runs a shell command line and captures its output.
pub trait CommandRunner {
    fn run(&self, command: &str, cwd: Option<&Path>) -> CommandOutput;
}

/// Runs commands through `sh -c` (`cmd /C` on Windows) with a timeout
/// covering both the wait and the output collection.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, cwd: Option<&Path>) -> CommandOutput {
        debug!("running `{}` (timeout {}s)", command, self.timeout.as_secs());
        let deadline = Instant::now() + self.timeout;

        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return CommandOutput::failure(e.to_string()),
        };

        // Both pipes are drained while waiting; a full pipe would block the child.
        let (tx, rx) = mpsc::channel();
        spawn_reader(child.stdout.take(), Stream::Stdout, tx.clone());
        spawn_reader(child.stderr.take(), Stream::Stderr, tx);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                kill_tree(&mut child);
                debug!("`{}` timed out", command);
                return CommandOutput::failure(TIMED_OUT);
            }
            Err(e) => {
                kill_tree(&mut child);
                return CommandOutput::failure(e.to_string());
            }
        };

        // Background children may still hold the pipes open after the shell exits.
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Stream::Stdout, bytes)) => stdout = bytes,
                Ok((Stream::Stderr, bytes)) => stderr = bytes,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    kill_tree(&mut child);
                    debug!("`{}` left output open past the timeout", command);
                    return CommandOutput::failure(TIMED_OUT);
                }
            }
        }

        let output = CommandOutput {
            code: status.code().unwrap_or(FAILURE_CODE),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };
        debug!("`{}` exited with {}", command, output.code);
        output
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    // Own process group, so a timeout can take down everything the command started.
    cmd.process_group(0);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain signal delivery to the group led by our own child.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

enum Stream {
    Stdout,
    Stderr,
}

fn spawn_reader<R>(pipe: Option<R>, stream: Stream, tx: Sender<(Stream, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send((stream, buf));
        });
    }
}

/// Quotes a path for use inside a shell command line.
pub fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Replays canned outputs by command line and records every call.
    #[derive(Default)]
    pub struct ScriptedRunner {
        outputs: HashMap<String, CommandOutput>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, command: &str, code: i32, stdout: &str, stderr: &str) -> Self {
            self.outputs.insert(
                command.to_string(),
                CommandOutput {
                    code,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        pub fn called(&self, command: &str) -> bool {
            self.calls.borrow().iter().any(|c| c == command)
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &str, _cwd: Option<&Path>) -> CommandOutput {
            self.calls.borrow_mut().push(command.to_string());
            self.outputs
                .get(command)
                .cloned()
                .unwrap_or_else(|| CommandOutput::failure(format!("{}: not scripted", command)))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let output = ShellRunner::new().run("echo hello; echo oops 1>&2", None);
        assert!(output.success());
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.first_line(), "hello");
    }

    #[test]
    fn classifies_non_zero_exit() {
        let output = ShellRunner::new().run("exit 7", None);
        assert_eq!(output.code, 7);
        assert!(!output.success());
    }

    #[test]
    fn unknown_program_is_reported_not_raised() {
        let output = ShellRunner::new().run("nonexistent-command-12345", None);
        assert!(!output.success());
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn timeout_yields_sentinel() {
        let runner = ShellRunner::with_timeout(Duration::from_millis(200));
        let output = runner.run("sleep 5", None);
        assert_eq!(output.code, FAILURE_CODE);
        assert_eq!(output.stderr, "Command timed out");
    }

    #[test]
    fn timeout_covers_background_children_holding_pipes() {
        let runner = ShellRunner::with_timeout(Duration::from_secs(1));
        let started = Instant::now();
        let output = runner.run("sleep 6 & echo started", None);
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        assert_eq!(output.code, FAILURE_CODE);
        assert_eq!(output.stderr, "Command timed out");
    }

    #[test]
    fn spawn_failure_yields_sentinel() {
        let output = ShellRunner::new().run("true", Some(Path::new("/nonexistent/dir/12345")));
        assert_eq!(output.code, FAILURE_CODE);
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn runs_in_working_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "").unwrap();
        let output = ShellRunner::new().run("ls", Some(temp.path()));
        assert!(output.stdout.contains("marker.txt"));
    }

    #[test]
    fn large_output_does_not_block() {
        let output = ShellRunner::new().run("yes line | head -n 200000", None);
        assert!(output.success());
        assert_eq!(output.stdout.lines().count(), 200000);
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote(Path::new("/a b/c")), "'/a b/c'");
        assert_eq!(shell_quote(Path::new("/it's")), r"'/it'\''s'");
    }
}
