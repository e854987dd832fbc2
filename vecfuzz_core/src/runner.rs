use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Runner I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Target did not finish within {0:?}")]
    Timeout(Duration),
}

/// Runs the target once on an input under a breakpoint script and returns the debugger's report.
pub trait TargetRunner {
    fn run(&mut self, input: &[u8], script: &str) -> Result<String, RunError>;
}

/// Drives the target through gdb in batch mode.
///
/// The input and the script go to temporary files that live for the duration
/// of one run. The target is started with `input_arg`, where `{}` stands for
/// the input file path, and gdb prints `info breakpoints` once it exits.
#[derive(Debug, Clone)]
pub struct GdbRunner {
    debugger: String,
    target: PathBuf,
    input_arg: String,
    timeout: Duration,
}

impl GdbRunner {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            debugger: "gdb".to_string(),
            target: target.into(),
            input_arg: "{}".to_string(),
            timeout: Duration::from_millis(2000),
        }
    }

    pub fn with_debugger(mut self, debugger: impl Into<String>) -> Self {
        self.debugger = debugger.into();
        self
    }

    pub fn with_input_arg(mut self, template: impl Into<String>) -> Self {
        self.input_arg = template.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Batch gdb invocation. The target runs through gdb's `run` with its stdio
    /// on `/dev/null`, so only gdb writes to the captured stdout.
    fn command(&self, script: &Path, input: &Path) -> Command {
        let input = input.to_string_lossy();
        let args = self.input_arg.replace("{}", &input);
        let mut run = String::from("run");
        for part in args.split_whitespace() {
            run.push(' ');
            run.push_str(&shell_quote(part));
        }
        run.push_str(" < /dev/null > /dev/null 2>&1");

        let mut cmd = Command::new(&self.debugger);
        cmd.arg("-batch")
            .arg("-nx")
            .arg("-x")
            .arg(script)
            .arg("-ex")
            .arg(run)
            .args(["-ex", "info breakpoints"])
            .arg(&self.target);
        cmd
    }
}

/// Single-quotes `arg` for the shell gdb starts the target with.
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

fn temp_file_with(contents: &[u8]) -> Result<NamedTempFile, RunError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

/// Grace period between asking the process group to terminate and killing it.
const TERMINATE_GRACE: Duration = Duration::from_millis(250);

/// Puts the child in a fresh process group so a timeout can reach everything it started.
fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Sends `signal` to the process group led by `child`, returning whether the signal was delivered.
#[cfg(unix)]
fn signal_group(child: &Child, signal: &str) -> bool {
    Command::new("kill")
        .arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{}", child.id()))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Stops a timed-out child and everything in its process group.
///
/// The group first gets SIGTERM, on which gdb kills its inferior and exits.
/// Whatever is left after [`TERMINATE_GRACE`] gets SIGKILL.
fn terminate(child: &mut Child) -> Result<(), RunError> {
    #[cfg(unix)]
    {
        if signal_group(child, "TERM") {
            let deadline = Instant::now() + TERMINATE_GRACE;
            while Instant::now() < deadline {
                if child.try_wait()?.is_some() {
                    signal_group(child, "KILL");
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            signal_group(child, "KILL");
        }
    }
    // Reaps the leader; `kill` is a no-op once the group signal has ended it.
    let _ = child.kill();
    let _ = child.wait();
    Ok(())
}

/// Polls `child` until it exits, terminating its process group once `timeout` has elapsed.
pub(crate) fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RunError> {
    let start_time = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None => {
                if start_time.elapsed() > timeout {
                    tracing::warn!(?timeout, pid = child.id(), "Target timed out, killing its process group");
                    terminate(child)?;
                    return Err(RunError::Timeout(timeout));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
        }
    }
}

impl TargetRunner for GdbRunner {
    fn run(&mut self, input: &[u8], script: &str) -> Result<String, RunError> {
        let input_file = temp_file_with(input)?;
        let script_file = temp_file_with(script.as_bytes())?;

        let mut cmd = self.command(script_file.path(), input_file.path());
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        isolate(&mut cmd);
        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: self.debugger.clone(),
            source,
        })?;

        // Drain stdout concurrently so a chatty debugger cannot block on a full pipe.
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                let _ = out.read_to_end(&mut buf);
            }
            buf
        });

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(status) => status,
            Err(err) => {
                // Detached: the report of a timed-out run is discarded, and a
                // process that escaped the group must not block this call.
                drop(reader);
                return Err(err);
            }
        };
        let output = reader.join().unwrap_or_default();
        tracing::debug!(%status, bytes = output.len(), "Debugger finished");
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}
