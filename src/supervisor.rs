//! Starting, feeding, waiting for and killing one child process.

use std::ffi::OsString;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::diary::Diary;
use crate::error::{Error, Failure, Result};
use crate::fd::RedirectSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One spawned child. The pid never changes; the status is set once the
/// child has been reaped.
#[derive(Debug)]
pub struct SupervisedProcess {
    pub pid: u32,
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    status: Option<ExitStatus>,
}

impl SupervisedProcess {
    pub fn program(&self) -> &str { &self.program }

    pub fn status(&self) -> Option<ExitStatus> { self.status }

    pub fn has_input(&self) -> bool { self.stdin.is_some() }

    /// Reaps the child if it has exited.
    pub fn is_alive(&mut self) -> Result<bool> {
        Ok(self.poll()?.is_none())
    }

    fn poll(&mut self) -> Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child
                .try_wait()
                .map_err(|e| Error::io(format!("polling pid {}", self.pid), e))?;
        }
        Ok(self.status)
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        self.stdin.take();
        if let Ok(None) = self.poll() {
            tracing::warn!(
                pid = self.pid,
                program = %self.program,
                "child still running on drop, killing"
            );
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Drives child processes and reports each step to a diary.
pub struct Supervisor<'d> {
    diary: &'d dyn Diary,
}

impl<'d> Supervisor<'d> {
    pub fn new(diary: &'d dyn Diary) -> Self {
        Supervisor { diary }
    }

    /// Launches `argv` with stdout and stderr bound to `redirect` and stdin
    /// piped.
    pub fn start(
        &self,
        argv: &[String],
        redirect: &RedirectSpec<'_>,
    ) -> Result<SupervisedProcess> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::LaunchFailure {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line"),
        })?;
        let name = program_name(program);

        self.diary.push_line(&format!("starting command: {}", quoted(argv)));

        let args: Vec<OsString> = args.iter().map(|s| s.into()).collect();
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(redirect.stdio()?)
            .stderr(redirect.stdio()?)
            .spawn()
            .map_err(|source| Error::LaunchFailure { program: name.clone(), source })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        tracing::debug!(pid, fd = redirect.raw_fd(), "spawned child with redirected output");
        self.diary.push_line(&format!("process '{}' started (PID={})", name, pid));

        Ok(SupervisedProcess { pid, program: name, child, stdin, status: None })
    }

    /// Sends one line. A dead child cannot take more input, so this is never
    /// retried.
    pub fn write_command(&self, process: &mut SupervisedProcess, text: &str) -> Result<()> {
        let pid = process.pid;
        let stdin = process.stdin.as_mut().ok_or_else(|| Error::WriteFailure {
            pid,
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin already closed"),
        })?;
        stdin
            .write_all(format!("{}\n", text).as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|source| Error::WriteFailure { pid, source })?;
        self.diary.push_line(&format!("sent command: {}", text));
        Ok(())
    }

    /// Closes the child's stdin. Calling it again does nothing.
    pub fn close_input(&self, process: &mut SupervisedProcess) {
        if process.stdin.take().is_some() {
            self.diary.push_line("sent EOF");
        }
    }

    /// Blocks until the child exits or `timeout` runs out. On timeout the
    /// child is left running; see [`Supervisor::force_kill`]. A timeout too
    /// large to represent as an instant waits forever.
    pub fn await_exit(
        &self,
        process: &mut SupervisedProcess,
        timeout: Duration,
    ) -> Result<ExitStatus> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(status) = process.poll()? {
                self.report_exit(process, status);
                return Ok(status);
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::ProcessTimeout {
                            program: process.program.clone(),
                            pid: process.pid,
                            timeout,
                        });
                    }
                    POLL_INTERVAL.min(deadline - now)
                }
                None => POLL_INTERVAL,
            };
            sleep(pause);
        }
    }

    /// SIGKILLs the child and reaps it. Already exited children are left
    /// alone. A failed liveness check does not prevent the kill.
    pub fn force_kill(&self, process: &mut SupervisedProcess) -> Result<()> {
        process.stdin.take();
        match process.poll() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(pid = process.pid, error = %err, "poll failed, killing anyway");
            }
        }

        tracing::warn!(pid = process.pid, "force killing child");
        match kill(Pid::from_raw(process.pid as i32), Signal::SIGKILL) {
            // Exited between the poll and the signal.
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(errno) => {
                return Err(Error::io(format!("killing pid {}", process.pid), errno.into()));
            }
        }

        match process.child.wait() {
            Ok(status) => process.status = Some(status),
            // Reaped elsewhere; nothing left to collect.
            Err(e) if e.raw_os_error() == Some(Errno::ECHILD as i32) => {
                tracing::warn!(pid = process.pid, "child already reaped");
            }
            Err(e) => return Err(Error::io(format!("reaping pid {}", process.pid), e)),
        }
        self.diary.push_line(&format!(
            "process '{}' killed (PID={})",
            process.program, process.pid
        ));
        Ok(())
    }

    /// Kills and reaps the child after `primary` stopped the run. Errors from
    /// the cleanup are attached to the returned failure.
    pub fn abort(&self, process: &mut SupervisedProcess, primary: Error) -> Failure {
        let mut failure = Failure::new(primary);
        if let Err(err) = self.force_kill(process) {
            failure.suppress(err);
        }
        failure
    }

    /// Closes input, waits up to `timeout`, and kills the child if the wait
    /// fails for any reason.
    pub fn wait_or_kill(
        &self,
        process: &mut SupervisedProcess,
        timeout: Duration,
    ) -> std::result::Result<ExitStatus, Failure> {
        self.close_input(process);
        self.await_exit(process, timeout)
            .map_err(|err| self.abort(process, err))
    }

    fn report_exit(&self, process: &SupervisedProcess, status: ExitStatus) {
        let line = match status.code() {
            Some(0) => format!("{} exited with exit code 0", process.program),
            Some(code) => format!("{} exited with nonzero exit code: {}", process.program, code),
            None => format!("{} terminated without exit code: {}", process.program, status),
        };
        self.diary.push_line(&line);
    }
}

/// Last path component, for log lines.
pub fn program_name(program: &str) -> String {
    program.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(program).to_string()
}

fn quoted(argv: &[String]) -> String {
    argv.iter().map(|a| format!("\"{}\"", a)).collect::<Vec<_>>().join(" ")
}
