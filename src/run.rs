//! One full run: temp log, banner, launch with the log as stdout, rename,
//! commands, shutdown.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::thread::sleep;

use crate::config::Config;
use crate::diary::Diary;
use crate::error::{Error, Failure};
use crate::fd::{extract, RedirectSpec};
use crate::rotate::{absolute, rotate};
use crate::supervisor::{SupervisedProcess, Supervisor};

pub const INITIAL_PREFIX: &str = ".forked";

#[derive(Debug)]
pub struct RunReport {
    pub pid: u32,
    /// `forked-<pid>.log`, left on disk.
    pub log_path: PathBuf,
    pub exit_status: ExitStatus,
}

/// Creates an empty, uniquely named log file in `config.log_dir`.
pub fn create_log(config: &Config, diary: &dyn Diary) -> Result<(File, PathBuf), Error> {
    let dir = &config.log_dir;
    fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("creating log directory {}", dir.display()), e))?;
    let (file, path) = tempfile::Builder::new()
        .prefix(INITIAL_PREFIX)
        .suffix(crate::rotate::LOG_SUFFIX)
        .tempfile_in(dir)
        .and_then(|tmp| tmp.keep().map_err(|e| e.error))
        .map_err(|e| Error::io(format!("creating temp log in {}", dir.display()), e))?;
    diary.push_line(&format!("created tmp file: {}", absolute(&path).display()));
    Ok((file, path))
}

pub fn run(config: &Config, diary: &dyn Diary) -> Result<RunReport, Failure> {
    let argv = config.argv()?;
    let (mut log, initial_path) = create_log(config, diary)?;
    diary.push_line("opened tmp file for writing");

    if !config.banner.is_empty() {
        writeln!(log, "{}", config.banner)
            .and_then(|_| log.flush())
            .map_err(|e| Error::io("writing banner", e))?;
    }

    let supervisor = Supervisor::new(diary);
    let spec = RedirectSpec::from_fd(extract(&log)?)?;
    let mut process = supervisor.start(&argv, &spec)?;

    let log_path = rotate_or_abort(&supervisor, &mut process, &initial_path, diary)?;

    // The child holds its own duplicates from here on.
    let _held = if config.close_after_launch {
        drop(log);
        None
    } else {
        Some(log)
    };

    if let Err(err) = send_commands(&supervisor, &mut process, config) {
        return Err(supervisor.abort(&mut process, err));
    }
    let exit_status = supervisor.wait_or_kill(&mut process, config.timeout())?;

    Ok(RunReport { pid: process.pid, log_path, exit_status })
}

/// Renames the log for a live child. On failure the child is killed and
/// reaped, and the rename error stays the primary one.
pub fn rotate_or_abort(
    supervisor: &Supervisor<'_>,
    process: &mut SupervisedProcess,
    initial_path: &Path,
    diary: &dyn Diary,
) -> Result<PathBuf, Failure> {
    rotate(initial_path, process.pid, diary).map_err(|err| supervisor.abort(process, err))
}

fn send_commands(
    supervisor: &Supervisor<'_>,
    process: &mut SupervisedProcess,
    config: &Config,
) -> Result<(), Error> {
    let delay = config.command_delay();
    for command in &config.commands {
        supervisor.write_command(process, command)?;
        if !delay.is_zero() {
            sleep(delay);
        }
    }
    Ok(())
}
