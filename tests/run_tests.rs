use std::fs;
use std::path::Path;
use std::time::Duration;

use forklog::control::{Command, Stream};
use forklog::diary::MemoryDiary;
use forklog::fd::{extract, RedirectSpec};
use forklog::rotate::rotate;
use forklog::supervisor::Supervisor;
use forklog::{run, Config, Error};
use tempfile::TempDir;

fn fakeshell_config(dir: &TempDir) -> Config {
    Config {
        log_dir: dir.path().join("log"),
        cmd: vec![env!("CARGO_BIN_EXE_fakeshell").to_string()],
        command_delay_ms: 50,
        ..Config::default()
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn log_is_named_after_the_child_pid() {
    let dir = TempDir::new().unwrap();
    let config = fakeshell_config(&dir);
    let diary = MemoryDiary::new();

    let report = run(&config, &diary).unwrap();

    assert_eq!(report.exit_status.code(), Some(0));
    assert_eq!(file_names(&config.log_dir), vec![format!("forked-{}.log", report.pid)]);
    assert!(diary.contains(&format!("process 'fakeshell' started (PID={})", report.pid)));
    assert!(diary.contains(&format!("forked-{}.log", report.pid)));
    assert!(diary.contains("fakeshell exited with exit code 0"));

    let text = fs::read_to_string(&report.log_path).unwrap();
    assert_eq!(
        text,
        format!(
            "{}\nfake shell\nthis should go to stdout\nthis should go to stderr\n",
            forklog::config::DEFAULT_BANNER
        )
    );
}

#[test]
fn unknown_commands_are_logged_in_order() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        banner: String::new(),
        commands: vec![
            Command::echo("one", Stream::Stdout).to_string(),
            "ls -la".to_string(),
            Command::echo("", Stream::Stderr).to_string(),
            Command::echo("two", Stream::Stdout).to_string(),
        ],
        ..fakeshell_config(&dir)
    };
    let report = run(&config, &MemoryDiary::new()).unwrap();
    assert_eq!(
        fs::read_to_string(&report.log_path).unwrap(),
        "fake shell\none\nunknown command: ls -la\n\ntwo\n"
    );
}

#[test]
fn rename_between_child_writes_loses_nothing() {
    let dir = TempDir::new().unwrap();
    let initial = dir.path().join(".forked-manual.log");
    let log = fs::File::create(&initial).unwrap();
    let diary = MemoryDiary::new();
    let supervisor = Supervisor::new(&diary);

    let spec = RedirectSpec::from_fd(extract(&log).unwrap()).unwrap();
    let mut process = supervisor
        .start(&[env!("CARGO_BIN_EXE_fakeshell").to_string()], &spec)
        .unwrap();
    drop(log);

    supervisor.write_command(&mut process, "echo before rename").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let final_path = rotate(&initial, process.pid, &diary).unwrap();
    supervisor.write_command(&mut process, "echo after rename>&2").unwrap();
    supervisor.wait_or_kill(&mut process, Duration::from_secs(10)).unwrap();

    assert!(!initial.exists());
    assert_eq!(
        fs::read_to_string(final_path).unwrap(),
        "fake shell\nbefore rename\nafter rename\n"
    );
}

#[test]
fn short_timeout_kills_the_child() {
    let dir = TempDir::new().unwrap();
    let log = tempfile::tempfile_in(dir.path()).unwrap();
    let diary = MemoryDiary::new();
    let supervisor = Supervisor::new(&diary);
    let spec = RedirectSpec::from_fd(extract(&log).unwrap()).unwrap();

    let mut process = supervisor
        .start(&[env!("CARGO_BIN_EXE_fakeshell").to_string()], &spec)
        .unwrap();
    // Input left open, so the child never sees EOF.
    match supervisor.await_exit(&mut process, Duration::from_millis(100)) {
        Err(Error::ProcessTimeout { pid, .. }) => assert_eq!(pid, process.pid),
        other => panic!("unexpected: {:?}", other),
    }
    supervisor.force_kill(&mut process).unwrap();
    assert!(!process.is_alive().unwrap());
    // Second kill on a reaped child stays quiet.
    supervisor.force_kill(&mut process).unwrap();
}
