use std::io::Write;

use forklog::config::FAKESHELL_ARG;
use forklog::diary::{ConsoleDiary, Diary};
use forklog::{control, Config};
use tracing_subscriber::EnvFilter;

const INTRO: &[&str] = &[
    "This program will start a new process with output redirected to a temporary file, then, while \
     the process is still live, the temporary file will be renamed to contain the PID in its name.",
    "Redirecting native standard I/O helps troubleshoot when a log framework can't print \
     crash logs.",
    "",
];

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Child mode: stdout is the log file, keep diagnostics out of it.
    if args.first().map(String::as_str) == Some(FAKESHELL_ARG) {
        if let Err(err) = control::fakeshell() {
            eprintln!("fakeshell: {}", err);
            std::process::exit(1);
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match args.first() {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("forklog: {}", err);
            std::process::exit(2);
        }
    };

    let diary = ConsoleDiary::new();
    for line in INTRO {
        diary.push_line(line);
    }

    let report = match forklog::run(&config, &diary) {
        Ok(report) => report,
        Err(failure) => {
            eprintln!("forklog: {}", failure);
            std::process::exit(1);
        }
    };

    diary.push_line("Log file contents:");
    diary.push_line("==================");
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let copied = std::fs::File::open(&report.log_path)
        .and_then(|mut log| std::io::copy(&mut log, &mut out))
        .and_then(|_| out.flush());
    drop(out);
    if let Err(err) = copied {
        tracing::error!(
            path = %report.log_path.display(),
            error = %err,
            "failed to read final log"
        );
    }
    diary.push_line("==================");
}
