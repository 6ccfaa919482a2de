use std::io::Write;
use std::sync::Mutex;
use chrono::Local;

pub const DIARY_NAME: &str = "forklog";

/// Sink for the human-readable step log of a run.
///
/// Passed explicitly to every component that reports progress.
pub trait Diary {
    fn push_line(&self, line: &str);
}

pub fn format_line(name: &str, pid: u32, line: &str) -> String {
    format!("{} {}[{}]: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), name, pid, line)
}

/// Writes timestamped lines to the process's stdout.
#[derive(Debug)]
pub struct ConsoleDiary {
    pid: u32,
}

impl ConsoleDiary {
    pub fn new() -> Self {
        ConsoleDiary { pid: std::process::id() }
    }
}

impl Default for ConsoleDiary {
    fn default() -> Self { ConsoleDiary::new() }
}

impl Diary for ConsoleDiary {
    fn push_line(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // Console loss is not worth failing a run over.
        let _ = out.write_all(format_line(DIARY_NAME, self.pid, line).as_bytes());
        let _ = out.flush();
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryDiary {
    lines: Mutex<Vec<String>>,
}

impl MemoryDiary {
    pub fn new() -> Self { MemoryDiary::default() }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Diary for MemoryDiary {
    fn push_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
