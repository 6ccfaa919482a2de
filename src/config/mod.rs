use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::control::{Command, Stream};
use crate::error::{Error, Result};

pub const FAKESHELL_ARG: &str = "fakeshell";
pub const DEFAULT_BANNER: &str =
    "This message was appended by the parent process; below is the output of the child process";

fn default_log_dir() -> PathBuf { PathBuf::from("target/log") }

fn default_banner() -> String { DEFAULT_BANNER.to_string() }

fn default_commands() -> Vec<String> {
    vec![
        Command::echo("this should go to stdout", Stream::Stdout).to_string(),
        Command::echo("this should go to stderr", Stream::Stderr).to_string(),
    ]
}

fn default_command_delay_ms() -> u64 { 5_000 }

fn default_timeout_secs() -> u64 { 10 }

fn default_true() -> bool { true }

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where the log file is created and renamed.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Child argv. Empty means this executable in fakeshell mode.
    #[serde(default = "Vec::default")]
    pub cmd: Vec<String>,

    /// First line of the log, written before the child starts. Empty means
    /// no banner.
    #[serde(default = "default_banner")]
    pub banner: String,

    /// Lines sent to the child, in order.
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// Pause after each command. Pacing only.
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Close the parent's log handle once the child has its own copy.
    #[serde(default = "default_true")]
    pub close_after_launch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_dir: default_log_dir(),
            cmd: Vec::new(),
            banner: default_banner(),
            commands: default_commands(),
            command_delay_ms: default_command_delay_ms(),
            timeout_secs: default_timeout_secs(),
            close_after_launch: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = std::fs::File::open(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let mut source = String::new();
        file.read_to_string(&mut source)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Config::from_toml_str(&source)
    }

    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    pub fn command_delay(&self) -> Duration { Duration::from_millis(self.command_delay_ms) }

    /// `cmd`, or this executable relaunched as the fakeshell.
    pub fn argv(&self) -> Result<Vec<String>> {
        if !self.cmd.is_empty() {
            return Ok(self.cmd.clone());
        }
        let exe = std::env::current_exe()
            .map_err(|e| Error::io("locating the current executable", e))?;
        Ok(vec![exe.to_string_lossy().into_owned(), FAKESHELL_ARG.to_string()])
    }
}
