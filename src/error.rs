//! Error types shared by every stage of a run.
//!
//! `Error` is a single failure. `Failure` is what a run hands back once a
//! child has been launched: the error that stopped the run plus whatever went
//! wrong while killing and reaping the child afterwards.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream is not backed by an OS descriptor.
    #[error("stream of kind {kind} has no native descriptor")]
    UnsupportedHandleKind { kind: &'static str },

    /// The descriptor was already closed when the redirect was built.
    #[error("descriptor {fd} is not open: {source}")]
    InvalidDescriptor {
        fd: i32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("failed to launch '{program}': {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send command to pid {pid}: {source}")]
    WriteFailure {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("timeout waiting for the process: {program} (pid {pid}, waited {timeout:?})")]
    ProcessTimeout {
        program: String,
        pid: u32,
        timeout: Duration,
    },

    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    RenameFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

/// A primary error plus the errors hit while cleaning up after it.
///
/// Cleanup errors never replace the primary one.
#[derive(Debug)]
pub struct Failure {
    pub primary: Error,
    pub suppressed: Vec<Error>,
}

impl Failure {
    pub fn new(primary: Error) -> Self {
        Failure {
            primary,
            suppressed: Vec::new(),
        }
    }

    pub fn suppress(&mut self, err: Error) {
        self.suppressed.push(err);
    }

    pub fn with_suppressed(mut self, suppressed: impl IntoIterator<Item = Error>) -> Self {
        self.suppressed.extend(suppressed);
        self
    }
}

impl From<Error> for Failure {
    fn from(primary: Error) -> Self {
        Failure::new(primary)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        for err in &self.suppressed {
            write!(f, "\n  suppressed: {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}
