//! The line protocol spoken over a child's stdin.
//!
//! One command per line, no state between lines:
//!
//! * `echo <text>` writes `<text>` to stdout,
//! * `echo <text>>&2` writes `<text>` to stderr,
//! * anything else writes `unknown command: <line>` to stderr.
//!
//! End of input ends the loop.

use std::fmt;
use std::io::{self, BufRead, Write};

pub const STDERR_SUFFIX: &str = ">&2";
pub const ECHO_PREFIX: &str = "echo ";
pub const GREETING: &str = "fake shell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Echo { text: String, stream: Stream },
    Unknown(String),
}

impl Command {
    pub fn echo(text: impl Into<String>, stream: Stream) -> Self {
        Command::Echo { text: text.into(), stream }
    }

    /// Parses one line, with or without its terminator.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        let (command, stream) = match line.strip_suffix(STDERR_SUFFIX) {
            Some(command) => (command, Stream::Stderr),
            None => (line, Stream::Stdout),
        };
        match command.strip_prefix(ECHO_PREFIX) {
            Some(text) => Command::echo(text, stream),
            None => Command::Unknown(command.to_string()),
        }
    }
}

/// Renders the wire form, without line terminator.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Echo { text, stream: Stream::Stdout } => write!(f, "{}{}", ECHO_PREFIX, text),
            Command::Echo { text, stream: Stream::Stderr } => {
                write!(f, "{}{}{}", ECHO_PREFIX, text, STDERR_SUFFIX)
            }
            Command::Unknown(command) => f.write_str(command),
        }
    }
}

/// Runs one command against the given streams.
pub fn execute<O: Write, E: Write>(command: &Command, out: &mut O, err: &mut E) -> io::Result<()> {
    match command {
        Command::Echo { text, stream: Stream::Stdout } => {
            writeln!(out, "{}", text)?;
            out.flush()
        }
        Command::Echo { text, stream: Stream::Stderr } => {
            writeln!(err, "{}", text)?;
            err.flush()
        }
        Command::Unknown(command) => {
            writeln!(err, "unknown command: {}", command)?;
            err.flush()
        }
    }
}

/// Reads commands until end of input. Returns the number of lines handled.
pub fn serve<R: BufRead, O: Write, E: Write>(
    input: R,
    out: &mut O,
    err: &mut E,
) -> io::Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        execute(&Command::parse(&line), out, err)?;
        handled += 1;
    }
    Ok(handled)
}

/// Child side of the protocol on the real stdio: greet, then serve until EOF.
pub fn fakeshell() -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    writeln!(out, "{}", GREETING)?;
    out.flush()?;
    serve(stdin.lock(), &mut out, &mut err)?;
    Ok(())
}
