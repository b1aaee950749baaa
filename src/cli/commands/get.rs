//! `lockbox get`: retrieve and print a single secret's value.

use std::io::{self, IsTerminal, Write};

use crate::cli::{with_unlocked, Cli};
use crate::errors::{LockboxError, Result};

/// Execute the `get` command.
///
/// The value is written to stdout byte for byte; a newline is added only
/// when stdout is a terminal.
pub fn execute(cli: &Cli, name: &str) -> Result<()> {
    let value = with_unlocked(cli, |manager| manager.retrieve(name))?;

    write_value(&value)
        .map_err(|e| LockboxError::CommandFailed(format!("writing stdout: {e}")))
}

fn write_value(value: &[u8]) -> io::Result<()> {
    let terminal = io::stdout().is_terminal();
    let mut out = io::stdout().lock();
    out.write_all(value)?;
    if terminal {
        out.write_all(b"\n")?;
    }
    out.flush()
}
