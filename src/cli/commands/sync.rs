//! `lockbox sync` and `lockbox push`: git synchronization.

use crate::cli::output;
use crate::cli::{open_manager, Cli};
use crate::errors::Result;

/// Execute the `sync` command (pull with rebase).
pub fn pull(cli: &Cli) -> Result<()> {
    let manager = open_manager(cli)?;
    manager.sync()?;
    output::success("Store synchronized with remote");
    Ok(())
}

/// Execute the `push` command.
pub fn push(cli: &Cli) -> Result<()> {
    let manager = open_manager(cli)?;
    manager.push()?;
    output::success("Store pushed to remote");
    Ok(())
}
