//! `lockbox list`: print the names of all secrets.

use crate::cli::output;
use crate::cli::{with_unlocked, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let names = with_unlocked(cli, |manager| manager.list())?;
    output::print_names(&names);
    Ok(())
}
