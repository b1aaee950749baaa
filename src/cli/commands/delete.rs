//! `lockbox delete`: remove a secret from the store.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{with_unlocked, Cli};
use crate::errors::{LockboxError, Result};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret '{name}'?"))
            .default(false)
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    with_unlocked(cli, |manager| manager.delete(name))?;
    output::success(&format!("Deleted secret '{name}'"));

    Ok(())
}
