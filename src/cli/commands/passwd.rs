//! `lockbox passwd`: change the store master password.
//!
//! The manager verifies the current password, derives a fresh salt and
//! key from the new one, re-encrypts every secret and writes the store
//! atomically.

use crate::backend::BackendKind;
use crate::cli::output;
use crate::cli::{open_manager, prompt_new_password, prompt_password, Cli, NEW_PASSWORD_ENV};
use crate::errors::{LockboxError, Result};

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let manager = open_manager(cli)?;

    if manager.backend() != BackendKind::Builtin {
        return Err(LockboxError::Unsupported(format!(
            "the {} backend has no master password",
            manager.backend()
        )));
    }

    output::info("Enter your current store password.");
    let old_password = prompt_password()?;

    output::info("Choose your new store password.");
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    let result = manager.change_password(&old_password, &new_password);
    manager.lock()?;
    result?;

    output::success(&format!(
        "Password changed for {}",
        manager.path().display()
    ));

    Ok(())
}
