//! `lockbox init`: create a new, empty store.

use crate::backend::BackendKind;
use crate::cli::output;
use crate::cli::{open_manager, prompt_new_password, Cli, PASSWORD_ENV};
use crate::errors::{LockboxError, Result};
use crate::manager::ManagerState;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let manager = open_manager(cli)?;

    // Refuse before prompting for a password.
    if manager.state() != ManagerState::Uninitialized {
        output::tip("Use `lockbox set` to add secrets to the existing store.");
        return Err(LockboxError::AlreadyInitialized(manager.path().to_path_buf()));
    }

    let password = match manager.backend() {
        BackendKind::Builtin => prompt_new_password(PASSWORD_ENV)?,
        BackendKind::Age | BackendKind::Gpg => Default::default(),
    };

    manager.initialize(&password)?;
    manager.lock()?;

    output::success(&format!(
        "Store created at {} ({} backend)",
        manager.path().display(),
        manager.backend()
    ));
    output::tip("Run `lockbox set <NAME>` to add a secret.");

    Ok(())
}
