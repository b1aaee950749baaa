//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::backend::BackendKind;
use crate::config::Settings;
use crate::errors::{LockboxError, Result};
use crate::manager::SecretsManager;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable holding the master password.
pub const PASSWORD_ENV: &str = "LOCKBOX_PASSWORD";

/// Environment variable holding the replacement password for `passwd`.
pub const NEW_PASSWORD_ENV: &str = "LOCKBOX_NEW_PASSWORD";

/// Lockbox CLI: encrypted secrets store.
#[derive(Parser)]
#[command(name = "lockbox", about = "Encrypted secrets store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.lockbox/lockbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store file or directory, overriding the config file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty store
    Init,

    /// Set a secret (add or update)
    Set {
        /// Secret name (e.g. github_token)
        name: String,
        /// Secret value (omit to read stdin or prompt)
        value: Option<String>,
    },

    /// Print a secret's value
    Get {
        /// Secret name
        name: String,
    },

    /// List secret names
    List,

    /// Delete a secret
    Delete {
        /// Secret name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change the store's master password
    Passwd,

    /// Pull remote changes into the store's git repository
    Sync,

    /// Push committed changes to the git remote
    Push,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load settings from `--config`, or `~/.lockbox/lockbox.toml`, then
/// apply `--store`.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_file(path)?,
        None => Settings::load(&Settings::default_dir()?)?,
    };
    if let Some(store) = &cli.store {
        settings.store_path = Some(store.clone());
    }
    Ok(settings)
}

/// Build a manager for the configured store.
pub fn open_manager(cli: &Cli) -> Result<SecretsManager> {
    let settings = load_settings(cli)?;
    SecretsManager::open(settings.store_config()?)
}

/// Open and unlock the store, run `f`, then lock again whatever `f` returned.
pub fn with_unlocked<T>(cli: &Cli, f: impl FnOnce(&SecretsManager) -> Result<T>) -> Result<T> {
    let manager = open_manager(cli)?;
    let password = password_for(&manager)?;

    let report = manager.unlock(&password)?;
    for name in &report.skipped {
        output::warning(&format!("Secret '{name}' could not be decrypted and was skipped"));
    }

    let result = f(&manager);
    manager.lock()?;
    result
}

/// The master password, or an empty one for backends that do not use it.
pub fn password_for(manager: &SecretsManager) -> Result<Zeroizing<String>> {
    match manager.backend() {
        BackendKind::Builtin => prompt_password(),
        BackendKind::Age | BackendKind::Gpg => Ok(Zeroizing::new(String::new())),
    }
}

/// Get the store password, trying in order:
/// 1. `LOCKBOX_PASSWORD` environment variable
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter store password")
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation (used by `init` and `passwd`).
///
/// Respects `env_var` for scripted/CI usage and enforces a minimum length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(env_var) {
        check_password_len(&pw)?;
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose store password")
            .with_confirmation(
                "Confirm store password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("password prompt: {e}")))?;

        let password = Zeroizing::new(password);
        if check_password_len(&password).is_err() {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(password);
    }
}

fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn check_password_len(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LockboxError::CommandFailed(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
