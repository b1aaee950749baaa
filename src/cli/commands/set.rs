//! `lockbox set`: add or update a secret.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{with_unlocked, Cli};
use crate::errors::{LockboxError, Result};

/// Execute the `set` command.
pub fn execute(cli: &Cli, name: &str, value: Option<&str>) -> Result<()> {
    let secret_value = read_value(name, value)?;

    let (existed, total) = with_unlocked(cli, |manager| {
        let existed = manager.exists(name)?;
        manager.store(name, &secret_value)?;
        Ok((existed, manager.list()?.len()))
    })?;

    let verb = if existed { "updated" } else { "added" };
    output::success(&format!("Secret '{name}' {verb} ({total} total)"));

    Ok(())
}

/// Determine the secret value from one of three sources.
fn read_value(name: &str, value: Option<&str>) -> Result<Zeroizing<Vec<u8>>> {
    if let Some(v) = value {
        output::warning("Value provided on command line; it may appear in shell history.");
        return Ok(Zeroizing::new(v.as_bytes().to_vec()));
    }

    if !io::stdin().is_terminal() {
        // Piped input is stored byte for byte, minus one trailing newline.
        let mut buf = Zeroizing::new(Vec::new());
        io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| LockboxError::CommandFailed(format!("reading stdin: {e}")))?;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        return Ok(buf);
    }

    let entered = dialoguer::Password::new()
        .with_prompt(format!("Enter value for {name}"))
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("input prompt: {e}")))?;
    Ok(Zeroizing::new(entered.into_bytes()))
}
