//! Keygen command - generate signing keys

use console::style;
use std::path::Path;

use skiff_core::signing;

use crate::error::{CliError, Result};

pub fn run(output_dir: Option<&Path>, force: bool, no_password: bool) -> Result<()> {
    let key_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(signing::default_key_dir);

    let secret = key_dir.join("skiff.key");
    let public = key_dir.join("skiff.pub");
    if !force && (secret.exists() || public.exists()) {
        return Err(CliError::input_with_help(
            format!("Keys already exist at {}", key_dir.display()),
            "use --force to overwrite",
        ));
    }

    let password = if no_password {
        None
    } else {
        let password = rpassword::prompt_password(
            "Enter password to protect secret key (leave empty for no password): ",
        )?;
        if password.is_empty() {
            None
        } else {
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                return Err(CliError::input("Passwords do not match"));
            }
            Some(password)
        }
    };

    eprintln!("{}", style("Generating signing keys...").cyan().bold());
    let protected = password.is_some();
    let files = signing::generate_keypair(&key_dir, password)?;

    eprintln!("  {} {}", style("Secret key").green().bold(), files.secret.display());
    eprintln!("  {} {}", style("Public key").green().bold(), files.public.display());
    eprintln!();
    if protected {
        eprintln!("{}", style("Secret key is password-protected.").dim());
    } else {
        eprintln!("{}", style("Warning: Secret key is NOT password-protected.").yellow());
    }

    eprintln!();
    eprintln!("{}:", style("To sign a package").bold());
    eprintln!("  skiff package checksums <dir> && skiff package sign <dir> --key {}", files.secret.display());
    Ok(())
}
