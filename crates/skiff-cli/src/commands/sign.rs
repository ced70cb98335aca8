//! Sign command - sign a package directory with minisign

use console::style;
use std::path::Path;

use skiff_core::signing;

use crate::error::{CliError, Result};
use crate::util::open_layout;

pub fn run(dir: &Path, key_path: Option<&Path>) -> Result<()> {
    let key_path = key_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| signing::default_key_dir().join("skiff.key"));

    if !key_path.exists() {
        return Err(CliError::input_with_help(
            format!("Secret key not found at {}", key_path.display()),
            "run 'skiff keygen' to generate keys",
        ));
    }

    let mut paths = open_layout(dir)?;
    if !paths.checksums.is_file() {
        return Err(CliError::input_with_help(
            format!("{} has no checksums.txt", dir.display()),
            "run 'skiff package checksums' first",
        ));
    }

    let password = if signing::is_encrypted(&key_path)? {
        Some(rpassword::prompt_password("Enter key password: ")?)
    } else {
        None
    };
    let sk = signing::load_secret_key(&key_path, password)?;

    eprintln!("{} {}...", style("Signing").cyan().bold(), dir.display());
    paths.sign_package(&sk)?;

    if let Some(signature) = &paths.signature {
        eprintln!("  {} {}", style("Signature").green().bold(), signature.display());
    }
    Ok(())
}
