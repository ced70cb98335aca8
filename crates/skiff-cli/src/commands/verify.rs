//! Verify command - check package checksums and signature

use console::style;
use std::path::Path;

use skiff_core::SkiffConfig;
use skiff_repo::sources::{validate_integrity, validate_signature};

use crate::display::{self, Check};
use crate::error::Result;
use crate::util::open_layout;

pub fn run(config: &SkiffConfig, dir: &Path, key_path: Option<&Path>) -> Result<()> {
    let paths = open_layout(dir)?;
    let pkg = paths.read_definition()?;

    eprintln!("{} {}", style("Verifying").cyan().bold(), dir.display());
    eprintln!();
    eprintln!("{}:", style("Integrity check").bold());

    if let Err(e) = validate_integrity(&paths, &pkg.metadata.aggregate_checksum, false) {
        display::print_check(Check::Fail, &e.to_string());
        return Err(e.into());
    }
    display::print_check(Check::Ok, "All file checksums match");

    eprintln!();
    eprintln!("{}:", style("Signature check").bold());

    let signed = paths.signature.as_ref().is_some_and(|s| s.is_file());
    let key = key_path.or(config.public_key.as_deref());
    if !signed && key.is_none() {
        display::print_check(Check::Skip, "Package is not signed");
    } else {
        if let Err(e) = validate_signature(&paths, key) {
            display::print_check(Check::Fail, &e.to_string());
            return Err(e.into());
        }
        display::print_check(Check::Ok, "Signature valid");
    }

    eprintln!();
    eprintln!("{}", style("Package verified successfully.").green().bold());
    Ok(())
}
