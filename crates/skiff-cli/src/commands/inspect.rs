//! Inspect command - print a package definition without loading components

use std::path::Path;

use skiff_core::{PackagePaths, SkiffConfig};
use skiff_repo::new_source;

use super::SourceArgs;
use crate::display;
use crate::error::{CliError, Result};
use crate::util::scratch_dir;

pub async fn run(config: &SkiffConfig, args: &SourceArgs<'_>, sbom_out: Option<&Path>) -> Result<()> {
    let source = new_source(args.options(config)?)?;
    let scratch = scratch_dir(config)?;
    let mut dst = PackagePaths::new(scratch.path());

    let loaded = source
        .load_package_metadata(&mut dst, sbom_out.is_some(), true)
        .await?;
    display::print_warnings(&loaded.warnings);

    let yaml = serde_yaml::to_string(&loaded.package)
        .map_err(|e| CliError::internal(format!("failed to render definition: {e}")))?;
    print!("{yaml}");

    if let Some(out) = sbom_out {
        if dst.sboms.path.is_none() {
            display::print_warnings(&["This package does not contain SBOMs".to_string()]);
            return Ok(());
        }
        std::fs::create_dir_all(out)?;
        let written = dst.sboms.output_files(out, &loaded.package.metadata.name)?;
        eprintln!("SBOMs written to {}", written.display());
    }
    Ok(())
}
