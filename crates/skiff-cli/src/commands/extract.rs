//! Extract command - load a package into a directory

use std::path::Path;

use skiff_core::{PackagePaths, SkiffConfig, filters};
use skiff_repo::new_source;

use super::SourceArgs;
use crate::display;
use crate::error::{CliError, Result};

pub async fn run(
    config: &SkiffConfig,
    args: &SourceArgs<'_>,
    components: &str,
    output: &Path,
) -> Result<()> {
    if output.exists() && std::fs::read_dir(output)?.next().is_some() {
        return Err(CliError::input_with_help(
            format!("{} is not empty", output.display()),
            "extract into a new or empty directory",
        ));
    }

    let source = new_source(args.options(config)?)?;
    let mut dst = PackagePaths::new(output);
    let filter = filters::by_select_state(components);

    let loaded = source.load_package(&mut dst, filter.as_ref(), true).await?;
    display::print_warnings(&loaded.warnings);
    display::print_package(&loaded.package);
    eprintln!();
    eprintln!("Extracted to {}", output.display());
    Ok(())
}
