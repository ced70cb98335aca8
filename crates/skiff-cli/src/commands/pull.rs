//! Pull command - download a registry package into a local archive

use std::path::Path;

use skiff_core::SkiffConfig;
use skiff_repo::{OciSource, PackageSource, SourceKind, identify};

use super::SourceArgs;
use crate::display;
use crate::error::{CliError, Result};

pub async fn run(config: &SkiffConfig, args: &SourceArgs<'_>, output: &Path) -> Result<()> {
    if identify(args.source) != Some(SourceKind::Oci) {
        return Err(CliError::input_with_help(
            format!("{} is not an OCI reference", args.source),
            "pull only works with oci:// references, for example oci://ghcr.io/acme/app:1.0.0",
        ));
    }

    let mut options = args.options(config)?;
    if let Some(shasum) = options.shasum.take().filter(|s| !s.is_empty()) {
        options.package_source = format!("{}@sha256:{}", options.package_source, shasum);
    }

    let (bar, progress) = display::pull_progress("Pulling");
    let source = OciSource::connect(options)?.with_progress(progress);
    let result = source.collect(output).await;
    bar.finish_and_clear();

    let archive = result?;
    display::print_written("Pulled", &archive);
    println!("{}", archive.display());
    Ok(())
}
