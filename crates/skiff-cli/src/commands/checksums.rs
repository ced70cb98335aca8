//! Checksums command - regenerate checksums.txt and the aggregate checksum

use console::style;
use std::path::Path;

use skiff_core::layout::ALWAYS_PULL;

use crate::display;
use crate::error::Result;
use crate::util::open_layout;

pub fn run(dir: &Path) -> Result<()> {
    let paths = open_layout(dir)?;
    let mut pkg = paths.read_definition()?;

    let aggregate = paths.generate_checksums()?;
    pkg.metadata.aggregate_checksum = aggregate.clone();
    pkg.write_to(&paths.definition)?;

    if paths.signature.as_ref().is_some_and(|s| s.is_file()) {
        display::print_warnings(&[
            "The existing signature no longer matches, sign the package again".to_string(),
        ]);
    }

    eprintln!(
        "{} {} files",
        style("Checksummed").green().bold(),
        paths
            .files()
            .keys()
            .filter(|rel| !ALWAYS_PULL.contains(&rel.as_str()))
            .count()
    );
    println!("{aggregate}");
    Ok(())
}
