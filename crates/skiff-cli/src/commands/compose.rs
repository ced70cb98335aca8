//! Compose command - resolve every import of a package definition

use std::path::Path;
use std::sync::Arc;

use skiff_core::{DEFINITION_FILE, SkiffConfig, SkiffPackage, filters};
use skiff_packager::{PreparedPackage, ResolutionContext, prepare_package};

use crate::display;
use crate::error::{CliError, Result};
use crate::util::skeleton_connector;

/// Read the definition in `dir` and build the context to resolve it in
pub fn load(
    config: &SkiffConfig,
    dir: &Path,
    flavor: &str,
    plain_http: bool,
) -> Result<(SkiffPackage, ResolutionContext)> {
    let definition = dir.join(DEFINITION_FILE);
    if !definition.is_file() {
        return Err(CliError::input(format!(
            "{} does not contain a {DEFINITION_FILE}",
            dir.display()
        )));
    }
    let pkg = SkiffPackage::from_file(&definition)?;
    let ctx = ResolutionContext::new(dir, config, Arc::new(skeleton_connector(plain_http)))
        .with_flavor(flavor);
    Ok((pkg, ctx))
}

/// Print or write a prepared definition
pub fn emit(prepared: &PreparedPackage, output: Option<&Path>) -> Result<()> {
    display::print_warnings(&prepared.warnings);
    match output {
        Some(path) => {
            prepared.package.write_to(path)?;
            display::print_written("Wrote", path);
        }
        None => {
            let yaml = serde_yaml::to_string(&prepared.package)
                .map_err(|e| CliError::internal(format!("failed to render definition: {e}")))?;
            print!("{yaml}");
        }
    }
    Ok(())
}

pub async fn run(
    config: &SkiffConfig,
    dir: &Path,
    flavor: &str,
    components: &str,
    output: Option<&Path>,
    plain_http: bool,
) -> Result<()> {
    let (pkg, ctx) = load(config, dir, flavor, plain_http)?;
    let filter = filters::by_select_state(components);
    let prepared = prepare_package(pkg, &ctx, filter.as_ref(), None).await?;
    emit(&prepared, output)
}
