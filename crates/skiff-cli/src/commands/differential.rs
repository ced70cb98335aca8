//! Differential command - compose a package against a reference package

use std::path::Path;

use skiff_core::{SkiffConfig, filters};
use skiff_packager::{load_differential_data, prepare_package};
use skiff_repo::SourceOptions;

use super::compose;
use crate::error::Result;

pub async fn run(
    config: &SkiffConfig,
    dir: &Path,
    reference: &str,
    flavor: &str,
    output: Option<&Path>,
    plain_http: bool,
) -> Result<()> {
    let (pkg, ctx) = compose::load(config, dir, flavor, plain_http)?;

    let mut options = SourceOptions::from_config(config, reference)?;
    options.plain_http = plain_http;
    let data = load_differential_data(options).await?;
    tracing::info!(version = %data.version, "loaded reference package");

    let prepared = prepare_package(pkg, &ctx, filters::empty().as_ref(), Some(&data)).await?;
    compose::emit(&prepared, output)
}
