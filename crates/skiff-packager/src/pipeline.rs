//! Create-time preparation of a package definition
//!
//! Runs the definition through composition, filtering and, when a reference
//! package is given, differential pruning. The result is what gets written
//! into a new package layout.

use skiff_core::{ComponentFilter, SkiffPackage};

use crate::composer::{ResolutionContext, compose_components};
use crate::differential::{self, DifferentialData};
use crate::error::Result;

/// A definition ready to be laid out, with the warnings it produced
#[derive(Debug, Clone)]
pub struct PreparedPackage {
    pub package: SkiffPackage,
    pub warnings: Vec<String>,
}

/// Compose, filter and optionally diff `pkg`
pub async fn prepare_package(
    pkg: SkiffPackage,
    ctx: &ResolutionContext,
    filter: &dyn ComponentFilter,
    reference: Option<&DifferentialData>,
) -> Result<PreparedPackage> {
    let (mut pkg, warnings) = compose_components(pkg, ctx).await?;
    if !ctx.flavor.is_empty() {
        pkg.build.flavor = ctx.flavor.clone();
    }

    pkg.components = filter.apply(&pkg)?;
    tracing::debug!(components = pkg.components.len(), "filtered composed package");

    if let Some(data) = reference {
        pkg = differential::apply_differential(pkg, data)?;
    }

    Ok(PreparedPackage {
        package: pkg,
        warnings,
    })
}
