//! Display formatting for CLI output
//!
//! Human-oriented output goes to stderr so that definitions printed on stdout
//! can be piped.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use skiff_core::{Component, SkiffPackage};
use skiff_repo::{ProgressFn, PullProgress};

use crate::util::{format_size, truncate_hash};

/// Outcome of one verification step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Ok,
    Skip,
    Fail,
}

pub fn print_check(check: Check, message: &str) {
    let tag = match check {
        Check::Ok => style("[OK]").green().bold(),
        Check::Skip => style("[SKIP]").yellow().bold(),
        Check::Fail => style("[FAIL]").red().bold(),
    };
    eprintln!("  {} {}", tag, message);
}

pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", style("⚠").yellow().bold(), warning);
    }
}

/// Header and component table of a package
pub fn print_package(pkg: &SkiffPackage) {
    let version = if pkg.metadata.version.is_empty() {
        String::new()
    } else {
        format!(" {}", pkg.metadata.version)
    };
    eprintln!(
        "{} {}{}",
        style("Package").cyan().bold(),
        pkg.metadata.name,
        version
    );
    if !pkg.metadata.description.is_empty() {
        eprintln!("  {}", style(&pkg.metadata.description).dim());
    }
    eprintln!("  {}: {}", style("Architecture").dim(), pkg.architecture());
    if !pkg.metadata.aggregate_checksum.is_empty() {
        eprintln!(
            "  {}: sha256:{}...",
            style("Checksum").dim(),
            truncate_hash(&pkg.metadata.aggregate_checksum, 16)
        );
    }
    if pkg.build.differential {
        eprintln!(
            "  {}: against {}",
            style("Differential").dim(),
            pkg.build.differential_package_version
        );
    }

    eprintln!();
    eprintln!("{}:", style("Components").bold());
    for component in &pkg.components {
        eprintln!("  {:30} {}", component.name, component_flags(component));
    }
}

fn component_flags(component: &Component) -> String {
    let mut flags = Vec::new();
    if component.required.unwrap_or(false) {
        flags.push(style("required").green().to_string());
    } else if component.default {
        flags.push(style("default").cyan().to_string());
    }
    if !component.images.is_empty() {
        flags.push(format!("{} image(s)", component.images.len()));
    }
    if !component.repos.is_empty() {
        flags.push(format!("{} repo(s)", component.repos.len()));
    }
    if !component.charts.is_empty() {
        flags.push(format!("{} chart(s)", component.charts.len()));
    }
    if !component.only.local_os.is_empty() {
        flags.push(style(format!("{} only", component.only.local_os)).dim().to_string());
    }
    flags.join(", ")
}

/// A progress bar fed by layer pulls
pub fn pull_progress(label: &str) -> (ProgressBar, ProgressFn) {
    let bar = ProgressBar::new(0);
    let template = ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(template);
    bar.set_message(label.to_string());

    let handle = bar.clone();
    let report: ProgressFn = Arc::new(move |progress: PullProgress| {
        handle.set_length(progress.total);
        handle.set_position(progress.written.min(progress.total));
    });
    (bar, report)
}

/// One-line summary of a written file
pub fn print_written(label: &str, path: &std::path::Path) {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    eprintln!(
        "{} {} ({})",
        style(label).green().bold(),
        path.display(),
        format_size(size)
    );
}
