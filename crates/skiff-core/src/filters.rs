//! Component filter strategies
//!
//! A filter reduces a package definition to the components that should be
//! loaded or deployed. Filters are applied identically at create time and at
//! load time, whatever the package source.

use glob::{MatchOptions, Pattern};

use crate::component::Component;
use crate::error::{CoreError, Result};
use crate::package::SkiffPackage;

/// Reduce a package definition to a list of components
pub trait ComponentFilter: Send + Sync {
    /// Type name reported when this filter fails inside a [`CombinedFilter`]
    fn kind(&self) -> &'static str;

    fn apply(&self, pkg: &SkiffPackage) -> Result<Vec<Component>>;
}

/// Identity filter
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFilter;

impl ComponentFilter for EmptyFilter {
    fn kind(&self) -> &'static str {
        "EmptyFilter"
    }

    fn apply(&self, pkg: &SkiffPackage) -> Result<Vec<Component>> {
        Ok(pkg.components.clone())
    }
}

/// Drop components pinned to a different local operating system
#[derive(Debug, Clone)]
pub struct LocalOsFilter {
    os: String,
}

impl ComponentFilter for LocalOsFilter {
    fn kind(&self) -> &'static str {
        "LocalOsFilter"
    }

    fn apply(&self, pkg: &SkiffPackage) -> Result<Vec<Component>> {
        if self.os.is_empty() {
            return Err(CoreError::LocalOsRequired);
        }
        Ok(pkg
            .components
            .iter()
            .filter(|c| c.only.local_os.is_empty() || c.only.local_os == self.os)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectState {
    Unknown,
    Included,
    Excluded,
}

/// Keep components selected by a comma separated list of globs.
///
/// Entries prefixed with `-` exclude. Exclusions are checked before inclusions,
/// so an excluded component stays out whatever the token order. An empty
/// request keeps everything.
#[derive(Debug, Clone)]
pub struct SelectStateFilter {
    requested: Vec<String>,
}

impl SelectStateFilter {
    fn is_partial(&self) -> bool {
        self.requested.first().is_some_and(|r| !r.is_empty())
    }

    fn state_of(&self, name: &str) -> SelectState {
        for request in &self.requested {
            if let Some(pattern) = request.strip_prefix('-') {
                if glob_match(pattern, name) {
                    return SelectState::Excluded;
                }
            }
        }
        for request in &self.requested {
            if glob_match(request, name) {
                return SelectState::Included;
            }
        }
        SelectState::Unknown
    }
}

impl ComponentFilter for SelectStateFilter {
    fn kind(&self) -> &'static str {
        "SelectStateFilter"
    }

    fn apply(&self, pkg: &SkiffPackage) -> Result<Vec<Component>> {
        if !self.is_partial() {
            return Ok(pkg.components.clone());
        }

        let mut selected = Vec::new();
        for component in &pkg.components {
            let state = self.state_of(&component.name);
            tracing::debug!(component = %component.name, ?state, "component selection");
            if state == SelectState::Included {
                selected.push(component.clone());
            }
        }
        Ok(selected)
    }
}

/// Apply filters in sequence, each over the previous stage's output
pub struct CombinedFilter {
    filters: Vec<Box<dyn ComponentFilter>>,
}

impl ComponentFilter for CombinedFilter {
    fn kind(&self) -> &'static str {
        "CombinedFilter"
    }

    fn apply(&self, pkg: &SkiffPackage) -> Result<Vec<Component>> {
        let mut stage = pkg.clone();
        for filter in &self.filters {
            stage.components = filter.apply(&stage).map_err(|e| CoreError::Filter {
                filter: filter.kind().to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(stage.components)
    }
}

/// Filter that keeps every component
pub fn empty() -> Box<dyn ComponentFilter> {
    Box::new(EmptyFilter)
}

/// Filter by `only.localOS`
pub fn by_local_os(os: impl Into<String>) -> Box<dyn ComponentFilter> {
    Box::new(LocalOsFilter { os: os.into() })
}

/// Filter by a `--components` style request string
pub fn by_select_state(requested: &str) -> Box<dyn ComponentFilter> {
    Box::new(SelectStateFilter {
        requested: split_requests(requested),
    })
}

pub fn combine(filters: Vec<Box<dyn ComponentFilter>>) -> Box<dyn ComponentFilter> {
    Box::new(CombinedFilter { filters })
}

/// Split a comma separated request list, trimming each entry
fn split_requests(requested: &str) -> Vec<String> {
    if requested.is_empty() {
        return Vec::new();
    }
    requested.split(',').map(|s| s.trim().to_string()).collect()
}

/// A malformed pattern matches nothing
fn glob_match(pattern: &str, name: &str) -> bool {
    let compiled = match Pattern::new(pattern) {
        Ok(compiled) => compiled,
        Err(e) => {
            tracing::debug!(pattern, error = %e, "ignoring malformed component selector");
            return false;
        }
    };
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    compiled.matches_with(name, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg_with(names: &[&str]) -> SkiffPackage {
        SkiffPackage {
            components: names.iter().map(|n| Component::named(*n)).collect(),
            ..Default::default()
        }
    }

    fn names(components: &[Component]) -> Vec<&str> {
        components.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let pkg = pkg_with(&["a", "b"]);
        assert_eq!(empty().apply(&pkg).unwrap(), pkg.components);
    }

    #[test]
    fn test_local_os_filter() {
        let mut pkg = pkg_with(&["any", "linux", "darwin"]);
        pkg.components[1].only.local_os = "linux".to_string();
        pkg.components[2].only.local_os = "darwin".to_string();

        let result = by_local_os("linux").apply(&pkg).unwrap();
        assert_eq!(names(&result), vec!["any", "linux"]);
    }

    #[test]
    fn test_local_os_required() {
        let pkg = pkg_with(&["a"]);
        let err = by_local_os("").apply(&pkg).unwrap_err();
        assert!(matches!(err, CoreError::LocalOsRequired));
    }

    #[test]
    fn test_select_state_empty_request_keeps_all() {
        let pkg = pkg_with(&["a", "b"]);
        assert_eq!(by_select_state("").apply(&pkg).unwrap().len(), 2);
    }

    #[test]
    fn test_select_state_globs() {
        let pkg = pkg_with(&["foo", "bar", "baz", "foobar"]);
        let result = by_select_state("ba*, foo").apply(&pkg).unwrap();
        assert_eq!(names(&result), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_exclusion_wins_regardless_of_order() {
        let pkg = pkg_with(&["foo", "bar", "baz"]);
        let a = by_select_state("ba*,-bar").apply(&pkg).unwrap();
        let b = by_select_state("-bar,ba*").apply(&pkg).unwrap();
        assert_eq!(names(&a), vec!["baz"]);
        assert_eq!(names(&b), vec!["baz"]);
    }

    #[test]
    fn test_only_exclusions_keep_nothing() {
        let pkg = pkg_with(&["foo", "bar"]);
        let result = by_select_state("-foo").apply(&pkg).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_malformed_selector_matches_nothing() {
        let pkg = pkg_with(&["foo", "bar"]);
        let result = by_select_state("[, bar").apply(&pkg).unwrap();
        assert_eq!(names(&result), vec!["bar"]);

        let result = by_select_state("*,-[").apply(&pkg).unwrap();
        assert_eq!(names(&result), vec!["foo", "bar"]);
    }

    #[test]
    fn test_combine_applies_in_sequence() {
        let pkg = pkg_with(&["foo", "bar", "baz", "foobar"]);
        let filter = combine(vec![
            by_select_state("*a*"),
            by_select_state("*bar, foo"),
            empty(),
        ]);
        let result = filter.apply(&pkg).unwrap();
        assert_eq!(names(&result), vec!["bar", "foobar"]);
    }

    #[test]
    fn test_combine_names_failing_filter() {
        let pkg = pkg_with(&["foo"]);
        let filter = combine(vec![empty(), by_local_os(""), by_select_state("[")]);
        let err = filter.apply(&pkg).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error applying filter LocalOsFilter: localOS is required"
        );
    }
}
