//! Migrations for deprecated component fields
//!
//! Packages built by older releases may still carry `scripts`, single
//! `setVariable` actions or `group`. Each migration rewrites the component in
//! place and reports a warning; a migration already recorded in the package's
//! build data instead clears the deprecated field.

use crate::component::{Action, ActionDefaults, ActionVariable, Component};
use crate::package::BuildData;

/// `scripts` rewritten into `actions`
pub const SCRIPTS_TO_ACTIONS: &str = "scripts-to-actions";

/// `setVariable` rewritten into `setVariables`
pub const PLURALIZE_SET_VARIABLE: &str = "pluralize-set-variable";

/// Migrations every newly built package records as done
pub const ALL: [&str; 2] = [SCRIPTS_TO_ACTIONS, PLURALIZE_SET_VARIABLE];

/// Run every migration on `component`, returning accumulated warnings
pub fn migrate_component(build: &BuildData, component: &mut Component) -> Vec<String> {
    let mut warnings = Vec::new();
    let done = |id: &str| build.migrations.iter().any(|m| m == id);

    if done(SCRIPTS_TO_ACTIONS) {
        component.scripts = Default::default();
    } else if let Some(w) = scripts_to_actions(component) {
        warnings.push(w);
    }

    if done(PLURALIZE_SET_VARIABLE) {
        for list in component.actions.lists_mut() {
            for action in list.iter_mut() {
                action.set_variable.clear();
            }
        }
    } else if let Some(w) = pluralize_set_variable(component) {
        warnings.push(w);
    }

    if !component.group.is_empty() {
        warnings.push(format!(
            "Component {} is using group which has been deprecated and will be removed in v1.0.0. Please migrate to another solution.",
            component.name
        ));
    }

    warnings
}

fn scripts_to_actions(c: &mut Component) -> Option<String> {
    if !c.scripts.has_commands() {
        return None;
    }

    let defaults = ActionDefaults {
        mute: !c.scripts.show_output,
        max_total_seconds: c.scripts.timeout_seconds,
        max_retries: c.scripts.retry.then_some(i64::MAX),
        ..Default::default()
    };
    let to_actions = |cmds: &[String]| cmds.iter().map(Action::cmd).collect::<Vec<_>>();

    if !c.scripts.prepare.is_empty() {
        c.actions.on_create.defaults = defaults.clone();
        c.actions.on_create.before.extend(to_actions(&c.scripts.prepare));
    }
    if !c.scripts.before.is_empty() {
        c.actions.on_deploy.defaults = defaults.clone();
        c.actions.on_deploy.before.extend(to_actions(&c.scripts.before));
    }
    if !c.scripts.after.is_empty() {
        c.actions.on_deploy.defaults = defaults;
        c.actions.on_deploy.after.extend(to_actions(&c.scripts.after));
    }

    Some(format!(
        "Component '{}' is using scripts which will be removed in v1.0.0. Please migrate to actions.",
        c.name
    ))
}

fn pluralize_set_variable(c: &mut Component) -> Option<String> {
    let mut migrated = false;
    for list in c.actions.lists_mut() {
        for action in list.iter_mut() {
            if !action.set_variable.is_empty() && action.set_variables.is_empty() {
                action.set_variables = vec![ActionVariable {
                    name: action.set_variable.clone(),
                    ..Default::default()
                }];
                migrated = true;
            }
        }
    }

    migrated.then(|| {
        format!(
            "Component '{}' is using setVariable in actions which will be removed in v1.0.0. Please migrate to the list form of setVariables.",
            c.name
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted() -> Component {
        let mut c = Component::named("legacy");
        c.scripts.prepare = vec!["make".to_string()];
        c.scripts.before = vec!["echo before".to_string()];
        c.scripts.after = vec!["echo after".to_string()];
        c.scripts.retry = true;
        c.scripts.timeout_seconds = Some(60);
        c
    }

    #[test]
    fn test_scripts_become_actions() {
        let mut c = scripted();
        let warnings = migrate_component(&BuildData::default(), &mut c);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("using scripts"));
        assert_eq!(c.actions.on_create.before[0].cmd, "make");
        assert_eq!(c.actions.on_deploy.before[0].cmd, "echo before");
        assert_eq!(c.actions.on_deploy.after[0].cmd, "echo after");
        assert!(c.actions.on_deploy.defaults.mute);
        assert_eq!(c.actions.on_deploy.defaults.max_total_seconds, Some(60));
        assert_eq!(c.actions.on_deploy.defaults.max_retries, Some(i64::MAX));
    }

    #[test]
    fn test_recorded_migration_clears_scripts() {
        let mut c = scripted();
        let build = BuildData {
            migrations: ALL.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let warnings = migrate_component(&build, &mut c);

        assert!(warnings.is_empty());
        assert!(c.scripts.is_empty());
        assert!(c.actions.is_empty());
    }

    #[test]
    fn test_set_variable_pluralized() {
        let mut c = Component::named("vars");
        let mut action = Action::cmd("echo hi");
        action.set_variable = "GREETING".to_string();
        c.actions.on_remove.on_failure.push(action);

        let warnings = migrate_component(&BuildData::default(), &mut c);
        assert_eq!(warnings.len(), 1);
        let migrated = &c.actions.on_remove.on_failure[0];
        assert_eq!(migrated.set_variables[0].name, "GREETING");
    }

    #[test]
    fn test_group_warns() {
        let mut c = Component::named("grouped");
        c.group = "db".to_string();
        let warnings = migrate_component(&BuildData::default(), &mut c);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("group"));
    }
}
