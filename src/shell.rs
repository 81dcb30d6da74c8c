//! Role dispatch: which top-level view and which sidebar tabs a user gets.

use serde::Serialize;

use crate::model::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Departments,
    Programs,
    Courses,
    Students,
    Moderators,
    Reservations,
}

impl Tab {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "departments" => Some(Tab::Departments),
            "programs" => Some(Tab::Programs),
            "courses" => Some(Tab::Courses),
            "students" => Some(Tab::Students),
            "moderators" => Some(Tab::Moderators),
            "reservations" => Some(Tab::Reservations),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Departments => "departments",
            Tab::Programs => "programs",
            Tab::Courses => "courses",
            Tab::Students => "students",
            Tab::Moderators => "moderators",
            Tab::Reservations => "reservations",
        }
    }
}

const ADMIN_TABS: &[Tab] = &[Tab::Departments, Tab::Students, Tab::Moderators];
const REGISTRY_TABS: &[Tab] = &[Tab::Reservations, Tab::Students, Tab::Programs, Tab::Courses];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentView {
    /// No student profile yet.
    Onboarding,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shell {
    /// Account disabled; only sign-out is offered.
    Disabled,
    Admin { tabs: Vec<Tab> },
    Registry { tabs: Vec<Tab> },
    Student(StudentView),
    /// Signed in but holding no role.
    Forbidden,
}

impl Shell {
    pub fn for_user(user: &User) -> Self {
        if user.is_disabled() {
            return Shell::Disabled;
        }
        match user.role() {
            Some(Role::Admin) => Shell::Admin { tabs: ADMIN_TABS.to_vec() },
            Some(Role::Registry) => Shell::Registry { tabs: REGISTRY_TABS.to_vec() },
            Some(Role::Student) if user.student_information.is_none() => Shell::Student(StudentView::Onboarding),
            Some(Role::Student) => Shell::Student(StudentView::Dashboard),
            None => Shell::Forbidden,
        }
    }

    /// View name used in the page model.
    pub fn view(&self) -> &'static str {
        match self {
            Shell::Disabled => "disabled",
            Shell::Admin { .. } => "admin",
            Shell::Registry { .. } => "registry",
            Shell::Student(StudentView::Onboarding) => "onboarding",
            Shell::Student(StudentView::Dashboard) => "student",
            Shell::Forbidden => "forbidden",
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        match self {
            Shell::Admin { tabs } | Shell::Registry { tabs } => tabs,
            _ => &[],
        }
    }

    pub fn default_tab(&self) -> Option<Tab> {
        self.tabs().first().copied()
    }

    pub fn allows_tab(&self, tab: Tab) -> bool {
        self.tabs().contains(&tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(v: serde_json::Value) -> User {
        serde_json::from_value(v).unwrap()
    }

    fn with_role(role: &str) -> User {
        user(json!({
            "id": "u1", "email": "a@school.edu", "isDisabled": false,
            "UserLevel": { "id": "l1", "email": "a@school.edu", "role": role }
        }))
    }

    #[test]
    fn admin_and_registry_tabs() {
        let admin = Shell::for_user(&with_role("ADMIN"));
        assert_eq!(admin.view(), "admin");
        assert_eq!(admin.default_tab(), Some(Tab::Departments));
        assert!(admin.allows_tab(Tab::Moderators));
        assert!(!admin.allows_tab(Tab::Reservations));

        let registry = Shell::for_user(&with_role("REGISTRY"));
        assert_eq!(registry.default_tab(), Some(Tab::Reservations));
        assert!(registry.allows_tab(Tab::Courses));
        assert!(!registry.allows_tab(Tab::Moderators));
    }

    #[test]
    fn disabled_wins_over_role() {
        let mut u = with_role("ADMIN");
        u.disabled.0 = true;
        let shell = Shell::for_user(&u);
        assert_eq!(shell, Shell::Disabled);
        assert!(shell.tabs().is_empty());
    }

    #[test]
    fn legacy_enabled_false_is_disabled() {
        let u = user(json!({ "id": "u1", "email": "a@school.edu", "enabled": false }));
        assert_eq!(Shell::for_user(&u), Shell::Disabled);
    }

    #[test]
    fn student_onboards_until_profile_exists() {
        let mut u = with_role("STUDENT");
        assert_eq!(Shell::for_user(&u), Shell::Student(StudentView::Onboarding));
        u.student_information = Some(
            serde_json::from_value(json!({
                "id": "s1", "gender": "NON_BINARY", "address": "Main St",
                "userId": "u1", "departmentId": "d1"
            }))
            .unwrap(),
        );
        let shell = Shell::for_user(&u);
        assert_eq!(shell.view(), "student");
        assert_eq!(shell.default_tab(), None);
    }

    #[test]
    fn no_role_is_forbidden() {
        let u = user(json!({ "id": "u1", "email": "a@school.edu" }));
        assert_eq!(Shell::for_user(&u), Shell::Forbidden);
    }

    #[test]
    fn tab_names_round_trip() {
        for t in ADMIN_TABS.iter().chain(REGISTRY_TABS) {
            assert_eq!(Tab::parse(t.as_str()), Some(*t));
        }
        assert_eq!(Tab::parse("settings"), None);
    }
}
