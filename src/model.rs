//! Typed records owned by the reservation backend.
//!
//! Field names follow the backend's JSON (camelCase, with the `UserLevel` and
//! `StudentInformation` relations capitalised as the backend sends them).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Registry,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Registry => "REGISTRY",
            Role::Student => "STUDENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::NonBinary];

    /// Form label: `male`, `female`, `non-binary`.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::NonBinary => "non-binary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Declined,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Term {
    First,
    Second,
    Summer,
}

impl Term {
    pub const ALL: [Term; 3] = [Term::First, Term::Second, Term::Summer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Term::First => "FIRST",
            Term::Second => "SECOND",
            Term::Summer => "SUMMER",
        }
    }
}

/// Disabled flag as carried on the wire. Older backend revisions send
/// `enabled`; current ones send `isDisabled`. Output is always `isDisabled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DisabledRepr", into = "DisabledOut")]
pub struct DisabledFlag(pub bool);

#[derive(Deserialize)]
struct DisabledRepr {
    #[serde(rename = "isDisabled", default)]
    is_disabled: Option<bool>,
    #[serde(default)]
    enabled: Option<bool>,
}

#[derive(Serialize)]
struct DisabledOut {
    #[serde(rename = "isDisabled")]
    is_disabled: bool,
}

impl From<DisabledRepr> for DisabledFlag {
    fn from(r: DisabledRepr) -> Self {
        match (r.is_disabled, r.enabled) {
            (Some(d), _) => DisabledFlag(d),
            (None, Some(e)) => DisabledFlag(!e),
            (None, None) => DisabledFlag(false),
        }
    }
}

impl From<DisabledFlag> for DisabledOut {
    fn from(f: DisabledFlag) -> Self {
        DisabledOut { is_disabled: f.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLevel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInformation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub gender: Gender,
    pub address: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    pub user_id: String,
    pub department_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub status: ReservationStatus,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub student_information_id: Option<String>,
}

/// Identity record resolved from a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub disabled: DisabledFlag,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub user_level_id: Option<String>,
    #[serde(rename = "UserLevel", default)]
    pub user_level: Option<UserLevel>,
    #[serde(rename = "StudentInformation", default)]
    pub student_information: Option<StudentInformation>,
    #[serde(rename = "Reservation", default)]
    pub reservation: Option<Reservation>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        self.user_level.as_ref().map(|l| l.role)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.0
    }

    /// Best name for greeting: display name, then given name, then email.
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.given_name.as_deref())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub disabled: DisabledFlag,
    pub name: String,
    pub alias: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub disabled: DisabledFlag,
    pub name: String,
    pub alias: String,
    pub color: String,
    #[serde(default)]
    pub year_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub disabled: DisabledFlag,
    pub name: String,
    pub alias: String,
    pub lec_unit: u32,
    pub program_id: String,
    pub term: Term,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_with_level_and_profile() {
        let u: User = serde_json::from_value(json!({
            "id": "u1",
            "dateCreated": "2023-01-10T08:00:00Z",
            "lastUpdated": "2023-01-10T08:00:00Z",
            "isDisabled": false,
            "email": "ana@school.edu",
            "givenName": "Ana",
            "familyName": "Reyes",
            "UserLevel": { "id": "l1", "email": "ana@school.edu", "role": "REGISTRY" },
            "StudentInformation": null
        }))
        .unwrap();
        assert_eq!(u.role(), Some(Role::Registry));
        assert!(!u.is_disabled());
        assert!(u.student_information.is_none());
        assert_eq!(u.greeting_name(), "Ana");
        assert!(u.date_created.is_some());
    }

    #[test]
    fn legacy_enabled_field_is_inverted() {
        let p: Program = serde_json::from_value(json!({
            "id": "p1", "enabled": false, "name": "Computer Science", "alias": "BSCS",
            "color": "red-500", "yearCount": 4
        }))
        .unwrap();
        assert_eq!(p.disabled, DisabledFlag(true));

        let out = serde_json::to_value(&p).unwrap();
        assert_eq!(out["isDisabled"], json!(true));
        assert!(out.get("enabled").is_none());
    }

    #[test]
    fn is_disabled_wins_over_enabled() {
        let d: Department = serde_json::from_value(json!({
            "id": "d1", "isDisabled": false, "enabled": false,
            "name": "Engineering", "alias": "COE", "color": "slate-900"
        }))
        .unwrap();
        assert_eq!(d.disabled, DisabledFlag(false));
    }

    #[test]
    fn enum_wire_names() {
        assert_eq!(serde_json::to_value(Gender::NonBinary).unwrap(), json!("NON_BINARY"));
        assert_eq!(Gender::NonBinary.label(), "non-binary");
        assert_eq!(serde_json::to_value(ReservationStatus::Cancelled).unwrap(), json!("CANCELLED"));
        let t: Term = serde_json::from_value(json!("SUMMER")).unwrap();
        assert_eq!(t, Term::Summer);
        assert_eq!(Role::Admin.as_str(), "ADMIN");
    }
}
