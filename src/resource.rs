//! Generic view of a backend-managed entity and the endpoint table per kind.
//!
//! Departments, programs, courses, moderators and students are all handled by
//! the same list/mutate machinery; only the endpoints and the display key
//! differ.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::{DisabledFlag, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Department,
    Program,
    Course,
    Moderator,
    Student,
}

/// Backend operations a kind may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Toggle,
    Delete,
}

impl Operation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "list" => Some(Operation::List),
            "create" => Some(Operation::Create),
            "update" => Some(Operation::Update),
            "toggle" => Some(Operation::Toggle),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Department,
        ResourceKind::Program,
        ResourceKind::Course,
        ResourceKind::Moderator,
        ResourceKind::Student,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        ResourceKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Department => "department",
            ResourceKind::Program => "program",
            ResourceKind::Course => "course",
            ResourceKind::Moderator => "moderator",
            ResourceKind::Student => "student",
        }
    }

    /// Title-cased singular used in notifications ("Department BSIT created!").
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Department => "Department",
            ResourceKind::Program => "Program",
            ResourceKind::Course => "Course",
            ResourceKind::Moderator => "Moderator",
            ResourceKind::Student => "Student",
        }
    }

    /// Field shown as the record's short handle.
    pub fn display_key(&self) -> &'static str {
        match self {
            ResourceKind::Department | ResourceKind::Program | ResourceKind::Course => "alias",
            ResourceKind::Moderator | ResourceKind::Student => "email",
        }
    }

    /// Role the user listing is narrowed to, for kinds backed by `/user/*`.
    pub fn user_role(&self) -> Option<Role> {
        match self {
            ResourceKind::Moderator => Some(Role::Registry),
            ResourceKind::Student => Some(Role::Student),
            _ => None,
        }
    }

    /// Backend path for an operation, or `None` when the kind does not offer it.
    pub fn endpoint(&self, op: Operation) -> Option<&'static str> {
        use Operation::*;
        match (self, op) {
            (ResourceKind::Department, List) => Some("/department/list"),
            (ResourceKind::Department, Create) => Some("/department/create"),
            (ResourceKind::Department, Update) => Some("/department/update"),
            (ResourceKind::Department, Toggle) => Some("/department/toggle"),
            (ResourceKind::Department, Delete) => Some("/department/delete"),

            (ResourceKind::Program, List) => Some("/program/list"),
            (ResourceKind::Program, Create) => Some("/program/create"),
            (ResourceKind::Program, Update) => Some("/program/update"),
            (ResourceKind::Program, Toggle) => Some("/program/toggle"),
            (ResourceKind::Program, Delete) => Some("/program/delete"),

            (ResourceKind::Course, List) => Some("/course/list"),
            (ResourceKind::Course, Create) => Some("/course/create"),
            (ResourceKind::Course, Update) => Some("/course/update"),
            (ResourceKind::Course, Toggle) => Some("/course/toggle"),
            (ResourceKind::Course, Delete) => Some("/course/delete"),

            // Moderators are users holding the REGISTRY level.
            (ResourceKind::Moderator, List) => Some("/user/list"),
            (ResourceKind::Moderator, Create) | (ResourceKind::Moderator, Update) => Some("/user/set-role"),
            (ResourceKind::Moderator, Toggle) => Some("/user/toggle"),
            (ResourceKind::Moderator, Delete) => Some("/user/remove-role"),

            (ResourceKind::Student, List) => Some("/user/list"),
            (ResourceKind::Student, Toggle) => Some("/user/toggle"),
            (ResourceKind::Student, Delete) => Some("/student/delete"),
            (ResourceKind::Student, Create) | (ResourceKind::Student, Update) => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List request parameters. Every field participates in the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListParams {
    pub skip: u64,
    pub take: u64,
    pub keyword: Option<String>,
    pub filter_id: Option<String>,
}

impl ListParams {
    /// JSON body sent to a `/list` endpoint.
    pub fn body(&self, kind: ResourceKind) -> Value {
        let mut m = Map::new();
        m.insert("skip".into(), Value::from(self.skip));
        m.insert("take".into(), Value::from(self.take));
        if let Some(k) = self.keyword.as_deref().filter(|k| !k.is_empty()) {
            m.insert("keyword".into(), Value::from(k));
        }
        if let Some(id) = &self.filter_id {
            // Courses and students narrow by program; other kinds by department.
            let field = match kind {
                ResourceKind::Course | ResourceKind::Student => "programId",
                _ => "departmentId",
            };
            m.insert(field.into(), Value::from(id.as_str()));
        }
        if let Some(role) = kind.user_role() {
            m.insert("role".into(), Value::from(role.as_str()));
        }
        Value::Object(m)
    }
}

/// A record of any kind: stable id, disabled flag, and everything else as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub is_disabled: bool,
    pub fields: Map<String, Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), is_disabled: false, fields: Map::new() }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_field(name, value.into());
        self
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        match name {
            "id" => {
                if let Some(s) = value.as_str() { self.id = s.to_string(); }
            }
            "isDisabled" => self.is_disabled = value.as_bool().unwrap_or(self.is_disabled),
            "enabled" => self.is_disabled = !value.as_bool().unwrap_or(!self.is_disabled),
            _ => { self.fields.insert(name.to_string(), value); }
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    pub fn display_key(&self, kind: ResourceKind) -> &str {
        self.field_str(kind.display_key()).unwrap_or(&self.id)
    }

    /// Name used in confirmations: `name`, then `displayName`, then `email`.
    pub fn display_name(&self) -> &str {
        ["name", "displayName", "email"]
            .iter()
            .find_map(|k| self.field_str(k).filter(|s| !s.is_empty()))
            .unwrap_or(&self.id)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        let mut m = self.fields.clone();
        m.insert("id".into(), Value::from(self.id.as_str()));
        m.insert("isDisabled".into(), Value::from(self.is_disabled));
        Value::Object(m)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;
        let id = match map.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(D::Error::missing_field("id")),
        };
        let flag: DisabledFlag = serde_json::from_value(Value::Object(Map::from_iter(
            ["isDisabled", "enabled"]
                .iter()
                .filter_map(|k| map.remove(*k).map(|v| (k.to_string(), v))),
        )))
        .map_err(D::Error::custom)?;
        Ok(Resource { id, is_disabled: flag.0, fields: map })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_table_covers_student_gaps() {
        assert_eq!(ResourceKind::Student.endpoint(Operation::Create), None);
        assert_eq!(ResourceKind::Student.endpoint(Operation::Delete), Some("/student/delete"));
        assert_eq!(ResourceKind::Moderator.endpoint(Operation::Delete), Some("/user/remove-role"));
        assert_eq!(ResourceKind::Department.endpoint(Operation::Toggle), Some("/department/toggle"));
        assert_eq!(ResourceKind::parse("program"), Some(ResourceKind::Program));
        assert_eq!(ResourceKind::parse("reservation"), None);
    }

    #[test]
    fn resource_accepts_legacy_enabled_flag() {
        let r = Resource::from_value(json!({"id": "p1", "enabled": true, "alias": "BSIT", "name": "Info Tech"})).unwrap();
        assert!(!r.is_disabled);
        assert_eq!(r.display_key(ResourceKind::Program), "BSIT");
        assert_eq!(r.display_name(), "Info Tech");
        let out = r.to_value();
        assert_eq!(out["isDisabled"], json!(false));
        assert!(out.get("enabled").is_none());
    }

    #[test]
    fn resource_requires_id() {
        assert!(Resource::from_value(json!({"name": "x"})).is_err());
    }

    #[test]
    fn list_body_includes_every_parameter() {
        let p = ListParams { skip: 20, take: 20, keyword: Some("ana".into()), filter_id: Some("p1".into()) };
        let body = p.body(ResourceKind::Student);
        assert_eq!(body, json!({"skip": 20, "take": 20, "keyword": "ana", "programId": "p1", "role": "STUDENT"}));

        let empty_kw = ListParams { keyword: Some(String::new()), take: 20, ..Default::default() };
        assert!(empty_kw.body(ResourceKind::Department).get("keyword").is_none());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let r = Resource::new("u9").with("email", "mod@school.edu");
        assert_eq!(r.display_name(), "mod@school.edu");
        assert_eq!(r.display_key(ResourceKind::Moderator), "mod@school.edu");
    }
}
