//! One admin screen: a list of a resource kind plus its create/update/delete
//! dialogs, described declaratively.
//!
//! Every management page (departments, programs, courses, moderators,
//! students) is an instance of [`ResourceScreen`] built from a
//! [`ScreenBuilder`]; the definitions at the bottom of this module reproduce
//! the stock pages.

use serde::Serialize;
use serde_json::Value;

use crate::cache::ResourceCache;
use crate::client::ResourceClient;
use crate::error::ClientError;
use crate::list_view::{ListView, DEFAULT_PAGE_SIZE};
use crate::modal::{BodyScroll, FieldSpec, FormSchema, ModalController};
use crate::model::Term;
use crate::notify::Notifier;
use crate::resource::{ListParams, Operation, Resource, ResourceKind};

/// Colour tokens a department or program may carry.
pub struct Palette;

impl Palette {
    pub const DEFAULT: &'static str = "slate-900";
    pub const COLORS: [&'static str; 8] = [
        "slate-900",
        "red-500",
        "orange-500",
        "amber-500",
        "green-500",
        "blue-500",
        "purple-500",
        "pink-500",
    ];

    pub fn contains(color: &str) -> bool {
        Self::COLORS.contains(&color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub field: String,
    pub header: String,
}

/// Single-value list filter whose options come from another kind's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub label: String,
    pub source: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub id: String,
    pub label: String,
}

pub struct ScreenBuilder {
    kind: ResourceKind,
    title: String,
    columns: Vec<Column>,
    schema: FormSchema,
    filter: Option<FilterSpec>,
    page_size: u64,
}

impl ScreenBuilder {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            title: format!("{}s", kind.label()),
            columns: Vec::new(),
            schema: FormSchema::default(),
            filter: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn column(mut self, field: &str, header: &str) -> Self {
        self.columns.push(Column { field: field.into(), header: header.into() });
        self
    }

    pub fn form(mut self, schema: FormSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn filter(mut self, label: &str, source: ResourceKind) -> Self {
        self.filter = Some(FilterSpec { label: label.into(), source });
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn build(
        self,
        client: ResourceClient,
        cache: ResourceCache<Vec<Resource>>,
        notifier: Notifier,
        scroll: BodyScroll,
    ) -> ResourceScreen {
        let list = ListView::new(self.kind, client.clone(), cache.clone(), notifier.clone(), self.page_size);
        let modal = ModalController::new(self.kind, self.schema, client.clone(), cache, notifier, scroll);
        ResourceScreen { title: self.title, columns: self.columns, filter: self.filter, client, list, modal }
    }
}

pub struct ResourceScreen {
    title: String,
    columns: Vec<Column>,
    filter: Option<FilterSpec>,
    client: ResourceClient,
    list: ListView,
    modal: ModalController,
}

impl ResourceScreen {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> ResourceKind {
        self.list.kind()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn filter(&self) -> Option<&FilterSpec> {
        self.filter.as_ref()
    }

    pub fn list(&self) -> &ListView {
        &self.list
    }

    pub fn modal(&self) -> &ModalController {
        &self.modal
    }

    /// Whether the screen offers an "add" action at all.
    pub fn can_create(&self) -> bool {
        !self.modal.schema().is_empty() && self.kind().endpoint(Operation::Create).is_some()
    }

    pub fn can_update(&self) -> bool {
        !self.modal.schema().is_empty() && self.kind().endpoint(Operation::Update).is_some()
    }

    /// Rows of the current page rendered as display strings, one per column.
    pub fn table(&self) -> Vec<Vec<String>> {
        self.list
            .rows()
            .iter()
            .map(|row| self.columns.iter().map(|c| cell(row, &c.field)).collect())
            .collect()
    }

    /// Open the update dialog for a row on the current page.
    pub fn edit(&self, id: &str) -> bool {
        match self.list.rows().into_iter().find(|r| r.id == id) {
            Some(row) if self.can_update() => {
                self.modal.open_update(row);
                true
            }
            _ => false,
        }
    }

    /// Open the delete confirmation for a row on the current page.
    pub fn remove(&self, id: &str) -> bool {
        match self.list.rows().into_iter().find(|r| r.id == id) {
            Some(row) => {
                self.modal.open_delete(row);
                true
            }
            None => false,
        }
    }

    /// Choices for the list filter, read from the source kind.
    pub async fn filter_options(&self) -> Result<Vec<FilterOption>, ClientError> {
        let Some(spec) = &self.filter else { return Ok(Vec::new()) };
        let params = ListParams { skip: 0, take: 100, ..Default::default() };
        let rows = self.client.list(spec.source, &params).await?;
        Ok(rows
            .into_iter()
            .filter(|r| !r.is_disabled)
            .map(|r| FilterOption { label: r.display_name().to_string(), id: r.id })
            .collect())
    }
}

fn cell(row: &Resource, field: &str) -> String {
    if field == "isDisabled" {
        return if row.is_disabled { "Disabled".into() } else { "Enabled".into() };
    }
    match row.field(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn color_field() -> FieldSpec {
    FieldSpec::choice("color", "Color", &Palette::COLORS).default_value(Palette::DEFAULT)
}

pub fn departments() -> ScreenBuilder {
    ScreenBuilder::new(ResourceKind::Department)
        .column("alias", "Alias")
        .column("name", "Name")
        .column("isDisabled", "Status")
        .form(FormSchema::new(vec![
            FieldSpec::text("name", "Name"),
            FieldSpec::text("alias", "Alias").uppercase(),
            color_field(),
        ]))
}

pub fn programs() -> ScreenBuilder {
    ScreenBuilder::new(ResourceKind::Program)
        .column("alias", "Alias")
        .column("name", "Name")
        .column("yearCount", "Years")
        .column("isDisabled", "Status")
        .filter("Department", ResourceKind::Department)
        .form(FormSchema::new(vec![
            FieldSpec::text("name", "Name"),
            FieldSpec::text("alias", "Alias").uppercase(),
            FieldSpec::integer("yearCount", "Year count"),
            FieldSpec::text("departmentId", "Department").optional(),
            color_field(),
        ]))
}

pub fn courses() -> ScreenBuilder {
    let terms: Vec<&str> = Term::ALL.iter().map(|t| t.as_str()).collect();
    ScreenBuilder::new(ResourceKind::Course)
        .column("alias", "Code")
        .column("name", "Name")
        .column("lecUnit", "Units")
        .column("term", "Term")
        .column("isDisabled", "Status")
        .filter("Program", ResourceKind::Program)
        .form(FormSchema::new(vec![
            FieldSpec::text("name", "Name"),
            FieldSpec::text("alias", "Code").uppercase(),
            FieldSpec::integer("lecUnit", "Lecture units"),
            FieldSpec::text("programId", "Program"),
            FieldSpec::choice("term", "Term", &terms),
        ]))
}

pub fn moderators() -> ScreenBuilder {
    ScreenBuilder::new(ResourceKind::Moderator)
        .column("email", "Email")
        .column("isDisabled", "Status")
        .form(FormSchema::new(vec![FieldSpec::text("email", "Email")]))
}

/// Students register themselves; the screen only lists, toggles and removes.
pub fn students() -> ScreenBuilder {
    ScreenBuilder::new(ResourceKind::Student)
        .column("email", "Email")
        .column("displayName", "Name")
        .column("isDisabled", "Status")
        .filter("Program", ResourceKind::Program)
}

/// Stock definition for a kind.
pub fn builtin(kind: ResourceKind) -> ScreenBuilder {
    match kind {
        ResourceKind::Department => departments(),
        ResourceKind::Program => programs(),
        ResourceKind::Course => courses(),
        ResourceKind::Moderator => moderators(),
        ResourceKind::Student => students(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;
    use crate::modal::{Form, ModalKind, SubmitOutcome};

    fn build(kind: ResourceKind, backend: &std::sync::Arc<FakeBackend>) -> ResourceScreen {
        let client = ResourceClient::new(backend.clone()).with_token("tok");
        builtin(kind).build(client, ResourceCache::new(), Notifier::new(), BodyScroll::new())
    }

    #[test]
    fn palette_defaults_to_slate() {
        assert!(Palette::contains(Palette::DEFAULT));
        assert!(!Palette::contains("neon-500"));
        let form = departments().schema.validate(&Form::new().set("name", "Eng").set("alias", "coe")).unwrap();
        assert_eq!(form["color"], "slate-900");
    }

    #[test]
    fn students_screen_has_no_create_or_update() {
        let backend = FakeBackend::new();
        let s = build(ResourceKind::Student, &backend);
        assert!(!s.can_create());
        assert!(!s.can_update());
        assert_eq!(s.title(), "Students");
        assert!(build(ResourceKind::Department, &backend).can_create());
    }

    #[tokio::test]
    async fn table_renders_columns_and_status() {
        let backend = FakeBackend::new();
        let mut d = Resource::new("d1").with("name", "Engineering").with("alias", "COE");
        d.is_disabled = true;
        backend.seed("department", d);
        let s = build(ResourceKind::Department, &backend);
        s.list().load().await;
        assert_eq!(s.table(), vec![vec!["COE".to_string(), "Engineering".into(), "Disabled".into()]]);
    }

    #[tokio::test]
    async fn edit_and_remove_open_dialogs_for_known_rows() {
        let backend = FakeBackend::new();
        backend.seed("program", Resource::new("p1").with("name", "Computer Science").with("alias", "BSCS"));
        let s = build(ResourceKind::Program, &backend);
        s.list().load().await;
        assert!(!s.edit("nope"));
        assert!(s.edit("p1"));
        assert_eq!(s.modal().state().kind(), ModalKind::Update);
        assert!(s.remove("p1"));
        assert_eq!(s.modal().state().kind(), ModalKind::Delete);
        assert_eq!(s.modal().confirm_delete(&s.list().key()).await, SubmitOutcome::Done);
        assert!(s.list().rows().is_empty());
    }

    #[tokio::test]
    async fn filter_options_skip_disabled_sources() {
        let backend = FakeBackend::new();
        backend.seed("department", Resource::new("d1").with("name", "Engineering").with("alias", "COE"));
        let mut off = Resource::new("d2").with("name", "Closed").with("alias", "OLD");
        off.is_disabled = true;
        backend.seed("department", off);
        let s = build(ResourceKind::Program, &backend);
        let opts = s.filter_options().await.unwrap();
        assert_eq!(opts, vec![FilterOption { id: "d1".into(), label: "Engineering".into() }]);
        assert!(build(ResourceKind::Department, &backend).filter_options().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn moderator_screen_assigns_registry_role() {
        let backend = FakeBackend::new();
        let s = build(ResourceKind::Moderator, &backend);
        s.modal().open_create();
        let out = s.modal().submit(&Form::new().set("email", "reg@school.edu"), &s.list().key()).await;
        assert_eq!(out, SubmitOutcome::Done);
        let users = backend.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].field_str("role"), Some("REGISTRY"));
    }
}
