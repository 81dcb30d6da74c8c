//! Create / update / delete dialogs for one resource list.
//!
//! Exactly one dialog can be open. Opening another replaces the current one.
//! While any dialog is open the page holds a [`ScrollLock`]; it is released on
//! close, and also when the controller itself goes away.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::{CacheKey, ResourceCache};
use crate::client::ResourceClient;
use crate::notify::Notifier;
use crate::resource::{Resource, ResourceKind};

/// Page-wide scroll state shared by every dialog on the page.
#[derive(Clone, Default)]
pub struct BodyScroll {
    holders: Arc<AtomicUsize>,
}

impl BodyScroll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.holders.load(Ordering::SeqCst) > 0
    }

    pub fn acquire(&self) -> ScrollLock {
        self.holders.fetch_add(1, Ordering::SeqCst);
        ScrollLock { holders: self.holders.clone() }
    }
}

/// Scrolling stays disabled while at least one of these is alive.
pub struct ScrollLock {
    holders: Arc<AtomicUsize>,
}

impl Drop for ScrollLock {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Raw,
    Trim,
    TrimUpper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Choice(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub normalize: Normalize,
    pub kind: FieldKind,
    pub default: Option<String>,
}

impl FieldSpec {
    pub fn text(name: &str, label: &str) -> Self {
        Self { name: name.into(), label: label.into(), required: true, normalize: Normalize::Trim, kind: FieldKind::Text, default: None }
    }

    pub fn integer(name: &str, label: &str) -> Self {
        Self { kind: FieldKind::Integer, ..Self::text(name, label) }
    }

    pub fn choice(name: &str, label: &str, options: &[&str]) -> Self {
        Self {
            kind: FieldKind::Choice(options.iter().map(|s| s.to_string()).collect()),
            normalize: Normalize::Raw,
            ..Self::text(name, label)
        }
    }

    pub fn uppercase(mut self) -> Self {
        self.normalize = Normalize::TrimUpper;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSchema {
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Normalize and check a submitted form, producing the request fields.
    pub fn validate(&self, form: &Form) -> Result<Map<String, Value>, String> {
        let mut out = Map::new();
        for f in &self.fields {
            let raw = form.get(&f.name).or(f.default.as_deref()).unwrap_or("");
            let value = match f.normalize {
                Normalize::Raw => raw.to_string(),
                Normalize::Trim => raw.trim().to_string(),
                Normalize::TrimUpper => raw.trim().to_uppercase(),
            };
            if value.trim().is_empty() {
                if f.required {
                    return Err(format!("{} is required", f.label));
                }
                continue;
            }
            let json = match &f.kind {
                FieldKind::Text => Value::from(value),
                FieldKind::Integer => match value.trim().parse::<u64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => return Err(format!("{} must be a number", f.label)),
                },
                FieldKind::Choice(options) => {
                    if !options.is_empty() && !options.iter().any(|o| o == &value) {
                        return Err(format!("{} has an unsupported value", f.label));
                    }
                    Value::from(value)
                }
            };
            out.insert(f.name.clone(), json);
        }
        Ok(out)
    }
}

/// Raw values as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    values: BTreeMap<String, String>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    /// Copy the schema's fields out of an existing record.
    pub fn prefill(schema: &FormSchema, resource: &Resource) -> Self {
        let mut form = Form::new();
        for f in &schema.fields {
            let v = match resource.field(&f.name) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => other.to_string(),
            };
            form.values.insert(f.name.clone(), v);
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModalState {
    Closed,
    Create,
    Update(Resource),
    Delete(Resource),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    None,
    Create,
    Update,
    Delete,
}

impl ModalState {
    pub fn kind(&self) -> ModalKind {
        match self {
            ModalState::Closed => ModalKind::None,
            ModalState::Create => ModalKind::Create,
            ModalState::Update(_) => ModalKind::Update,
            ModalState::Delete(_) => ModalKind::Delete,
        }
    }

    pub fn payload(&self) -> Option<&Resource> {
        match self {
            ModalState::Update(r) | ModalState::Delete(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Backend accepted; dialog closed and list revalidated.
    Done,
    /// Local validation failed; nothing was sent.
    Invalid(String),
    /// Backend or transport refused; dialog stays open.
    Rejected(String),
    /// Another submission is still in flight.
    Busy,
    /// No dialog was open.
    Closed,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ModalController {
    kind: ResourceKind,
    schema: FormSchema,
    client: ResourceClient,
    cache: ResourceCache<Vec<Resource>>,
    notifier: Notifier,
    scroll: BodyScroll,
    state: Mutex<ModalState>,
    lock: Mutex<Option<ScrollLock>>,
    in_flight: AtomicBool,
}

impl ModalController {
    pub fn new(
        kind: ResourceKind,
        schema: FormSchema,
        client: ResourceClient,
        cache: ResourceCache<Vec<Resource>>,
        notifier: Notifier,
        scroll: BodyScroll,
    ) -> Self {
        Self {
            kind,
            schema,
            client,
            cache,
            notifier,
            scroll,
            state: Mutex::new(ModalState::Closed),
            lock: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ModalState {
        self.state.lock().clone()
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    fn open(&self, next: ModalState) {
        debug!(target: "modal", kind = %self.kind, modal = ?next.kind(), "open");
        *self.state.lock() = next;
        let mut lock = self.lock.lock();
        if lock.is_none() {
            *lock = Some(self.scroll.acquire());
        }
    }

    pub fn open_create(&self) {
        self.open(ModalState::Create);
    }

    pub fn open_update(&self, resource: Resource) {
        self.open(ModalState::Update(resource));
    }

    pub fn open_delete(&self, resource: Resource) {
        self.open(ModalState::Delete(resource));
    }

    pub fn cancel(&self) {
        *self.state.lock() = ModalState::Closed;
        self.lock.lock().take();
    }

    /// Values the open dialog starts with.
    pub fn initial_form(&self) -> Form {
        match &*self.state.lock() {
            ModalState::Update(r) => Form::prefill(&self.schema, r),
            _ => {
                let mut form = Form::new();
                for f in &self.schema.fields {
                    if let Some(d) = &f.default {
                        form = form.set(&f.name, d.clone());
                    }
                }
                form
            }
        }
    }

    /// Confirmation text for an open delete dialog.
    pub fn prompt(&self) -> Option<String> {
        match &*self.state.lock() {
            ModalState::Delete(r) => Some(format!("Are you sure you want to delete {}?", r.display_name())),
            _ => None,
        }
    }

    pub async fn confirm_delete(&self, list_key: &CacheKey) -> SubmitOutcome {
        self.submit(&Form::new(), list_key).await
    }

    /// Submit the open dialog. On success the dialog closes and `list_key`
    /// is revalidated; on failure it stays open.
    pub async fn submit(&self, form: &Form, list_key: &CacheKey) -> SubmitOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return SubmitOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);
        let submitted = self.state();

        let label = self.kind.label();
        let result = match &submitted {
            ModalState::Closed => return SubmitOutcome::Closed,
            ModalState::Create => {
                let fields = match self.schema.validate(form) {
                    Ok(f) => f,
                    Err(msg) => return self.invalid(msg),
                };
                let handle = display_of(&fields, self.kind);
                self.client.create(self.kind, fields).await.map(|_| format!("{} {} created!", label, handle))
            }
            ModalState::Update(r) => {
                let fields = match self.schema.validate(form) {
                    Ok(f) => f,
                    Err(msg) => return self.invalid(msg),
                };
                let handle = display_of(&fields, self.kind);
                let handle = if handle.is_empty() { r.display_key(self.kind).to_string() } else { handle };
                self.client.update(self.kind, &r.id, fields).await.map(|_| format!("{} {} updated!", label, handle))
            }
            ModalState::Delete(r) => {
                let handle = r.display_key(self.kind).to_string();
                self.client.delete(self.kind, &r.id).await.map(|_| format!("{} {} removed!", label, handle))
            }
        };

        match result {
            Ok(message) => {
                self.notifier.success(message);
                // Only close if the user has not opened another dialog meanwhile.
                if *self.state.lock() == submitted {
                    self.cancel();
                }
                self.cache.mutate(list_key).await;
                SubmitOutcome::Done
            }
            Err(err) => {
                let msg = err.user_message();
                self.notifier.error(msg.clone());
                SubmitOutcome::Rejected(msg)
            }
        }
    }

    fn invalid(&self, msg: String) -> SubmitOutcome {
        self.notifier.error(msg.clone());
        SubmitOutcome::Invalid(msg)
    }
}

fn display_of(fields: &Map<String, Value>, kind: ResourceKind) -> String {
    fields.get(kind.display_key()).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

#[cfg(test)]
#[path = "modal_tests.rs"]
mod modal_tests;
