//! Paginated, filterable list of one resource kind, read through the cache.
//!
//! Row toggles are optimistic: the cached row flips at once, the backend call
//! follows, and the row is reconciled with the server's answer or restored to
//! its previous state on failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{fetcher, CacheKey, Fetcher, ResourceCache, Snapshot, Status};
use crate::client::ResourceClient;
use crate::notify::Notifier;
use crate::resource::{ListParams, Operation, Resource, ResourceKind};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Client-held list state. Every field is part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub offset: u64,
    pub page_size: u64,
    pub keyword: String,
    pub filter_id: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListQuery {
    pub fn new(page_size: u64) -> Self {
        Self { offset: 0, page_size: page_size.max(1), keyword: String::new(), filter_id: None }
    }

    /// Advance one page. There is no client-side upper bound.
    pub fn next(&mut self) {
        self.offset = self.offset.saturating_add(self.page_size);
    }

    /// Go back one page, never below zero.
    pub fn previous(&mut self) {
        self.offset = self.offset.saturating_sub(self.page_size);
    }

    /// Offset is left unchanged.
    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.keyword = keyword.into().trim().to_string();
    }

    /// Offset is left unchanged.
    pub fn set_filter(&mut self, filter_id: Option<String>) {
        self.filter_id = filter_id.filter(|f| !f.is_empty());
    }

    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }

    pub fn params(&self) -> ListParams {
        ListParams {
            skip: self.offset,
            take: self.page_size,
            keyword: (!self.keyword.is_empty()).then(|| self.keyword.clone()),
            filter_id: self.filter_id.clone(),
        }
    }

    pub fn cache_key(&self, kind: ResourceKind) -> CacheKey {
        let endpoint = kind.endpoint(Operation::List).unwrap_or("/list");
        // Moderators and students share /user/list, so the kind is part of the key.
        CacheKey::new(endpoint)
            .with("kind", kind)
            .with("skip", self.offset)
            .with("take", self.page_size)
            .with("keyword", &self.keyword)
            .with("filter", self.filter_id.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TogglePhase {
    /// Local flag flipped, request not yet sent.
    Applied,
    /// Request in flight.
    Pending,
    /// Server answered; local flag now mirrors the server.
    Confirmed,
    /// Request failed; local flag restored.
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowToggle {
    pub id: String,
    pub before: bool,
    pub shown: bool,
    pub phase: TogglePhase,
}

pub struct ListView {
    kind: ResourceKind,
    client: ResourceClient,
    cache: ResourceCache<Vec<Resource>>,
    notifier: Notifier,
    query: Mutex<ListQuery>,
    toggles: Mutex<HashMap<String, RowToggle>>,
    mounted: AtomicBool,
}

impl ListView {
    pub fn new(
        kind: ResourceKind,
        client: ResourceClient,
        cache: ResourceCache<Vec<Resource>>,
        notifier: Notifier,
        page_size: u64,
    ) -> Self {
        Self {
            kind,
            client,
            cache,
            notifier,
            query: Mutex::new(ListQuery::new(page_size)),
            toggles: Mutex::new(HashMap::new()),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn query(&self) -> ListQuery {
        self.query.lock().clone()
    }

    pub fn key(&self) -> CacheKey {
        self.query.lock().cache_key(self.kind)
    }

    pub fn cache(&self) -> &ResourceCache<Vec<Resource>> {
        &self.cache
    }

    fn list_fetcher(&self) -> Fetcher<Vec<Resource>> {
        let client = self.client.clone();
        let kind = self.kind;
        let params = self.query.lock().params();
        fetcher(move || {
            let client = client.clone();
            let params = params.clone();
            async move { client.list(kind, &params).await }
        })
    }

    /// Read the current key through the cache, fetching if nothing is loaded.
    pub async fn load(&self) -> Snapshot<Vec<Resource>> {
        let key = self.key();
        let snap = self.cache.use_resource(&key, self.list_fetcher()).await;
        self.report(&snap);
        snap
    }

    /// Revalidate the current key, keeping rows visible meanwhile.
    pub async fn refresh(&self) -> Snapshot<Vec<Resource>> {
        let key = self.key();
        if self.cache.peek(&key).status == Status::Idle {
            return self.load().await;
        }
        let snap = self.cache.mutate(&key).await;
        self.report(&snap);
        snap
    }

    fn report(&self, snap: &Snapshot<Vec<Resource>>) {
        if let (Status::Error, Some(err)) = (snap.status, &snap.error) {
            if self.is_mounted() {
                self.notifier.error(err.user_message());
            }
        }
    }

    pub fn rows(&self) -> Vec<Resource> {
        self.cache.peek(&self.key()).data.map(|d| d.as_ref().clone()).unwrap_or_default()
    }

    pub async fn next(&self) -> Snapshot<Vec<Resource>> {
        self.query.lock().next();
        self.load().await
    }

    pub async fn previous(&self) -> Snapshot<Vec<Resource>> {
        self.query.lock().previous();
        self.load().await
    }

    pub async fn set_keyword(&self, keyword: &str) -> Snapshot<Vec<Resource>> {
        self.query.lock().set_keyword(keyword);
        self.load().await
    }

    pub async fn set_filter(&self, filter_id: Option<String>) -> Snapshot<Vec<Resource>> {
        self.query.lock().set_filter(filter_id);
        self.load().await
    }

    pub async fn reset_offset(&self) -> Snapshot<Vec<Resource>> {
        self.query.lock().reset_offset();
        self.load().await
    }

    pub fn toggle_state(&self, id: &str) -> Option<RowToggle> {
        self.toggles.lock().get(id).cloned()
    }

    /// Flip a row's disabled flag optimistically. Returns the final phase, or
    /// `None` when the row is unknown or a toggle for it is still in flight.
    pub async fn toggle_row(&self, id: &str) -> Option<TogglePhase> {
        let key = self.key();
        let before = self.rows().iter().find(|r| r.id == id)?.is_disabled;
        {
            let mut toggles = self.toggles.lock();
            if toggles.get(id).map(|t| t.phase == TogglePhase::Pending || t.phase == TogglePhase::Applied).unwrap_or(false) {
                debug!(target: "list", id, "toggle already in flight");
                return None;
            }
            // Finished toggles are kept only until the next one starts.
            toggles.retain(|_, t| matches!(t.phase, TogglePhase::Applied | TogglePhase::Pending));
            toggles.insert(id.to_string(), RowToggle { id: id.to_string(), before, shown: !before, phase: TogglePhase::Applied });
        }
        self.patch_row(&key, id, !before);
        self.set_phase(id, !before, TogglePhase::Pending);

        let phase = match self.client.toggle(self.kind, id, !before).await {
            Ok(reply) => {
                self.patch_row(&key, id, reply.is_disabled);
                self.set_phase(id, reply.is_disabled, TogglePhase::Confirmed);
                self.cache.mutate(&key).await;
                TogglePhase::Confirmed
            }
            Err(err) => {
                self.patch_row(&key, id, before);
                self.set_phase(id, before, TogglePhase::RolledBack);
                if self.is_mounted() {
                    self.notifier.error(err.user_message());
                }
                TogglePhase::RolledBack
            }
        };
        Some(phase)
    }

    fn set_phase(&self, id: &str, shown: bool, phase: TogglePhase) {
        if !self.is_mounted() {
            return;
        }
        if let Some(t) = self.toggles.lock().get_mut(id) {
            t.shown = shown;
            t.phase = phase;
        }
    }

    fn patch_row(&self, key: &CacheKey, id: &str, is_disabled: bool) {
        let Some(data) = self.cache.peek(key).data else { return };
        let mut rows = data.as_ref().clone();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.is_disabled = is_disabled;
            self.cache.set_data(key, rows);
        }
    }

    /// Detach the view. Responses arriving afterwards no longer touch view
    /// state or raise notifications.
    pub fn dismiss(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "list_view_tests.rs"]
mod list_view_tests;
