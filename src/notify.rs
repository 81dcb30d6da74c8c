//! Transient user notifications ("toasts").
//!
//! Screens push notices here; whatever renders the UI drains them. Every
//! notice is also logged so failures are visible server-side.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

#[derive(Clone, Default)]
pub struct Notifier {
    queue: Arc<Mutex<VecDeque<Notice>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "notify", %message, "success");
        self.queue.lock().push_back(Notice { level: Level::Success, message });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "notify", %message, "error");
        self.queue.lock().push_back(Notice { level: Level::Error, message });
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.queue.lock().drain(..).collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.queue.lock().back().cloned()
    }
}
