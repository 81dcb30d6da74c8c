pub mod error;
pub mod model;
pub mod resource;
pub mod client;
pub mod cache;
pub mod notify;
pub mod list_view;
pub mod modal;
pub mod screen;
pub mod session;
pub mod shell;
pub mod config;
pub mod server;
// Test scaffolding for this crate's unit and integration tests.
#[doc(hidden)]
pub mod fake;
