//! Local-first data layer for tracking job applications: a key/value store,
//! typed repositories over it, a query engine for the application table and
//! the virtual window that renders it.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod query;
pub mod repository;
pub mod seed;
pub mod status;
pub mod store;
pub mod window;

pub use config::Config;
pub use error::{RecordError, StoreError};
pub use query::QueryEngine;
pub use store::Store;
pub use window::{VirtualWindow, WindowRange};
