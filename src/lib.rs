//! qTimer keeps named timers in a local SQLite database, mirrors projects
//! and tickets from a project-management service, and posts tracked time
//! back to it.

pub mod clock;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod source;
pub mod sync;
pub mod timers;
pub mod types;

pub use context::Core;
pub use error::{Error, Result};
