//! SQLite backend for the rolo contact and index stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements both
//! `ContactStore` and `IndexStore`.

mod encode;
mod index;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
