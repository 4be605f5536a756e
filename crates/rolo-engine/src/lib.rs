//! The rolo engines: per-viewer visibility, search-index maintenance and
//! querying, batch reconciliation, and the repair scan.
//!
//! Everything here is generic over one store type implementing both
//! [`rolo_core::store::ContactStore`] and [`rolo_core::store::IndexStore`];
//! no engine holds authoritative state of its own. Caches are explicit,
//! TTL-bounded, and always safe to discard.

pub mod batch;
pub mod birthdays;
pub mod error;
pub mod indexer;
pub mod repair;
pub mod search;
pub mod visibility;

pub use error::{Error, Result};
