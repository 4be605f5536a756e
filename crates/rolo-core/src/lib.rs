//! Core types and trait seams for the rolo address-book engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends ([`store::ContactStore`], [`store::IndexStore`]) and the
//! engines in `rolo-engine` build on top of it.

pub mod contact;
pub mod error;
pub mod fuzzy;
pub mod property;
pub mod store;
pub mod token;

pub use error::{Error, Result};
