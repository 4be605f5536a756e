//! JSON REST API for rolo.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`rolo_core::store::ContactStore`] and [`rolo_core::store::IndexStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility; the
//! viewer is taken from headers a fronting proxy stamps (see [`viewer`]).

pub mod admin;
pub mod contacts;
pub mod error;
pub mod properties;
pub mod search;
pub mod viewer;

#[cfg(test)]
mod tests;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use rolo_core::store::{ContactStore, IndexStore};
use rolo_engine::{
  batch::BatchReindexer,
  birthdays::BirthdayFinder,
  indexer::IndexMaintainer,
  repair::RepairScan,
  search::SearchEngine,
  visibility::{VisibilityConfig, VisibilityEngine},
};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".into() }
const fn default_port() -> u16 { 8087 }
const fn default_cache_ttl_secs() -> u64 { 60 * 60 }
const fn default_link_depth() -> u8 { 1 }

/// Runtime server configuration, deserialised from `config.toml` and the
/// `ROLO_*` environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Visibility cache TTL, in seconds.
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,
  /// How many link hops the visibility engine follows.
  #[serde(default = "default_link_depth")]
  pub link_depth:     u8,
}

impl ServerConfig {
  pub fn visibility_config(&self) -> VisibilityConfig {
    VisibilityConfig {
      ttl: std::time::Duration::from_secs(self.cache_ttl_secs),
      link_depth: self.link_depth,
      ..VisibilityConfig::default()
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ContactStore + IndexStore> {
  pub store:      Arc<S>,
  pub visibility: Arc<VisibilityEngine<S>>,
  pub search:     Arc<SearchEngine<S>>,
  pub birthdays:  Arc<BirthdayFinder<S>>,
  pub maintainer: Arc<IndexMaintainer<S>>,
  pub batch:      Arc<BatchReindexer<S>>,
  pub repair:     Arc<RepairScan<S>>,
}

impl<S: ContactStore + IndexStore> AppState<S> {
  pub fn new(store: Arc<S>, visibility_config: VisibilityConfig) -> Self {
    let visibility = Arc::new(VisibilityEngine::with_config(
      store.clone(),
      visibility_config,
    ));
    Self {
      search:     Arc::new(SearchEngine::new(store.clone(), visibility.clone())),
      birthdays:  Arc::new(BirthdayFinder::new(store.clone(), visibility.clone())),
      maintainer: Arc::new(IndexMaintainer::new(store.clone())),
      batch:      Arc::new(BatchReindexer::new(store.clone())),
      repair:     Arc::new(RepairScan::new(store.clone())),
      visibility,
      store,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: ContactStore + IndexStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Contacts
    .route(
      "/contacts",
      get(contacts::list::<S>).post(contacts::create::<S>),
    )
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .route("/contacts/{id}/attic", post(contacts::set_attic::<S>))
    .route("/contacts/{id}/owner", post(contacts::set_owner::<S>))
    .route("/contacts/{id}/properties", get(contacts::properties::<S>))
    .route("/contacts/{id}/history", get(contacts::history::<S>))
    // Properties
    .route("/properties", post(properties::create::<S>))
    .route("/properties/{id}", get(properties::get_one::<S>))
    .route(
      "/properties/{id}/supersede",
      post(properties::supersede_one::<S>),
    )
    .route("/properties/{id}/attic", post(properties::set_attic::<S>))
    .route(
      "/properties/{id}/supersession",
      get(properties::supersession::<S>),
    )
    // Search
    .route("/search", get(search::query::<S>))
    .route("/search/page", get(search::next_page::<S>))
    .route("/complete", get(search::complete::<S>))
    .route("/birthdays", get(search::birthdays::<S>))
    // Admin
    .route("/admin/reindex", post(admin::reindex::<S>))
    .route("/admin/reindex/progress", get(admin::reindex_progress::<S>))
    .route("/admin/purge", post(admin::purge::<S>))
    .route("/admin/repair", post(admin::repair::<S>))
    .with_state(state)
}
