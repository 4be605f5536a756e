//! The visibility engine — which contacts may a viewer see?
//!
//! A viewer sees the contacts they own plus the targets of their own
//! non-private links. The computed set is cached per viewer with a TTL;
//! the cache is derived, disposable state — a miss or an expired entry just
//! triggers a synchronous recompute.

use std::{
  collections::HashSet,
  num::NonZeroUsize,
  sync::{Mutex, MutexGuard, PoisonError},
  time::{Duration, Instant},
};

use lru::LruCache;
use uuid::Uuid;

use rolo_core::{contact::Viewer, property::Privacy, store::ContactStore};

use crate::{Error, Result};

// ─── Config ──────────────────────────────────────────────────────────────────

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// Tuning knobs for [`VisibilityEngine`]. All injected — no ambient state.
#[derive(Debug, Clone)]
pub struct VisibilityConfig {
  /// How long a computed set stays fresh.
  pub ttl:        Duration,
  /// Maximum number of cached viewer sets.
  pub capacity:   NonZeroUsize,
  /// How many link hops to follow from the viewer's own record. One hop is
  /// the canonical behavior; anything deeper is a product decision, never a
  /// default.
  pub link_depth: u8,
}

impl Default for VisibilityConfig {
  fn default() -> Self {
    Self {
      ttl:        Duration::from_secs(60 * 60),
      capacity:   DEFAULT_CAPACITY,
      link_depth: 1,
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

struct CachedSet {
  contacts:    HashSet<Uuid>,
  computed_at: Instant,
}

/// Computes and caches per-viewer visibility sets.
pub struct VisibilityEngine<S> {
  store:  std::sync::Arc<S>,
  config: VisibilityConfig,
  /// Keyed by (viewer, include_attic); the two flavors are invalidated
  /// together.
  cache:  Mutex<LruCache<(Uuid, bool), CachedSet>>,
}

impl<S: ContactStore> VisibilityEngine<S> {
  pub fn new(store: std::sync::Arc<S>) -> Self {
    Self::with_config(store, VisibilityConfig::default())
  }

  pub fn with_config(store: std::sync::Arc<S>, config: VisibilityConfig) -> Self {
    let cache = Mutex::new(LruCache::new(config.capacity));
    Self { store, config, cache }
  }

  fn lock(&self) -> MutexGuard<'_, LruCache<(Uuid, bool), CachedSet>> {
    // The cache holds no authoritative state; a poisoned entry is still
    // safe to reuse or overwrite.
    self.cache.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The set of contact keys `viewer` may see.
  ///
  /// An anonymous viewer sees nothing. `force_refresh` skips the cache;
  /// a stale or absent cache entry triggers a synchronous recompute either
  /// way.
  pub async fn visible(
    &self,
    viewer: Viewer,
    include_attic: bool,
    force_refresh: bool,
  ) -> Result<HashSet<Uuid>> {
    let Some(viewer_id) = viewer.contact_id() else {
      return Ok(HashSet::new());
    };

    if !force_refresh
      && let Some(cached) = self.lock().get(&(viewer_id, include_attic))
      && cached.computed_at.elapsed() <= self.config.ttl
    {
      return Ok(cached.contacts.clone());
    }

    let contacts = self.compute(viewer_id, include_attic).await?;
    self.lock().put(
      (viewer_id, include_attic),
      CachedSet { contacts: contacts.clone(), computed_at: Instant::now() },
    );
    Ok(contacts)
  }

  /// Drop the cached sets for one viewer. Called by the write path on every
  /// ownership or link-privacy change; visibility sets are per-viewer, so
  /// no cross-viewer invalidation is ever needed.
  pub fn invalidate(&self, viewer_id: Uuid) {
    let mut cache = self.lock();
    cache.pop(&(viewer_id, false));
    cache.pop(&(viewer_id, true));
    tracing::debug!(%viewer_id, "visibility cache invalidated");
  }

  async fn compute(
    &self,
    viewer_id: Uuid,
    include_attic: bool,
  ) -> Result<HashSet<Uuid>> {
    tracing::debug!(%viewer_id, include_attic, "recomputing visibility set");

    // 1. Everything the viewer created.
    let mut visible: HashSet<Uuid> = self
      .store
      .contacts_owned_by(viewer_id, include_attic)
      .await
      .map_err(Error::store)?
      .into_iter()
      .collect();

    // 2. Targets of non-private links, one hop from the viewer's own
    //    record per configured depth step.
    let mut frontier = vec![viewer_id];
    for _ in 0..self.config.link_depth {
      let mut next = Vec::new();
      for source in frontier {
        let links =
          self.store.links_from(source).await.map_err(Error::store)?;
        for link_prop in links {
          let Some(link) = link_prop.value.as_link() else { continue };
          if link.privacy == Privacy::Private {
            continue;
          }
          if visible.contains(&link.target) {
            continue;
          }
          match self
            .store
            .get_contact(link.target)
            .await
            .map_err(Error::store)?
          {
            Some(target) if include_attic || !target.attic => {
              visible.insert(target.contact_id);
              next.push(target.contact_id);
            }
            Some(_) => {}
            None => {
              tracing::warn!(
                target = %link.target,
                "link points at a missing contact"
              );
            }
          }
        }
      }
      frontier = next;
    }

    Ok(visible)
  }
}
