//! Full and incremental rebuilds of the search index.
//!
//! The batch reindexer walks contacts and recently-changed addresses and
//! funnels each owning contact through the same reconciliation the write
//! path uses. Progress is published as a percentage so an admin endpoint
//! can poll a long-running rebuild.

use std::{
  collections::HashSet,
  sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
  },
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use rolo_core::store::{ContactStore, IndexStore, PurgeCounts};

use crate::{
  indexer::{IndexMaintainer, ReindexCounts},
  Error, Result,
};

pub struct BatchReindexer<S> {
  store:      Arc<S>,
  maintainer: IndexMaintainer<S>,
  progress:   Arc<AtomicU8>,
}

impl<S: ContactStore + IndexStore> BatchReindexer<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      maintainer: IndexMaintainer::new(store.clone()),
      progress: Arc::new(AtomicU8::new(100)),
      store,
    }
  }

  /// Percentage of the current (or last) run that has completed.
  pub fn progress_percent(&self) -> u8 { self.progress.load(Ordering::Relaxed) }

  /// Reconcile every contact touched since `since`, or every contact when
  /// `since` is `None`. Each contact is reconciled at most once per run.
  pub async fn run(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<ReindexCounts> {
    self.progress.store(0, Ordering::Relaxed);

    let mut targets: Vec<Uuid> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();

    for contact in
      self.store.contacts_by_recency(since).await.map_err(Error::store)?
    {
      if seen.insert(contact.contact_id) {
        targets.push(contact.contact_id);
      }
    }
    // Address edits change place tokens without touching the contact row,
    // so recent addresses contribute their owners too.
    for address in
      self.store.addresses_by_recency(since).await.map_err(Error::store)?
    {
      if seen.insert(address.contact_id) {
        targets.push(address.contact_id);
      }
    }

    let total = targets.len();
    tracing::info!(total, incremental = since.is_some(), "batch reindex start");

    let mut counts = ReindexCounts::default();
    for (done, contact_id) in targets.into_iter().enumerate() {
      counts.absorb(self.maintainer.reindex_contact(contact_id).await?);
      let percent = if total == 0 {
        100
      } else {
        ((done + 1) * 100 / total) as u8
      };
      self.progress.store(percent, Ordering::Relaxed);
    }
    self.progress.store(100, Ordering::Relaxed);

    tracing::info!(
      added = counts.added,
      removed = counts.removed,
      "batch reindex done"
    );
    Ok(counts)
  }

  /// Drop every plain key and index entry. Pair with a follow-up [`run`]
  /// to rebuild from scratch.
  ///
  /// [`run`]: BatchReindexer::run
  pub async fn purge(&self) -> Result<PurgeCounts> {
    let counts = self.store.purge().await.map_err(Error::store)?;
    tracing::info!(keys = counts.keys, entries = counts.entries, "index purged");
    Ok(counts)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use rolo_core::{
    contact::{ContactDetail, NewContact},
    property::{AddressValue, NewProperty, PropertyValue},
  };
  use rolo_store_sqlite::SqliteStore;

  use super::*;

  async fn store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
  }

  async fn add_person(s: &SqliteStore, name: &str) -> Uuid {
    s.add_contact(NewContact::new(name, ContactDetail::person()))
      .await
      .unwrap()
      .contact_id
  }

  #[tokio::test]
  async fn full_run_indexes_everything() {
    let s = store().await;
    let batch = BatchReindexer::new(s.clone());

    let dirk = add_person(&s, "Dirk").await;
    let nelly = add_person(&s, "Nelly Diesbach").await;

    let counts = batch.run(None).await.unwrap();
    assert_eq!(counts.added, 3);
    assert_eq!(counts.removed, 0);
    assert_eq!(batch.progress_percent(), 100);

    assert_eq!(s.tokens_for_contact(dirk).await.unwrap().len(), 1);
    assert_eq!(s.tokens_for_contact(nelly).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn rerun_is_convergent() {
    let s = store().await;
    let batch = BatchReindexer::new(s.clone());
    add_person(&s, "Dirk").await;

    batch.run(None).await.unwrap();
    let second = batch.run(None).await.unwrap();
    assert_eq!(second, ReindexCounts::default());
  }

  #[tokio::test]
  async fn incremental_run_skips_old_contacts() {
    let s = store().await;
    let batch = BatchReindexer::new(s.clone());

    let old = add_person(&s, "Dirk").await;
    let cutoff = Utc::now() + Duration::hours(1);

    let counts = batch.run(Some(cutoff)).await.unwrap();
    assert_eq!(counts, ReindexCounts::default());
    assert!(s.tokens_for_contact(old).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn recent_address_pulls_in_its_owner() {
    let s = store().await;
    let batch = BatchReindexer::new(s.clone());

    let contact = add_person(&s, "Dirk").await;
    batch.run(None).await.unwrap();

    // A cutoff after the contact row but before the address: the contact
    // scan skips it, the address scan brings its owner back into scope.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let cutoff = Utc::now();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    s.add_property(NewProperty::new(
      contact,
      PropertyValue::Address(AddressValue {
        lines:    vec!["1 Main St".into()],
        location: None,
        adr_zoom: vec!["USA".into(), "NY".into(), "Brooklyn".into()],
      }),
    ))
    .await
    .unwrap();

    let counts = batch.run(Some(cutoff)).await.unwrap();
    assert_eq!(counts.added, 2);

    let tokens: Vec<String> = s
      .tokens_for_contact(contact)
      .await
      .unwrap()
      .into_iter()
      .map(|key| key.token)
      .collect();
    assert!(tokens.contains(&"brooklyn".to_string()));
  }

  #[tokio::test]
  async fn purge_then_rebuild() {
    let s = store().await;
    let batch = BatchReindexer::new(s.clone());

    let dirk = add_person(&s, "Dirk").await;
    batch.run(None).await.unwrap();

    let purged = batch.purge().await.unwrap();
    assert_eq!(purged.keys, 1);
    assert_eq!(purged.entries, 1);
    assert!(s.tokens_for_contact(dirk).await.unwrap().is_empty());

    batch.run(None).await.unwrap();
    assert_eq!(s.tokens_for_contact(dirk).await.unwrap().len(), 1);
  }
}
