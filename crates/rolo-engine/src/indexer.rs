//! Incremental maintenance of the plain-token search index.
//!
//! Every mutation funnels through [`IndexMaintainer::reindex`], which
//! reconciles the owning contact's *entire* token set against the index
//! rather than patching per-field deltas. That makes the operation
//! idempotent and safe to replay after partial failures.

use std::collections::HashSet;

use uuid::Uuid;

use rolo_core::store::{ContactStore, IndexStore};

use crate::{Error, Result};

/// The unit of reindexing work. A property reference resolves to its owning
/// contact before any index rows are touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
  Contact(Uuid),
  Property(Uuid),
}

/// Rows added and removed by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexCounts {
  pub added:   usize,
  pub removed: usize,
}

impl ReindexCounts {
  pub fn absorb(&mut self, other: ReindexCounts) {
    self.added += other.added;
    self.removed += other.removed;
  }
}

/// Reconciles contacts against the token index.
pub struct IndexMaintainer<S> {
  store: std::sync::Arc<S>,
}

impl<S: ContactStore + IndexStore> IndexMaintainer<S> {
  pub fn new(store: std::sync::Arc<S>) -> Self { Self { store } }

  /// Bring the index rows for the entity's owning contact in line with its
  /// current state. Missing entities reconcile to nothing and are logged,
  /// not failed; the index trails the authoritative store by design of the
  /// write path, so races are expected.
  pub async fn reindex(&self, entity: EntityRef) -> Result<ReindexCounts> {
    let contact_id = match entity {
      EntityRef::Contact(id) => id,
      EntityRef::Property(id) => {
        match self.store.get_property(id).await.map_err(Error::store)? {
          Some(property) => property.contact_id,
          None => {
            tracing::warn!(property_id = %id, "reindex of a missing property");
            return Ok(ReindexCounts::default());
          }
        }
      }
    };
    self.reindex_contact(contact_id).await
  }

  pub async fn reindex_contact(
    &self,
    contact_id: Uuid,
  ) -> Result<ReindexCounts> {
    let desired = self.desired_tokens(contact_id).await?;

    // Attic and missing contacts want no rows at all; drop them in one
    // statement instead of walking the per-token diff.
    if desired.is_empty() {
      let removed = self
        .store
        .remove_entries_for_contact(contact_id)
        .await
        .map_err(Error::store)?;
      tracing::debug!(%contact_id, removed, "index cleared");
      return Ok(ReindexCounts { added: 0, removed });
    }

    let current = self
      .store
      .tokens_for_contact(contact_id)
      .await
      .map_err(Error::store)?;

    let mut counts = ReindexCounts::default();

    for key in &current {
      if desired.contains(&key.token) {
        continue;
      }
      if self
        .store
        .remove_entry(key.key_id, contact_id)
        .await
        .map_err(Error::store)?
      {
        counts.removed += 1;
      }
    }

    let current_tokens: HashSet<&str> =
      current.iter().map(|key| key.token.as_str()).collect();
    for token in &desired {
      if current_tokens.contains(token.as_str()) {
        continue;
      }
      let key = self
        .store
        .ensure_plain_key(token.clone())
        .await
        .map_err(Error::store)?;
      if self
        .store
        .add_entry(key.key_id, contact_id)
        .await
        .map_err(Error::store)?
      {
        counts.added += 1;
      }
    }

    tracing::debug!(
      %contact_id,
      added = counts.added,
      removed = counts.removed,
      "index reconciled"
    );
    Ok(counts)
  }

  /// The full token set a contact should be findable under: name fields
  /// plus the place tokens of its current addresses. Attic and missing
  /// contacts index to nothing.
  async fn desired_tokens(&self, contact_id: Uuid) -> Result<HashSet<String>> {
    let Some(contact) =
      self.store.get_contact(contact_id).await.map_err(Error::store)?
    else {
      tracing::warn!(%contact_id, "reindex of a missing contact");
      return Ok(HashSet::new());
    };
    if contact.attic {
      return Ok(HashSet::new());
    }

    let mut tokens: HashSet<String> =
      contact.name_tokens().into_iter().collect();

    let properties = self
      .store
      .properties_of(contact_id, false)
      .await
      .map_err(Error::store)?;
    for property in properties {
      if let Some(address) = property.value.as_address() {
        tokens.extend(address.place_tokens());
      }
    }

    Ok(tokens)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use rolo_core::{
    contact::{ContactDetail, NewContact},
    property::{AddressValue, NewProperty, PropertyValue},
    store::{ContactStore, IndexStore},
  };
  use rolo_store_sqlite::SqliteStore;

  use super::*;

  async fn store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
  }

  fn address(zoom: &[&str]) -> PropertyValue {
    PropertyValue::Address(AddressValue {
      lines:    vec!["1 Main St".into()],
      location: None,
      adr_zoom: zoom.iter().map(|z| z.to_string()).collect(),
    })
  }

  async fn tokens(s: &SqliteStore, contact: Uuid) -> HashSet<String> {
    s.tokens_for_contact(contact)
      .await
      .unwrap()
      .into_iter()
      .map(|key| key.token)
      .collect()
  }

  #[tokio::test]
  async fn indexes_name_fields() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let contact = s
      .add_contact(NewContact::new(
        "Stéphane",
        ContactDetail::Person {
          lastname: Some("Diesbach".into()),
          nickname: Some("Stef".into()),
          birthday: Default::default(),
        },
      ))
      .await
      .unwrap();

    maintainer
      .reindex(EntityRef::Contact(contact.contact_id))
      .await
      .unwrap();

    let have = tokens(&s, contact.contact_id).await;
    let want: HashSet<String> =
      ["stephane", "diesbach", "stef"].iter().map(|t| t.to_string()).collect();
    assert_eq!(have, want);
  }

  #[tokio::test]
  async fn address_move_replaces_place_tokens() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let contact = s
      .add_contact(NewContact::new("Dirk", ContactDetail::person()))
      .await
      .unwrap();
    let old = s
      .add_property(NewProperty::new(
        contact.contact_id,
        address(&["USA", "NY", "Brooklyn"]),
      ))
      .await
      .unwrap();
    maintainer
      .reindex(EntityRef::Property(old.property_id))
      .await
      .unwrap();
    assert!(tokens(&s, contact.contact_id).await.contains("brooklyn"));

    // Move: supersede the old address with a new one, then reindex via the
    // new property. The stale place tokens must disappear.
    let (_, new) = s
      .supersede_property(
        old.property_id,
        NewProperty::new(contact.contact_id, address(&["USA", "NY", "Manhattan"])),
      )
      .await
      .unwrap();
    maintainer
      .reindex(EntityRef::Property(new.property_id))
      .await
      .unwrap();

    let have = tokens(&s, contact.contact_id).await;
    assert!(have.contains("manhattan"));
    assert!(!have.contains("brooklyn"));
    assert!(have.contains("ny"));
  }

  #[tokio::test]
  async fn attic_contact_reconciles_to_nothing() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let contact = s
      .add_contact(NewContact::new("Nelly", ContactDetail::person()))
      .await
      .unwrap();
    maintainer
      .reindex(EntityRef::Contact(contact.contact_id))
      .await
      .unwrap();
    assert!(!tokens(&s, contact.contact_id).await.is_empty());

    s.set_contact_attic(contact.contact_id, true).await.unwrap();
    let counts = maintainer
      .reindex(EntityRef::Contact(contact.contact_id))
      .await
      .unwrap();
    assert_eq!(counts.removed, 1);
    assert!(tokens(&s, contact.contact_id).await.is_empty());
  }

  #[tokio::test]
  async fn reconciliation_is_idempotent() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let contact = s
      .add_contact(NewContact::new("Olga Dieter", ContactDetail::person()))
      .await
      .unwrap();

    let first = maintainer
      .reindex(EntityRef::Contact(contact.contact_id))
      .await
      .unwrap();
    assert_eq!(first.added, 2);

    let second = maintainer
      .reindex(EntityRef::Contact(contact.contact_id))
      .await
      .unwrap();
    assert_eq!(second, ReindexCounts::default());
  }

  #[tokio::test]
  async fn missing_contact_clears_its_entries() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let ghost = Uuid::new_v4();
    let key = s.ensure_plain_key("ghost".into()).await.unwrap();
    s.add_entry(key.key_id, ghost).await.unwrap();

    let counts = maintainer.reindex_contact(ghost).await.unwrap();
    assert_eq!(counts.removed, 1);
    assert!(tokens(&s, ghost).await.is_empty());
  }

  #[tokio::test]
  async fn missing_property_is_a_no_op() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let counts = maintainer
      .reindex(EntityRef::Property(Uuid::new_v4()))
      .await
      .unwrap();
    assert_eq!(counts, ReindexCounts::default());
  }

  #[tokio::test]
  async fn only_last_two_zoom_levels_index() {
    let s = store().await;
    let maintainer = IndexMaintainer::new(s.clone());

    let contact = s
      .add_contact(NewContact::new("Ada", ContactDetail::person()))
      .await
      .unwrap();
    s.add_property(NewProperty::new(
      contact.contact_id,
      address(&["USA", "NY", "New York", "Harlem"]),
    ))
    .await
    .unwrap();
    maintainer
      .reindex(EntityRef::Contact(contact.contact_id))
      .await
      .unwrap();

    let have = tokens(&s, contact.contact_id).await;
    assert!(have.contains("harlem"));
    assert!(have.contains("york"));
    assert!(!have.contains("usa"));
  }
}
