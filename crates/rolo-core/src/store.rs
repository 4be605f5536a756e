//! The storage trait seams the engines run against.
//!
//! Two traits split the two entity groups: [`ContactStore`] covers the
//! authoritative contact/property records, [`IndexStore`] covers the derived
//! token index. A backend (e.g. `rolo-store-sqlite`) implements both on one
//! type. The index side offers only idempotent, compensating operations —
//! create-if-absent and delete-if-present — because nothing guarantees an
//! index write lands in the same transaction as the entity write that
//! triggered it.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  contact::{Contact, NewContact},
  property::{NewProperty, Property, Supersession},
};

// ─── Index row types ─────────────────────────────────────────────────────────

/// A normalised search token, globally unique across the system.
///
/// PlainKeys are append-only and shared across contacts; they are never
/// deleted except by [`IndexStore::purge`], so a concurrent reader can never
/// chase a token row that vanished under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainKey {
  pub key_id: Uuid,
  pub token:  String,
}

/// Counters returned by [`IndexStore::purge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
  pub keys:    usize,
  pub entries: usize,
}

// ─── ContactStore ────────────────────────────────────────────────────────────

/// Abstraction over the authoritative contact/property store.
///
/// Properties are never updated in place: an edit goes through
/// [`supersede_property`](ContactStore::supersede_property), which writes the
/// replacement, attics the original, and records the lineage. Nothing here
/// hard-deletes except [`delete_property`](ContactStore::delete_property),
/// which exists only for the repair scan's orphan removal.
pub trait ContactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// Create and persist a new contact. `created_at` is set by the store.
  fn add_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Retrieve a contact by key. Returns `None` if not found — attic status
  /// does not matter for direct key access.
  fn get_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Point a contact at its owner. Used once at account bootstrap to make
  /// the fresh person record own itself, and by ownership transfers.
  fn set_contact_owner(
    &self,
    id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Toggle the attic (soft-delete) flag on a contact.
  fn set_contact_attic(
    &self,
    id: Uuid,
    attic: bool,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Keys of all contacts owned by `owner_id`.
  fn contacts_owned_by(
    &self,
    owner_id: Uuid,
    include_attic: bool,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// All contacts ordered newest-first. With `since`, only contacts created
  /// at or after that instant — the batch reindexer's incremental cursor.
  fn contacts_by_recency(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  // ── Properties ────────────────────────────────────────────────────────

  /// Record a new property. `created_at` is set by the store.
  fn add_property(
    &self,
    input: NewProperty,
  ) -> impl Future<Output = Result<Property, Self::Error>> + Send + '_;

  /// Retrieve a property by key, attic or not.
  fn get_property(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Property>, Self::Error>> + Send + '_;

  /// Replace `old_id` with a freshly-written property: writes the
  /// replacement, sets `attic` on the original, and records a
  /// [`Supersession`].
  ///
  /// Returns an error if `old_id` does not exist or is already superseded.
  fn supersede_property(
    &self,
    old_id: Uuid,
    replacement: NewProperty,
  ) -> impl Future<Output = Result<(Supersession, Property), Self::Error>> + Send + '_;

  /// The supersession record that retired `old_property_id`, if any.
  fn supersession_for(
    &self,
    old_property_id: Uuid,
  ) -> impl Future<Output = Result<Option<Supersession>, Self::Error>> + Send + '_;

  /// Toggle the attic flag on a property. Attic-ing with no successor is
  /// how a fact is deleted.
  fn set_property_attic(
    &self,
    id: Uuid,
    attic: bool,
  ) -> impl Future<Output = Result<Property, Self::Error>> + Send + '_;

  /// All properties of a contact, newest first. Without `include_attic`
  /// only current (non-attic) instances are returned.
  fn properties_of(
    &self,
    contact_id: Uuid,
    include_attic: bool,
  ) -> impl Future<Output = Result<Vec<Property>, Self::Error>> + Send + '_;

  /// Current (non-attic) link properties owned by `contact_id`.
  fn links_from(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Property>, Self::Error>> + Send + '_;

  /// All address properties ordered newest-first, bounded by `since` like
  /// [`contacts_by_recency`](ContactStore::contacts_by_recency).
  fn addresses_by_recency(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Property>, Self::Error>> + Send + '_;

  // ── Repair ────────────────────────────────────────────────────────────

  /// Keys of properties whose contact no longer exists.
  fn orphaned_properties(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Hard-delete a property row. Only the repair scan calls this; normal
  /// flows attic instead.
  fn delete_property(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── IndexStore ──────────────────────────────────────────────────────────────

/// Abstraction over the derived token → contact index.
///
/// Rows here are disposable: every operation is an idempotent upsert or
/// delete, and a periodic full reconciliation sweep repairs whatever a crash
/// between entity write and index write left behind.
pub trait IndexStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up the PlainKey for `token`, creating it if absent.
  fn ensure_plain_key(
    &self,
    token: String,
  ) -> impl Future<Output = Result<PlainKey, Self::Error>> + Send + '_;

  /// All PlainKeys with `lo <= token < hi`, token order. With
  /// `hi = prefix_upper_bound(lo)` this is a starts-with scan.
  fn plain_keys_in_range(
    &self,
    lo: String,
    hi: String,
  ) -> impl Future<Output = Result<Vec<PlainKey>, Self::Error>> + Send + '_;

  /// The posting set of a token: keys of contacts currently matching it.
  fn contacts_for_key(
    &self,
    key_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// All PlainKeys a contact currently has entries for.
  fn tokens_for_contact(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PlainKey>, Self::Error>> + Send + '_;

  /// Create-if-absent. Returns `true` if a row was actually inserted.
  fn add_entry(
    &self,
    key_id: Uuid,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete-if-present. Returns `true` if a row was actually removed.
  fn remove_entry(
    &self,
    key_id: Uuid,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Drop every entry for a contact. Returns the number removed.
  fn remove_entries_for_contact(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Entries whose contact no longer exists, as `(key_id, contact_id)`
  /// pairs. Feeds the repair scan.
  fn orphaned_entries(
    &self,
  ) -> impl Future<Output = Result<Vec<(Uuid, Uuid)>, Self::Error>> + Send + '_;

  /// Delete all PlainKey and entry rows unconditionally. Last-resort reset
  /// before a full rebuild.
  fn purge(
    &self,
  ) -> impl Future<Output = Result<PurgeCounts, Self::Error>> + Send + '_;
}
