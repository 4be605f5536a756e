//! Consistency sweep over the whole dataset.
//!
//! Properties and index entries do not carry foreign keys to contacts, so
//! interrupted multi-step writes can leave rows pointing at nothing. The
//! repair scan finds them and, when asked, deletes them.

use std::sync::Arc;

use rolo_core::store::{ContactStore, IndexStore};

use crate::{Error, Result};

/// What a scan found and, in fix mode, how much it deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
  pub orphaned_properties: usize,
  pub orphaned_entries:    usize,
  pub fixed:               usize,
}

pub struct RepairScan<S> {
  store: Arc<S>,
}

impl<S: ContactStore + IndexStore> RepairScan<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Scan for rows whose contact no longer exists. With `fix` false this
  /// only reports; with `fix` true the orphans are hard-deleted.
  pub async fn run(&self, fix: bool) -> Result<RepairReport> {
    let mut report = RepairReport::default();

    let property_ids =
      self.store.orphaned_properties().await.map_err(Error::store)?;
    report.orphaned_properties = property_ids.len();
    for property_id in property_ids {
      tracing::warn!(%property_id, "property references a missing contact");
      if fix {
        self
          .store
          .delete_property(property_id)
          .await
          .map_err(Error::store)?;
        report.fixed += 1;
      }
    }

    let entries = self.store.orphaned_entries().await.map_err(Error::store)?;
    report.orphaned_entries = entries.len();
    for (key_id, contact_id) in entries {
      tracing::warn!(
        %key_id,
        %contact_id,
        "index entry references a missing contact"
      );
      if fix && self
        .store
        .remove_entry(key_id, contact_id)
        .await
        .map_err(Error::store)?
      {
        report.fixed += 1;
      }
    }

    tracing::info!(
      orphaned_properties = report.orphaned_properties,
      orphaned_entries = report.orphaned_entries,
      fixed = report.fixed,
      fix,
      "repair scan done"
    );
    Ok(report)
  }
}
