//! The [`IndexStore`] half of [`SqliteStore`].
//!
//! Every write here is an idempotent upsert or delete (`INSERT OR IGNORE`,
//! plain `DELETE`), so index reconciliation can run without transactional
//! coupling to the entity writes that trigger it.

use uuid::Uuid;

use rolo_core::store::{IndexStore, PlainKey, PurgeCounts};

use crate::{Error, Result, SqliteStore, encode::encode_uuid};

fn plain_key_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String)> {
  Ok((row.get(0)?, row.get(1)?))
}

fn decode_plain_key((key_id, token): (String, String)) -> Result<PlainKey> {
  Ok(PlainKey { key_id: Uuid::parse_str(&key_id)?, token })
}

impl IndexStore for SqliteStore {
  type Error = Error;

  async fn ensure_plain_key(&self, token: String) -> Result<PlainKey> {
    let candidate_id = encode_uuid(Uuid::new_v4());

    let (key_id, token): (String, String) = self
      .conn
      .call(move |conn| {
        // INSERT OR IGNORE first, then read back whichever row won; a
        // concurrent writer inserting the same token is harmless.
        conn.execute(
          "INSERT OR IGNORE INTO plain_keys (key_id, token) VALUES (?1, ?2)",
          rusqlite::params![candidate_id, token],
        )?;
        let key_id: String = conn.query_row(
          "SELECT key_id FROM plain_keys WHERE token = ?1",
          rusqlite::params![token],
          |row| row.get(0),
        )?;
        Ok((key_id, token))
      })
      .await?;

    Ok(PlainKey { key_id: Uuid::parse_str(&key_id)?, token })
  }

  async fn plain_keys_in_range(
    &self,
    lo: String,
    hi: String,
  ) -> Result<Vec<PlainKey>> {
    let raws: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT key_id, token FROM plain_keys
           WHERE token >= ?1 AND token < ?2
           ORDER BY token",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![lo, hi], plain_key_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(decode_plain_key).collect()
  }

  async fn contacts_for_key(&self, key_id: Uuid) -> Result<Vec<Uuid>> {
    let key_str = encode_uuid(key_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT contact_id FROM index_entries WHERE key_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![key_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| Uuid::parse_str(s).map_err(Error::Uuid))
      .collect()
  }

  async fn tokens_for_contact(&self, contact_id: Uuid) -> Result<Vec<PlainKey>> {
    let contact_str = encode_uuid(contact_id);

    let raws: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT pk.key_id, pk.token
           FROM index_entries e
           JOIN plain_keys pk ON pk.key_id = e.key_id
           WHERE e.contact_id = ?1
           ORDER BY pk.token",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![contact_str], plain_key_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(decode_plain_key).collect()
  }

  async fn add_entry(&self, key_id: Uuid, contact_id: Uuid) -> Result<bool> {
    let key_str     = encode_uuid(key_id);
    let contact_str = encode_uuid(contact_id);

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO index_entries (key_id, contact_id)
           VALUES (?1, ?2)",
          rusqlite::params![key_str, contact_str],
        )?)
      })
      .await?;

    Ok(inserted > 0)
  }

  async fn remove_entry(&self, key_id: Uuid, contact_id: Uuid) -> Result<bool> {
    let key_str     = encode_uuid(key_id);
    let contact_str = encode_uuid(contact_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM index_entries WHERE key_id = ?1 AND contact_id = ?2",
          rusqlite::params![key_str, contact_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  async fn remove_entries_for_contact(&self, contact_id: Uuid) -> Result<usize> {
    let contact_str = encode_uuid(contact_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM index_entries WHERE contact_id = ?1",
          rusqlite::params![contact_str],
        )?)
      })
      .await?;

    Ok(removed)
  }

  async fn orphaned_entries(&self) -> Result<Vec<(Uuid, Uuid)>> {
    let raws: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT e.key_id, e.contact_id FROM index_entries e
           LEFT JOIN contacts c ON c.contact_id = e.contact_id
           WHERE c.contact_id IS NULL",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .iter()
      .map(|(k, c)| {
        Ok((
          Uuid::parse_str(k).map_err(Error::Uuid)?,
          Uuid::parse_str(c).map_err(Error::Uuid)?,
        ))
      })
      .collect()
  }

  async fn purge(&self) -> Result<PurgeCounts> {
    let (entries, keys) = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let entries = tx.execute("DELETE FROM index_entries", [])?;
        let keys = tx.execute("DELETE FROM plain_keys", [])?;
        tx.commit()?;
        Ok((entries, keys))
      })
      .await?;

    Ok(PurgeCounts { keys, entries })
  }
}
