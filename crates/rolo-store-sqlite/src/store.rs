//! [`SqliteStore`] — the SQLite implementation of [`ContactStore`].
//!
//! The [`rolo_core::store::IndexStore`] half lives in [`crate::index`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use rolo_core::{
  contact::{Contact, NewContact},
  property::{NewProperty, Property, Supersession},
  store::ContactStore,
};

use crate::{
  Error, Result,
  encode::{
    ContactColumns, RawContact, RawProperty, RawSupersession, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A rolo store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawContact> {
  Ok(RawContact {
    contact_id: row.get(0)?,
    kind:       row.get(1)?,
    name:       row.get(2)?,
    lastname:   row.get(3)?,
    nickname:   row.get(4)?,
    birthday:   row.get(5)?,
    owner_id:   row.get(6)?,
    attic:      row.get(7)?,
    created_at: row.get(8)?,
  })
}

fn property_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProperty> {
  Ok(RawProperty {
    property_id: row.get(0)?,
    contact_id:  row.get(1)?,
    kind:        row.get(2)?,
    value_json:  row.get(3)?,
    attic:       row.get(4)?,
    created_at:  row.get(5)?,
  })
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a fully-built [`Property`] into the `properties` table.
  async fn insert_property(&self, property: &Property) -> Result<()> {
    let property_id_str = encode_uuid(property.property_id);
    let contact_id_str  = encode_uuid(property.contact_id);
    let kind            = property.value.discriminant();
    let value_json_str  = property.value.to_json()?.to_string();
    let attic           = property.attic;
    let created_at_str  = encode_dt(property.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO properties (
             property_id, contact_id, kind, value_json, attic, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            property_id_str,
            contact_id_str,
            kind,
            value_json_str,
            attic,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_properties(
    &self,
    sql: &'static str,
    args: Vec<String>,
  ) -> Result<Vec<Property>> {
    let raws: Vec<RawProperty> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), property_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProperty::into_property).collect()
  }
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  type Error = Error;

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    let contact = Contact {
      contact_id: Uuid::new_v4(),
      name:       input.name,
      detail:     input.detail,
      owner_id:   input.owner_id,
      attic:      false,
      created_at: Utc::now(),
    };

    let cols = ContactColumns::from_contact(&contact);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contacts (
             contact_id, kind, name, lastname, nickname, birthday,
             owner_id, attic, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            cols.contact_id,
            cols.kind,
            cols.name,
            cols.lastname,
            cols.nickname,
            cols.birthday,
            cols.owner_id,
            cols.attic,
            cols.created_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(contact)
  }

  async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT contact_id, kind, name, lastname, nickname, birthday,
                      owner_id, attic, created_at
               FROM contacts WHERE contact_id = ?1",
              rusqlite::params![id_str],
              contact_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn set_contact_owner(&self, id: Uuid, owner_id: Uuid) -> Result<Contact> {
    let id_str    = encode_uuid(id);
    let owner_str = encode_uuid(owner_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts SET owner_id = ?2 WHERE contact_id = ?1",
          rusqlite::params![id_str, owner_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ContactNotFound(id));
    }
    self.get_contact(id).await?.ok_or(Error::ContactNotFound(id))
  }

  async fn set_contact_attic(&self, id: Uuid, attic: bool) -> Result<Contact> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts SET attic = ?2 WHERE contact_id = ?1",
          rusqlite::params![id_str, attic],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ContactNotFound(id));
    }
    self.get_contact(id).await?.ok_or(Error::ContactNotFound(id))
  }

  async fn contacts_owned_by(
    &self,
    owner_id: Uuid,
    include_attic: bool,
  ) -> Result<Vec<Uuid>> {
    let owner_str = encode_uuid(owner_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let sql = if include_attic {
          "SELECT contact_id FROM contacts WHERE owner_id = ?1"
        } else {
          "SELECT contact_id FROM contacts WHERE owner_id = ?1 AND attic = 0"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| Uuid::parse_str(s).map_err(Error::Uuid))
      .collect()
  }

  async fn contacts_by_recency(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Contact>> {
    let since_str = since.map(encode_dt);

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(since) = since_str {
          let mut stmt = conn.prepare(
            "SELECT contact_id, kind, name, lastname, nickname, birthday,
                    owner_id, attic, created_at
             FROM contacts WHERE created_at >= ?1
             ORDER BY created_at DESC",
          )?;
          stmt
            .query_map(rusqlite::params![since], contact_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT contact_id, kind, name, lastname, nickname, birthday,
                    owner_id, attic, created_at
             FROM contacts ORDER BY created_at DESC",
          )?;
          stmt
            .query_map([], contact_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }

  // ── Properties ────────────────────────────────────────────────────────────

  async fn add_property(&self, input: NewProperty) -> Result<Property> {
    let property = Property {
      property_id: Uuid::new_v4(),
      contact_id:  input.contact_id,
      value:       input.value,
      attic:       false,
      created_at:  Utc::now(),
    };

    self.insert_property(&property).await?;
    Ok(property)
  }

  async fn get_property(&self, id: Uuid) -> Result<Option<Property>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProperty> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT property_id, contact_id, kind, value_json, attic, created_at
               FROM properties WHERE property_id = ?1",
              rusqlite::params![id_str],
              property_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProperty::into_property).transpose()
  }

  async fn supersede_property(
    &self,
    old_id: Uuid,
    replacement: NewProperty,
  ) -> Result<(Supersession, Property)> {
    // Lifecycle check first; the UNIQUE constraint on old_property_id
    // backstops any race.
    let old = self
      .get_property(old_id)
      .await?
      .ok_or(Error::PropertyNotFound(old_id))?;
    if self.supersession_for(old_id).await?.is_some() {
      return Err(Error::AlreadySuperseded(old_id));
    }

    let new_property = self.add_property(replacement).await?;

    let supersession = Supersession {
      supersession_id: Uuid::new_v4(),
      old_property_id: old.property_id,
      new_property_id: new_property.property_id,
      recorded_at:     Utc::now(),
    };

    let sup_id_str = encode_uuid(supersession.supersession_id);
    let old_id_str = encode_uuid(old_id);
    let new_id_str = encode_uuid(new_property.property_id);
    let at_str     = encode_dt(supersession.recorded_at);

    // Retire the original and record the lineage in one transaction.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE properties SET attic = 1 WHERE property_id = ?1",
          rusqlite::params![old_id_str],
        )?;
        tx.execute(
          "INSERT INTO supersessions (
             supersession_id, old_property_id, new_property_id, recorded_at
           ) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![sup_id_str, old_id_str, new_id_str, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok((supersession, new_property))
  }

  async fn supersession_for(
    &self,
    old_property_id: Uuid,
  ) -> Result<Option<Supersession>> {
    let old_str = encode_uuid(old_property_id);

    let raw: Option<RawSupersession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT supersession_id, old_property_id, new_property_id, recorded_at
               FROM supersessions WHERE old_property_id = ?1",
              rusqlite::params![old_str],
              |row| {
                Ok(RawSupersession {
                  supersession_id: row.get(0)?,
                  old_property_id: row.get(1)?,
                  new_property_id: row.get(2)?,
                  recorded_at:     row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSupersession::into_supersession).transpose()
  }

  async fn set_property_attic(&self, id: Uuid, attic: bool) -> Result<Property> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE properties SET attic = ?2 WHERE property_id = ?1",
          rusqlite::params![id_str, attic],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PropertyNotFound(id));
    }
    self
      .get_property(id)
      .await?
      .ok_or(Error::PropertyNotFound(id))
  }

  async fn properties_of(
    &self,
    contact_id: Uuid,
    include_attic: bool,
  ) -> Result<Vec<Property>> {
    let sql = if include_attic {
      "SELECT property_id, contact_id, kind, value_json, attic, created_at
       FROM properties WHERE contact_id = ?1
       ORDER BY created_at DESC"
    } else {
      "SELECT property_id, contact_id, kind, value_json, attic, created_at
       FROM properties WHERE contact_id = ?1 AND attic = 0
       ORDER BY created_at DESC"
    };
    self.fetch_properties(sql, vec![encode_uuid(contact_id)]).await
  }

  async fn links_from(&self, contact_id: Uuid) -> Result<Vec<Property>> {
    self
      .fetch_properties(
        "SELECT property_id, contact_id, kind, value_json, attic, created_at
         FROM properties
         WHERE contact_id = ?1 AND kind = 'link' AND attic = 0
         ORDER BY created_at DESC",
        vec![encode_uuid(contact_id)],
      )
      .await
  }

  async fn addresses_by_recency(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Property>> {
    match since {
      Some(since) => {
        self
          .fetch_properties(
            "SELECT property_id, contact_id, kind, value_json, attic, created_at
             FROM properties
             WHERE kind = 'address' AND created_at >= ?1
             ORDER BY created_at DESC",
            vec![encode_dt(since)],
          )
          .await
      }
      None => {
        self
          .fetch_properties(
            "SELECT property_id, contact_id, kind, value_json, attic, created_at
             FROM properties WHERE kind = 'address'
             ORDER BY created_at DESC",
            vec![],
          )
          .await
      }
    }
  }

  // ── Repair ────────────────────────────────────────────────────────────────

  async fn orphaned_properties(&self) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT p.property_id FROM properties p
           LEFT JOIN contacts c ON c.contact_id = p.contact_id
           WHERE c.contact_id IS NULL",
        )?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| Uuid::parse_str(s).map_err(Error::Uuid))
      .collect()
  }

  async fn delete_property(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM supersessions
           WHERE old_property_id = ?1 OR new_property_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM properties WHERE property_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
