//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Property payloads are
//! stored as compact JSON keyed by the kind discriminant. Fuzzy dates are
//! stored as their coded integer. UUIDs are stored as hyphenated lowercase
//! strings.

use chrono::{DateTime, Utc};
use rolo_core::{
  contact::{Contact, ContactDetail},
  fuzzy::FuzzyDate,
  property::{Property, PropertyValue, Supersession},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `contacts` row.
pub struct RawContact {
  pub contact_id: String,
  pub kind:       String,
  pub name:       String,
  pub lastname:   Option<String>,
  pub nickname:   Option<String>,
  pub birthday:   i64,
  pub owner_id:   Option<String>,
  pub attic:      bool,
  pub created_at: String,
}

impl RawContact {
  pub fn into_contact(self) -> Result<Contact> {
    let detail = match self.kind.as_str() {
      "person" => ContactDetail::Person {
        lastname: self.lastname,
        nickname: self.nickname,
        birthday: FuzzyDate::from_int(self.birthday as u32),
      },
      "company" => ContactDetail::Company,
      other => {
        return Err(Error::Core(rolo_core::Error::UnknownKind(
          other.to_owned(),
        )));
      }
    };

    Ok(Contact {
      contact_id: decode_uuid(&self.contact_id)?,
      name: self.name,
      detail,
      owner_id: self.owner_id.as_deref().map(decode_uuid).transpose()?,
      attic: self.attic,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Column values for inserting a [`Contact`].
pub struct ContactColumns {
  pub contact_id: String,
  pub kind:       &'static str,
  pub name:       String,
  pub lastname:   Option<String>,
  pub nickname:   Option<String>,
  pub birthday:   i64,
  pub owner_id:   Option<String>,
  pub attic:      bool,
  pub created_at: String,
}

impl ContactColumns {
  pub fn from_contact(contact: &Contact) -> Self {
    let (lastname, nickname, birthday) = match &contact.detail {
      ContactDetail::Person { lastname, nickname, birthday } => {
        (lastname.clone(), nickname.clone(), birthday.to_int() as i64)
      }
      ContactDetail::Company => (None, None, 0),
    };

    Self {
      contact_id: encode_uuid(contact.contact_id),
      kind: contact.detail.discriminant(),
      name: contact.name.clone(),
      lastname,
      nickname,
      birthday,
      owner_id: contact.owner_id.map(encode_uuid),
      attic: contact.attic,
      created_at: encode_dt(contact.created_at),
    }
  }
}

/// Raw strings read directly from a `properties` row.
pub struct RawProperty {
  pub property_id: String,
  pub contact_id:  String,
  pub kind:        String,
  pub value_json:  String,
  pub attic:       bool,
  pub created_at:  String,
}

impl RawProperty {
  pub fn into_property(self) -> Result<Property> {
    let data: serde_json::Value = serde_json::from_str(&self.value_json)?;
    let value = PropertyValue::from_parts(&self.kind, data)?;

    Ok(Property {
      property_id: decode_uuid(&self.property_id)?,
      contact_id: decode_uuid(&self.contact_id)?,
      value,
      attic: self.attic,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `supersessions` row.
pub struct RawSupersession {
  pub supersession_id: String,
  pub old_property_id: String,
  pub new_property_id: String,
  pub recorded_at:     String,
}

impl RawSupersession {
  pub fn into_supersession(self) -> Result<Supersession> {
    Ok(Supersession {
      supersession_id: decode_uuid(&self.supersession_id)?,
      old_property_id: decode_uuid(&self.old_property_id)?,
      new_property_id: decode_uuid(&self.new_property_id)?,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}
