//! Property entities — a contact's timestamped, soft-deletable attributes.
//!
//! A property is immutable once created except for its `attic` flag. An edit
//! creates a replacement instance and retires the old one into the attic;
//! the lineage is recorded in a separate supersession row. The *current*
//! value for a contact and kind is simply the newest non-attic instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, token::tokenize};

// ─── Payload sub-types ───────────────────────────────────────────────────────

/// Geographic coordinates attached to an address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub lat: f64,
  pub lon: f64,
}

/// A postal address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressValue {
  /// Free-form address lines, top to bottom.
  pub lines:    Vec<String>,
  pub location: Option<GeoPoint>,
  /// Administrative-area tokens from coarse to fine, e.g.
  /// `["USA", "NY", "Brooklyn", "Fort Greene"]`. Filled by an external
  /// geocoding collaborator; may be empty.
  #[serde(default)]
  pub adr_zoom: Vec<String>,
}

impl AddressValue {
  /// Town/neighborhood-level search tokens: the last two `adr_zoom`
  /// entries. Street text never feeds the index.
  pub fn place_tokens(&self) -> Vec<String> {
    let skip = self.adr_zoom.len().saturating_sub(2);
    tokenize(&self.adr_zoom[skip..].join(" "))
  }
}

/// Who may see the linked contact through this link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
  Open,
  Restricted,
  Private,
}

/// A directed relationship edge from the owning contact to `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkValue {
  pub target:   Uuid,
  /// Human-readable relation label, e.g. "sister", "manager".
  pub relation: String,
  pub privacy:  Privacy,
}

/// Free-form tagged information that fits no other kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherValue {
  pub tag:  String,
  pub text: String,
}

// ─── PropertyValue ───────────────────────────────────────────────────────────

/// The typed payload of a property. The variant name doubles as the `kind`
/// discriminant stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PropertyValue {
  Address(AddressValue),
  Email(String),
  Mobile(String),
  Web(String),
  Other(OtherValue),
  Link(LinkValue),
}

impl PropertyValue {
  /// The discriminant string stored in the `kind` column.
  /// Must match the `rename_all = "lowercase"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Address(_) => "address",
      Self::Email(_) => "email",
      Self::Mobile(_) => "mobile",
      Self::Web(_) => "web",
      Self::Other(_) => "other",
      Self::Link(_) => "link",
    }
  }

  /// Serialise the inner payload (without the type tag) for the
  /// `value_json` database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in
  /// the database.
  pub fn from_parts(
    discriminant: &str,
    data: serde_json::Value,
  ) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }

  pub fn as_address(&self) -> Option<&AddressValue> {
    match self {
      Self::Address(a) => Some(a),
      _ => None,
    }
  }

  pub fn as_link(&self) -> Option<&LinkValue> {
    match self {
      Self::Link(l) => Some(l),
      _ => None,
    }
  }
}

// ─── Property ────────────────────────────────────────────────────────────────

/// A property instance. Once written, only the `attic` flag ever changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
  pub property_id: Uuid,
  pub contact_id:  Uuid,
  pub value:       PropertyValue,
  /// Soft-delete flag. An atticked property stays fetchable by key for
  /// history but is excluded from current views and the search index.
  pub attic:       bool,
  pub created_at:  DateTime<Utc>,
}

// ─── Supersession ────────────────────────────────────────────────────────────

/// Records that an edited property was replaced by a newer instance.
/// A property can be superseded at most once (enforced by a UNIQUE
/// constraint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supersession {
  pub supersession_id: Uuid,
  pub old_property_id: Uuid,
  pub new_property_id: Uuid,
  pub recorded_at:     DateTime<Utc>,
}

// ─── NewProperty ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactStore::add_property`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewProperty {
  pub contact_id: Uuid,
  pub value:      PropertyValue,
}

impl NewProperty {
  pub fn new(contact_id: Uuid, value: PropertyValue) -> Self {
    Self { contact_id, value }
  }
}
