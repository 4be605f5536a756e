//! Contact entities — the records a user owns and can share.
//!
//! A contact is the envelope that properties hang off. The envelope itself
//! is mutable only in its `attic` flag and, during account bootstrap, its
//! owner; everything else is fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{fuzzy::FuzzyDate, token::tokenize};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The closed set of concrete contact kinds. The tag doubles as the `kind`
/// discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContactDetail {
  Person {
    lastname: Option<String>,
    nickname: Option<String>,
    /// Birthday with possibly-unknown components; all-zero when not
    /// recorded.
    #[serde(default)]
    birthday: FuzzyDate,
  },
  Company,
}

impl ContactDetail {
  /// A person with nothing but the shared name filled in.
  pub fn person() -> Self {
    Self::Person {
      lastname: None,
      nickname: None,
      birthday: FuzzyDate::default(),
    }
  }

  /// The discriminant string stored in the `kind` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Person { .. } => "person",
      Self::Company => "company",
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A person or company record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id: Uuid,
  /// First name of a person, or a company's full name.
  pub name:       String,
  #[serde(flatten)]
  pub detail:     ContactDetail,
  /// The contact (a user's own person record) that owns this one. `None`
  /// only during the brief account-bootstrap window, before the fresh
  /// person record is pointed at itself.
  pub owner_id:   Option<Uuid>,
  /// Soft-delete flag; atticked contacts stay fetchable by key but drop out
  /// of every default view and the search index.
  pub attic:      bool,
  pub created_at: DateTime<Utc>,
}

impl Contact {
  pub fn is_person(&self) -> bool {
    matches!(self.detail, ContactDetail::Person { .. })
  }

  pub fn birthday(&self) -> Option<FuzzyDate> {
    match &self.detail {
      ContactDetail::Person { birthday, .. } if !birthday.is_unknown() => {
        Some(*birthday)
      }
      _ => None,
    }
  }

  /// The search tokens the contact record itself contributes: name plus,
  /// for a person, last name and nickname. Place tokens come from address
  /// properties, not from here.
  pub fn name_tokens(&self) -> Vec<String> {
    let mut keys = tokenize(&self.name);
    if let ContactDetail::Person { lastname, nickname, .. } = &self.detail {
      if let Some(lastname) = lastname {
        keys.extend(tokenize(lastname));
      }
      if let Some(nickname) = nickname {
        keys.extend(tokenize(nickname));
      }
    }
    keys
  }
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactStore::add_contact`].
/// `created_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewContact {
  pub name:     String,
  pub detail:   ContactDetail,
  pub owner_id: Option<Uuid>,
}

impl NewContact {
  pub fn new(name: impl Into<String>, detail: ContactDetail) -> Self {
    Self { name: name.into(), detail, owner_id: None }
  }

  pub fn owned_by(mut self, owner_id: Uuid) -> Self {
    self.owner_id = Some(owner_id);
    self
  }
}

// ─── Viewer ──────────────────────────────────────────────────────────────────

/// The identity a read operation runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
  /// Not signed in. The visibility engine yields the empty set; anything an
  /// anonymous caller may still see (name autocompletion) is the caller's
  /// policy, not this crate's.
  Anonymous,
  /// A signed-in user, identified by their own person record.
  User(Uuid),
  /// Operator role. Search skips visibility filtering entirely.
  Admin(Uuid),
}

impl Viewer {
  pub fn contact_id(&self) -> Option<Uuid> {
    match self {
      Self::Anonymous => None,
      Self::User(id) | Self::Admin(id) => Some(*id),
    }
  }

  pub fn is_admin(&self) -> bool { matches!(self, Self::Admin(_)) }
}
