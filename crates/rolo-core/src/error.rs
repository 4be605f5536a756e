//! Error types for `rolo-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("contact not found: {0}")]
  ContactNotFound(Uuid),

  #[error("property not found: {0}")]
  PropertyNotFound(Uuid),

  #[error("property {0} is already superseded")]
  AlreadySuperseded(Uuid),

  #[error("unknown kind discriminant: {0:?}")]
  UnknownKind(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
