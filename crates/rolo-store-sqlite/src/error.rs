//! Error type for `rolo-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rolo_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("contact not found: {0}")]
  ContactNotFound(uuid::Uuid),

  #[error("property not found: {0}")]
  PropertyNotFound(uuid::Uuid),

  #[error("property {0} is already superseded")]
  AlreadySuperseded(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
