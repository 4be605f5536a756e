//! Viewer identification from request headers.
//!
//! Authentication proper sits in front of this service; by the time a
//! request arrives, a trusted proxy has stamped it with `x-viewer-id`
//! (the viewer's own contact key) and optionally `x-viewer-role: admin`.
//! Requests without the id header are anonymous.

use axum::{extract::FromRequestParts, http::request::Parts};
use rolo_core::contact::Viewer;
use uuid::Uuid;

use crate::error::ApiError;

pub const VIEWER_ID_HEADER: &str = "x-viewer-id";
pub const VIEWER_ROLE_HEADER: &str = "x-viewer-role";

/// Extractor wrapper around [`Viewer`].
#[derive(Debug, Clone, Copy)]
pub struct ViewerParty(pub Viewer);

impl<S> FromRequestParts<S> for ViewerParty
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let Some(raw_id) = parts.headers.get(VIEWER_ID_HEADER) else {
      return Ok(Self(Viewer::Anonymous));
    };

    let id = raw_id
      .to_str()
      .ok()
      .and_then(|s| Uuid::parse_str(s).ok())
      .ok_or_else(|| {
        ApiError::BadRequest(format!("invalid {VIEWER_ID_HEADER} header"))
      })?;

    let admin = parts
      .headers
      .get(VIEWER_ROLE_HEADER)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|role| role.eq_ignore_ascii_case("admin"));

    Ok(Self(if admin { Viewer::Admin(id) } else { Viewer::User(id) }))
  }
}
