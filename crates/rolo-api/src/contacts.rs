//! Handlers for `/contacts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contacts` | Viewer's visible contacts; `?include_attic=true` |
//! | `POST` | `/contacts` | Body: [`CreateBody`]; the viewer becomes owner |
//! | `GET`  | `/contacts/:id` | 404 if absent or not visible |
//! | `POST` | `/contacts/:id/attic` | Body: `{"attic":true}`; owner or admin |
//! | `POST` | `/contacts/:id/owner` | Body: `{"owner_id":...}`; owner or admin |
//! | `GET`  | `/contacts/:id/properties` | Current rows; `?include_attic=true` |
//! | `GET`  | `/contacts/:id/history` | All rows ever, each with lineage |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rolo_core::{
  contact::{Contact, ContactDetail, NewContact, Viewer},
  property::Property,
  store::{ContactStore, IndexStore},
};
use rolo_engine::indexer::EntityRef;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, viewer::ViewerParty};

/// Resolve a contact the viewer is allowed to see, or 404.
///
/// Absent and invisible are deliberately the same answer; the response must
/// not reveal whether a hidden record exists. Attic'd records stay reachable
/// here so their history can still be inspected.
pub(crate) async fn ensure_visible<S>(
  state: &AppState<S>,
  viewer: Viewer,
  id: Uuid,
) -> Result<Contact, ApiError>
where
  S: ContactStore + IndexStore,
{
  let contact = state
    .store
    .get_contact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;

  if viewer.is_admin() || viewer.contact_id() == Some(id) {
    return Ok(contact);
  }
  let visible = state.visibility.visible(viewer, true, false).await?;
  if !visible.contains(&id) {
    return Err(ApiError::NotFound(format!("contact {id} not found")));
  }
  Ok(contact)
}

fn require_viewer(viewer: Viewer) -> Result<Uuid, ApiError> {
  viewer
    .contact_id()
    .ok_or_else(|| ApiError::Forbidden("viewer identity required".into()))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  #[serde(default)]
  pub include_attic: bool,
}

/// `GET /contacts[?include_attic=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Contact>>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let mut contacts = if viewer.is_admin() {
    let mut all = state
      .store
      .contacts_by_recency(None)
      .await
      .map_err(ApiError::store)?;
    if !params.include_attic {
      all.retain(|c| !c.attic);
    }
    all
  } else {
    let visible = state
      .visibility
      .visible(viewer, params.include_attic, false)
      .await?;
    let mut out = Vec::with_capacity(visible.len());
    for id in visible {
      if let Some(contact) =
        state.store.get_contact(id).await.map_err(ApiError::store)?
      {
        out.push(contact);
      }
    }
    out
  };

  contacts.sort_by(|a, b| {
    a.name.cmp(&b.name).then(a.contact_id.cmp(&b.contact_id))
  });
  Ok(Json(contacts))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:   String,
  #[serde(flatten)]
  pub detail: ContactDetail,
}

/// `POST /contacts` — body: `{"name":"...","kind":"person",...}`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContactStore + IndexStore,
{
  let owner_id = require_viewer(viewer)?;
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  // The viewer's own record is provisioned out of band; an id the store
  // has never seen is a misconfigured proxy, not a client error.
  if state
    .store
    .get_contact(owner_id)
    .await
    .map_err(ApiError::store)?
    .is_none()
  {
    return Err(ApiError::Forbidden(format!("unknown viewer {owner_id}")));
  }

  let contact = state
    .store
    .add_contact(NewContact::new(body.name, body.detail).owned_by(owner_id))
    .await
    .map_err(ApiError::store)?;

  state
    .maintainer
    .reindex(EntityRef::Contact(contact.contact_id))
    .await?;
  state.visibility.invalidate(owner_id);

  Ok((StatusCode::CREATED, Json(contact)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /contacts/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
) -> Result<Json<Contact>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let contact = ensure_visible(&state, viewer, id).await?;
  Ok(Json(contact))
}

// ─── Attic ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AtticBody {
  pub attic: bool,
}

/// `POST /contacts/:id/attic` — soft-delete or restore. Owner or admin only.
pub async fn set_attic<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
  Json(body): Json<AtticBody>,
) -> Result<Json<Contact>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let viewer_id = require_viewer(viewer)?;
  let contact = ensure_visible(&state, viewer, id).await?;
  if !viewer.is_admin() && contact.owner_id != Some(viewer_id) {
    return Err(ApiError::Forbidden("only the owner may attic".into()));
  }

  let updated = state
    .store
    .set_contact_attic(id, body.attic)
    .await
    .map_err(ApiError::store)?;

  state.maintainer.reindex(EntityRef::Contact(id)).await?;
  if let Some(owner) = updated.owner_id {
    state.visibility.invalidate(owner);
  }
  state.visibility.invalidate(id);

  Ok(Json(updated))
}

// ─── Owner ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OwnerBody {
  pub owner_id: Uuid,
}

/// `POST /contacts/:id/owner` — transfer ownership. Owner or admin only.
pub async fn set_owner<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
  Json(body): Json<OwnerBody>,
) -> Result<Json<Contact>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let viewer_id = require_viewer(viewer)?;
  let contact = ensure_visible(&state, viewer, id).await?;
  if !viewer.is_admin() && contact.owner_id != Some(viewer_id) {
    return Err(ApiError::Forbidden(
      "only the owner may transfer ownership".into(),
    ));
  }
  if state
    .store
    .get_contact(body.owner_id)
    .await
    .map_err(ApiError::store)?
    .is_none()
  {
    return Err(ApiError::BadRequest(format!(
      "new owner {} does not exist",
      body.owner_id
    )));
  }

  let previous_owner = contact.owner_id;
  let updated = state
    .store
    .set_contact_owner(id, body.owner_id)
    .await
    .map_err(ApiError::store)?;

  if let Some(owner) = previous_owner {
    state.visibility.invalidate(owner);
  }
  state.visibility.invalidate(body.owner_id);

  Ok(Json(updated))
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
pub struct HistoryEntry {
  #[serde(flatten)]
  pub property:     Property,
  /// The lineage row that retired this property, if any.
  pub supersession: Option<rolo_core::property::Supersession>,
}

/// `GET /contacts/:id/history` — every property ever recorded for the
/// contact, current and attic alike, each with its lineage row.
pub async fn history<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: ContactStore + IndexStore,
{
  ensure_visible(&state, viewer, id).await?;
  let properties = state
    .store
    .properties_of(id, true)
    .await
    .map_err(ApiError::store)?;

  let mut entries = Vec::with_capacity(properties.len());
  for property in properties {
    let supersession = state
      .store
      .supersession_for(property.property_id)
      .await
      .map_err(ApiError::store)?;
    entries.push(HistoryEntry { property, supersession });
  }
  Ok(Json(entries))
}

// ─── Properties of ────────────────────────────────────────────────────────────

/// `GET /contacts/:id/properties[?include_attic=true]`
pub async fn properties<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Property>>, ApiError>
where
  S: ContactStore + IndexStore,
{
  ensure_visible(&state, viewer, id).await?;
  let properties = state
    .store
    .properties_of(id, params.include_attic)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(properties))
}
