//! Handlers for `/properties` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/properties` | Body: [`CreateBody`]; returns 201 + stored row |
//! | `GET`  | `/properties/:id` | 404 if absent or owning contact not visible |
//! | `POST` | `/properties/:id/supersede` | Body: `{"value":...}`; 409 if already superseded |
//! | `POST` | `/properties/:id/attic` | Body: `{"attic":true}` |
//! | `GET`  | `/properties/:id/supersession` | Lineage row, `null` if current |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rolo_core::{
  contact::Viewer,
  property::{NewProperty, Property, PropertyValue, Supersession},
  store::{ContactStore, IndexStore},
};
use rolo_engine::indexer::EntityRef;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, contacts::ensure_visible, error::ApiError, viewer::ViewerParty,
};

/// Resolve a property whose owning contact the viewer may see, or 404.
async fn ensure_property_visible<S>(
  state: &AppState<S>,
  viewer: Viewer,
  id: Uuid,
) -> Result<Property, ApiError>
where
  S: ContactStore + IndexStore,
{
  let property = state
    .store
    .get_property(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("property {id} not found")))?;
  ensure_visible(state, viewer, property.contact_id).await?;
  Ok(property)
}

/// Reconcile the index and drop the owning contact's cached visibility.
/// Link edits change what the contact's viewer can see; everything else is
/// harmless to over-invalidate.
async fn after_write<S>(
  state: &AppState<S>,
  property_id: Uuid,
  contact_id: Uuid,
) -> Result<(), ApiError>
where
  S: ContactStore + IndexStore,
{
  state
    .maintainer
    .reindex(EntityRef::Property(property_id))
    .await?;
  state.visibility.invalidate(contact_id);
  Ok(())
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub contact_id: Uuid,
  pub value:      PropertyValue,
}

/// `POST /properties` — body: `{"contact_id":...,"value":{"type":"email","data":...}}`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContactStore + IndexStore,
{
  ensure_visible(&state, viewer, body.contact_id).await?;
  if let Some(link) = body.value.as_link()
    && state
      .store
      .get_contact(link.target)
      .await
      .map_err(ApiError::store)?
      .is_none()
  {
    return Err(ApiError::BadRequest(format!(
      "link target {} does not exist",
      link.target
    )));
  }

  let property = state
    .store
    .add_property(NewProperty::new(body.contact_id, body.value))
    .await
    .map_err(ApiError::store)?;

  after_write(&state, property.property_id, property.contact_id).await?;
  Ok((StatusCode::CREATED, Json(property)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /properties/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
) -> Result<Json<Property>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let property = ensure_property_visible(&state, viewer, id).await?;
  Ok(Json(property))
}

// ─── Supersede ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SupersedeBody {
  pub value: PropertyValue,
}

/// `POST /properties/:id/supersede` — write the replacement, attic the
/// original, record the lineage. The replacement always lands on the same
/// contact.
pub async fn supersede_one<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
  Json(body): Json<SupersedeBody>,
) -> Result<Json<Property>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let old = ensure_property_visible(&state, viewer, id).await?;
  if state
    .store
    .supersession_for(id)
    .await
    .map_err(ApiError::store)?
    .is_some()
  {
    return Err(ApiError::Conflict(format!(
      "property {id} is already superseded"
    )));
  }

  let (_, replacement) = state
    .store
    .supersede_property(id, NewProperty::new(old.contact_id, body.value))
    .await
    .map_err(ApiError::store)?;

  after_write(&state, replacement.property_id, replacement.contact_id).await?;
  Ok(Json(replacement))
}

// ─── Attic ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AtticBody {
  pub attic: bool,
}

/// `POST /properties/:id/attic` — retract or restore without a replacement.
pub async fn set_attic<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
  Json(body): Json<AtticBody>,
) -> Result<Json<Property>, ApiError>
where
  S: ContactStore + IndexStore,
{
  ensure_property_visible(&state, viewer, id).await?;
  let updated = state
    .store
    .set_property_attic(id, body.attic)
    .await
    .map_err(ApiError::store)?;

  after_write(&state, updated.property_id, updated.contact_id).await?;
  Ok(Json(updated))
}

// ─── Supersession ─────────────────────────────────────────────────────────────

/// `GET /properties/:id/supersession` — the lineage row that retired this
/// property, or `null` while it is still current.
pub async fn supersession<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<Supersession>>, ApiError>
where
  S: ContactStore + IndexStore,
{
  ensure_property_visible(&state, viewer, id).await?;
  let supersession = state
    .store
    .supersession_for(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(supersession))
}
