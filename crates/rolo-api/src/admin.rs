//! Handlers for `/admin` endpoints. All of them require an admin viewer.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rolo_core::{
  contact::Viewer,
  store::{ContactStore, IndexStore},
};
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, error::ApiError, viewer::ViewerParty};

fn require_admin(viewer: Viewer) -> Result<(), ApiError> {
  if viewer.is_admin() {
    Ok(())
  } else {
    Err(ApiError::Forbidden("admin role required".into()))
  }
}

// ─── Reindex ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ReindexBody {
  /// Only reconcile contacts and addresses touched at or after this
  /// instant. Omit for a full rebuild.
  pub since: Option<DateTime<Utc>>,
}

/// `POST /admin/reindex` — start a batch reconciliation in the background
/// and return immediately. Poll `/admin/reindex/progress` for completion.
pub async fn reindex<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  body: Option<Json<ReindexBody>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContactStore + IndexStore + 'static,
{
  require_admin(viewer)?;
  let Json(body) = body.unwrap_or_default();

  let batch = state.batch.clone();
  tokio::spawn(async move {
    if let Err(error) = batch.run(body.since).await {
      tracing::error!(%error, "batch reindex failed");
    }
  });

  Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))))
}

/// `GET /admin/reindex/progress`
pub async fn reindex_progress<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ContactStore + IndexStore,
{
  require_admin(viewer)?;
  Ok(Json(json!({ "percent": state.batch.progress_percent() })))
}

// ─── Purge ────────────────────────────────────────────────────────────────────

/// `POST /admin/purge` — drop the whole index. Follow up with a reindex.
pub async fn purge<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ContactStore + IndexStore,
{
  require_admin(viewer)?;
  let counts = state.batch.purge().await?;
  Ok(Json(json!({ "keys": counts.keys, "entries": counts.entries })))
}

// ─── Repair ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct RepairParams {
  /// Delete the orphans found instead of only reporting them.
  #[serde(default)]
  pub fix: bool,
}

/// `POST /admin/repair[?fix=true]` — scan for rows referencing missing
/// contacts.
pub async fn repair<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Query(params): Query<RepairParams>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: ContactStore + IndexStore,
{
  require_admin(viewer)?;
  let report = state.repair.run(params.fix).await?;
  Ok(Json(json!({
    "orphaned_properties": report.orphaned_properties,
    "orphaned_entries":    report.orphaned_entries,
    "fixed":               report.fixed,
  })))
}
