//! Handlers for `/search`, `/complete`, and `/birthdays`.

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::Utc;
use rolo_core::{
  contact::Contact,
  store::{ContactStore, IndexStore},
};
use rolo_engine::birthdays::Jubilee;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError, viewer::ViewerParty};

const fn default_limit() -> usize { 20 }
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:             String,
  #[serde(default = "default_limit")]
  pub limit:         usize,
  #[serde(default)]
  pub include_attic: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
  pub contacts: Vec<Contact>,
  pub has_more: bool,
}

async fn hydrate<S>(
  state: &AppState<S>,
  page: rolo_engine::search::SearchPage,
) -> Result<SearchResponse, ApiError>
where
  S: ContactStore + IndexStore,
{
  let mut contacts = Vec::with_capacity(page.contacts.len());
  for id in page.contacts {
    // The index may briefly trail a hard repair delete; skip silently.
    if let Some(contact) =
      state.store.get_contact(id).await.map_err(ApiError::store)?
    {
      contacts.push(contact);
    }
  }
  Ok(SearchResponse { contacts, has_more: page.has_more })
}

/// `GET /search?q=<words>[&limit=20][&include_attic=true]` — every word is a
/// token prefix; all must match. Results are limited to what the viewer
/// may see.
pub async fn query<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let limit = params.limit.clamp(1, MAX_LIMIT);
  let page = state
    .search
    .search(viewer, &params.q, limit, params.include_attic)
    .await?;
  Ok(Json(hydrate(&state, page).await?))
}

/// `GET /search/page?q=<words>[&limit=20]` — the page after the last one
/// served for this query. An expired cursor restarts from the top.
pub async fn next_page<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let limit = params.limit.clamp(1, MAX_LIMIT);
  let page = state
    .search
    .next_page(viewer, &params.q, limit, params.include_attic)
    .await?;
  Ok(Json(hydrate(&state, page).await?))
}

// ─── Complete ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompleteParams {
  pub term:  String,
  #[serde(default = "default_limit")]
  pub limit: usize,
}

/// `GET /complete?term=<partial>[&limit=20]`
pub async fn complete<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<CompleteParams>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let limit = params.limit.clamp(1, MAX_LIMIT);
  let suggestions = state.search.complete(&params.term, limit).await?;
  Ok(Json(suggestions))
}

// ─── Birthdays ────────────────────────────────────────────────────────────────

const fn default_days_back() -> i64 { 2 }
const fn default_days_ahead() -> i64 { 14 }

#[derive(Debug, Deserialize)]
pub struct BirthdayParams {
  #[serde(default = "default_days_back")]
  pub days_back:  i64,
  #[serde(default = "default_days_ahead")]
  pub days_ahead: i64,
}

/// `GET /birthdays[?days_back=2][&days_ahead=14]` — visible people with a
/// birthday near today, by calendar day.
pub async fn birthdays<S>(
  State(state): State<AppState<S>>,
  ViewerParty(viewer): ViewerParty,
  Query(params): Query<BirthdayParams>,
) -> Result<Json<Vec<Jubilee>>, ApiError>
where
  S: ContactStore + IndexStore,
{
  let jubilees = state
    .birthdays
    .upcoming(
      viewer,
      Utc::now().date_naive(),
      params.days_back,
      params.days_ahead,
    )
    .await?;
  Ok(Json(jubilees))
}
