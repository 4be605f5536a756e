//! Integration tests driving the full router over an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use rolo_core::{
  contact::{ContactDetail, NewContact},
  store::ContactStore,
};
use rolo_engine::visibility::VisibilityConfig;
use rolo_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::AppState;

struct TestApp {
  router: Router,
  store:  Arc<SqliteStore>,
}

async fn app() -> TestApp {
  let store =
    Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));
  let state = AppState::new(store.clone(), VisibilityConfig::default());
  TestApp { router: crate::api_router(state), store }
}

impl TestApp {
  /// Provision a user account: a self-owned Person record.
  async fn user(&self, name: &str) -> Uuid {
    let contact = self
      .store
      .add_contact(NewContact::new(name, ContactDetail::person()))
      .await
      .unwrap();
    self
      .store
      .set_contact_owner(contact.contact_id, contact.contact_id)
      .await
      .unwrap();
    contact.contact_id
  }

  async fn request(
    &self,
    method: Method,
    uri: &str,
    viewer: Option<(Uuid, bool)>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, admin)) = viewer {
      builder = builder.header("x-viewer-id", id.to_string());
      if admin {
        builder = builder.header("x-viewer-role", "admin");
      }
    }
    let request = match body {
      Some(value) => builder
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string())),
      None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = self.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn get(&self, uri: &str, viewer: Uuid) -> (StatusCode, Value) {
    self.request(Method::GET, uri, Some((viewer, false)), None).await
  }

  async fn post(
    &self,
    uri: &str,
    viewer: Uuid,
    body: Value,
  ) -> (StatusCode, Value) {
    self
      .request(Method::POST, uri, Some((viewer, false)), Some(body))
      .await
  }

  /// Create a contact through the API and return its id.
  async fn create_contact(&self, viewer: Uuid, body: Value) -> Uuid {
    let (status, value) = self.post("/contacts", viewer, body).await;
    assert_eq!(status, StatusCode::CREATED);
    value["contact_id"].as_str().unwrap().parse().unwrap()
  }
}

// ─── Contacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_fetch_contact() {
  let app = app().await;
  let me = app.user("Stef").await;

  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (status, contact) = app.get(&format!("/contacts/{id}"), me).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(contact["name"], "Dirk");
  assert_eq!(contact["owner_id"].as_str().unwrap(), me.to_string());
}

#[tokio::test]
async fn anonymous_cannot_create() {
  let app = app().await;
  let (status, _) = app
    .request(
      Method::POST,
      "/contacts",
      None,
      Some(json!({ "name": "Dirk", "kind": "person" })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hidden_contact_reads_as_missing() {
  let app = app().await;
  let me = app.user("Stef").await;
  let stranger = app.user("Olga").await;
  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (status, _) = app.get(&format!("/contacts/{id}"), stranger).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  // Admin bypasses visibility.
  let (status, _) = app
    .request(
      Method::GET,
      &format!("/contacts/{id}"),
      Some((stranger, true)),
      None,
    )
    .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn attic_removes_from_listing_but_keeps_record() {
  let app = app().await;
  let me = app.user("Stef").await;
  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (status, _) = app
    .post(&format!("/contacts/{id}/attic"), me, json!({ "attic": true }))
    .await;
  assert_eq!(status, StatusCode::OK);

  let (_, listed) = app.get("/contacts", me).await;
  let names: Vec<&str> = listed
    .as_array()
    .unwrap()
    .iter()
    .map(|c| c["name"].as_str().unwrap())
    .collect();
  assert!(!names.contains(&"Dirk"));

  // The record itself stays reachable for history.
  let (status, contact) = app.get(&format!("/contacts/{id}"), me).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(contact["attic"], true);
}

#[tokio::test]
async fn only_owner_may_attic() {
  let app = app().await;
  let me = app.user("Stef").await;
  let other = app.user("Olga").await;
  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  // The stranger cannot even see it.
  let (status, _) = app
    .post(&format!("/contacts/{id}/attic"), other, json!({ "attic": true }))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn property_lifecycle_over_http() {
  let app = app().await;
  let me = app.user("Stef").await;
  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (status, property) = app
    .post(
      "/properties",
      me,
      json!({
        "contact_id": id,
        "value": { "type": "email", "data": "dirk@example.com" },
      }),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);
  let property_id = property["property_id"].as_str().unwrap().to_owned();

  // Supersede it.
  let (status, replacement) = app
    .post(
      &format!("/properties/{property_id}/supersede"),
      me,
      json!({ "value": { "type": "email", "data": "dirk@new.example" } }),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(replacement["value"]["data"], "dirk@new.example");

  // A second supersede of the same row conflicts.
  let (status, _) = app
    .post(
      &format!("/properties/{property_id}/supersede"),
      me,
      json!({ "value": { "type": "email", "data": "dirk@third.example" } }),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);

  // The lineage is queryable from the retired row.
  let (status, lineage) = app
    .get(&format!("/properties/{property_id}/supersession"), me)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    lineage["new_property_id"],
    replacement["property_id"]
  );

  // History lists both rows, the retired one with its lineage.
  let (status, history) =
    app.get(&format!("/contacts/{id}/history"), me).await;
  assert_eq!(status, StatusCode::OK);
  let entries = history.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert!(
    entries
      .iter()
      .any(|e| e["attic"] == true && !e["supersession"].is_null())
  );

  // Current view hides the retired row, attic view shows both.
  let (_, current) =
    app.get(&format!("/contacts/{id}/properties"), me).await;
  assert_eq!(current.as_array().unwrap().len(), 1);
  let (_, all) = app
    .get(&format!("/contacts/{id}/properties?include_attic=true"), me)
    .await;
  assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn link_to_missing_contact_is_rejected() {
  let app = app().await;
  let me = app.user("Stef").await;
  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (status, _) = app
    .post(
      "/properties",
      me,
      json!({
        "contact_id": id,
        "value": {
          "type": "link",
          "data": {
            "target": Uuid::new_v4(),
            "relation": "friend",
            "privacy": "open",
          },
        },
      }),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_finds_freshly_written_contacts() {
  let app = app().await;
  let me = app.user("Stef").await;
  app
    .create_contact(
      me,
      json!({ "name": "Dirk", "kind": "person", "lastname": "Diesbach" }),
    )
    .await;

  let (status, found) = app.get("/search?q=dies", me).await;
  assert_eq!(status, StatusCode::OK);
  let contacts = found["contacts"].as_array().unwrap();
  assert_eq!(contacts.len(), 1);
  assert_eq!(contacts[0]["name"], "Dirk");
  assert_eq!(found["has_more"], false);
}

#[tokio::test]
async fn search_respects_visibility() {
  let app = app().await;
  let me = app.user("Stef").await;
  let other = app.user("Olga").await;
  app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (_, found) = app.get("/search?q=dirk", other).await;
  assert!(found["contacts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn attic_drops_out_of_search() {
  let app = app().await;
  let me = app.user("Stef").await;
  let id = app
    .create_contact(me, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  app
    .post(&format!("/contacts/{id}/attic"), me, json!({ "attic": true }))
    .await;

  let (_, found) = app.get("/search?q=dirk", me).await;
  assert!(found["contacts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn completion_suggests_indexed_tokens() {
  let app = app().await;
  let me = app.user("Stef").await;
  app
    .create_contact(
      me,
      json!({ "name": "Dirk", "kind": "person", "lastname": "Diesbach" }),
    )
    .await;

  let (status, suggestions) = app.get("/complete?term=die", me).await;
  assert_eq!(status, StatusCode::OK);
  assert!(
    suggestions
      .as_array()
      .unwrap()
      .iter()
      .any(|s| s == "Diesbach")
  );
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_endpoints_reject_plain_users() {
  let app = app().await;
  let me = app.user("Stef").await;

  for uri in ["/admin/reindex", "/admin/purge", "/admin/repair"] {
    let (status, _) = app.post(uri, me, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
  }
  let (status, _) = app.get("/admin/reindex/progress", me).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn purge_and_repair_report_counts() {
  let app = app().await;
  let admin = app.user("Root").await;
  app
    .create_contact(admin, json!({ "name": "Dirk", "kind": "person" }))
    .await;

  let (status, purged) = app
    .request(Method::POST, "/admin/purge", Some((admin, true)), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(purged["entries"], 1);

  let (status, report) = app
    .request(Method::POST, "/admin/repair", Some((admin, true)), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["orphaned_properties"], 0);
  assert_eq!(report["fixed"], 0);
}
