//! Token-prefix search over the plain-key index.
//!
//! Every query word is treated as a prefix; a contact matches when every
//! word matches at least one of its tokens. Candidate sets come straight
//! from the index, then the viewer's visibility set filters them.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use lru::LruCache;
use uuid::Uuid;

use rolo_core::{
  contact::Viewer,
  store::{ContactStore, IndexStore},
  token::{prefix_upper_bound, tokenize_unique},
};

use crate::{visibility::VisibilityEngine, Error, Result};

const PAGE_CACHE_CAPACITY: std::num::NonZeroUsize =
  std::num::NonZeroUsize::new(256).unwrap();

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
  viewer:        Option<Uuid>,
  /// An admin cursor holds the unfiltered result list; the same id without
  /// the role must never pop it.
  admin:         bool,
  query:         String,
  include_attic: bool,
}

impl PageKey {
  fn new(viewer: Viewer, terms: &[String], include_attic: bool) -> Self {
    Self {
      viewer: viewer.contact_id(),
      admin: viewer.is_admin(),
      query: terms.join(" "),
      include_attic,
    }
  }
}

/// A materialized result list plus how far the viewer has paged into it.
struct PageCursor {
  results: Vec<Uuid>,
  offset:  usize,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
  pub contacts: Vec<Uuid>,
  /// Whether another call to [`SearchEngine::next_page`] can yield more.
  pub has_more: bool,
}

pub struct SearchEngine<S> {
  store:      Arc<S>,
  visibility: Arc<VisibilityEngine<S>>,
  pages:      Mutex<LruCache<PageKey, PageCursor>>,
}

impl<S: ContactStore + IndexStore> SearchEngine<S> {
  pub fn new(store: Arc<S>, visibility: Arc<VisibilityEngine<S>>) -> Self {
    let pages = Mutex::new(LruCache::new(PAGE_CACHE_CAPACITY));
    Self { store, visibility, pages }
  }

  fn lock_pages(&self) -> MutexGuard<'_, LruCache<PageKey, PageCursor>> {
    self.pages.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Run a fresh query and return its first page. The full result list is
  /// cached per (viewer, normalized query, attic flag) so later pages come
  /// from the same snapshot.
  pub async fn search(
    &self,
    viewer: Viewer,
    query: &str,
    limit: usize,
    include_attic: bool,
  ) -> Result<SearchPage> {
    let terms = tokenize_unique(query);
    if terms.is_empty() {
      return Ok(SearchPage { contacts: Vec::new(), has_more: false });
    }

    let results = self.run_query(viewer, &terms, include_attic).await?;
    let key = PageKey::new(viewer, &terms, include_attic);
    self.page_out(key, results, limit)
  }

  /// The page after the last one handed out for this query. A cursor that
  /// fell out of the cache restarts from the first page; stateless clients
  /// just see the results again.
  pub async fn next_page(
    &self,
    viewer: Viewer,
    query: &str,
    limit: usize,
    include_attic: bool,
  ) -> Result<SearchPage> {
    let terms = tokenize_unique(query);
    if terms.is_empty() {
      return Ok(SearchPage { contacts: Vec::new(), has_more: false });
    }
    let key = PageKey::new(viewer, &terms, include_attic);

    // Pop in its own statement; `page_out_from` takes the lock again and
    // a guard still held from the scrutinee would deadlock it.
    let cached = self.lock_pages().pop(&key);
    if let Some(cursor) = cached {
      return self.page_out_from(key, cursor.results, cursor.offset, limit);
    }

    tracing::debug!(query = %key.query, "page cursor expired, restarting");
    let results = self.run_query(viewer, &terms, include_attic).await?;
    self.page_out(key, results, limit)
  }

  /// Autocomplete: complete the last word of `term` against indexed tokens.
  /// Suggestions keep the words already typed and capitalize each token.
  pub async fn complete(
    &self,
    term: &str,
    limit: usize,
  ) -> Result<Vec<String>> {
    let mut words = tokenize_unique(term);
    let Some(last) = words.pop() else { return Ok(Vec::new()) };
    let prefix = words
      .iter()
      .map(|w| capitalize(w))
      .collect::<Vec<_>>()
      .join(" ");

    let keys = self
      .store
      .plain_keys_in_range(last.clone(), prefix_upper_bound(&last))
      .await
      .map_err(Error::store)?;

    let mut suggestions = Vec::new();
    for key in keys.into_iter().take(limit) {
      let completed = capitalize(&key.token);
      if prefix.is_empty() {
        suggestions.push(completed);
      } else {
        suggestions.push(format!("{prefix} {completed}"));
      }
    }
    Ok(suggestions)
  }

  async fn run_query(
    &self,
    viewer: Viewer,
    terms: &[String],
    include_attic: bool,
  ) -> Result<Vec<Uuid>> {
    let mut candidate_sets: Vec<HashSet<Uuid>> =
      Vec::with_capacity(terms.len());
    for term in terms {
      let keys = self
        .store
        .plain_keys_in_range(term.clone(), prefix_upper_bound(term))
        .await
        .map_err(Error::store)?;
      let mut postings = HashSet::new();
      for key in keys {
        postings.extend(
          self.store.contacts_for_key(key.key_id).await.map_err(Error::store)?,
        );
      }
      if postings.is_empty() {
        // One empty term empties the whole intersection.
        return Ok(Vec::new());
      }
      candidate_sets.push(postings);
    }

    // Intersect from the smallest set outward.
    candidate_sets.sort_by_key(|set| set.len());
    let mut iter = candidate_sets.into_iter();
    let mut matched = iter.next().unwrap_or_default();
    for set in iter {
      matched.retain(|id| set.contains(id));
    }

    if !viewer.is_admin() {
      // Atticked contacts carry no index entries, so `include_attic` only
      // widens the visibility set; it cannot resurrect retired tokens.
      let visible =
        self.visibility.visible(viewer, include_attic, false).await?;
      matched.retain(|id| visible.contains(id));
    }

    let mut results: Vec<Uuid> = matched.into_iter().collect();
    results.sort();
    Ok(results)
  }

  fn page_out(
    &self,
    key: PageKey,
    results: Vec<Uuid>,
    limit: usize,
  ) -> Result<SearchPage> {
    self.page_out_from(key, results, 0, limit)
  }

  fn page_out_from(
    &self,
    key: PageKey,
    results: Vec<Uuid>,
    offset: usize,
    limit: usize,
  ) -> Result<SearchPage> {
    let end = (offset + limit).min(results.len());
    let contacts = results[offset.min(results.len())..end].to_vec();
    let has_more = end < results.len();

    if has_more {
      self.lock_pages().put(key, PageCursor { results, offset: end });
    } else {
      self.lock_pages().pop(&key);
    }

    Ok(SearchPage { contacts, has_more })
  }
}

fn capitalize(token: &str) -> String {
  let mut chars = token.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use rolo_core::{
    contact::{ContactDetail, NewContact},
    property::{LinkValue, NewProperty, Privacy, PropertyValue},
    store::ContactStore,
  };
  use rolo_store_sqlite::SqliteStore;

  use super::*;
  use crate::indexer::{EntityRef, IndexMaintainer};

  struct Fixture {
    store:      Arc<SqliteStore>,
    maintainer: IndexMaintainer<SqliteStore>,
    engine:     SearchEngine<SqliteStore>,
  }

  async fn fixture() -> Fixture {
    let store =
      Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));
    let visibility = Arc::new(VisibilityEngine::new(store.clone()));
    Fixture {
      maintainer: IndexMaintainer::new(store.clone()),
      engine:     SearchEngine::new(store.clone(), visibility),
      store,
    }
  }

  impl Fixture {
    async fn person(&self, name: &str, lastname: Option<&str>) -> Uuid {
      let contact = self
        .store
        .add_contact(NewContact::new(name, ContactDetail::Person {
          lastname: lastname.map(str::to_owned),
          nickname: None,
          birthday: Default::default(),
        }))
        .await
        .unwrap();
      self
        .maintainer
        .reindex(EntityRef::Contact(contact.contact_id))
        .await
        .unwrap();
      contact.contact_id
    }

    async fn owned_person(&self, name: &str, owner: Uuid) -> Uuid {
      let contact = self
        .store
        .add_contact(
          NewContact::new(name, ContactDetail::person()).owned_by(owner),
        )
        .await
        .unwrap();
      self
        .maintainer
        .reindex(EntityRef::Contact(contact.contact_id))
        .await
        .unwrap();
      contact.contact_id
    }
  }

  #[tokio::test]
  async fn prefix_query_respects_visibility() {
    let f = fixture().await;
    let me = f.person("Stef", None).await;
    let dirk = f.owned_person("Dirk", me).await;
    let stranger = f.person("Dirkje", None).await;

    let page =
      f.engine.search(Viewer::User(me), "dir", 10, false).await.unwrap();
    assert!(page.contacts.contains(&dirk));
    assert!(!page.contacts.contains(&stranger));
  }

  #[tokio::test]
  async fn restricted_link_target_is_searchable() {
    let f = fixture().await;
    let me = f.person("Stef", None).await;
    let other = f.person("Olga", None).await;
    let dirk = f.owned_person("Dirk", other).await;
    f.store
      .add_property(NewProperty::new(
        me,
        PropertyValue::Link(LinkValue {
          target:   dirk,
          relation: "colleague".into(),
          privacy:  Privacy::Restricted,
        }),
      ))
      .await
      .unwrap();

    let page =
      f.engine.search(Viewer::User(me), "dir", 10, false).await.unwrap();
    assert_eq!(page.contacts, vec![dirk]);
  }

  #[tokio::test]
  async fn admin_bypasses_visibility() {
    let f = fixture().await;
    let admin = f.person("Root", None).await;
    let hidden = f.person("Dirk", None).await;

    let page =
      f.engine.search(Viewer::Admin(admin), "dirk", 10, false).await.unwrap();
    assert_eq!(page.contacts, vec![hidden]);
  }

  #[tokio::test]
  async fn all_terms_must_match() {
    let f = fixture().await;
    let me = f.person("Stef", None).await;
    let diesbach = {
      let c = f
        .store
        .add_contact(
          NewContact::new("Dirk", ContactDetail::Person {
            lastname: Some("Diesbach".into()),
            nickname: None,
            birthday: Default::default(),
          })
          .owned_by(me),
        )
        .await
        .unwrap();
      f.maintainer
        .reindex(EntityRef::Contact(c.contact_id))
        .await
        .unwrap();
      c.contact_id
    };
    f.owned_person("Dirk", me).await;

    let page =
      f.engine.search(Viewer::User(me), "dirk dies", 10, false).await.unwrap();
    assert_eq!(page.contacts, vec![diesbach]);
  }

  #[tokio::test]
  async fn unknown_term_yields_nothing() {
    let f = fixture().await;
    let me = f.person("Stef", None).await;
    f.owned_person("Dirk", me).await;

    let page = f
      .engine
      .search(Viewer::User(me), "dirk zzz", 10, false)
      .await
      .unwrap();
    assert!(page.contacts.is_empty());
    assert!(!page.has_more);
  }

  #[tokio::test]
  async fn accented_query_matches_folded_tokens() {
    let f = fixture().await;
    let me = f.person("Root", None).await;
    f.owned_person("Stéphane", me).await;

    let page =
      f.engine.search(Viewer::User(me), "Stéph", 10, false).await.unwrap();
    assert_eq!(page.contacts.len(), 1);
  }

  #[tokio::test]
  async fn admin_cursor_is_invisible_to_the_plain_role() {
    let f = fixture().await;
    let root = f.person("Root", None).await;
    for i in 0..3 {
      f.person(&format!("Dirk{i}"), None).await;
    }

    // Prime a cursor over the unfiltered list.
    let first =
      f.engine.search(Viewer::Admin(root), "dirk", 2, false).await.unwrap();
    assert!(first.has_more);

    // The same id without the admin role must not pop that cursor; it owns
    // nothing, so a fresh filtered query comes back empty.
    let page =
      f.engine.next_page(Viewer::User(root), "dirk", 2, false).await.unwrap();
    assert!(page.contacts.is_empty());

    // The admin cursor itself is still intact.
    let second =
      f.engine.next_page(Viewer::Admin(root), "dirk", 2, false).await.unwrap();
    assert_eq!(second.contacts.len(), 1);
  }

  #[tokio::test]
  async fn atticked_contact_stays_out_even_with_include_attic() {
    let f = fixture().await;
    let me = f.person("Stef", None).await;
    let dirk = f.owned_person("Dirk", me).await;

    f.store.set_contact_attic(dirk, true).await.unwrap();
    f.maintainer.reindex(EntityRef::Contact(dirk)).await.unwrap();

    // Attic removes the tokens themselves; widening visibility does not
    // bring the contact back.
    let page =
      f.engine.search(Viewer::User(me), "dirk", 10, true).await.unwrap();
    assert!(page.contacts.is_empty());
  }

  #[tokio::test]
  async fn paging_walks_the_result_list() {
    let f = fixture().await;
    let me = f.person("Root", None).await;
    let mut all = Vec::new();
    for i in 0..5 {
      all.push(f.owned_person(&format!("Dirk{i}"), me).await);
    }
    all.sort();

    let first =
      f.engine.search(Viewer::User(me), "dirk", 2, false).await.unwrap();
    assert_eq!(first.contacts, all[0..2]);
    assert!(first.has_more);

    let second =
      f.engine.next_page(Viewer::User(me), "dirk", 2, false).await.unwrap();
    assert_eq!(second.contacts, all[2..4]);
    assert!(second.has_more);

    let third =
      f.engine.next_page(Viewer::User(me), "dirk", 2, false).await.unwrap();
    assert_eq!(third.contacts, all[4..5]);
    assert!(!third.has_more);
  }

  #[tokio::test]
  async fn expired_cursor_restarts_from_the_top() {
    let f = fixture().await;
    let me = f.person("Root", None).await;
    for i in 0..3 {
      f.owned_person(&format!("Dirk{i}"), me).await;
    }

    // next_page without a prior search behaves like a fresh query.
    let page =
      f.engine.next_page(Viewer::User(me), "dirk", 2, false).await.unwrap();
    assert_eq!(page.contacts.len(), 2);
    assert!(page.has_more);
  }

  #[tokio::test]
  async fn completion_extends_the_last_word() {
    let f = fixture().await;
    f.person("Dirk", Some("Diesbach")).await;
    f.person("Dieter", None).await;

    let bare = f.engine.complete("die", 10).await.unwrap();
    assert!(bare.contains(&"Diesbach".to_string()));
    assert!(bare.contains(&"Dieter".to_string()));
    assert!(!bare.contains(&"Dirk".to_string()));

    let phrased = f.engine.complete("dirk die", 10).await.unwrap();
    assert!(phrased.contains(&"Dirk Diesbach".to_string()));
  }
}
