//! Upcoming-birthday lookup for a viewer's visible contacts.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use rolo_core::{
  contact::{ContactDetail, Viewer},
  fuzzy::FuzzyDate,
  store::ContactStore,
};

use crate::{visibility::VisibilityEngine, Error, Result};

/// A person with a birthday inside the requested window.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Jubilee {
  pub contact_id: Uuid,
  pub name:       String,
  pub nickname:   Option<String>,
  pub birthday:   FuzzyDate,
}

pub struct BirthdayFinder<S> {
  store:      Arc<S>,
  visibility: Arc<VisibilityEngine<S>>,
}

impl<S: ContactStore> BirthdayFinder<S> {
  pub fn new(store: Arc<S>, visibility: Arc<VisibilityEngine<S>>) -> Self {
    Self { store, visibility }
  }

  /// Visible people whose birthday falls within `days_back` days before
  /// `today` through `days_ahead` days after, by calendar day regardless
  /// of year. The window may wrap the end of the year. Birthdays without a
  /// known month never match; results are ordered by month and day.
  pub async fn upcoming(
    &self,
    viewer: Viewer,
    today: NaiveDate,
    days_back: i64,
    days_ahead: i64,
  ) -> Result<Vec<Jubilee>> {
    let from = today - chrono::Duration::days(days_back);
    let to = today + chrono::Duration::days(days_ahead);
    let from_md = month_day(from);
    let to_md = month_day(to);
    let wraps = from_md > to_md;

    let visible = self.visibility.visible(viewer, false, false).await?;

    let mut jubilees = Vec::new();
    for contact_id in visible {
      let Some(contact) =
        self.store.get_contact(contact_id).await.map_err(Error::store)?
      else {
        continue;
      };
      let ContactDetail::Person { nickname, birthday, .. } = &contact.detail
      else {
        continue;
      };
      if !birthday.has_month() {
        continue;
      }
      let md = (birthday.month as u32) * 100 + birthday.day as u32;
      let hit = if wraps {
        md >= from_md || md <= to_md
      } else {
        from_md <= md && md <= to_md
      };
      if hit {
        jubilees.push(Jubilee {
          contact_id: contact.contact_id,
          name: contact.name.clone(),
          nickname: nickname.clone(),
          birthday: *birthday,
        });
      }
    }

    jubilees.sort_by_key(|j| {
      ((j.birthday.month as u32) * 100 + j.birthday.day as u32, j.contact_id)
    });
    Ok(jubilees)
  }
}

fn month_day(date: NaiveDate) -> u32 { date.month() * 100 + date.day() }
