//! Search-token normalisation.
//!
//! Every string that feeds the search index — contact names, nicknames,
//! last names, place names — and every query string passes through
//! [`tokenize`], so index writes and query reads agree on one canonical
//! token form.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Punctuation trimmed from the edges of each whitespace-separated piece.
const STRIP: &str = ",.;:\\?/!@#$%^&*()[]{}|\"'";

/// The maximum character value. Appending it to a prefix yields the
/// exclusive upper bound of a starts-with range scan over tokens.
pub const MAX_SUFFIX: char = char::MAX;

/// Normalise `text` into an ordered sequence of search tokens.
///
/// Splits on whitespace, trims the [`STRIP`] set from each piece, folds to
/// lower case, decomposes to NFD and drops combining marks (so "é" becomes
/// "e"), and discards anything left empty.
///
/// Pure and idempotent: re-tokenizing the space-joined output yields the
/// same sequence.
pub fn tokenize(text: &str) -> Vec<String> {
  text
    .split_whitespace()
    .filter_map(|piece| {
      let piece = piece.trim_matches(|c| STRIP.contains(c));
      let token: String = piece
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| *c != '`' && *c != '~')
        .collect();
      // Dropping backticks and tildes can expose fresh edge punctuation
      // ("`.a" trims to "`.a", filters to ".a"), so trim once more.
      let token = token.trim_matches(|c: char| STRIP.contains(c)).trim();
      (!token.is_empty()).then(|| token.to_owned())
    })
    .collect()
}

/// Like [`tokenize`] but with duplicates removed; first occurrence wins.
pub fn tokenize_unique(text: &str) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  tokenize(text)
    .into_iter()
    .filter(|t| seen.insert(t.clone()))
    .collect()
}

/// The exclusive upper bound that turns a `token >= prefix` scan into a
/// starts-with scan: all tokens below the bound share `prefix`.
pub fn prefix_upper_bound(prefix: &str) -> String {
  let mut hi = String::with_capacity(prefix.len() + MAX_SUFFIX.len_utf8());
  hi.push_str(prefix);
  hi.push(MAX_SUFFIX);
  hi
}
