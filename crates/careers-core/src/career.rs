//! Career records: one row per Wikidata occupation entity.
//!
//! A career is keyed by its Wikidata id, which never changes once the row
//! exists. Discovery may rewrite the descriptive fields; review state and
//! traffic data are only touched by their own dedicated operations.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// A Wikidata entity id of the form `Q<digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WikidataId(String);

impl WikidataId {
  /// Validate and wrap an entity id such as `Q28640`.
  pub fn parse(s: &str) -> Result<Self> {
    if is_entity_id(s) {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::InvalidWikidataId(s.to_owned()))
    }
  }

  /// Extract the id from an entity URI such as
  /// `http://www.wikidata.org/entity/Q28640`.
  pub fn from_entity_uri(uri: &str) -> Result<Self> {
    Self::parse(uri.rsplit('/').next().unwrap_or_default())
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

/// Whether `s` has the exact shape of a Wikidata item id.
///
/// The SPARQL label service falls back to the bare id when an item has no
/// label in the requested language, so this also detects unlabelled items.
pub fn is_entity_id(s: &str) -> bool {
  s.strip_prefix('Q')
    .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

impl fmt::Display for WikidataId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for WikidataId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for WikidataId {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> {
    if is_entity_id(&s) { Ok(Self(s)) } else { Err(Error::InvalidWikidataId(s)) }
  }
}

impl From<WikidataId> for String {
  fn from(id: WikidataId) -> Self { id.0 }
}

impl AsRef<str> for WikidataId {
  fn as_ref(&self) -> &str { &self.0 }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Which kind of Wikidata class an entity was discovered through.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
  Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  #[default]
  Profession,
  Occupation,
  Job,
  Position,
}

/// Review state of a career.
///
/// Any state may move to any other; transitions are reviewer-initiated only.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
  Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CareerStatus {
  #[default]
  Unreviewed,
  NeedsDiverseImages,
  HasDiverseImages,
  #[serde(rename = "not_a_career")]
  #[strum(serialize = "not_a_career")]
  NotACareer,
  GenderSpecific,
}

// ─── Career ──────────────────────────────────────────────────────────────────

/// A persisted career row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Career {
  pub wikidata_id:          WikidataId,
  pub name:                 String,
  pub category:             Category,
  pub wikipedia_url:        Option<String>,
  /// Sum of monthly views over the fetch window.
  pub pageviews_total:      i64,
  pub avg_daily_views:      f64,
  /// `None` means pageviews have never been fetched for this career.
  pub last_pageview_update: Option<DateTime<Utc>>,
  pub status:               CareerStatus,
  pub reviewed_by:          Option<String>,
  pub reviewed_at:          Option<DateTime<Utc>>,
  pub notes:                Option<String>,
  pub lede_text:            Option<String>,
  pub lede_fetched_at:      Option<DateTime<Utc>>,
  pub images_fetched_at:    Option<DateTime<Utc>>,
  pub created_at:           DateTime<Utc>,
  /// Bumped by every mutating operation on the row.
  pub updated_at:           DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CareerStore::upsert_career`]: the descriptive
/// fields discovery produces. Everything else keeps its stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCareer {
  pub wikidata_id:   WikidataId,
  pub name:          String,
  pub category:      Category,
  pub wikipedia_url: Option<String>,
}

/// Aggregated traffic for one career, as produced by the pageview fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageviewUpdate {
  pub wikidata_id:     WikidataId,
  pub total_views:     i64,
  pub avg_daily_views: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_entity_ids() {
    assert_eq!(WikidataId::parse("Q28640").unwrap().as_str(), "Q28640");
    assert!(WikidataId::parse("Q").is_err());
    assert!(WikidataId::parse("q123").is_err());
    assert!(WikidataId::parse("Q12a").is_err());
    assert!(WikidataId::parse("P31").is_err());
  }

  #[test]
  fn parses_entity_uri() {
    let id = WikidataId::from_entity_uri("http://www.wikidata.org/entity/Q12737077").unwrap();
    assert_eq!(id.as_str(), "Q12737077");
  }

  #[test]
  fn label_shaped_like_an_id_is_detected() {
    assert!(is_entity_id("Q42"));
    assert!(!is_entity_id("Quarry worker"));
    assert!(!is_entity_id("Queen consort"));
  }

  #[test]
  fn status_discriminants_round_trip() {
    use strum::IntoEnumIterator as _;

    let names: Vec<String> = CareerStatus::iter().map(|s| s.to_string()).collect();
    assert_eq!(names, [
      "unreviewed",
      "needs_diverse_images",
      "has_diverse_images",
      "not_a_career",
      "gender_specific",
    ]);
    for status in CareerStatus::iter() {
      assert_eq!(status.as_ref().parse::<CareerStatus>().unwrap(), status);
      let json = serde_json::to_string(&status).unwrap();
      assert_eq!(json, format!("\"{status}\""));
    }
    assert!("needs_image".parse::<CareerStatus>().is_err());
  }

  #[test]
  fn wikidata_id_serde_rejects_malformed() {
    let ok: WikidataId = serde_json::from_str("\"Q5\"").unwrap();
    assert_eq!(ok.as_str(), "Q5");
    assert!(serde_json::from_str::<WikidataId>("\"nope\"").is_err());
  }
}
