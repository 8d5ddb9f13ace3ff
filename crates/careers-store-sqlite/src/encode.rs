//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enums are stored as their
//! snake_case discriminants and image metadata as compact JSON.

use std::str::FromStr;

use careers_core::{
  career::{Career, WikidataId},
  image::{CareerImage, ImageMetadata},
};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(column: &'static str, value: String) -> Result<T> {
  value.parse().map_err(|_| Error::Decode { column, value })
}

// ─── ImageMetadata ───────────────────────────────────────────────────────────

/// `None` for empty metadata so the column stays NULL.
pub fn encode_metadata(m: &ImageMetadata) -> Result<Option<String>> {
  if m.is_empty() { Ok(None) } else { Ok(Some(serde_json::to_string(m)?)) }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawCareer::from_row`].
pub const CAREER_COLUMNS: &str = "wikidata_id, name, category, wikipedia_url, \
   pageviews_total, avg_daily_views, last_pageview_update, status, reviewed_by, \
   reviewed_at, notes, lede_text, lede_fetched_at, images_fetched_at, \
   created_at, updated_at";

/// Raw values read directly from a `careers` row.
pub struct RawCareer {
  pub wikidata_id:          String,
  pub name:                 String,
  pub category:             String,
  pub wikipedia_url:        Option<String>,
  pub pageviews_total:      i64,
  pub avg_daily_views:      f64,
  pub last_pageview_update: Option<String>,
  pub status:               String,
  pub reviewed_by:          Option<String>,
  pub reviewed_at:          Option<String>,
  pub notes:                Option<String>,
  pub lede_text:            Option<String>,
  pub lede_fetched_at:      Option<String>,
  pub images_fetched_at:    Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawCareer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      wikidata_id:          row.get(0)?,
      name:                 row.get(1)?,
      category:             row.get(2)?,
      wikipedia_url:        row.get(3)?,
      pageviews_total:      row.get(4)?,
      avg_daily_views:      row.get(5)?,
      last_pageview_update: row.get(6)?,
      status:               row.get(7)?,
      reviewed_by:          row.get(8)?,
      reviewed_at:          row.get(9)?,
      notes:                row.get(10)?,
      lede_text:            row.get(11)?,
      lede_fetched_at:      row.get(12)?,
      images_fetched_at:    row.get(13)?,
      created_at:           row.get(14)?,
      updated_at:           row.get(15)?,
    })
  }

  pub fn into_career(self) -> Result<Career> {
    Ok(Career {
      wikidata_id:          WikidataId::try_from(self.wikidata_id)?,
      name:                 self.name,
      category:             decode_enum("category", self.category)?,
      wikipedia_url:        self.wikipedia_url,
      pageviews_total:      self.pageviews_total,
      avg_daily_views:      self.avg_daily_views,
      last_pageview_update: decode_opt_dt(self.last_pageview_update)?,
      status:               decode_enum("status", self.status)?,
      reviewed_by:          self.reviewed_by,
      reviewed_at:          decode_opt_dt(self.reviewed_at)?,
      notes:                self.notes,
      lede_text:            self.lede_text,
      lede_fetched_at:      decode_opt_dt(self.lede_fetched_at)?,
      images_fetched_at:    decode_opt_dt(self.images_fetched_at)?,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawCareerImage::from_row`].
pub const IMAGE_COLUMNS: &str =
  "id, wikidata_id, image_url, caption, position, is_replacement, source, metadata, created_at";

/// Raw values read directly from a `career_images` row.
pub struct RawCareerImage {
  pub id:             i64,
  pub wikidata_id:    String,
  pub image_url:      String,
  pub caption:        Option<String>,
  pub position:       i64,
  pub is_replacement: bool,
  pub source:         String,
  pub metadata:       Option<String>,
  pub created_at:     String,
}

impl RawCareerImage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      wikidata_id:    row.get(1)?,
      image_url:      row.get(2)?,
      caption:        row.get(3)?,
      position:       row.get(4)?,
      is_replacement: row.get(5)?,
      source:         row.get(6)?,
      metadata:       row.get(7)?,
      created_at:     row.get(8)?,
    })
  }

  pub fn into_image(self) -> Result<CareerImage> {
    let metadata = self
      .metadata
      .as_deref()
      .map(serde_json::from_str::<ImageMetadata>)
      .transpose()?;

    Ok(CareerImage {
      id: self.id,
      wikidata_id: WikidataId::try_from(self.wikidata_id)?,
      image_url: self.image_url,
      caption: self.caption,
      position: self.position,
      is_replacement: self.is_replacement,
      source: decode_enum("source", self.source)?,
      metadata,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn datetime_round_trips_through_rfc3339() {
    let now = Utc::now();
    assert_eq!(decode_dt(&encode_dt(now)).unwrap(), now);
    assert!(decode_dt("yesterday").is_err());
  }

  #[test]
  fn empty_metadata_encodes_as_null() {
    assert_eq!(encode_metadata(&ImageMetadata::default()).unwrap(), None);
    let m = ImageMetadata { creator: Some("Ada".into()), ..Default::default() };
    assert!(encode_metadata(&m).unwrap().unwrap().contains("Ada"));
  }
}
