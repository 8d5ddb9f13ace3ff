//! Row decoding for the PostgreSQL backend.
//!
//! Timestamps map directly to `TIMESTAMPTZ`; enums are stored as their
//! snake_case discriminants and image metadata as JSON text.

use std::str::FromStr;

use careers_core::{
  career::{Career, WikidataId},
  image::{CareerImage, ImageMetadata},
};
use tokio_postgres::Row;

use crate::{Error, Result};

pub const CAREER_COLUMNS: &str = "wikidata_id, name, category, wikipedia_url, \
   pageviews_total, avg_daily_views, last_pageview_update, status, reviewed_by, \
   reviewed_at, notes, lede_text, lede_fetched_at, images_fetched_at, \
   created_at, updated_at";

pub const IMAGE_COLUMNS: &str =
  "id, wikidata_id, image_url, caption, position, is_replacement, source, metadata, created_at";

fn decode_enum<T: FromStr>(column: &'static str, value: String) -> Result<T> {
  value.parse().map_err(|_| Error::Decode { column, value })
}

/// `None` for empty metadata so the column stays NULL.
pub fn encode_metadata(m: &ImageMetadata) -> Result<Option<String>> {
  if m.is_empty() { Ok(None) } else { Ok(Some(serde_json::to_string(m)?)) }
}

pub fn career_from_row(row: &Row) -> Result<Career> {
  Ok(Career {
    wikidata_id:          WikidataId::try_from(row.try_get::<_, String>("wikidata_id")?)?,
    name:                 row.try_get("name")?,
    category:             decode_enum("category", row.try_get("category")?)?,
    wikipedia_url:        row.try_get("wikipedia_url")?,
    pageviews_total:      row.try_get("pageviews_total")?,
    avg_daily_views:      row.try_get("avg_daily_views")?,
    last_pageview_update: row.try_get("last_pageview_update")?,
    status:               decode_enum("status", row.try_get("status")?)?,
    reviewed_by:          row.try_get("reviewed_by")?,
    reviewed_at:          row.try_get("reviewed_at")?,
    notes:                row.try_get("notes")?,
    lede_text:            row.try_get("lede_text")?,
    lede_fetched_at:      row.try_get("lede_fetched_at")?,
    images_fetched_at:    row.try_get("images_fetched_at")?,
    created_at:           row.try_get("created_at")?,
    updated_at:           row.try_get("updated_at")?,
  })
}

pub fn image_from_row(row: &Row) -> Result<CareerImage> {
  let metadata = row
    .try_get::<_, Option<String>>("metadata")?
    .as_deref()
    .map(serde_json::from_str::<ImageMetadata>)
    .transpose()?;

  Ok(CareerImage {
    id: row.try_get("id")?,
    wikidata_id: WikidataId::try_from(row.try_get::<_, String>("wikidata_id")?)?,
    image_url: row.try_get("image_url")?,
    caption: row.try_get("caption")?,
    position: row.try_get("position")?,
    is_replacement: row.try_get("is_replacement")?,
    source: decode_enum("source", row.try_get("source")?)?,
    metadata,
    created_at: row.try_get("created_at")?,
  })
}
