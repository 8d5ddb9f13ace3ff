//! Images attached to a career.
//!
//! Image rows belong to exactly one career and are never updated in place.
//! They are bulk-inserted when Wikipedia images are fetched, or inserted one
//! at a time when a reviewer picks a replacement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::career::WikidataId;

/// Where an image came from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
  Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageSource {
  #[default]
  Wikipedia,
  Openverse,
}

/// Attribution details for an externally sourced image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
  pub creator:     Option<String>,
  pub license:     Option<String>,
  pub license_url: Option<String>,
  /// Landing page of the image at its original host.
  pub source_url:  Option<String>,
}

impl ImageMetadata {
  pub fn is_empty(&self) -> bool {
    self.creator.is_none()
      && self.license.is_none()
      && self.license_url.is_none()
      && self.source_url.is_none()
  }
}

/// A persisted image row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerImage {
  pub id:             i64,
  pub wikidata_id:    WikidataId,
  pub image_url:      String,
  pub caption:        Option<String>,
  /// Display order within the career.
  pub position:       i64,
  pub is_replacement: bool,
  pub source:         ImageSource,
  pub metadata:       Option<ImageMetadata>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::CareerStore::add_career_image`] and
/// [`crate::store::CareerStore::add_career_images`].
///
/// Rows added this way are never replacements; those only come from
/// [`crate::store::CareerStore::set_replacement_image`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCareerImage {
  pub image_url: String,
  pub caption:   Option<String>,
  /// Bulk inserts default this to the image's index in the batch.
  pub position:  Option<i64>,
  pub source:    ImageSource,
}

impl NewCareerImage {
  /// An image scraped from the career's Wikipedia article.
  pub fn wikipedia(image_url: impl Into<String>, caption: Option<String>) -> Self {
    Self {
      image_url: image_url.into(),
      caption,
      ..Self::default()
    }
  }
}

/// Input to [`crate::store::CareerStore::set_replacement_image`].
/// Replacements are always Openverse-sourced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplacementImage {
  pub image_url: String,
  pub caption:   Option<String>,
  pub metadata:  ImageMetadata,
}
