//! Openverse image search, restricted to licenses Wikipedia accepts.

use serde::Deserialize;

use careers_core::image::{ImageMetadata, ReplacementImage};

use crate::{http::join_url, Result};

pub const DEFAULT_OPENVERSE_API_URL: &str = "https://api.openverse.org/v1";

/// Licenses compatible with Wikipedia, in Openverse's filter syntax.
pub const COMPATIBLE_LICENSES: &str = "pdm,cc0,by,by-sa";

pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

fn untitled() -> String { "Untitled".into() }
fn unknown() -> String { "Unknown".into() }

/// An image as returned by search and detail lookups.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenverseImage {
  pub id:                  String,
  #[serde(default = "untitled", deserialize_with = "or_default::untitled")]
  pub title:               String,
  pub url:                 Option<String>,
  pub thumbnail:           Option<String>,
  pub foreign_landing_url: Option<String>,
  pub license:             Option<String>,
  pub license_version:     Option<String>,
  pub license_url:         Option<String>,
  #[serde(default = "unknown", deserialize_with = "or_default::unknown")]
  pub creator:             String,
  pub creator_url:         Option<String>,
  #[serde(default = "unknown", deserialize_with = "or_default::unknown")]
  pub source:              String,
  /// Pre-formatted attribution, only present on detail lookups.
  pub attribution:         Option<String>,
}

/// Openverse sends explicit nulls for absent text fields.
mod or_default {
  use serde::{Deserialize, Deserializer};

  pub fn untitled<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(super::untitled))
  }

  pub fn unknown<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(super::unknown))
  }
}

impl OpenverseImage {
  /// Whether the image is already hosted on Wikimedia Commons.
  pub fn is_commons(&self) -> bool {
    if self.source.eq_ignore_ascii_case("wikimedia") {
      return true;
    }
    let landing = self.foreign_landing_url.as_deref().unwrap_or_default();
    let url = self.url.as_deref().unwrap_or_default();
    landing.contains("commons.wikimedia.org") || url.contains("upload.wikimedia.org/wikipedia/commons")
  }

  /// The Commons file name from an `upload.wikimedia.org/.../commons/a/ab/Name.jpg` URL.
  pub fn commons_filename(&self) -> Option<&str> {
    let url = self.url.as_deref()?;
    if !url.contains("upload.wikimedia.org") {
      return None;
    }
    let (_, path) = url.split_once("/commons/")?;
    let name = path.split('/').nth(2)?;
    (!name.is_empty()).then_some(name)
  }

  /// Attribution text, preferring the one Openverse formatted.
  pub fn attribution_text(&self) -> String {
    if let Some(a) = &self.attribution {
      return a.clone();
    }
    let mut parts = vec![format!("\"{}\"", self.title), format!("by {}", self.creator)];
    if let Some(license) = &self.license {
      let mut text = license.to_uppercase();
      if let Some(v) = &self.license_version {
        text = format!("{text} {v}");
      }
      parts.push(format!("({text})"));
    }
    parts.push(format!("via {}", self.source));
    parts.join(" ")
  }

  /// A replacement row for this image. `None` when it has no image URL.
  pub fn to_replacement(&self, caption: Option<String>) -> Option<ReplacementImage> {
    let image_url = self.url.clone()?;
    Some(ReplacementImage {
      image_url,
      caption: caption.or_else(|| Some(self.title.clone())),
      metadata: ImageMetadata {
        creator:     Some(self.creator.clone()),
        license:     self.license.clone(),
        license_url: self.license_url.clone(),
        source_url:  self.foreign_landing_url.clone(),
      },
    })
  }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OpenverseSearch {
  #[serde(default)]
  pub results:      Vec<OpenverseImage>,
  #[serde(default)]
  pub result_count: u64,
  #[serde(default)]
  pub page_count:   u64,
}

#[derive(Clone)]
pub struct OpenverseClient {
  http:    reqwest::Client,
  api_url: String,
}

impl OpenverseClient {
  pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
    Self { http, api_url: api_url.into() }
  }

  /// `GET /images/?q=..&license=..&page=..&page_size=..`
  ///
  /// `page` is 1-based; `page_size` is capped at [`MAX_PAGE_SIZE`].
  pub async fn search_images(&self, query: &str, page: u32, page_size: u32) -> Result<OpenverseSearch> {
    let page = page.max(1).to_string();
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
    let resp = self
      .http
      .get(join_url(&self.api_url, "images/"))
      .query(&[
        ("q", query),
        ("license", COMPATIBLE_LICENSES),
        ("page", page.as_str()),
        ("page_size", page_size.as_str()),
      ])
      .send()
      .await?
      .error_for_status()?;
    let search: OpenverseSearch = resp.json().await?;
    tracing::debug!(query, results = search.results.len(), total = search.result_count, "openverse search");
    Ok(search)
  }

  /// `GET /images/<id>/`; `None` when Openverse does not know the id.
  pub async fn get_image(&self, id: &str) -> Result<Option<OpenverseImage>> {
    let path = format!("images/{}/", urlencoding::encode(id));
    let resp = self.http.get(join_url(&self.api_url, &path)).send().await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let image = resp.error_for_status()?.json().await?;
    Ok(Some(image))
  }
}
