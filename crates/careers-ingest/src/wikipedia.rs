//! Article content from the MediaWiki action API.
//!
//! Two lookups back the review screen: the introductory extract (cached on
//! the career as its lede) and the list of images already in the article.

use regex::Regex;
use serde::Deserialize;

use careers_core::image::NewCareerImage;

use crate::Result;

pub const DEFAULT_WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Image titles requested per article.
pub const IMAGE_LIST_LIMIT: usize = 50;
/// Images resolved to URLs per article.
pub const IMAGE_INFO_LIMIT: usize = 20;
/// Captions are cut to this many characters.
pub const CAPTION_MAX_CHARS: usize = 500;

/// Template and icon files that appear on most articles.
pub const IGNORED_IMAGE_PREFIXES: &[&str] = &[
  "File:OOjs",
  "File:Ambox",
  "File:Question",
  "File:Symbol",
  "File:Wiki",
  "File:Commons",
  "File:Edit-",
  "File:Globe",
  "File:Folder",
  "File:Portal",
  "File:Flag",
  "File:Crystal",
  "File:Nuvola",
  "File:Gnome",
  "File:Padlock",
  "File:Lock-",
  "File:Semi-",
  "File:Text",
  "File:Splitsection",
  "File:Merge-",
  "File:Wikibooks",
  "File:Wikiquote",
  "File:Wikisource",
  "File:Wiktionary",
  "File:Wikinews",
  "File:Wikiversity",
  "File:Wikivoyage",
  "File:Wikidata",
  "File:Wikispecies",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp"];

// ─── Titles ──────────────────────────────────────────────────────────────────

/// Human-readable title for a Wikipedia URL: decoded, underscores as spaces.
/// Empty when the URL has no `/wiki/` segment.
pub fn display_title(wikipedia_url: &str) -> String {
  crate::pageviews::article_title(wikipedia_url)
    .map(|t| t.replace('_', " "))
    .unwrap_or_default()
}

/// Whether a `File:` title is worth showing to a reviewer.
pub fn is_content_image(file_title: &str) -> bool {
  if IGNORED_IMAGE_PREFIXES.iter().any(|p| file_title.starts_with(p)) {
    return false;
  }
  let lower = file_title.to_lowercase();
  IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Remove markup from an `ImageDescription` and cap its length.
fn clean_caption(raw: &str) -> String {
  let text = match Regex::new(r"<[^>]+>") {
    Ok(re) => re.replace_all(raw, "").into_owned(),
    Err(_) => raw.to_owned(),
  };
  text.chars().take(CAPTION_MAX_CHARS).collect()
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
  #[serde(default)]
  query: Query,
}

#[derive(Debug, Default, Deserialize)]
struct Query {
  #[serde(default)]
  pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
  #[serde(default)]
  title:     String,
  #[serde(default)]
  missing:   bool,
  #[serde(default)]
  extract:   Option<String>,
  #[serde(default)]
  images:    Vec<PageImage>,
  #[serde(default)]
  imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageImage {
  title: String,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
  url:         Option<String>,
  thumburl:    Option<String>,
  #[serde(default)]
  extmetadata: ExtMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ExtMetadata {
  #[serde(rename = "ImageDescription")]
  image_description: Option<ExtValue>,
}

#[derive(Debug, Deserialize)]
struct ExtValue {
  #[serde(default)]
  value: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// An image found in an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleImage {
  /// The `File:` page title.
  pub title:     String,
  pub image_url: String,
  /// 400px thumbnail, or the full image when none was rendered.
  pub thumb_url: String,
  pub caption:   String,
}

impl From<ArticleImage> for NewCareerImage {
  fn from(img: ArticleImage) -> Self {
    let caption = (!img.caption.is_empty()).then_some(img.caption);
    NewCareerImage::wikipedia(img.image_url, caption)
  }
}

#[derive(Clone)]
pub struct WikipediaClient {
  http:    reqwest::Client,
  api_url: String,
}

impl WikipediaClient {
  pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
    Self { http, api_url: api_url.into() }
  }

  async fn query(&self, params: &[(&str, &str)]) -> Result<Query> {
    let resp = self
      .http
      .get(&self.api_url)
      .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
      .query(params)
      .send()
      .await?
      .error_for_status()?;
    let body: QueryResponse = resp.json().await?;
    Ok(body.query)
  }

  /// The plain-text introduction of `title`, following redirects. A missing
  /// article yields an empty string.
  pub async fn fetch_lede(&self, title: &str) -> Result<String> {
    let query = self
      .query(&[
        ("titles", title),
        ("prop", "extracts"),
        ("exintro", "1"),
        ("explaintext", "1"),
        ("redirects", "1"),
      ])
      .await?;

    let lede = query
      .pages
      .into_iter()
      .find(|p| !p.missing)
      .and_then(|p| p.extract)
      .unwrap_or_default();
    Ok(lede)
  }

  /// Content images in `title` with their URLs and captions.
  ///
  /// Lists up to [`IMAGE_LIST_LIMIT`] files, drops icons and non-image
  /// files, then resolves the first [`IMAGE_INFO_LIMIT`] of what remains.
  pub async fn fetch_article_images(&self, title: &str) -> Result<Vec<ArticleImage>> {
    let limit = IMAGE_LIST_LIMIT.to_string();
    let listed = self
      .query(&[("titles", title), ("prop", "images"), ("imlimit", limit.as_str()), ("redirects", "1")])
      .await?;

    let files: Vec<String> = listed
      .pages
      .into_iter()
      .flat_map(|p| p.images)
      .map(|i| i.title)
      .filter(|t| is_content_image(t))
      .take(IMAGE_INFO_LIMIT)
      .collect();
    if files.is_empty() {
      return Ok(Vec::new());
    }
    tracing::debug!(title, files = files.len(), "resolving article images");

    let titles = files.join("|");
    let resolved = self
      .query(&[
        ("titles", titles.as_str()),
        ("prop", "imageinfo"),
        ("iiprop", "url|extmetadata"),
        ("iiurlwidth", "400"),
      ])
      .await?;

    let images = resolved
      .pages
      .into_iter()
      .filter_map(|page| {
        let info = page.imageinfo.into_iter().next()?;
        let image_url = info.url?;
        let caption = info
          .extmetadata
          .image_description
          .map(|d| clean_caption(&d.value))
          .unwrap_or_default();
        Some(ArticleImage {
          title: page.title,
          thumb_url: info.thumburl.unwrap_or_else(|| image_url.clone()),
          image_url,
          caption,
        })
      })
      .collect();
    Ok(images)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use axum::{extract::Query as QueryParams, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
  use serde_json::json;

  use super::*;
  use crate::testing::{client, serve};

  #[test]
  fn display_titles() {
    assert_eq!(display_title("https://en.wikipedia.org/wiki/Software_engineer"), "Software engineer");
    assert_eq!(display_title("https://en.wikipedia.org/wiki/Caf%C3%A9_owner"), "Café owner");
    assert_eq!(display_title("https://example.org/x"), "");
  }

  #[test]
  fn filters_icons_and_non_images() {
    assert!(is_content_image("File:Nurse at work.JPG"));
    assert!(is_content_image("File:Diagram.svg"));
    assert!(!is_content_image("File:Commons-logo.svg"));
    assert!(!is_content_image("File:Wiktionary-logo-en.png"));
    assert!(!is_content_image("File:Ambox important.svg"));
    assert!(!is_content_image("File:Lecture.ogg"));
    assert!(!is_content_image("File:Report.pdf"));
  }

  #[test]
  fn captions_lose_markup_and_length() {
    assert_eq!(clean_caption("<p>A <b>nurse</b> at work</p>"), "A nurse at work");
    let long = "é".repeat(800);
    assert_eq!(clean_caption(&long).chars().count(), CAPTION_MAX_CHARS);
  }

  async fn api(QueryParams(q): QueryParams<HashMap<String, String>>) -> impl IntoResponse {
    assert_eq!(q.get("action").map(String::as_str), Some("query"));
    assert_eq!(q.get("formatversion").map(String::as_str), Some("2"));

    let title = q.get("titles").cloned().unwrap_or_default();
    match (q.get("prop").map(String::as_str), title.as_str()) {
      (_, "Boom") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
      (Some("extracts"), "Nurse") => {
        assert_eq!(q.get("exintro").map(String::as_str), Some("1"));
        Json(json!({ "query": { "pages": [
          { "pageid": 1, "title": "Nurse", "extract": "A nurse is a health care professional." }
        ] } }))
        .into_response()
      }
      (Some("extracts"), _) => {
        Json(json!({ "query": { "pages": [ { "title": title.clone(), "missing": true } ] } })).into_response()
      }
      (Some("images"), "Nurse") => {
        assert_eq!(q.get("imlimit").map(String::as_str), Some("50"));
        Json(json!({ "query": { "pages": [ { "title": "Nurse", "images": [
          { "ns": 6, "title": "File:Commons-logo.svg" },
          { "ns": 6, "title": "File:Nurse at work.jpg" },
          { "ns": 6, "title": "File:Lecture.ogg" },
          { "ns": 6, "title": "File:Ward.png" },
          { "ns": 6, "title": "File:Broken.jpg" }
        ] } ] } }))
        .into_response()
      }
      (Some("images"), _) => {
        Json(json!({ "query": { "pages": [ { "title": title.clone(), "images": [
          { "ns": 6, "title": "File:Wikidata-logo.svg" }
        ] } ] } }))
        .into_response()
      }
      (Some("imageinfo"), _) => {
        assert_eq!(title, "File:Nurse at work.jpg|File:Ward.png|File:Broken.jpg");
        Json(json!({ "query": { "pages": [
          { "title": "File:Nurse at work.jpg", "imageinfo": [ {
            "url": "https://upload.example/nurse.jpg",
            "thumburl": "https://upload.example/400px-nurse.jpg",
            "extmetadata": { "ImageDescription": { "value": "<i>Nurse</i> on a ward" } }
          } ] },
          { "title": "File:Ward.png", "imageinfo": [ { "url": "https://upload.example/ward.png" } ] },
          { "title": "File:Broken.jpg", "missing": true }
        ] } }))
        .into_response()
      }
      _ => StatusCode::BAD_REQUEST.into_response(),
    }
  }

  async fn fixture() -> WikipediaClient {
    let base = serve(Router::new().route("/w/api.php", get(api))).await;
    WikipediaClient::new(client(), format!("{base}/w/api.php"))
  }

  #[tokio::test]
  async fn fetches_lede() {
    let c = fixture().await;
    assert_eq!(c.fetch_lede("Nurse").await.unwrap(), "A nurse is a health care professional.");
  }

  #[tokio::test]
  async fn missing_article_has_empty_lede() {
    let c = fixture().await;
    assert_eq!(c.fetch_lede("No such article").await.unwrap(), "");
  }

  #[tokio::test]
  async fn server_errors_are_errors() {
    let c = fixture().await;
    assert!(c.fetch_lede("Boom").await.is_err());
    assert!(c.fetch_article_images("Boom").await.is_err());
  }

  #[tokio::test]
  async fn resolves_content_images() {
    let c = fixture().await;
    let images = c.fetch_article_images("Nurse").await.unwrap();
    assert_eq!(images, vec![
      ArticleImage {
        title:     "File:Nurse at work.jpg".into(),
        image_url: "https://upload.example/nurse.jpg".into(),
        thumb_url: "https://upload.example/400px-nurse.jpg".into(),
        caption:   "Nurse on a ward".into(),
      },
      ArticleImage {
        title:     "File:Ward.png".into(),
        image_url: "https://upload.example/ward.png".into(),
        thumb_url: "https://upload.example/ward.png".into(),
        caption:   String::new(),
      },
    ]);

    let rows: Vec<NewCareerImage> = images.into_iter().map(Into::into).collect();
    assert_eq!(rows[0].caption.as_deref(), Some("Nurse on a ward"));
    assert_eq!(rows[1].caption, None);
    assert_eq!(rows[0].source, careers_core::image::ImageSource::Wikipedia);
  }

  #[tokio::test]
  async fn article_with_only_icons_skips_second_lookup() {
    let c = fixture().await;
    assert!(c.fetch_article_images("Baker").await.unwrap().is_empty());
  }
}
