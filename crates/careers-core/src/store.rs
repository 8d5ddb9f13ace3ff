//! The `CareerStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (`careers-store-sqlite`,
//! `careers-store-postgres`). The ingestion pipeline and the CLI depend on
//! this abstraction, not on any concrete backend.

use std::{collections::BTreeMap, future::Future};

use serde::{Deserialize, Serialize};

use crate::{
  bucket::RankedCareer,
  career::{Career, CareerStatus, NewCareer, PageviewUpdate, WikidataId},
  image::{CareerImage, ImageSource, NewCareerImage, ReplacementImage},
};

/// Row limit applied to status and search listings when none is given.
pub const DEFAULT_LIST_LIMIT: usize = 100;

// ─── Query helpers ───────────────────────────────────────────────────────────

/// Escape `\`, `%` and `_` in a user-supplied search term and wrap it for a
/// substring `LIKE ... ESCAPE '\'` match.
pub fn like_pattern(query: &str) -> String {
  let mut escaped = String::with_capacity(query.len() + 2);
  escaped.push('%');
  for c in query.chars() {
    if matches!(c, '\\' | '%' | '_') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// The busiest career by average daily views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCareer {
  pub name:  String,
  pub views: i64,
}

/// Dataset summary returned by [`CareerStore::get_stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
  pub total_careers:  u64,
  pub with_pageviews: u64,
  pub total_views:    i64,
  pub by_category:    BTreeMap<String, u64>,
  pub by_status:      BTreeMap<String, u64>,
  pub top_career:     Option<TopCareer>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a career store backend.
///
/// Every mutating operation is a single atomic statement or an explicit
/// transaction, so concurrent review sessions never observe partial writes to
/// one career. Operations on different careers are independent.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait CareerStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Careers ───────────────────────────────────────────────────────────

  /// Insert a career, or update its name, category and URL if the Wikidata
  /// id already exists. Review state and pageview data are never reset.
  fn upsert_career(
    &self,
    career: NewCareer,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Batch form of [`upsert_career`](Self::upsert_career), applied in one
  /// transaction. Returns the number of careers written.
  fn upsert_careers(
    &self,
    careers: Vec<NewCareer>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Retrieve a career by id. Returns `None` if not found.
  fn get_career(
    &self,
    id: WikidataId,
  ) -> impl Future<Output = Result<Option<Career>, Self::Error>> + Send + '_;

  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Pageviews ─────────────────────────────────────────────────────────

  /// Careers whose pageviews have never been fetched, ordered by id.
  fn get_careers_needing_pageviews(
    &self,
  ) -> impl Future<Output = Result<Vec<Career>, Self::Error>> + Send + '_;

  /// Record traffic for one career and stamp `last_pageview_update`.
  /// Errors if the career does not exist.
  fn update_pageviews(
    &self,
    update: PageviewUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Batch form of [`update_pageviews`](Self::update_pageviews). Unknown ids
  /// are skipped; returns the number of rows updated.
  fn update_pageviews_batch(
    &self,
    updates: Vec<PageviewUpdate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Review ────────────────────────────────────────────────────────────

  /// Move a career to `status` and stamp `reviewed_at`.
  ///
  /// `reviewed_by` and `notes` keep their stored values when `None`. Errors
  /// if the career does not exist.
  fn update_career_status(
    &self,
    id: WikidataId,
    status: CareerStatus,
    reviewed_by: Option<String>,
    notes: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Cache the article lede and stamp `lede_fetched_at`.
  fn update_career_lede(
    &self,
    id: WikidataId,
    lede: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Ranked listings ───────────────────────────────────────────────────

  /// Every career, bucket-sorted.
  fn get_all_careers(
    &self,
  ) -> impl Future<Output = Result<Vec<RankedCareer>, Self::Error>> + Send + '_;

  /// Careers in `status`, bucket-sorted. `limit` defaults to
  /// [`DEFAULT_LIST_LIMIT`] and keeps the busiest rows.
  fn get_careers_by_status(
    &self,
    status: CareerStatus,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<RankedCareer>, Self::Error>> + Send + '_;

  /// Case-insensitive substring match on name, bucket-sorted. Case folding
  /// covers non-ASCII letters. Wildcard characters in `query` match literally.
  fn search_careers<'a>(
    &'a self,
    query: &'a str,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<RankedCareer>, Self::Error>> + Send + 'a;

  /// Careers with traffic, in plain descending `avg_daily_views` order.
  fn get_top_careers(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Career>, Self::Error>> + Send + '_;

  /// Counts and totals over every career. The top career is the busiest by
  /// `avg_daily_views` and is present whenever the store is non-empty, even
  /// before any traffic has been fetched.
  fn get_stats(&self) -> impl Future<Output = Result<DatasetStats, Self::Error>> + Send + '_;

  // ── Images ────────────────────────────────────────────────────────────

  fn add_career_image(
    &self,
    id: WikidataId,
    image: NewCareerImage,
  ) -> impl Future<Output = Result<CareerImage, Self::Error>> + Send + '_;

  /// Bulk insert (position defaults to batch index) and stamp
  /// `images_fetched_at`. Returns the number of rows inserted.
  fn add_career_images(
    &self,
    id: WikidataId,
    images: Vec<NewCareerImage>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Images for a career ordered by position, optionally from one source.
  fn get_career_images(
    &self,
    id: WikidataId,
    source: Option<ImageSource>,
  ) -> impl Future<Output = Result<Vec<CareerImage>, Self::Error>> + Send + '_;

  /// Delete a career's images, optionally only those from one source.
  /// Returns the number of rows deleted.
  fn clear_career_images(
    &self,
    id: WikidataId,
    source: Option<ImageSource>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete a single image row. Returns `false` if it did not exist.
  fn delete_career_image(
    &self,
    image_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Replace the career's replacement image in one transaction: the previous
  /// replacement (if any) is deleted and the new one inserted, so readers
  /// never see zero or two replacements.
  fn set_replacement_image(
    &self,
    id: WikidataId,
    image: ReplacementImage,
  ) -> impl Future<Output = Result<CareerImage, Self::Error>> + Send + '_;
}
