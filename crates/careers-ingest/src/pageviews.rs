//! Monthly pageview aggregation from the Wikimedia metrics API.
//!
//! Every failure mode (network error, non-200 status, malformed body, no
//! months returned) collapses to [`PageviewTotals::ZERO`]. Callers tell
//! "never fetched" apart from "no traffic" by `last_pageview_update`, not by
//! the view count.

use std::future::Future;

use serde::Deserialize;

use crate::{http::join_url, Result};

pub const DEFAULT_PAGEVIEWS_BASE_URL: &str = "https://wikimedia.org/api/rest_v1/metrics/pageviews";

/// Average month length used to turn a monthly series into a daily rate.
pub const DAYS_PER_MONTH: f64 = 30.44;

pub const DEFAULT_WINDOW_START: &str = "2024010100";
pub const DEFAULT_WINDOW_END: &str = "2025123100";

// ─── Totals ──────────────────────────────────────────────────────────────────

/// Views summed over the fetch window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageviewTotals {
  pub total_views:     i64,
  /// Rounded to two decimals.
  pub avg_daily_views: f64,
}

impl PageviewTotals {
  pub const ZERO: Self = Self { total_views: 0, avg_daily_views: 0.0 };

  /// Reduce a monthly series: `avg = total / (months * 30.44)`.
  pub fn from_monthly(views: &[i64]) -> Self {
    if views.is_empty() {
      return Self::ZERO;
    }
    let total_views: i64 = views.iter().sum();
    let days = views.len() as f64 * DAYS_PER_MONTH;
    let avg = total_views as f64 / days;
    Self { total_views, avg_daily_views: (avg * 100.0).round() / 100.0 }
  }
}

// ─── Titles ──────────────────────────────────────────────────────────────────

/// The article title addressed by a Wikipedia URL: the `/wiki/` suffix,
/// percent-decoded. `None` when the URL has no usable title.
pub fn article_title(wikipedia_url: &str) -> Option<String> {
  let (_, raw) = wikipedia_url.split_once("/wiki/")?;
  if raw.is_empty() {
    return None;
  }
  let title = urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), |t| t.into_owned());
  Some(title)
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// Anything that can report traffic for an article title.
///
/// Implementations never fail: errors are absorbed into
/// [`PageviewTotals::ZERO`].
pub trait PageviewSource: Send + Sync {
  fn pageviews<'a>(&'a self, title: &'a str) -> impl Future<Output = PageviewTotals> + Send + 'a;
}

/// Fetch window in the API's `YYYYMMDDHH` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewWindow {
  pub start: String,
  pub end:   String,
}

impl Default for PageviewWindow {
  fn default() -> Self {
    Self { start: DEFAULT_WINDOW_START.into(), end: DEFAULT_WINDOW_END.into() }
  }
}

#[derive(Debug, Deserialize)]
struct MonthlyResponse {
  #[serde(default)]
  items: Vec<MonthlyItem>,
}

#[derive(Debug, Deserialize)]
struct MonthlyItem {
  views: i64,
}

/// Client for the per-article monthly pageview endpoint.
#[derive(Clone)]
pub struct PageviewClient {
  http:     reqwest::Client,
  base_url: String,
  window:   PageviewWindow,
}

impl PageviewClient {
  pub fn new(http: reqwest::Client, base_url: impl Into<String>, window: PageviewWindow) -> Self {
    Self { http, base_url: base_url.into(), window }
  }

  fn url(&self, title: &str) -> String {
    join_url(
      &self.base_url,
      &format!(
        "per-article/en.wikipedia/all-access/user/{}/monthly/{}/{}",
        urlencoding::encode(title),
        self.window.start,
        self.window.end,
      ),
    )
  }

  /// `GET .../per-article/en.wikipedia/all-access/user/<title>/monthly/<start>/<end>`
  ///
  /// Any non-200 status is `Ok(ZERO)`; transport and decode failures are
  /// returned as errors.
  pub async fn fetch_monthly(&self, title: &str) -> Result<PageviewTotals> {
    let resp = self.http.get(self.url(title)).send().await?;
    if resp.status() != reqwest::StatusCode::OK {
      tracing::debug!(title, status = %resp.status(), "no pageview data");
      return Ok(PageviewTotals::ZERO);
    }
    let body: MonthlyResponse = resp.json().await?;
    let views: Vec<i64> = body.items.iter().map(|i| i.views).collect();
    Ok(PageviewTotals::from_monthly(&views))
  }
}

impl PageviewSource for PageviewClient {
  async fn pageviews<'a>(&'a self, title: &'a str) -> PageviewTotals {
    self.fetch_monthly(title).await.unwrap_or_else(|e| {
      tracing::debug!(title, error = %e, "pageview fetch failed");
      PageviewTotals::ZERO
    })
  }
}
