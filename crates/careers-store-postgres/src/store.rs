//! [`PostgresStore`]: the PostgreSQL implementation of [`CareerStore`].

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_postgres::{types::ToSql, Client, Config, GenericClient, NoTls};

use careers_core::{
  bucket::{rank_careers, RankedCareer},
  career::{Career, CareerStatus, NewCareer, PageviewUpdate, WikidataId},
  image::{CareerImage, ImageSource, NewCareerImage, ReplacementImage},
  store::{like_pattern, CareerStore, DatasetStats, TopCareer, DEFAULT_LIST_LIMIT},
};

use crate::{
  encode::{career_from_row, encode_metadata, image_from_row, CAREER_COLUMNS, IMAGE_COLUMNS},
  schema::SCHEMA,
  Error, Result,
};

type Param<'a> = &'a (dyn ToSql + Sync);

const UPSERT_CAREER: &str = "
  INSERT INTO careers (wikidata_id, name, category, wikipedia_url, created_at, updated_at)
  VALUES ($1, $2, $3, $4, $5, $5)
  ON CONFLICT (wikidata_id) DO UPDATE SET
    name          = EXCLUDED.name,
    category      = EXCLUDED.category,
    wikipedia_url = EXCLUDED.wikipedia_url,
    updated_at    = EXCLUDED.updated_at";

const UPDATE_PAGEVIEWS: &str = "
  UPDATE careers
  SET pageviews_total = $2, avg_daily_views = $3, last_pageview_update = $4, updated_at = $4
  WHERE wikidata_id = $1";

const INSERT_IMAGE: &str = "
  INSERT INTO career_images
    (wikidata_id, image_url, caption, position, is_replacement, source, metadata, created_at)
  VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
  RETURNING id, wikidata_id, image_url, caption, position, is_replacement, source, metadata, created_at";

enum Filter {
  All,
  Status(CareerStatus),
  NameLike(String),
  WithTraffic,
}

fn sql_limit(limit: Option<usize>) -> Option<i64> {
  // A NULL LIMIT is unbounded.
  limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

async fn career_exists(client: &impl GenericClient, id: &str) -> Result<bool> {
  Ok(
    client
      .query_opt("SELECT 1 FROM careers WHERE wikidata_id = $1", &[&id])
      .await?
      .is_some(),
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A career store backed by a PostgreSQL database.
///
/// Cloning shares the underlying connection.
#[derive(Clone)]
pub struct PostgresStore {
  client: Arc<Mutex<Client>>,
}

impl PostgresStore {
  /// Connect to `url` without TLS and run schema initialisation.
  pub async fn connect(url: &str) -> Result<Self> {
    Self::connect_config(&url.parse::<Config>()?).await
  }

  /// Connect with a prepared [`Config`], e.g. one carrying a `search_path`
  /// option, and run schema initialisation.
  pub async fn connect_config(config: &Config) -> Result<Self> {
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
      if let Err(e) = connection.await {
        tracing::error!("PostgreSQL connection error: {}", e);
      }
    });

    client.batch_execute(SCHEMA).await?;
    Ok(Self { client: Arc::new(Mutex::new(client)) })
  }

  async fn select_careers(&self, filter: Filter, limit: Option<usize>) -> Result<Vec<Career>> {
    let limit = sql_limit(limit);
    let (clause, arg) = match filter {
      Filter::All => ("", None),
      Filter::Status(s) => ("WHERE status = $2", Some(s.to_string())),
      Filter::NameLike(p) => ("WHERE name ILIKE $2 ESCAPE '\\'", Some(p)),
      Filter::WithTraffic => ("WHERE pageviews_total > 0", None),
    };
    let sql = format!(
      "SELECT {CAREER_COLUMNS} FROM careers {clause}
       ORDER BY avg_daily_views DESC, wikidata_id
       LIMIT $1"
    );
    let mut params: Vec<Param<'_>> = vec![&limit];
    if let Some(arg) = &arg {
      params.push(arg);
    }

    let client = self.client.lock().await;
    let rows = client.query(&sql, &params).await?;
    rows.iter().map(career_from_row).collect()
  }

  async fn select_ranked(&self, filter: Filter, limit: Option<usize>) -> Result<Vec<RankedCareer>> {
    Ok(rank_careers(self.select_careers(filter, limit).await?))
  }

  /// Run a single-row statement keyed on `$1 = wikidata_id`, mapping zero
  /// affected rows to [`Error::CareerNotFound`].
  async fn update_one(&self, id: WikidataId, sql: &str, rest: &[Param<'_>]) -> Result<()> {
    let changed = {
      let id_str = id.as_str();
      let mut params: Vec<Param<'_>> = vec![&id_str];
      params.extend_from_slice(rest);
      self.client.lock().await.execute(sql, &params).await?
    };
    if changed == 0 {
      return Err(Error::CareerNotFound(id));
    }
    Ok(())
  }
}

// ─── CareerStore impl ────────────────────────────────────────────────────────

impl CareerStore for PostgresStore {
  type Error = Error;

  // ── Careers ───────────────────────────────────────────────────────────────

  async fn upsert_career(&self, career: NewCareer) -> Result<()> {
    self.upsert_careers(vec![career]).await?;
    Ok(())
  }

  async fn upsert_careers(&self, careers: Vec<NewCareer>) -> Result<usize> {
    let now = Utc::now();
    let mut client = self.client.lock().await;
    let tx = client.transaction().await?;
    let stmt = tx.prepare(UPSERT_CAREER).await?;

    let mut written = 0;
    for c in &careers {
      written += tx
        .execute(&stmt, &[
          &c.wikidata_id.as_str(),
          &c.name,
          &c.category.as_ref(),
          &c.wikipedia_url,
          &now,
        ])
        .await?;
    }
    tx.commit().await?;

    tracing::debug!(written, "upserted careers");
    Ok(usize::try_from(written).unwrap_or(usize::MAX))
  }

  async fn get_career(&self, id: WikidataId) -> Result<Option<Career>> {
    let row = self
      .client
      .lock()
      .await
      .query_opt(
        &format!("SELECT {CAREER_COLUMNS} FROM careers WHERE wikidata_id = $1"),
        &[&id.as_str()],
      )
      .await?;
    row.as_ref().map(career_from_row).transpose()
  }

  async fn count(&self) -> Result<u64> {
    let row = self
      .client
      .lock()
      .await
      .query_one("SELECT COUNT(*) FROM careers", &[])
      .await?;
    Ok(u64::try_from(row.try_get::<_, i64>(0)?).unwrap_or_default())
  }

  // ── Pageviews ─────────────────────────────────────────────────────────────

  async fn get_careers_needing_pageviews(&self) -> Result<Vec<Career>> {
    let rows = self
      .client
      .lock()
      .await
      .query(
        &format!(
          "SELECT {CAREER_COLUMNS} FROM careers
           WHERE last_pageview_update IS NULL
           ORDER BY wikidata_id"
        ),
        &[],
      )
      .await?;
    rows.iter().map(career_from_row).collect()
  }

  async fn update_pageviews(&self, update: PageviewUpdate) -> Result<()> {
    let now = Utc::now();
    self
      .update_one(update.wikidata_id, UPDATE_PAGEVIEWS, &[
        &update.total_views,
        &update.avg_daily_views,
        &now,
      ])
      .await
  }

  async fn update_pageviews_batch(&self, updates: Vec<PageviewUpdate>) -> Result<usize> {
    let now = Utc::now();
    let mut client = self.client.lock().await;
    let tx = client.transaction().await?;
    let stmt = tx.prepare(UPDATE_PAGEVIEWS).await?;

    let mut updated = 0;
    for u in &updates {
      updated += tx
        .execute(&stmt, &[&u.wikidata_id.as_str(), &u.total_views, &u.avg_daily_views, &now])
        .await?;
    }
    tx.commit().await?;
    Ok(usize::try_from(updated).unwrap_or(usize::MAX))
  }

  // ── Review ────────────────────────────────────────────────────────────────

  async fn update_career_status(
    &self,
    id:          WikidataId,
    status:      CareerStatus,
    reviewed_by: Option<String>,
    notes:       Option<String>,
  ) -> Result<()> {
    let now = Utc::now();
    let status = status.to_string();
    self
      .update_one(
        id,
        "UPDATE careers
         SET status      = $2,
             reviewed_by = COALESCE($3, reviewed_by),
             notes       = COALESCE($4, notes),
             reviewed_at = $5,
             updated_at  = $5
         WHERE wikidata_id = $1",
        &[&status, &reviewed_by, &notes, &now],
      )
      .await
  }

  async fn update_career_lede(&self, id: WikidataId, lede: String) -> Result<()> {
    let now = Utc::now();
    self
      .update_one(
        id,
        "UPDATE careers SET lede_text = $2, lede_fetched_at = $3, updated_at = $3
         WHERE wikidata_id = $1",
        &[&lede, &now],
      )
      .await
  }

  // ── Ranked listings ───────────────────────────────────────────────────────

  async fn get_all_careers(&self) -> Result<Vec<RankedCareer>> {
    self.select_ranked(Filter::All, None).await
  }

  async fn get_careers_by_status(
    &self,
    status: CareerStatus,
    limit:  Option<usize>,
  ) -> Result<Vec<RankedCareer>> {
    self
      .select_ranked(Filter::Status(status), Some(limit.unwrap_or(DEFAULT_LIST_LIMIT)))
      .await
  }

  async fn search_careers<'a>(
    &'a self,
    query: &'a str,
    limit: Option<usize>,
  ) -> Result<Vec<RankedCareer>> {
    self
      .select_ranked(
        Filter::NameLike(like_pattern(query)),
        Some(limit.unwrap_or(DEFAULT_LIST_LIMIT)),
      )
      .await
  }

  async fn get_top_careers(&self, limit: usize) -> Result<Vec<Career>> {
    self.select_careers(Filter::WithTraffic, Some(limit)).await
  }

  async fn get_stats(&self) -> Result<DatasetStats> {
    let client = self.client.lock().await;

    // SUM over BIGINT yields NUMERIC; cast back for the driver.
    let totals = client
      .query_one(
        "SELECT COUNT(*),
                COUNT(last_pageview_update),
                COALESCE(SUM(pageviews_total), 0)::BIGINT
         FROM careers",
        &[],
      )
      .await?;
    let count = |n: i64| u64::try_from(n).unwrap_or_default();

    let mut by_category = BTreeMap::<String, u64>::new();
    for row in client
      .query("SELECT category, COUNT(*) FROM careers GROUP BY category", &[])
      .await?
    {
      by_category.insert(row.try_get(0)?, count(row.try_get(1)?));
    }

    let mut by_status = BTreeMap::<String, u64>::new();
    for row in client
      .query("SELECT status, COUNT(*) FROM careers GROUP BY status", &[])
      .await?
    {
      by_status.insert(row.try_get(0)?, count(row.try_get(1)?));
    }

    let top_career = client
      .query_opt(
        "SELECT name, pageviews_total FROM careers
         ORDER BY avg_daily_views DESC, wikidata_id LIMIT 1",
        &[],
      )
      .await?
      .map(|row| -> Result<TopCareer> {
        Ok(TopCareer { name: row.try_get(0)?, views: row.try_get(1)? })
      })
      .transpose()?;

    Ok(DatasetStats {
      total_careers: count(totals.try_get(0)?),
      with_pageviews: count(totals.try_get(1)?),
      total_views: totals.try_get(2)?,
      by_category,
      by_status,
      top_career,
    })
  }

  // ── Images ────────────────────────────────────────────────────────────────

  async fn add_career_image(&self, id: WikidataId, image: NewCareerImage) -> Result<CareerImage> {
    let now = Utc::now();
    let client = self.client.lock().await;
    if !career_exists(&*client, id.as_str()).await? {
      return Err(Error::CareerNotFound(id));
    }

    let row = client
      .query_one(INSERT_IMAGE, &[
        &id.as_str(),
        &image.image_url,
        &image.caption,
        &image.position.unwrap_or(0),
        &false,
        &image.source.as_ref(),
        &Option::<String>::None,
        &now,
      ])
      .await?;
    image_from_row(&row)
  }

  async fn add_career_images(&self, id: WikidataId, images: Vec<NewCareerImage>) -> Result<usize> {
    let now = Utc::now();
    let mut client = self.client.lock().await;
    let tx = client.transaction().await?;
    if !career_exists(&tx, id.as_str()).await? {
      return Err(Error::CareerNotFound(id));
    }

    let stmt = tx.prepare(INSERT_IMAGE).await?;
    for (idx, img) in (0_i64..).zip(&images) {
      tx.execute(&stmt, &[
        &id.as_str(),
        &img.image_url,
        &img.caption,
        &img.position.unwrap_or(idx),
        &false,
        &img.source.as_ref(),
        &Option::<String>::None,
        &now,
      ])
      .await?;
    }
    tx.execute(
      "UPDATE careers SET images_fetched_at = $2, updated_at = $2 WHERE wikidata_id = $1",
      &[&id.as_str(), &now],
    )
    .await?;
    tx.commit().await?;
    Ok(images.len())
  }

  async fn get_career_images(
    &self,
    id:     WikidataId,
    source: Option<ImageSource>,
  ) -> Result<Vec<CareerImage>> {
    let source = source.map(|s| s.to_string());
    let rows = self
      .client
      .lock()
      .await
      .query(
        &format!(
          "SELECT {IMAGE_COLUMNS} FROM career_images
           WHERE wikidata_id = $1 AND ($2::TEXT IS NULL OR source = $2)
           ORDER BY position, id"
        ),
        &[&id.as_str(), &source],
      )
      .await?;
    rows.iter().map(image_from_row).collect()
  }

  async fn clear_career_images(&self, id: WikidataId, source: Option<ImageSource>) -> Result<usize> {
    let source = source.map(|s| s.to_string());
    let deleted = self
      .client
      .lock()
      .await
      .execute(
        "DELETE FROM career_images WHERE wikidata_id = $1 AND ($2::TEXT IS NULL OR source = $2)",
        &[&id.as_str(), &source],
      )
      .await?;
    Ok(usize::try_from(deleted).unwrap_or(usize::MAX))
  }

  async fn delete_career_image(&self, image_id: i64) -> Result<bool> {
    let deleted = self
      .client
      .lock()
      .await
      .execute("DELETE FROM career_images WHERE id = $1", &[&image_id])
      .await?;
    Ok(deleted > 0)
  }

  async fn set_replacement_image(
    &self,
    id:    WikidataId,
    image: ReplacementImage,
  ) -> Result<CareerImage> {
    let now = Utc::now();
    let metadata = encode_metadata(&image.metadata)?;

    let mut client = self.client.lock().await;
    let tx = client.transaction().await?;
    if !career_exists(&tx, id.as_str()).await? {
      return Err(Error::CareerNotFound(id));
    }

    tx.execute(
      "DELETE FROM career_images WHERE wikidata_id = $1 AND is_replacement",
      &[&id.as_str()],
    )
    .await?;
    let row = tx
      .query_one(INSERT_IMAGE, &[
        &id.as_str(),
        &image.image_url,
        &image.caption,
        &0_i64,
        &true,
        &ImageSource::Openverse.as_ref(),
        &metadata,
        &now,
      ])
      .await?;
    tx.commit().await?;
    image_from_row(&row)
  }
}
