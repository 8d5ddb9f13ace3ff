//! [`SqliteStore`]: the SQLite implementation of [`CareerStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use rusqlite::{functions::FunctionFlags, OptionalExtension as _, ToSql};

use careers_core::{
  bucket::{rank_careers, RankedCareer},
  career::{Career, CareerStatus, NewCareer, PageviewUpdate, WikidataId},
  image::{CareerImage, ImageSource, NewCareerImage, ReplacementImage},
  store::{like_pattern, CareerStore, DatasetStats, TopCareer, DEFAULT_LIST_LIMIT},
};

use crate::{
  encode::{encode_dt, encode_metadata, RawCareer, RawCareerImage, CAREER_COLUMNS, IMAGE_COLUMNS},
  schema::SCHEMA,
  Error, Result,
};

// ─── Statements ──────────────────────────────────────────────────────────────

/// Insert-or-update that leaves review and traffic columns alone on conflict.
const UPSERT_CAREER: &str = "
  INSERT INTO careers (wikidata_id, name, category, wikipedia_url, created_at, updated_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?5)
  ON CONFLICT(wikidata_id) DO UPDATE SET
    name          = excluded.name,
    category      = excluded.category,
    wikipedia_url = excluded.wikipedia_url,
    updated_at    = excluded.updated_at";

const UPDATE_PAGEVIEWS: &str = "
  UPDATE careers
  SET pageviews_total = ?2, avg_daily_views = ?3, last_pageview_update = ?4, updated_at = ?4
  WHERE wikidata_id = ?1";

const INSERT_IMAGE: &str = "
  INSERT INTO career_images
    (wikidata_id, image_url, caption, position, is_replacement, source, metadata, created_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Row filter shared by the ranked listing queries.
enum Filter {
  All,
  Status(CareerStatus),
  NameLike(String),
  WithTraffic,
}

fn sql_limit(limit: Option<usize>) -> i64 {
  // SQLite treats a negative LIMIT as unbounded.
  limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

fn career_exists(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM careers WHERE wikidata_id = ?1", [id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn select_image(conn: &rusqlite::Connection, image_id: i64) -> rusqlite::Result<RawCareerImage> {
  conn.query_row(
    &format!("SELECT {IMAGE_COLUMNS} FROM career_images WHERE id = ?1"),
    [image_id],
    RawCareerImage::from_row,
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A career store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        // SQLite's own LIKE and lower() only fold ASCII.
        conn.create_scalar_function(
          "casefold",
          1,
          FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
          |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Careers matching `filter`, busiest first, at most `limit` rows.
  async fn select_careers(&self, filter: Filter, limit: Option<usize>) -> Result<Vec<Career>> {
    let limit = sql_limit(limit);

    let raws: Vec<RawCareer> = self
      .conn
      .call(move |conn| {
        let (clause, arg) = match filter {
          Filter::All => ("", None),
          Filter::Status(s) => ("WHERE status = ?2", Some(s.to_string())),
          Filter::NameLike(p) => ("WHERE casefold(name) LIKE casefold(?2) ESCAPE '\\'", Some(p)),
          Filter::WithTraffic => ("WHERE pageviews_total > 0", None),
        };
        let sql = format!(
          "SELECT {CAREER_COLUMNS} FROM careers {clause}
           ORDER BY avg_daily_views DESC, wikidata_id
           LIMIT ?1"
        );
        let mut params: Vec<&dyn ToSql> = vec![&limit];
        if let Some(arg) = &arg {
          params.push(arg);
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params.as_slice(), RawCareer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCareer::into_career).collect()
  }

  async fn select_ranked(&self, filter: Filter, limit: Option<usize>) -> Result<Vec<RankedCareer>> {
    Ok(rank_careers(self.select_careers(filter, limit).await?))
  }

  /// Run a single-row `UPDATE` keyed on `wikidata_id`, mapping zero affected
  /// rows to [`Error::CareerNotFound`].
  async fn update_one<F>(&self, id: WikidataId, f: F) -> Result<()>
  where
    F: FnOnce(&rusqlite::Connection, &str) -> rusqlite::Result<usize> + Send + 'static,
  {
    let id_str = id.as_str().to_owned();
    let changed = self.conn.call(move |conn| Ok(f(conn, &id_str)?)).await?;
    if changed == 0 {
      return Err(Error::CareerNotFound(id));
    }
    Ok(())
  }
}

// ─── CareerStore impl ────────────────────────────────────────────────────────

impl CareerStore for SqliteStore {
  type Error = Error;

  // ── Careers ───────────────────────────────────────────────────────────────

  async fn upsert_career(&self, career: NewCareer) -> Result<()> {
    self.upsert_careers(vec![career]).await?;
    Ok(())
  }

  async fn upsert_careers(&self, careers: Vec<NewCareer>) -> Result<usize> {
    let now = encode_dt(Utc::now());

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        {
          let mut stmt = tx.prepare(UPSERT_CAREER)?;
          for c in &careers {
            written += stmt.execute(rusqlite::params![
              c.wikidata_id.as_str(),
              c.name,
              c.category.as_ref(),
              c.wikipedia_url,
              now,
            ])?;
          }
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;

    tracing::debug!(written, "upserted careers");
    Ok(written)
  }

  async fn get_career(&self, id: WikidataId) -> Result<Option<Career>> {
    let id_str = id.as_str().to_owned();

    let raw: Option<RawCareer> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CAREER_COLUMNS} FROM careers WHERE wikidata_id = ?1"),
              [id_str],
              RawCareer::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCareer::into_career).transpose()
  }

  async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM careers", [], |r| r.get(0))?))
      .await?;
    Ok(u64::try_from(n).unwrap_or_default())
  }

  // ── Pageviews ─────────────────────────────────────────────────────────────

  async fn get_careers_needing_pageviews(&self) -> Result<Vec<Career>> {
    let raws: Vec<RawCareer> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CAREER_COLUMNS} FROM careers
           WHERE last_pageview_update IS NULL
           ORDER BY wikidata_id"
        ))?;
        let rows = stmt
          .query_map([], RawCareer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCareer::into_career).collect()
  }

  async fn update_pageviews(&self, update: PageviewUpdate) -> Result<()> {
    let now = encode_dt(Utc::now());
    let (total, avg) = (update.total_views, update.avg_daily_views);

    self
      .update_one(update.wikidata_id, move |conn, id| {
        conn.execute(UPDATE_PAGEVIEWS, rusqlite::params![id, total, avg, now])
      })
      .await
  }

  async fn update_pageviews_batch(&self, updates: Vec<PageviewUpdate>) -> Result<usize> {
    let now = encode_dt(Utc::now());

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
          let mut stmt = tx.prepare(UPDATE_PAGEVIEWS)?;
          for u in &updates {
            updated += stmt.execute(rusqlite::params![
              u.wikidata_id.as_str(),
              u.total_views,
              u.avg_daily_views,
              now,
            ])?;
          }
        }
        tx.commit()?;
        Ok(updated)
      })
      .await?;

    Ok(updated)
  }

  // ── Review ────────────────────────────────────────────────────────────────

  async fn update_career_status(
    &self,
    id:          WikidataId,
    status:      CareerStatus,
    reviewed_by: Option<String>,
    notes:       Option<String>,
  ) -> Result<()> {
    let now = encode_dt(Utc::now());
    let status = status.to_string();

    // One statement: omitted reviewer/notes keep their stored values.
    self
      .update_one(id, move |conn, id| {
        conn.execute(
          "UPDATE careers
           SET status      = ?2,
               reviewed_by = COALESCE(?3, reviewed_by),
               notes       = COALESCE(?4, notes),
               reviewed_at = ?5,
               updated_at  = ?5
           WHERE wikidata_id = ?1",
          rusqlite::params![id, status, reviewed_by, notes, now],
        )
      })
      .await
  }

  async fn update_career_lede(&self, id: WikidataId, lede: String) -> Result<()> {
    let now = encode_dt(Utc::now());

    self
      .update_one(id, move |conn, id| {
        conn.execute(
          "UPDATE careers SET lede_text = ?2, lede_fetched_at = ?3, updated_at = ?3
           WHERE wikidata_id = ?1",
          rusqlite::params![id, lede, now],
        )
      })
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
    self
      .conn
      .call(|conn| {
        let count = |sql: &str| -> rusqlite::Result<u64> {
          let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
          Ok(u64::try_from(n).unwrap_or_default())
        };
        let total_careers = count("SELECT COUNT(*) FROM careers")?;
        let with_pageviews =
          count("SELECT COUNT(*) FROM careers WHERE last_pageview_update IS NOT NULL")?;
        let total_views: i64 =
          conn.query_row("SELECT COALESCE(SUM(pageviews_total), 0) FROM careers", [], |r| {
            r.get(0)
          })?;

        let group = |column: &str| -> rusqlite::Result<BTreeMap<String, u64>> {
          let mut stmt =
            conn.prepare(&format!("SELECT {column}, COUNT(*) FROM careers GROUP BY {column}"))?;
          let counts = stmt
            .query_map([], |r| {
              let n: i64 = r.get(1)?;
              Ok((r.get::<_, String>(0)?, u64::try_from(n).unwrap_or_default()))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
          Ok(counts)
        };
        let by_category = group("category")?;
        let by_status = group("status")?;

        let top_career = conn
          .query_row(
            "SELECT name, pageviews_total FROM careers
             ORDER BY avg_daily_views DESC, wikidata_id LIMIT 1",
            [],
            |r| Ok(TopCareer { name: r.get(0)?, views: r.get(1)? }),
          )
          .optional()?;

        Ok(DatasetStats {
          total_careers,
          with_pageviews,
          total_views,
          by_category,
          by_status,
          top_career,
        })
      })
      .await
      .map_err(Error::from)
  }

  // ── Images ────────────────────────────────────────────────────────────────

  async fn add_career_image(&self, id: WikidataId, image: NewCareerImage) -> Result<CareerImage> {
    let id_str = id.as_str().to_owned();
    let now = encode_dt(Utc::now());

    let raw: Option<RawCareerImage> = self
      .conn
      .call(move |conn| {
        if !career_exists(conn, &id_str)? {
          return Ok(None);
        }
        conn.execute(INSERT_IMAGE, rusqlite::params![
          id_str,
          image.image_url,
          image.caption,
          image.position.unwrap_or(0),
          false,
          image.source.as_ref(),
          Option::<String>::None,
          now,
        ])?;
        Ok(Some(select_image(conn, conn.last_insert_rowid())?))
      })
      .await?;

    raw.ok_or(Error::CareerNotFound(id))?.into_image()
  }

  async fn add_career_images(&self, id: WikidataId, images: Vec<NewCareerImage>) -> Result<usize> {
    let id_str = id.as_str().to_owned();
    let now = encode_dt(Utc::now());

    let inserted: Option<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !career_exists(&tx, &id_str)? {
          return Ok(None);
        }
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(INSERT_IMAGE)?;
          for (idx, img) in (0_i64..).zip(&images) {
            inserted += stmt.execute(rusqlite::params![
              id_str,
              img.image_url,
              img.caption,
              img.position.unwrap_or(idx),
              false,
              img.source.as_ref(),
              Option::<String>::None,
              now,
            ])?;
          }
        }
        tx.execute(
          "UPDATE careers SET images_fetched_at = ?2, updated_at = ?2 WHERE wikidata_id = ?1",
          rusqlite::params![id_str, now],
        )?;
        tx.commit()?;
        Ok(Some(inserted))
      })
      .await?;

    inserted.ok_or(Error::CareerNotFound(id))
  }

  async fn get_career_images(
    &self,
    id:     WikidataId,
    source: Option<ImageSource>,
  ) -> Result<Vec<CareerImage>> {
    let id_str = id.as_str().to_owned();
    let source = source.map(|s| s.to_string());

    let raws: Vec<RawCareerImage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IMAGE_COLUMNS} FROM career_images
           WHERE wikidata_id = ?1 AND (?2 IS NULL OR source = ?2)
           ORDER BY position, id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, source], RawCareerImage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCareerImage::into_image).collect()
  }

  async fn clear_career_images(&self, id: WikidataId, source: Option<ImageSource>) -> Result<usize> {
    let id_str = id.as_str().to_owned();
    let source = source.map(|s| s.to_string());

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM career_images WHERE wikidata_id = ?1 AND (?2 IS NULL OR source = ?2)",
          rusqlite::params![id_str, source],
        )?)
      })
      .await?;

    Ok(deleted)
  }

  async fn delete_career_image(&self, image_id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM career_images WHERE id = ?1", [image_id])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn set_replacement_image(
    &self,
    id:    WikidataId,
    image: ReplacementImage,
  ) -> Result<CareerImage> {
    let id_str = id.as_str().to_owned();
    let now = encode_dt(Utc::now());
    let metadata = encode_metadata(&image.metadata)?;

    // Delete and insert commit together; readers see exactly one replacement.
    let raw: Option<RawCareerImage> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !career_exists(&tx, &id_str)? {
          return Ok(None);
        }
        tx.execute(
          "DELETE FROM career_images WHERE wikidata_id = ?1 AND is_replacement = 1",
          [&id_str],
        )?;
        tx.execute(INSERT_IMAGE, rusqlite::params![
          id_str,
          image.image_url,
          image.caption,
          0_i64,
          true,
          ImageSource::Openverse.as_ref(),
          metadata,
          now,
        ])?;
        let raw = select_image(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.ok_or(Error::CareerNotFound(id))?.into_image()
  }
}
