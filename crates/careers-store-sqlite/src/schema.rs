//! SQL schema for the career SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS careers (
    wikidata_id          TEXT PRIMARY KEY,
    name                 TEXT NOT NULL,
    category             TEXT NOT NULL DEFAULT 'profession'
                         CHECK (category IN ('profession', 'occupation', 'job', 'position')),
    wikipedia_url        TEXT,
    pageviews_total      INTEGER NOT NULL DEFAULT 0,
    avg_daily_views      REAL    NOT NULL DEFAULT 0,
    last_pageview_update TEXT,               -- NULL until pageviews are fetched
    status               TEXT NOT NULL DEFAULT 'unreviewed'
                         CHECK (status IN ('unreviewed', 'needs_diverse_images',
                                           'has_diverse_images', 'not_a_career',
                                           'gender_specific')),
    reviewed_by          TEXT,
    reviewed_at          TEXT,
    notes                TEXT,
    lede_text            TEXT,
    lede_fetched_at      TEXT,
    images_fetched_at    TEXT,
    created_at           TEXT NOT NULL,      -- ISO 8601 UTC
    updated_at           TEXT NOT NULL
);

-- Image rows are inserted and deleted, never updated.
CREATE TABLE IF NOT EXISTS career_images (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    wikidata_id    TEXT NOT NULL REFERENCES careers(wikidata_id) ON DELETE CASCADE,
    image_url      TEXT NOT NULL,
    caption        TEXT,
    position       INTEGER NOT NULL DEFAULT 0,
    is_replacement INTEGER NOT NULL DEFAULT 0 CHECK (is_replacement IN (0, 1)),
    source         TEXT NOT NULL DEFAULT 'wikipedia'
                   CHECK (source IN ('wikipedia', 'openverse')),
    metadata       TEXT,                     -- JSON-encoded ImageMetadata or NULL
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS careers_status_idx    ON careers(status);
CREATE INDEX IF NOT EXISTS careers_category_idx  ON careers(category);
CREATE INDEX IF NOT EXISTS careers_avg_views_idx ON careers(avg_daily_views DESC);
CREATE INDEX IF NOT EXISTS career_images_career_idx
    ON career_images(wikidata_id, position);

-- At most one replacement image per career.
CREATE UNIQUE INDEX IF NOT EXISTS career_images_replacement_idx
    ON career_images(wikidata_id) WHERE is_replacement = 1;

PRAGMA user_version = 1;
";
