//! SQL schema for the career PostgreSQL store.

/// Full schema DDL; idempotent, run on every connect.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS careers (
    wikidata_id          TEXT PRIMARY KEY,
    name                 TEXT NOT NULL,
    category             TEXT NOT NULL DEFAULT 'profession'
                         CHECK (category IN ('profession', 'occupation', 'job', 'position')),
    wikipedia_url        TEXT,
    pageviews_total      BIGINT NOT NULL DEFAULT 0,
    avg_daily_views      DOUBLE PRECISION NOT NULL DEFAULT 0,
    last_pageview_update TIMESTAMPTZ,
    status               TEXT NOT NULL DEFAULT 'unreviewed'
                         CHECK (status IN ('unreviewed', 'needs_diverse_images',
                                           'has_diverse_images', 'not_a_career',
                                           'gender_specific')),
    reviewed_by          TEXT,
    reviewed_at          TIMESTAMPTZ,
    notes                TEXT,
    lede_text            TEXT,
    lede_fetched_at      TIMESTAMPTZ,
    images_fetched_at    TIMESTAMPTZ,
    created_at           TIMESTAMPTZ NOT NULL,
    updated_at           TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS career_images (
    id             BIGSERIAL PRIMARY KEY,
    wikidata_id    TEXT NOT NULL REFERENCES careers(wikidata_id) ON DELETE CASCADE,
    image_url      TEXT NOT NULL,
    caption        TEXT,
    position       BIGINT NOT NULL DEFAULT 0,
    is_replacement BOOLEAN NOT NULL DEFAULT FALSE,
    source         TEXT NOT NULL DEFAULT 'wikipedia'
                   CHECK (source IN ('wikipedia', 'openverse')),
    metadata       TEXT,
    created_at     TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS careers_status_idx    ON careers(status);
CREATE INDEX IF NOT EXISTS careers_category_idx  ON careers(category);
CREATE INDEX IF NOT EXISTS careers_avg_views_idx ON careers(avg_daily_views DESC);
CREATE INDEX IF NOT EXISTS career_images_career_idx
    ON career_images(wikidata_id, position);

CREATE UNIQUE INDEX IF NOT EXISTS career_images_replacement_idx
    ON career_images(wikidata_id) WHERE is_replacement;
";
