//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per raw fetched document. Immutable once created, except the
-- one-time backfill of filing_identifier/source_url by the resolver.
-- Bytes live on disk under content_key; only the hash is stored here.
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id       TEXT PRIMARY KEY,
    entity_id         TEXT NOT NULL,
    source_type       TEXT NOT NULL,     -- 'filing' | 'exhibit'
    filing_identifier TEXT,              -- dashed accession; NULL until resolved
    source_url        TEXT,              -- canonical URL; NULL until resolved
    content_key       TEXT NOT NULL,
    content_hash      TEXT NOT NULL,     -- sha256 hex of the stored bytes
    content_type      TEXT NOT NULL,
    fetched_at        TEXT NOT NULL,     -- ISO 8601 UTC
    created_at        TEXT NOT NULL,     -- ISO 8601 UTC; server-assigned
    UNIQUE (entity_id, content_key)
);

-- Fact events are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table. The uniqueness
-- tuple makes re-ingestion of an identical observation a no-op.
CREATE TABLE IF NOT EXISTS fact_events (
    event_id          TEXT PRIMARY KEY,
    entity_id         TEXT NOT NULL,
    metric            TEXT NOT NULL,
    value             REAL NOT NULL,
    unit              TEXT NOT NULL,
    as_of             TEXT NOT NULL,     -- ISO date the value is true for
    reported_at       TEXT NOT NULL,     -- ISO date the source was filed
    artifact_id       TEXT NOT NULL REFERENCES artifacts(artifact_id),
    run_id            TEXT NOT NULL,     -- no FK: losing a run row must never invalidate an event
    extraction_method TEXT NOT NULL,
    confidence        REAL NOT NULL,
    quoted_text       TEXT,
    created_at        TEXT NOT NULL,
    UNIQUE (entity_id, metric, as_of, reported_at, artifact_id, value, unit)
);

-- Conflicts between our canonical value and comparison sources.
-- Status only ever moves pending -> resolved | dismissed.
CREATE TABLE IF NOT EXISTS discrepancies (
    id                TEXT PRIMARY KEY,
    entity_id         TEXT NOT NULL,
    metric            TEXT NOT NULL,
    our_value         REAL NOT NULL,
    comparison_values TEXT NOT NULL,     -- JSON array of {value, source, url, as_of}
    severity          TEXT NOT NULL,     -- 'minor' | 'moderate' | 'major'
    max_deviation_pct REAL NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending',
    resolution_value  REAL,
    resolution_source TEXT,
    resolution_notes  TEXT,
    resolved_by       TEXT,
    resolved_at       TEXT,
    created_at        TEXT NOT NULL
);

-- At most one open row per (entity, metric); terminal rows accumulate.
CREATE UNIQUE INDEX IF NOT EXISTS discrepancies_pending_idx
    ON discrepancies(entity_id, metric) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS runs (
    run_id       TEXT PRIMARY KEY,
    started_at   TEXT NOT NULL,
    ended_at     TEXT,                   -- NULL while the run is live
    trigger_kind TEXT NOT NULL,          -- 'scheduled' | 'manual'
    notes        TEXT
);

CREATE INDEX IF NOT EXISTS artifacts_entity_idx    ON artifacts(entity_id);
CREATE INDEX IF NOT EXISTS facts_entity_metric_idx ON fact_events(entity_id, metric, as_of);
CREATE INDEX IF NOT EXISTS discrepancies_status_idx ON discrepancies(status);

PRAGMA user_version = 1;
";
