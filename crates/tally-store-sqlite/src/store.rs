//! [`SqliteStore`] — the SQLite implementation of [`LedgerStore`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use tally_core::{
  artifact::{Artifact, NewArtifact, PutOutcome},
  discrepancy::{Discrepancy, NewDiscrepancy, Resolution},
  fact::{FactEvent, NewFactEvent},
  metric::Metric,
  run::{Run, RunTrigger},
  store::{DiscrepancyQuery, LedgerStore},
};

use crate::{
  Error, Result,
  encode::{
    RawArtifact, RawDiscrepancy, RawFactEvent, RawRun, encode_comparisons,
    encode_date, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

const FACT_COLUMNS: &str = "event_id, entity_id, metric, value, unit, as_of, \
   reported_at, artifact_id, run_id, extraction_method, confidence, \
   quoted_text, created_at";

const DISCREPANCY_COLUMNS: &str = "id, entity_id, metric, our_value, \
   comparison_values, severity, max_deviation_pct, status, resolution_value, \
   resolution_source, resolution_notes, resolved_by, resolved_at, created_at";

const ARTIFACT_COLUMNS: &str = "artifact_id, entity_id, source_type, \
   filing_identifier, source_url, content_key, content_hash, content_type, \
   fetched_at, created_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally ledger store backed by a single SQLite file plus a blob directory
/// for raw document bytes.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  blob_root: PathBuf,
}

impl SqliteStore {
  /// Open (or create) a store at `db_path` with bytes under `blob_root`,
  /// and run schema initialisation.
  pub async fn open(
    db_path: impl AsRef<Path>,
    blob_root: impl Into<PathBuf>,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(db_path).await?;
    let store = Self { conn, blob_root: blob_root.into() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store with a throwaway blob directory — useful for
  /// testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let blob_root =
      std::env::temp_dir().join(format!("tally-blobs-{}", Uuid::new_v4()));
    let store = Self { conn, blob_root };
    store.init_schema().await?;
    Ok(store)
  }

  /// The on-disk path raw bytes for `content_key` are stored at.
  pub fn blob_path(&self, content_key: &str) -> PathBuf {
    self.blob_root.join(content_key)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Look up an artifact row by its uniqueness key.
  async fn find_artifact_id(
    &self,
    entity_id: String,
    content_key: String,
  ) -> Result<Option<Uuid>> {
    let id_str: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT artifact_id FROM artifacts
               WHERE entity_id = ?1 AND content_key = ?2",
              rusqlite::params![entity_id, content_key],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    id_str.as_deref().map(crate::encode::decode_uuid).transpose()
  }
}

fn read_fact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFactEvent> {
  Ok(RawFactEvent {
    event_id:          row.get(0)?,
    entity_id:         row.get(1)?,
    metric:            row.get(2)?,
    value:             row.get(3)?,
    unit:              row.get(4)?,
    as_of:             row.get(5)?,
    reported_at:       row.get(6)?,
    artifact_id:       row.get(7)?,
    run_id:            row.get(8)?,
    extraction_method: row.get(9)?,
    confidence:        row.get(10)?,
    quoted_text:       row.get(11)?,
    created_at:        row.get(12)?,
  })
}

fn read_discrepancy_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawDiscrepancy> {
  Ok(RawDiscrepancy {
    id:                row.get(0)?,
    entity_id:         row.get(1)?,
    metric:            row.get(2)?,
    our_value:         row.get(3)?,
    comparison_values: row.get(4)?,
    severity:          row.get(5)?,
    max_deviation_pct: row.get(6)?,
    status:            row.get(7)?,
    resolution_value:  row.get(8)?,
    resolution_source: row.get(9)?,
    resolution_notes:  row.get(10)?,
    resolved_by:       row.get(11)?,
    resolved_at:       row.get(12)?,
    created_at:        row.get(13)?,
  })
}

fn read_artifact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawArtifact> {
  Ok(RawArtifact {
    artifact_id:       row.get(0)?,
    entity_id:         row.get(1)?,
    source_type:       row.get(2)?,
    filing_identifier: row.get(3)?,
    source_url:        row.get(4)?,
    content_key:       row.get(5)?,
    content_hash:      row.get(6)?,
    content_type:      row.get(7)?,
    fetched_at:        row.get(8)?,
    created_at:        row.get(9)?,
  })
}

fn read_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
  Ok(RawRun {
    run_id:       row.get(0)?,
    started_at:   row.get(1)?,
    ended_at:     row.get(2)?,
    trigger_kind: row.get(3)?,
    notes:        row.get(4)?,
  })
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  // ── Content store ─────────────────────────────────────────────────────────

  async fn put_artifact(
    &self,
    input: NewArtifact,
    bytes: Bytes,
  ) -> Result<PutOutcome> {
    // Existence check first: an already-ingested document is a no-op and its
    // bytes are not rewritten.
    if let Some(existing) = self
      .find_artifact_id(input.entity_id.clone(), input.content_key.clone())
      .await?
    {
      return Ok(PutOutcome { artifact_id: existing, inserted: false });
    }

    // Bytes land on disk before metadata. If the metadata insert fails the
    // orphaned blob is harmless and the whole call is retryable; the reverse
    // order could leave a row pointing at nothing.
    let blob_path = self.blob_path(&input.content_key);
    if let Some(parent) = blob_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&blob_path, &bytes).await?;

    let artifact_id = Uuid::new_v4();
    let id_str = encode_uuid(artifact_id);
    let entity_id = input.entity_id.clone();
    let content_key = input.content_key.clone();
    let source_type = input.source_type.as_str().to_owned();
    let content_hash = hex::encode(Sha256::digest(&bytes));
    let content_type = input.content_type;
    let fetched_at = encode_dt(input.fetched_at);
    let created_at = encode_dt(Utc::now());

    // INSERT OR IGNORE: two concurrent ingestions of the same document
    // degrade to "one wins, one no-ops" via the uniqueness constraint.
    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO artifacts (
             artifact_id, entity_id, source_type, filing_identifier,
             source_url, content_key, content_hash, content_type,
             fetched_at, created_at
           ) VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            entity_id,
            source_type,
            content_key,
            content_hash,
            content_type,
            fetched_at,
            created_at,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    if inserted {
      return Ok(PutOutcome { artifact_id, inserted: true });
    }

    // Lost the race: report the surviving row.
    let existing = self
      .find_artifact_id(input.entity_id, input.content_key)
      .await?
      .ok_or(Error::ArtifactNotFound(artifact_id))?;
    Ok(PutOutcome { artifact_id: existing, inserted: false })
  }

  async fn get_artifact(&self, id: Uuid) -> Result<Option<Artifact>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE artifact_id = ?1"
    );

    let raw: Option<RawArtifact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], read_artifact_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawArtifact::into_artifact).transpose()
  }

  async fn unresolved_artifacts(&self, entity_id: &str) -> Result<Vec<Artifact>> {
    let entity = entity_id.to_owned();
    let sql = format!(
      "SELECT {ARTIFACT_COLUMNS} FROM artifacts
       WHERE entity_id = ?1 AND filing_identifier IS NULL
       ORDER BY created_at"
    );

    let raws: Vec<RawArtifact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![entity], read_artifact_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArtifact::into_artifact).collect()
  }

  async fn backfill_identity(
    &self,
    artifact_id: Uuid,
    filing_identifier: &str,
    source_url: &str,
  ) -> Result<bool> {
    let id_str = encode_uuid(artifact_id);
    let filing = filing_identifier.to_owned();
    let url = source_url.to_owned();

    let (updated, exists) = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE artifacts
           SET filing_identifier = ?2, source_url = ?3
           WHERE artifact_id = ?1 AND filing_identifier IS NULL",
          rusqlite::params![id_str, filing, url],
        )?;

        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM artifacts WHERE artifact_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        Ok((n == 1, exists))
      })
      .await?;

    if !exists {
      return Err(Error::ArtifactNotFound(artifact_id));
    }
    Ok(updated)
  }

  // ── Fact ledger — append-only writes ──────────────────────────────────────

  async fn append_fact(&self, input: NewFactEvent) -> Result<bool> {
    input.validate().map_err(Error::Core)?;

    let event_id = encode_uuid(Uuid::new_v4());
    let entity_id = input.entity_id;
    let metric = input.metric.as_str().to_owned();
    let as_of = encode_date(input.as_of);
    let reported_at = encode_date(input.reported_at);
    let artifact_id = encode_uuid(input.artifact_id);
    let run_id = encode_uuid(input.run_id);
    let created_at = encode_dt(Utc::now());
    let value = input.value;
    let unit = input.unit;
    let extraction_method = input.extraction_method;
    let confidence = input.confidence;
    let quoted_text = input.quoted_text;

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO fact_events (
             event_id, entity_id, metric, value, unit, as_of, reported_at,
             artifact_id, run_id, extraction_method, confidence, quoted_text,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            event_id,
            entity_id,
            metric,
            value,
            unit,
            as_of,
            reported_at,
            artifact_id,
            run_id,
            extraction_method,
            confidence,
            quoted_text,
            created_at,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(inserted)
  }

  async fn latest_fact(
    &self,
    entity_id: &str,
    metric: Metric,
  ) -> Result<Option<FactEvent>> {
    let entity = entity_id.to_owned();
    let metric_str = metric.as_str().to_owned();
    let sql = format!(
      "SELECT {FACT_COLUMNS} FROM fact_events
       WHERE entity_id = ?1 AND metric = ?2
       ORDER BY as_of DESC, reported_at DESC, created_at DESC, event_id DESC
       LIMIT 1"
    );

    let raw: Option<RawFactEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![entity, metric_str], read_fact_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFactEvent::into_event).transpose()
  }

  async fn fact_as_of(
    &self,
    entity_id: &str,
    metric: Metric,
    date: NaiveDate,
  ) -> Result<Option<FactEvent>> {
    let entity = entity_id.to_owned();
    let metric_str = metric.as_str().to_owned();
    let date_str = encode_date(date);
    let sql = format!(
      "SELECT {FACT_COLUMNS} FROM fact_events
       WHERE entity_id = ?1 AND metric = ?2 AND as_of <= ?3
       ORDER BY as_of DESC, reported_at DESC, created_at DESC, event_id DESC
       LIMIT 1"
    );

    let raw: Option<RawFactEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params![entity, metric_str, date_str],
              read_fact_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFactEvent::into_event).transpose()
  }

  // ── Discrepancies ─────────────────────────────────────────────────────────

  async fn upsert_pending_discrepancy(
    &self,
    input: NewDiscrepancy,
  ) -> Result<Discrepancy> {
    let entity_id = input.entity_id.clone();
    let metric_str = input.metric.as_str().to_owned();
    let our_value = input.our_value;
    let comparisons = encode_comparisons(&input.comparison_values)?;
    let severity = input.severity.as_str().to_owned();
    let deviation = input.max_deviation_pct;
    let new_id = encode_uuid(Uuid::new_v4());
    let created_at = encode_dt(Utc::now());
    let select_sql = format!(
      "SELECT {DISCREPANCY_COLUMNS} FROM discrepancies
       WHERE entity_id = ?1 AND metric = ?2 AND status = 'pending'"
    );

    let raw: RawDiscrepancy = self
      .conn
      .call(move |conn| {
        // Refresh the open row if one exists; terminal rows are never touched.
        let updated = conn.execute(
          "UPDATE discrepancies
           SET our_value = ?3, comparison_values = ?4, severity = ?5,
               max_deviation_pct = ?6
           WHERE entity_id = ?1 AND metric = ?2 AND status = 'pending'",
          rusqlite::params![
            entity_id, metric_str, our_value, comparisons, severity, deviation
          ],
        )?;

        if updated == 0 {
          conn.execute(
            "INSERT INTO discrepancies (
               id, entity_id, metric, our_value, comparison_values, severity,
               max_deviation_pct, status, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
            rusqlite::params![
              new_id, entity_id, metric_str, our_value, comparisons, severity,
              deviation, created_at
            ],
          )?;
        }

        let row = conn.query_row(
          &select_sql,
          rusqlite::params![entity_id, metric_str],
          read_discrepancy_row,
        )?;
        Ok(row)
      })
      .await?;

    raw.into_discrepancy()
  }

  async fn get_discrepancy(&self, id: Uuid) -> Result<Option<Discrepancy>> {
    let id_str = encode_uuid(id);
    let sql =
      format!("SELECT {DISCREPANCY_COLUMNS} FROM discrepancies WHERE id = ?1");

    let raw: Option<RawDiscrepancy> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], read_discrepancy_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDiscrepancy::into_discrepancy).transpose()
  }

  async fn list_discrepancies(
    &self,
    query: &DiscrepancyQuery,
  ) -> Result<Vec<Discrepancy>> {
    let status = query.status.map(|s| s.as_str().to_owned());
    let severity = query.severity.map(|s| s.as_str().to_owned());
    let entity = query.entity_id.clone();
    let since = query.since.map(encode_dt);
    let until = query.until.map(encode_dt);
    let limit_val = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawDiscrepancy> = self
      .conn
      .call(move |conn| {
        // Build WHERE clause dynamically; parameter slots stay fixed.
        let mut conds: Vec<&'static str> = vec![];
        if status.is_some() {
          conds.push("status = ?1");
        }
        if severity.is_some() {
          conds.push("severity = ?2");
        }
        if entity.is_some() {
          conds.push("entity_id = ?3");
        }
        if since.is_some() {
          conds.push("created_at >= ?4");
        }
        if until.is_some() {
          conds.push("created_at < ?5");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {DISCREPANCY_COLUMNS} FROM discrepancies
           {where_clause}
           ORDER BY created_at DESC
           LIMIT ?6 OFFSET ?7"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              status.as_deref(),
              severity.as_deref(),
              entity.as_deref(),
              since.as_deref(),
              until.as_deref(),
              limit_val,
              offset_val,
            ],
            read_discrepancy_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDiscrepancy::into_discrepancy).collect()
  }

  async fn resolve_discrepancy(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> Result<Discrepancy> {
    if !resolution.status.is_terminal() {
      return Err(Error::NonTerminalResolution);
    }

    let id_str = encode_uuid(id);
    let status = resolution.status.as_str().to_owned();
    let resolved_at = encode_dt(Utc::now());

    let updated = self
      .conn
      .call({
        let id_str = id_str.clone();
        move |conn| {
          // Compare-and-set against pending: two reviewers can't both close
          // the same row.
          let n = conn.execute(
            "UPDATE discrepancies
             SET status = ?2, resolution_value = ?3, resolution_source = ?4,
                 resolution_notes = ?5, resolved_by = ?6, resolved_at = ?7
             WHERE id = ?1 AND status = 'pending'",
            rusqlite::params![
              id_str,
              status,
              resolution.resolution_value,
              resolution.resolution_source,
              resolution.notes,
              resolution.resolved_by,
              resolved_at,
            ],
          )?;
          Ok(n)
        }
      })
      .await?;

    match self.get_discrepancy(id).await? {
      None => Err(Error::DiscrepancyNotFound(id)),
      Some(_) if updated == 0 => Err(Error::NotPending(id)),
      Some(row) => Ok(row),
    }
  }

  async fn resolve_discrepancies_for(
    &self,
    entity_id: &str,
    metric: Metric,
    resolution: Resolution,
  ) -> Result<usize> {
    if !resolution.status.is_terminal() {
      return Err(Error::NonTerminalResolution);
    }

    let entity = entity_id.to_owned();
    let metric_str = metric.as_str().to_owned();
    let status = resolution.status.as_str().to_owned();
    let resolved_at = encode_dt(Utc::now());

    let updated = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE discrepancies
           SET status = ?3, resolution_value = ?4, resolution_source = ?5,
               resolution_notes = ?6, resolved_by = ?7, resolved_at = ?8
           WHERE entity_id = ?1 AND metric = ?2 AND status = 'pending'",
          rusqlite::params![
            entity,
            metric_str,
            status,
            resolution.resolution_value,
            resolution.resolution_source,
            resolution.notes,
            resolution.resolved_by,
            resolved_at,
          ],
        )?;
        Ok(n)
      })
      .await?;

    Ok(updated)
  }

  // ── Run register ──────────────────────────────────────────────────────────

  async fn start_run(
    &self,
    trigger: RunTrigger,
    notes: Option<String>,
  ) -> Result<Run> {
    let run = Run {
      run_id: Uuid::new_v4(),
      started_at: Utc::now(),
      ended_at: None,
      trigger,
      notes,
    };

    let id_str = encode_uuid(run.run_id);
    let at_str = encode_dt(run.started_at);
    let trigger_str = trigger.as_str().to_owned();
    let notes_clone = run.notes.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO runs (run_id, started_at, ended_at, trigger_kind, notes)
           VALUES (?1, ?2, NULL, ?3, ?4)",
          rusqlite::params![id_str, at_str, trigger_str, notes_clone],
        )?;
        Ok(())
      })
      .await?;

    Ok(run)
  }

  async fn finish_run(&self, run_id: Uuid) -> Result<Run> {
    let id_str = encode_uuid(run_id);
    let ended_at = encode_dt(Utc::now());

    let raw: Option<RawRun> = self
      .conn
      .call(move |conn| {
        // Idempotent: a run already ended keeps its original ended_at.
        conn.execute(
          "UPDATE runs SET ended_at = ?2
           WHERE run_id = ?1 AND ended_at IS NULL",
          rusqlite::params![id_str, ended_at],
        )?;

        Ok(
          conn
            .query_row(
              "SELECT run_id, started_at, ended_at, trigger_kind, notes
               FROM runs WHERE run_id = ?1",
              rusqlite::params![id_str],
              read_run_row,
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      None => Err(Error::RunNotFound(run_id)),
      Some(raw) => raw.into_run(),
    }
  }

  async fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
    let limit_val = limit as i64;

    let raws: Vec<RawRun> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT run_id, started_at, ended_at, trigger_kind, notes
           FROM runs ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], read_run_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRun::into_run).collect()
  }
}
