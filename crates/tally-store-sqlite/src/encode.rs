//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings; dates are ISO `YYYY-MM-DD` (both order
//! lexicographically). Comparison values are stored as compact JSON. UUIDs
//! are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use tally_core::{
  artifact::{Artifact, SourceType},
  discrepancy::{ComparisonValue, Discrepancy, DiscrepancyStatus, Severity},
  fact::FactEvent,
  metric::Metric,
  run::{Run, RunTrigger},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps and dates ────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_source_type(s: &str) -> Result<SourceType> {
  match s {
    "filing" => Ok(SourceType::Filing),
    "exhibit" => Ok(SourceType::Exhibit),
    other => Err(Error::Decode(format!("source type {other:?}"))),
  }
}

pub fn decode_metric(s: &str) -> Result<Metric> {
  Metric::parse(s).map_err(Error::Core)
}

pub fn decode_severity(s: &str) -> Result<Severity> {
  match s {
    "minor" => Ok(Severity::Minor),
    "moderate" => Ok(Severity::Moderate),
    "major" => Ok(Severity::Major),
    other => Err(Error::Decode(format!("severity {other:?}"))),
  }
}

pub fn decode_status(s: &str) -> Result<DiscrepancyStatus> {
  match s {
    "pending" => Ok(DiscrepancyStatus::Pending),
    "resolved" => Ok(DiscrepancyStatus::Resolved),
    "dismissed" => Ok(DiscrepancyStatus::Dismissed),
    other => Err(Error::Decode(format!("status {other:?}"))),
  }
}

pub fn decode_trigger(s: &str) -> Result<RunTrigger> {
  match s {
    "scheduled" => Ok(RunTrigger::Scheduled),
    "manual" => Ok(RunTrigger::Manual),
    other => Err(Error::Decode(format!("run trigger {other:?}"))),
  }
}

// ─── Comparison values ───────────────────────────────────────────────────────

pub fn encode_comparisons(values: &[ComparisonValue]) -> Result<String> {
  Ok(serde_json::to_string(values)?)
}

pub fn decode_comparisons(s: &str) -> Result<Vec<ComparisonValue>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `artifacts` row.
pub struct RawArtifact {
  pub artifact_id:       String,
  pub entity_id:         String,
  pub source_type:       String,
  pub filing_identifier: Option<String>,
  pub source_url:        Option<String>,
  pub content_key:       String,
  pub content_hash:      String,
  pub content_type:      String,
  pub fetched_at:        String,
  pub created_at:        String,
}

impl RawArtifact {
  pub fn into_artifact(self) -> Result<Artifact> {
    Ok(Artifact {
      artifact_id:       decode_uuid(&self.artifact_id)?,
      entity_id:         self.entity_id,
      source_type:       decode_source_type(&self.source_type)?,
      filing_identifier: self.filing_identifier,
      source_url:        self.source_url,
      content_key:       self.content_key,
      content_hash:      self.content_hash,
      content_type:      self.content_type,
      fetched_at:        decode_dt(&self.fetched_at)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `fact_events` row.
pub struct RawFactEvent {
  pub event_id:          String,
  pub entity_id:         String,
  pub metric:            String,
  pub value:             f64,
  pub unit:              String,
  pub as_of:             String,
  pub reported_at:       String,
  pub artifact_id:       String,
  pub run_id:            String,
  pub extraction_method: String,
  pub confidence:        f64,
  pub quoted_text:       Option<String>,
  pub created_at:        String,
}

impl RawFactEvent {
  pub fn into_event(self) -> Result<FactEvent> {
    Ok(FactEvent {
      event_id:          decode_uuid(&self.event_id)?,
      entity_id:         self.entity_id,
      metric:            decode_metric(&self.metric)?,
      value:             self.value,
      unit:              self.unit,
      as_of:             decode_date(&self.as_of)?,
      reported_at:       decode_date(&self.reported_at)?,
      artifact_id:       decode_uuid(&self.artifact_id)?,
      run_id:            decode_uuid(&self.run_id)?,
      extraction_method: self.extraction_method,
      confidence:        self.confidence,
      quoted_text:       self.quoted_text,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `discrepancies` row.
pub struct RawDiscrepancy {
  pub id:                String,
  pub entity_id:         String,
  pub metric:            String,
  pub our_value:         f64,
  pub comparison_values: String,
  pub severity:          String,
  pub max_deviation_pct: f64,
  pub status:            String,
  pub resolution_value:  Option<f64>,
  pub resolution_source: Option<String>,
  pub resolution_notes:  Option<String>,
  pub resolved_by:       Option<String>,
  pub resolved_at:       Option<String>,
  pub created_at:        String,
}

impl RawDiscrepancy {
  pub fn into_discrepancy(self) -> Result<Discrepancy> {
    Ok(Discrepancy {
      id:                decode_uuid(&self.id)?,
      entity_id:         self.entity_id,
      metric:            decode_metric(&self.metric)?,
      our_value:         self.our_value,
      comparison_values: decode_comparisons(&self.comparison_values)?,
      severity:          decode_severity(&self.severity)?,
      max_deviation_pct: self.max_deviation_pct,
      status:            decode_status(&self.status)?,
      resolution_value:  self.resolution_value,
      resolution_source: self.resolution_source,
      resolution_notes:  self.resolution_notes,
      resolved_by:       self.resolved_by,
      resolved_at:       self.resolved_at.as_deref().map(decode_dt).transpose()?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `runs` row.
pub struct RawRun {
  pub run_id:       String,
  pub started_at:   String,
  pub ended_at:     Option<String>,
  pub trigger_kind: String,
  pub notes:        Option<String>,
}

impl RawRun {
  pub fn into_run(self) -> Result<Run> {
    Ok(Run {
      run_id:     decode_uuid(&self.run_id)?,
      started_at: decode_dt(&self.started_at)?,
      ended_at:   self.ended_at.as_deref().map(decode_dt).transpose()?,
      trigger:    decode_trigger(&self.trigger_kind)?,
      notes:      self.notes,
    })
  }
}
