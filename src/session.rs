//! Writing-session telemetry model and the signal normalizer.
//!
//! A raw [`SessionUpdate`] arrives from the editor plumbing with signed
//! counters; the normalizer validates it into an immutable
//! [`ActivitySnapshot`] (delta values, the unit the detector evaluates)
//! and folds it into the session's cumulative counters. Counters are
//! append-only; the session lifecycle itself is owned by the session
//! store.

use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SessionId = String;
pub type UserId = String;
pub type DocumentId = String;

/// Bulk-insertion sizes retained per session for recency checks.
const BULK_HISTORY_CAP: usize = 32;

/// Raw per-update telemetry as delivered by the editor integration.
///
/// Counters are signed on the wire; the normalizer rejects negatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub session_id: SessionId,
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub chars_added: i64,
    pub chars_deleted: i64,
    pub words_added: i64,
    pub words_deleted: i64,
    pub copy_paste_events: i64,
    /// Character sizes of bulk text insertions within this update,
    /// in the order they occurred.
    pub bulk_text_additions: Vec<i64>,
    /// Pause durations observed within this update, in seconds.
    pub pause_durations: Vec<f64>,
    /// Elapsed editing time covered by this update, in minutes.
    pub duration_minutes: f64,
    pub last_activity: DateTime<Utc>,
}

/// Immutable per-update view the anomaly detector evaluates.
///
/// Exists only transiently within one processing call.
#[derive(Debug, Clone)]
pub struct ActivitySnapshot {
    pub chars_added: u64,
    pub chars_deleted: u64,
    pub words_added: u64,
    pub words_deleted: u64,
    pub copy_paste_events: u64,
    pub bulk_text_additions: Vec<u64>,
    pub pause_durations: Vec<f64>,
    pub duration_minutes: f64,
    pub recorded_at: DateTime<Utc>,
}

impl ActivitySnapshot {
    /// Validate a raw update into a snapshot.
    ///
    /// Counts must be non-negative; duration is clamped to ≥ 0.
    /// Partial or all-zero updates are valid idle ticks, not errors.
    pub fn from_update(update: &SessionUpdate) -> Result<Self, AnalysisError> {
        for (name, value) in [
            ("chars_added", update.chars_added),
            ("chars_deleted", update.chars_deleted),
            ("words_added", update.words_added),
            ("words_deleted", update.words_deleted),
            ("copy_paste_events", update.copy_paste_events),
        ] {
            if value < 0 {
                return Err(AnalysisError::InvalidUpdate(format!(
                    "{name} is negative: {value}"
                )));
            }
        }
        if let Some(bad) = update.bulk_text_additions.iter().find(|v| **v < 0) {
            return Err(AnalysisError::InvalidUpdate(format!(
                "bulk_text_additions contains negative size: {bad}"
            )));
        }

        Ok(Self {
            chars_added: update.chars_added as u64,
            chars_deleted: update.chars_deleted as u64,
            words_added: update.words_added as u64,
            words_deleted: update.words_deleted as u64,
            copy_paste_events: update.copy_paste_events as u64,
            bulk_text_additions: update
                .bulk_text_additions
                .iter()
                .map(|v| *v as u64)
                .collect(),
            pause_durations: update
                .pause_durations
                .iter()
                .map(|p| p.max(0.0))
                .collect(),
            duration_minutes: update.duration_minutes.max(0.0),
            recorded_at: update.last_activity,
        })
    }

    /// Words per minute over this update's elapsed time.
    ///
    /// Returns `None` for zero-duration updates rather than dividing
    /// by zero; the speed rule skips those.
    pub fn words_per_minute(&self) -> Option<f64> {
        if self.duration_minutes > 0.0 {
            Some(self.words_added as f64 / self.duration_minutes * 60.0)
        } else {
            None
        }
    }

    /// The most recent bulk insertion in this update, if any.
    pub fn latest_bulk_addition(&self) -> Option<u64> {
        self.bulk_text_additions.last().copied()
    }

    pub fn is_idle_tick(&self) -> bool {
        self.chars_added == 0
            && self.chars_deleted == 0
            && self.words_added == 0
            && self.words_deleted == 0
            && self.copy_paste_events == 0
            && self.bulk_text_additions.is_empty()
    }
}

/// One continuous editing session for one user on one document.
///
/// Mutated on every telemetry update; counters only grow. Never
/// deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub document_id: DocumentId,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Cumulative editing time in minutes.
    pub duration_minutes: f64,
    pub chars_added: u64,
    pub chars_deleted: u64,
    pub words_added: u64,
    pub words_deleted: u64,
    pub copy_paste_events: u64,
    pub bulk_insertion_count: u64,
    /// Recent bulk-insertion sizes, newest last, capped.
    pub recent_bulk_insertions: Vec<u64>,
    /// Full pause history in seconds, appended per update.
    pub pause_durations: Vec<f64>,
    pub last_style_check: Option<DateTime<Utc>>,
    pub anomalies: Vec<AnomalyRecord>,
}

impl WritingSession {
    pub fn new(
        id: impl Into<SessionId>,
        user_id: impl Into<UserId>,
        document_id: impl Into<DocumentId>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            document_id: document_id.into(),
            started_at,
            last_activity: started_at,
            duration_minutes: 0.0,
            chars_added: 0,
            chars_deleted: 0,
            words_added: 0,
            words_deleted: 0,
            copy_paste_events: 0,
            bulk_insertion_count: 0,
            recent_bulk_insertions: Vec::new(),
            pause_durations: Vec::new(),
            last_style_check: None,
            anomalies: Vec::new(),
        }
    }

    /// Fold a snapshot into the cumulative counters. Additive for
    /// counts, append for pause history.
    pub fn apply(&mut self, snapshot: &ActivitySnapshot) {
        self.chars_added += snapshot.chars_added;
        self.chars_deleted += snapshot.chars_deleted;
        self.words_added += snapshot.words_added;
        self.words_deleted += snapshot.words_deleted;
        self.copy_paste_events += snapshot.copy_paste_events;
        self.bulk_insertion_count += snapshot.bulk_text_additions.len() as u64;
        self.duration_minutes += snapshot.duration_minutes;

        for &size in &snapshot.bulk_text_additions {
            if self.recent_bulk_insertions.len() >= BULK_HISTORY_CAP {
                self.recent_bulk_insertions.remove(0);
            }
            self.recent_bulk_insertions.push(size);
        }
        self.pause_durations.extend_from_slice(&snapshot.pause_durations);

        if snapshot.recorded_at > self.last_activity {
            self.last_activity = snapshot.recorded_at;
        }
    }

    /// Append anomalies for instructor review. Records are never
    /// mutated after creation.
    pub fn record_anomalies(&mut self, anomalies: &[AnomalyRecord]) {
        self.anomalies.extend_from_slice(anomalies);
    }

    pub fn has_high_severity_anomaly(&self) -> bool {
        self.anomalies
            .iter()
            .any(|a| a.severity == AnomalySeverity::High)
    }
}

/// Classification of a single rule-triggered observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    SuspiciousAddition,
    StyleChange,
    AiPattern,
    CopyPaste,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

/// One rule-triggered observation about one session update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub requires_review: bool,
}

impl AnomalyRecord {
    /// Build a record, holding the invariant that only medium-or-worse
    /// anomalies can require review.
    pub fn new(
        anomaly_type: AnomalyType,
        severity: AnomalySeverity,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
        requires_review: bool,
    ) -> Self {
        Self {
            anomaly_type,
            severity,
            description: description.into(),
            timestamp,
            requires_review: requires_review && severity >= AnomalySeverity::Medium,
        }
    }
}
