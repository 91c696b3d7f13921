//! Real-time anomaly detection over one activity snapshot.
//!
//! Each rule is evaluated independently, in a fixed order, against the
//! snapshot plus minimal session lookups; a single update may yield
//! several anomalies, and an empty result is the common case.

use crate::config::DetectorConfig;
use crate::error::StoreError;
use crate::session::{
    ActivitySnapshot, AnomalyRecord, AnomalySeverity, AnomalyType, WritingSession,
};
use crate::store::DocumentStore;
use crate::stylometry::complexity_score;
use chrono::{DateTime, Duration, Utc};

pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Evaluate all rules for one update.
    ///
    /// Rule order: bulk addition, typing speed, copy-paste frequency,
    /// stylistic drift. The style check mutates the session's
    /// rate-limit timestamp.
    pub async fn evaluate(
        &self,
        session: &mut WritingSession,
        snapshot: &ActivitySnapshot,
        documents: &dyn DocumentStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<AnomalyRecord>, StoreError> {
        let mut anomalies = Vec::new();

        if let Some(record) = self.check_bulk_addition(snapshot, now) {
            anomalies.push(record);
        }
        if let Some(record) = self.check_typing_speed(snapshot, now) {
            anomalies.push(record);
        }
        if let Some(record) = self.check_copy_paste(snapshot, now) {
            anomalies.push(record);
        }
        if let Some(record) = self.check_style_drift(session, documents, now).await? {
            anomalies.push(record);
        }

        Ok(anomalies)
    }

    /// The most recent single bulk insertion above the character
    /// threshold (exclusive) is suspicious.
    fn check_bulk_addition(
        &self,
        snapshot: &ActivitySnapshot,
        now: DateTime<Utc>,
    ) -> Option<AnomalyRecord> {
        let latest = snapshot.latest_bulk_addition()?;
        if latest > self.config.bulk_addition_chars {
            return Some(AnomalyRecord::new(
                AnomalyType::SuspiciousAddition,
                AnomalySeverity::Medium,
                format!(
                    "bulk insertion of {latest} chars exceeds {} char threshold",
                    self.config.bulk_addition_chars
                ),
                now,
                true,
            ));
        }
        None
    }

    /// Words-per-minute over the threshold (exclusive). Informational
    /// only; fast typists exist.
    fn check_typing_speed(
        &self,
        snapshot: &ActivitySnapshot,
        now: DateTime<Utc>,
    ) -> Option<AnomalyRecord> {
        let wpm = snapshot.words_per_minute()?;
        if wpm > self.config.typing_speed_wpm {
            return Some(AnomalyRecord::new(
                AnomalyType::AiPattern,
                AnomalySeverity::Low,
                format!(
                    "typing speed {wpm:.0} WPM exceeds {:.0} WPM threshold",
                    self.config.typing_speed_wpm
                ),
                now,
                false,
            ));
        }
        None
    }

    fn check_copy_paste(
        &self,
        snapshot: &ActivitySnapshot,
        now: DateTime<Utc>,
    ) -> Option<AnomalyRecord> {
        if snapshot.copy_paste_events > self.config.copy_paste_events {
            return Some(AnomalyRecord::new(
                AnomalyType::CopyPaste,
                AnomalySeverity::Medium,
                format!(
                    "{} copy-paste events in one update exceeds {}",
                    snapshot.copy_paste_events, self.config.copy_paste_events
                ),
                now,
                true,
            ));
        }
        None
    }

    /// Compare complexity between the two most recent persisted
    /// versions, at most once per configured interval per session.
    ///
    /// The rate-limit timestamp advances whenever the check runs, even
    /// when fewer than two versions exist, so a version-poor document
    /// is not re-probed on every tick.
    async fn check_style_drift(
        &self,
        session: &mut WritingSession,
        documents: &dyn DocumentStore,
        now: DateTime<Utc>,
    ) -> Result<Option<AnomalyRecord>, StoreError> {
        let interval = Duration::seconds(self.config.style_check_interval_secs as i64);
        if let Some(last) = session.last_style_check {
            if now - last < interval {
                return Ok(None);
            }
        }
        session.last_style_check = Some(now);

        let versions = documents.recent_versions(&session.document_id, 2).await?;
        if versions.len() < 2 {
            // Insufficient history is not an error; no finding.
            return Ok(None);
        }

        let current = complexity_score(&versions[0].content);
        let previous = complexity_score(&versions[1].content);
        let delta = (current - previous).abs();

        if delta > self.config.style_delta_high {
            return Ok(Some(AnomalyRecord::new(
                AnomalyType::StyleChange,
                AnomalySeverity::High,
                format!("complexity shifted {delta:.1} points between versions"),
                now,
                true,
            )));
        }
        if delta > self.config.style_delta_medium {
            return Ok(Some(AnomalyRecord::new(
                AnomalyType::StyleChange,
                AnomalySeverity::Medium,
                format!("complexity shifted {delta:.1} points between versions"),
                now,
                false,
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionUpdate;
    use crate::store::MemoryStore;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(DetectorConfig::default())
    }

    fn update_with(f: impl FnOnce(&mut SessionUpdate)) -> ActivitySnapshot {
        let mut update = SessionUpdate {
            session_id: "s1".to_string(),
            document_id: "d1".to_string(),
            user_id: "u1".to_string(),
            chars_added: 0,
            chars_deleted: 0,
            words_added: 0,
            words_deleted: 0,
            copy_paste_events: 0,
            bulk_text_additions: vec![],
            pause_durations: vec![],
            duration_minutes: 0.0,
            last_activity: Utc::now(),
        };
        f(&mut update);
        ActivitySnapshot::from_update(&update).expect("valid update")
    }

    async fn evaluate(snapshot: ActivitySnapshot) -> Vec<AnomalyRecord> {
        let store = MemoryStore::new();
        let mut session = WritingSession::new("s1", "u1", "d1", Utc::now());
        detector()
            .evaluate(&mut session, &snapshot, &store, Utc::now())
            .await
            .expect("evaluate")
    }

    #[tokio::test]
    async fn test_zero_deltas_produce_no_anomalies() {
        let anomalies = evaluate(update_with(|_| {})).await;
        assert!(anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_addition_boundary_is_exclusive() {
        let at_threshold = evaluate(update_with(|u| u.bulk_text_additions = vec![500])).await;
        assert!(at_threshold.is_empty());

        let over = evaluate(update_with(|u| u.bulk_text_additions = vec![501])).await;
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].anomaly_type, AnomalyType::SuspiciousAddition);
        assert_eq!(over[0].severity, AnomalySeverity::Medium);
        assert!(over[0].requires_review);
    }

    #[tokio::test]
    async fn test_bulk_addition_uses_most_recent_insertion() {
        // An older large paste followed by a small one does not trigger.
        let anomalies =
            evaluate(update_with(|u| u.bulk_text_additions = vec![900, 40])).await;
        assert!(anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_typing_speed_boundary_is_exclusive() {
        // 120 words over 1 minute of elapsed time is exactly 120 WPM... via
        // wpm = words / duration * 60, so words=2, duration=1 -> 120.
        let at_threshold = evaluate(update_with(|u| {
            u.words_added = 2;
            u.duration_minutes = 1.0;
        }))
        .await;
        assert!(at_threshold.is_empty());

        // words=121, duration=60 -> 121 WPM.
        let over = evaluate(update_with(|u| {
            u.words_added = 121;
            u.duration_minutes = 60.0;
        }))
        .await;
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].anomaly_type, AnomalyType::AiPattern);
        assert_eq!(over[0].severity, AnomalySeverity::Low);
        assert!(!over[0].requires_review);
    }

    #[tokio::test]
    async fn test_zero_duration_skips_speed_rule() {
        let anomalies = evaluate(update_with(|u| u.words_added = 500)).await;
        assert!(anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_copy_paste_boundary() {
        let at_threshold = evaluate(update_with(|u| u.copy_paste_events = 5)).await;
        assert!(at_threshold.is_empty());

        let over = evaluate(update_with(|u| u.copy_paste_events = 6)).await;
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].anomaly_type, AnomalyType::CopyPaste);
        assert!(over[0].requires_review);
    }

    #[tokio::test]
    async fn test_style_drift_severity_tiers() {
        let store = MemoryStore::new();
        let now = Utc::now();
        // Terse note vs ornate academic prose; complexity gap well past 50.
        store.push_version("d1", "We met. We talked. It was good.", now - Duration::hours(1));
        store.push_version(
            "d1",
            "Notwithstanding considerable methodological heterogeneity, the \
             longitudinal investigation demonstrated remarkably consistent \
             attitudinal convergence across demographically diverse cohorts.",
            now,
        );

        let mut session = WritingSession::new("s1", "u1", "d1", now);
        let snapshot = update_with(|_| {});
        let anomalies = detector()
            .evaluate(&mut session, &snapshot, &store, now)
            .await
            .expect("evaluate");

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::StyleChange);
        assert_eq!(anomalies[0].severity, AnomalySeverity::High);
        assert!(anomalies[0].requires_review);
        assert!(session.last_style_check.is_some());
    }

    #[tokio::test]
    async fn test_moderate_style_drift_is_medium_without_review() {
        let store = MemoryStore::new();
        let now = Utc::now();
        // Delta lands between the medium and high thresholds.
        store.push_version("d1", "We met. We talked. It was good.", now - Duration::hours(1));
        store.push_version(
            "d1",
            "Mornings usually provide quieter moments. Students revise \
             drafts before breakfast. Writing improves through steady \
             practice.",
            now,
        );

        let mut session = WritingSession::new("s1", "u1", "d1", now);
        let snapshot = update_with(|_| {});
        let anomalies = detector()
            .evaluate(&mut session, &snapshot, &store, now)
            .await
            .expect("evaluate");

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::StyleChange);
        assert_eq!(anomalies[0].severity, AnomalySeverity::Medium);
        assert!(!anomalies[0].requires_review);
    }

    #[tokio::test]
    async fn test_style_check_is_rate_limited() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.push_version("d1", "short one.", now - Duration::hours(1));
        store.push_version(
            "d1",
            "Extraordinarily sophisticated vocabulary permeates throughout \
             this considerably elaborate replacement composition entirely.",
            now,
        );

        let mut session = WritingSession::new("s1", "u1", "d1", now);
        session.last_style_check = Some(now - Duration::seconds(60));

        let snapshot = update_with(|_| {});
        let anomalies = detector()
            .evaluate(&mut session, &snapshot, &store, now)
            .await
            .expect("evaluate");
        assert!(anomalies.is_empty(), "checked again inside the interval");

        // Outside the interval the check runs.
        let later = now + Duration::seconds(301);
        let anomalies = detector()
            .evaluate(&mut session, &snapshot, &store, later)
            .await
            .expect("evaluate");
        assert_eq!(anomalies.len(), 1);
    }

    #[tokio::test]
    async fn test_single_version_yields_no_style_finding() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.push_version("d1", "only draft so far", now);

        let mut session = WritingSession::new("s1", "u1", "d1", now);
        let snapshot = update_with(|_| {});
        let anomalies = detector()
            .evaluate(&mut session, &snapshot, &store, now)
            .await
            .expect("evaluate");

        assert!(anomalies.is_empty());
        // The interval is still consumed.
        assert_eq!(session.last_style_check, Some(now));
    }

    #[tokio::test]
    async fn test_multiple_rules_fire_in_order() {
        let anomalies = evaluate(update_with(|u| {
            u.words_added = 550;
            u.duration_minutes = 8.0;
            u.copy_paste_events = 7;
            u.bulk_text_additions = vec![1200];
        }))
        .await;

        let types: Vec<AnomalyType> = anomalies.iter().map(|a| a.anomaly_type).collect();
        assert_eq!(
            types,
            vec![
                AnomalyType::SuspiciousAddition,
                AnomalyType::AiPattern,
                AnomalyType::CopyPaste,
            ]
        );
    }
}
