//! Pipeline orchestration.
//!
//! [`AnalysisEngine`] wires the detector, the trend analyzer and the
//! alert builder to the collaborator stores. It is cheap to clone and
//! holds no per-session state, so concurrent updates for different
//! sessions proceed independently; escalated deep analysis runs on a
//! background task and never blocks the telemetry path.

use crate::alerts::{AlertBuilder, AlertSeverity, AlertType, CourseId, InterventionAlert,
    NotificationId};
use crate::config::WritepulseConfig;
use crate::detector::AnomalyDetector;
use crate::error::AnalysisError;
use crate::risk::{assess_ai_risk, RiskAssessment};
use crate::session::{ActivitySnapshot, AnomalyRecord, DocumentId, SessionUpdate, UserId,
    WritingSession};
use crate::store::{
    BaselineStore, BehaviorProfileSink, DeclarationStore, DocumentStore, EnrollmentStore,
    InterventionNotification, NotificationSink, SessionStore, SubmissionStore,
};
use crate::trends::TrendAnalyzer;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// External services the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub declarations: Arc<dyn DeclarationStore>,
    pub baselines: Arc<dyn BaselineStore>,
    pub profile: Arc<dyn BehaviorProfileSink>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// Back every seam with one shared store. Test and demo wiring.
    pub fn from_single<S>(store: Arc<S>) -> Self
    where
        S: SessionStore
            + DocumentStore
            + SubmissionStore
            + EnrollmentStore
            + DeclarationStore
            + BaselineStore
            + BehaviorProfileSink
            + NotificationSink
            + 'static,
    {
        Self {
            sessions: store.clone(),
            documents: store.clone(),
            submissions: store.clone(),
            enrollments: store.clone(),
            declarations: store.clone(),
            baselines: store.clone(),
            profile: store.clone(),
            notifications: store,
        }
    }
}

#[derive(Clone)]
pub struct AnalysisEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: WritepulseConfig,
    detector: AnomalyDetector,
    trends: TrendAnalyzer,
    alert_builder: AlertBuilder,
    stores: Collaborators,
}

impl AnalysisEngine {
    pub fn new(config: WritepulseConfig, stores: Collaborators) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                detector: AnomalyDetector::new(config.detector.clone()),
                trends: TrendAnalyzer::new(config.trends.clone()),
                alert_builder: AlertBuilder::new(config.alerts.clone()),
                config,
                stores,
            }),
        }
    }

    /// Open a new tracked session for one student on one document.
    pub async fn begin_session(
        &self,
        user: impl Into<UserId>,
        document: impl Into<DocumentId>,
    ) -> Result<WritingSession, AnalysisError> {
        let session = WritingSession::new(
            Uuid::new_v4().to_string(),
            user.into(),
            document.into(),
            Utc::now(),
        );
        self.inner.stores.sessions.save(&session).await?;
        Ok(session)
    }

    /// Process one telemetry update end to end: validate, fold into the
    /// session, run the real-time rules, persist, and escalate to
    /// background deep analysis on any high-severity finding.
    ///
    /// Returns the anomalies detected for this update.
    pub async fn process_session_update(
        &self,
        update: SessionUpdate,
    ) -> Result<Vec<AnomalyRecord>, AnalysisError> {
        let snapshot = ActivitySnapshot::from_update(&update)?;
        let now = snapshot.recorded_at;

        let mut session = self
            .inner
            .stores
            .sessions
            .load(&update.session_id)
            .await?
            .ok_or_else(|| AnalysisError::UnknownSession(update.session_id.clone()))?;

        session.apply(&snapshot);
        let anomalies = self
            .inner
            .detector
            .evaluate(&mut session, &snapshot, self.inner.stores.documents.as_ref(), now)
            .await
            .map_err(AnalysisError::Store)?;
        session.record_anomalies(&anomalies);
        self.inner.stores.sessions.save(&session).await?;

        // Cognitive-load profiling is best effort; its failures must not
        // reject valid telemetry.
        if let Err(err) = self
            .inner
            .stores
            .profile
            .record_activity(&session.user_id, &snapshot)
            .await
        {
            log::warn!(
                "behavior profile update failed for {}: {err}",
                session.user_id
            );
        }

        if anomalies
            .iter()
            .any(|a| a.severity == crate::session::AnomalySeverity::High)
        {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                if let Err(err) = inner.deep_analysis(&session).await {
                    log::warn!(
                        "deep analysis failed for session {}: {err}",
                        session.id
                    );
                }
            });
        }

        Ok(anomalies)
    }

    /// Longitudinal trend scan for one student, finalized for dispatch.
    pub async fn analyze_student_writing_progress(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        timeframe_days: Option<i64>,
    ) -> Result<Vec<InterventionAlert>, AnalysisError> {
        let now = Utc::now();
        let alerts = self
            .inner
            .trends
            .scan(
                user,
                course,
                timeframe_days,
                self.inner.stores.sessions.as_ref(),
                self.inner.stores.submissions.as_ref(),
                now,
            )
            .await?;
        Ok(self.inner.alert_builder.finalize_batch(alerts, now))
    }

    /// Scheduled course-wide scan. One student's store failure is
    /// logged and skipped; the rest of the roster is still analyzed.
    pub async fn run_course_intervention_analysis(
        &self,
        course: &CourseId,
    ) -> Result<Vec<InterventionAlert>, AnalysisError> {
        let now = Utc::now();
        let students = self.inner.stores.enrollments.active_students(course).await?;
        log::info!(
            "course intervention analysis for {course}: {} student(s)",
            students.len()
        );

        let mut alerts = Vec::new();
        for student in &students {
            match self
                .inner
                .trends
                .scan(
                    student,
                    Some(course),
                    None,
                    self.inner.stores.sessions.as_ref(),
                    self.inner.stores.submissions.as_ref(),
                    now,
                )
                .await
            {
                Ok(found) => alerts.extend(found),
                Err(err) => {
                    log::warn!("trend scan failed for student {student}: {err}");
                }
            }
        }

        Ok(self.inner.alert_builder.finalize_batch(alerts, now))
    }

    /// Hand one finalized alert to the notification collaborator,
    /// addressed to a specific instructor.
    pub async fn create_intervention_notification(
        &self,
        alert: InterventionAlert,
        instructor: impl Into<UserId>,
    ) -> Result<NotificationId, AnalysisError> {
        let alert = self.inner.alert_builder.finalize(alert, Utc::now());
        let id = self
            .inner
            .stores
            .notifications
            .deliver(InterventionNotification {
                priority: alert.severity.dispatch_priority(),
                alert,
                recipient: Some(instructor.into()),
            })
            .await?;
        Ok(id)
    }

    /// Route a completed risk assessment: suppressed to a supportive
    /// acknowledgement when the student declared AI use, escalated to
    /// an educational intervention when the score exceeds the
    /// configured threshold, dropped otherwise.
    pub async fn handle_detected_ai_usage(
        &self,
        user: &UserId,
        document: &DocumentId,
        assessment: &RiskAssessment,
    ) -> Result<Option<NotificationId>, AnalysisError> {
        self.inner.handle_detected_ai_usage(user, document, assessment).await
    }
}

impl EngineInner {
    /// Background deep analysis for one escalated session.
    async fn deep_analysis(&self, session: &WritingSession) -> Result<(), AnalysisError> {
        let content = self
            .stores
            .documents
            .current_content(&session.document_id)
            .await?
            .unwrap_or_default();
        let baseline = self.stores.baselines.style_baseline(&session.user_id).await?;

        let assessment = assess_ai_risk(
            &content,
            baseline.as_ref(),
            session,
            &self.config.detector,
        );
        log::debug!(
            "deep analysis for session {}: score {:.1}, confidence {:.1}",
            session.id,
            assessment.score,
            assessment.confidence
        );

        self.handle_detected_ai_usage(&session.user_id, &session.document_id, &assessment)
            .await?;
        Ok(())
    }

    async fn handle_detected_ai_usage(
        &self,
        user: &UserId,
        document: &DocumentId,
        assessment: &RiskAssessment,
    ) -> Result<Option<NotificationId>, AnalysisError> {
        let declaration = self.stores.declarations.ai_declaration(user, document).await?;

        let alert = if let Some(declaration) = declaration {
            // Honest disclosure is the behavior we want to reinforce.
            InterventionAlert::new(
                AlertType::AiUsageAcknowledged,
                AlertSeverity::Info,
                "Declared AI assistance on file",
                format!(
                    "The student declared use of {} for this document. No review \
                     is needed; consider acknowledging the transparency.",
                    if declaration.tools.is_empty() {
                        "AI tools".to_string()
                    } else {
                        declaration.tools.join(", ")
                    }
                ),
                user.clone(),
            )
            .with_actions(["Thank the student for disclosing their process"])
        } else if assessment.exceeds(self.config.detector.risk_intervention_threshold) {
            InterventionAlert::new(
                AlertType::AiUsageRisk,
                AlertSeverity::Warning,
                "Writing patterns suggest undeclared AI assistance",
                format!(
                    "Composite risk score {:.0} (confidence {:.0}%) across {} words. \
                     Start with a conversation about the writing process, not an \
                     accusation.",
                    assessment.score, assessment.confidence, assessment.words_evaluated
                ),
                user.clone(),
            )
            .with_actions([
                "Discuss the assignment's AI policy with the student",
                "Invite the student to walk through their drafting process",
                "Point the student at the disclosure workflow",
            ])
        } else {
            return Ok(None);
        };

        let alert = self.alert_builder.finalize(alert, Utc::now());
        let id = self
            .stores
            .notifications
            .deliver(InterventionNotification {
                priority: alert.severity.dispatch_priority(),
                alert,
                // No addressed instructor; the sink routes to course staff.
                recipient: None,
            })
            .await?;
        Ok(Some(id))
    }
}
