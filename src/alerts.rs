//! Instructor-facing intervention alerts.
//!
//! Both the real-time path and the batch path normalize their findings
//! into [`InterventionAlert`] before dispatch. The builder assigns
//! urgency-based response deadlines and deduplicates within one batch;
//! repeated identical findings across scheduled runs are a standing
//! alert, refreshed each run, not a bug.

use crate::config::AlertConfig;
use crate::session::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type CourseId = String;
pub type AssignmentId = String;
pub type SubmissionId = String;
pub type NotificationId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    /// Map alert severity to notification dispatch priority.
    pub fn dispatch_priority(self) -> DispatchPriority {
        match self {
            Self::Critical => DispatchPriority::Urgent,
            Self::Warning => DispatchPriority::High,
            Self::Info => DispatchPriority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPriority {
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NoRecentActivity,
    ProductivityDecline,
    EffortOutputMismatch,
    ProcrastinationPattern,
    LowParticipation,
    OverContribution,
    QualityConcern,
    TimeManagementCrisis,
    AiUsageRisk,
    AiUsageAcknowledged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

/// Metric snapshot backing a finding, for instructor context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMetrics {
    pub current_value: f64,
    pub previous_value: f64,
    pub threshold: f64,
    pub trend: TrendDirection,
}

/// Where in the course structure the finding applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<AssignmentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<SubmissionId>,
}

impl AlertContext {
    pub fn course(course_id: impl Into<CourseId>) -> Self {
        Self {
            course_id: Some(course_id.into()),
            ..Default::default()
        }
    }

    pub fn submission(
        course_id: Option<CourseId>,
        assignment_id: impl Into<AssignmentId>,
        submission_id: impl Into<SubmissionId>,
    ) -> Self {
        Self {
            course_id,
            assignment_id: Some(assignment_id.into()),
            submission_id: Some(submission_id.into()),
        }
    }
}

/// A severity-ranked finding requiring instructor awareness or action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionAlert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub suggested_actions: Vec<String>,
    pub student_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<AlertContext>,
    /// Filled by the builder from severity when absent; an explicitly
    /// supplied deadline is never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AlertMetrics>,
    pub created_at: DateTime<Utc>,
}

impl InterventionAlert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        student_id: impl Into<UserId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            suggested_actions: Vec::new(),
            student_id: student_id.into(),
            context: None,
            response_deadline: None,
            metrics: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: AlertContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_metrics(mut self, metrics: AlertMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.response_deadline = Some(deadline);
        self
    }

    fn dedup_key(&self) -> (AlertType, UserId, Option<AlertContext>) {
        (self.alert_type, self.student_id.clone(), self.context.clone())
    }
}

/// Normalizes alerts from both paths: deadline assignment and
/// within-batch deduplication.
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    config: AlertConfig,
}

impl AlertBuilder {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    /// Assign the severity-based response deadline when none was set.
    pub fn finalize(&self, mut alert: InterventionAlert, now: DateTime<Utc>) -> InterventionAlert {
        if alert.response_deadline.is_none() {
            let hours = match alert.severity {
                AlertSeverity::Critical => self.config.critical_response_hours,
                AlertSeverity::Warning => self.config.warning_response_hours,
                AlertSeverity::Info => self.config.info_response_hours,
            };
            alert.response_deadline = Some(now + Duration::hours(hours));
        }
        alert
    }

    /// Finalize a batch: dedup on (type, student, context) keeping the
    /// highest-severity representative, then assign deadlines.
    pub fn finalize_batch(
        &self,
        alerts: Vec<InterventionAlert>,
        now: DateTime<Utc>,
    ) -> Vec<InterventionAlert> {
        let mut kept: Vec<InterventionAlert> = Vec::with_capacity(alerts.len());
        let mut index: HashMap<(AlertType, UserId, Option<AlertContext>), usize> = HashMap::new();

        for alert in alerts {
            let key = alert.dedup_key();
            match index.get(&key) {
                Some(&i) => {
                    if alert.severity > kept[i].severity {
                        kept[i] = alert;
                    }
                }
                None => {
                    index.insert(key, kept.len());
                    kept.push(alert);
                }
            }
        }

        kept.into_iter().map(|a| self.finalize(a, now)).collect()
    }
}

// AlertContext participates in the dedup key.
impl std::hash::Hash for AlertContext {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.course_id.hash(state);
        self.assignment_id.hash(state);
        self.submission_id.hash(state);
    }
}
