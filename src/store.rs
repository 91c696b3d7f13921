//! Collaborator contracts consumed by the analysis core.
//!
//! Persistence, enrollment data and notification delivery are owned by
//! external services; the core only sees these trait seams. Components
//! take explicit store handles rather than process-wide state, so
//! different sessions can be processed fully in parallel and tests run
//! isolated.

use crate::alerts::{CourseId, DispatchPriority, InterventionAlert, NotificationId};
use crate::error::StoreError;
use crate::session::{ActivitySnapshot, DocumentId, SessionId, UserId, WritingSession};
use crate::stylometry::StyleBaseline;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

// =============================================================================
// Boundary types
// =============================================================================

/// One persisted revision of a document, newest first when listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of a submission, as the submission store reports it
/// for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission_id: String,
    pub assignment_id: String,
    pub course_id: CourseId,
    pub due_date: Option<DateTime<Utc>>,
    /// When this student first edited the submission, if ever.
    pub first_edit_at: Option<DateTime<Utc>>,
    /// Words contributed by this student.
    pub words_written: u64,
    /// Words contributed by all participants.
    pub words_total: u64,
    pub participant_count: u32,
    pub collaborative: bool,
}

/// How much AI assistance a student declared for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredExtent {
    Minimal,
    Moderate,
    Substantial,
}

/// A student's honest, self-reported AI-usage declaration. Its
/// presence suppresses escalation entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiUseDeclaration {
    pub tools: Vec<String>,
    pub extent: DeclaredExtent,
    pub declared_at: DateTime<Utc>,
}

/// One alert handed to the notification dispatch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionNotification {
    pub alert: InterventionAlert,
    /// Explicit recipient; `None` lets the sink route to course staff.
    pub recipient: Option<UserId>,
    pub priority: DispatchPriority,
}

// =============================================================================
// Collaborator traits
// =============================================================================

/// Durable record of writing sessions and their cumulative counters.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<WritingSession>, StoreError>;

    async fn save(&self, session: &WritingSession) -> Result<(), StoreError>;

    /// Sessions for one student whose last activity falls in
    /// `[from, to)`, optionally scoped to one course.
    async fn sessions_in_window(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WritingSession>, StoreError>;
}

/// Document/version store; read-only from this core.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn current_content(&self, document: &DocumentId)
        -> Result<Option<String>, StoreError>;

    /// Most recent persisted versions, newest first.
    async fn recent_versions(
        &self,
        document: &DocumentId,
        limit: usize,
    ) -> Result<Vec<DocumentVersion>, StoreError>;
}

/// Submission/enrollment store; read-only.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn submissions_for_student(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
    ) -> Result<Vec<SubmissionRecord>, StoreError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn active_students(&self, course: &CourseId) -> Result<Vec<UserId>, StoreError>;
}

/// AI-usage self-declarations, per (student, document).
#[async_trait]
pub trait DeclarationStore: Send + Sync {
    async fn ai_declaration(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<AiUseDeclaration>, StoreError>;
}

/// Established writing-style baselines, per student.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    async fn style_baseline(&self, user: &UserId) -> Result<Option<StyleBaseline>, StoreError>;
}

/// Real-time cognitive-load profile collaborator; updated, never read
/// back by this core.
#[async_trait]
pub trait BehaviorProfileSink: Send + Sync {
    async fn record_activity(
        &self,
        user: &UserId,
        snapshot: &ActivitySnapshot,
    ) -> Result<(), StoreError>;
}

/// Notification dispatch collaborator; write-only.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        notification: InterventionNotification,
    ) -> Result<NotificationId, StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory implementation of every collaborator trait, used by the
/// test suites and as a reference for store implementers.
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, WritingSession>,
    /// Versions per document, oldest first.
    versions: DashMap<DocumentId, Vec<DocumentVersion>>,
    document_courses: DashMap<DocumentId, CourseId>,
    submissions: DashMap<UserId, Vec<SubmissionRecord>>,
    enrollments: DashMap<CourseId, Vec<UserId>>,
    declarations: DashMap<(UserId, DocumentId), AiUseDeclaration>,
    baselines: DashMap<UserId, StyleBaseline>,
    activity_counts: DashMap<UserId, u64>,
    delivered: Mutex<Vec<InterventionNotification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_version(
        &self,
        document: impl Into<DocumentId>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) {
        self.versions.entry(document.into()).or_default().push(DocumentVersion {
            content: content.into(),
            created_at,
        });
    }

    pub fn set_document_course(
        &self,
        document: impl Into<DocumentId>,
        course: impl Into<CourseId>,
    ) {
        self.document_courses.insert(document.into(), course.into());
    }

    pub fn add_submission(&self, user: impl Into<UserId>, record: SubmissionRecord) {
        self.submissions.entry(user.into()).or_default().push(record);
    }

    pub fn enroll(&self, course: impl Into<CourseId>, students: Vec<UserId>) {
        self.enrollments.insert(course.into(), students);
    }

    pub fn declare_ai_use(
        &self,
        user: impl Into<UserId>,
        document: impl Into<DocumentId>,
        declaration: AiUseDeclaration,
    ) {
        self.declarations
            .insert((user.into(), document.into()), declaration);
    }

    pub fn set_baseline(&self, user: impl Into<UserId>, baseline: StyleBaseline) {
        self.baselines.insert(user.into(), baseline);
    }

    /// Notifications handed to the sink so far, for test inspection.
    pub fn delivered_notifications(&self) -> Vec<InterventionNotification> {
        self.delivered.lock().expect("sink poisoned").clone()
    }

    /// Behavior-profile updates recorded for one student.
    pub fn activity_count(&self, user: &UserId) -> u64 {
        self.activity_counts.get(user).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<WritingSession>, StoreError> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    async fn save(&self, session: &WritingSession) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn sessions_in_window(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WritingSession>, StoreError> {
        let sessions = self
            .sessions
            .iter()
            .filter(|entry| {
                let s = entry.value();
                if s.user_id != *user || s.last_activity < from || s.last_activity >= to {
                    return false;
                }
                match course {
                    Some(course_id) => self
                        .document_courses
                        .get(&s.document_id)
                        .map(|c| *c == *course_id)
                        .unwrap_or(false),
                    None => true,
                }
            })
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sessions)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn current_content(
        &self,
        document: &DocumentId,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .versions
            .get(document)
            .and_then(|v| v.last().map(|version| version.content.clone())))
    }

    async fn recent_versions(
        &self,
        document: &DocumentId,
        limit: usize,
    ) -> Result<Vec<DocumentVersion>, StoreError> {
        let mut versions: Vec<DocumentVersion> = self
            .versions
            .get(document)
            .map(|v| v.clone())
            .unwrap_or_default();
        versions.reverse(); // newest first
        versions.truncate(limit);
        Ok(versions)
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn submissions_for_student(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let records = self
            .submissions
            .get(user)
            .map(|r| r.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| course.map(|c| r.course_id == *c).unwrap_or(true))
            .collect();
        Ok(records)
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn active_students(&self, course: &CourseId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .enrollments
            .get(course)
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DeclarationStore for MemoryStore {
    async fn ai_declaration(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<AiUseDeclaration>, StoreError> {
        Ok(self
            .declarations
            .get(&(user.clone(), document.clone()))
            .map(|d| d.clone()))
    }
}

#[async_trait]
impl BaselineStore for MemoryStore {
    async fn style_baseline(&self, user: &UserId) -> Result<Option<StyleBaseline>, StoreError> {
        Ok(self.baselines.get(user).map(|b| b.clone()))
    }
}

#[async_trait]
impl BehaviorProfileSink for MemoryStore {
    async fn record_activity(
        &self,
        user: &UserId,
        _snapshot: &ActivitySnapshot,
    ) -> Result<(), StoreError> {
        *self.activity_counts.entry(user.clone()).or_insert(0) += 1;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn deliver(
        &self,
        notification: InterventionNotification,
    ) -> Result<NotificationId, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.delivered
            .lock()
            .map_err(|_| StoreError::Unavailable("notification sink poisoned".to_string()))?
            .push(notification);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = MemoryStore::new();
        let session = WritingSession::new("s1", "u1", "d1", Utc::now());
        store.save(&session).await.expect("save");

        let loaded = store
            .load(&"s1".to_string())
            .await
            .expect("load")
            .expect("present");
        assert_eq!(loaded.user_id, "u1");
        assert!(store.load(&"missing".to_string()).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_window_query_filters_by_course() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut in_course = WritingSession::new("s1", "u1", "d1", now);
        in_course.last_activity = now;
        let mut other_course = WritingSession::new("s2", "u1", "d2", now);
        other_course.last_activity = now;

        store.save(&in_course).await.expect("save");
        store.save(&other_course).await.expect("save");
        store.set_document_course("d1", "course-a");
        store.set_document_course("d2", "course-b");

        let course = "course-a".to_string();
        let found = store
            .sessions_in_window(
                &"u1".to_string(),
                Some(&course),
                now - Duration::days(1),
                now + Duration::days(1),
            )
            .await
            .expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "s1");
    }

    #[tokio::test]
    async fn test_recent_versions_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.push_version("d1", "first draft", now - Duration::hours(2));
        store.push_version("d1", "second draft", now);

        let versions = store
            .recent_versions(&"d1".to_string(), 2)
            .await
            .expect("versions");
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].content, "second draft");

        let current = store
            .current_content(&"d1".to_string())
            .await
            .expect("content");
        assert_eq!(current.as_deref(), Some("second draft"));
    }

    #[tokio::test]
    async fn test_notification_sink_records_delivery() {
        use crate::alerts::{AlertSeverity, AlertType, InterventionAlert};

        let store = MemoryStore::new();
        let alert = InterventionAlert::new(
            AlertType::QualityConcern,
            AlertSeverity::Info,
            "t",
            "m",
            "u1",
        );
        store
            .deliver(InterventionNotification {
                priority: alert.severity.dispatch_priority(),
                alert,
                recipient: Some("instructor-1".to_string()),
            })
            .await
            .expect("deliver");

        assert_eq!(store.delivered_notifications().len(), 1);
    }
}
