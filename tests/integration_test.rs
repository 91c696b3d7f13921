//! End-to-end pipeline tests over the in-memory collaborator store.

use chrono::{Duration, Utc};
use std::sync::Arc;
use writepulse_core::store::SessionStore;
use writepulse_core::{
    AiUseDeclaration, AlertSeverity, AlertType, AnalysisEngine, AnomalySeverity, AnomalyType,
    Collaborators, DeclaredExtent, MemoryStore, SessionUpdate, SubmissionRecord, WritepulseConfig,
    WritingSession,
};

fn engine_with(store: Arc<MemoryStore>) -> AnalysisEngine {
    AnalysisEngine::new(
        WritepulseConfig::default(),
        Collaborators::from_single(store),
    )
}

fn quiet_update(session: &WritingSession) -> SessionUpdate {
    SessionUpdate {
        session_id: session.id.clone(),
        document_id: session.document_id.clone(),
        user_id: session.user_id.clone(),
        chars_added: 0,
        chars_deleted: 0,
        words_added: 0,
        words_deleted: 0,
        copy_paste_events: 0,
        bulk_text_additions: vec![],
        pause_durations: vec![],
        duration_minutes: 0.0,
        last_activity: Utc::now(),
    }
}

fn submission(
    id: &str,
    course: &str,
    due_in_hours: Option<i64>,
    first_edit_hours_before_due: Option<i64>,
    words_written: u64,
) -> SubmissionRecord {
    let now = Utc::now();
    let due = due_in_hours.map(|h| now + Duration::hours(h));
    SubmissionRecord {
        submission_id: id.to_string(),
        assignment_id: format!("a-{id}"),
        course_id: course.to_string(),
        due_date: due,
        first_edit_at: due
            .zip(first_edit_hours_before_due)
            .map(|(d, h)| d - Duration::hours(h)),
        words_written,
        words_total: words_written,
        participant_count: 1,
        collaborative: false,
    }
}

/// A burst of pasted text at implausible speed produces the bulk,
/// speed and paste findings in rule order, persisted on the session.
#[tokio::test]
async fn test_realtime_rules_fire_together_in_order() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let session = engine.begin_session("student-1", "doc-1").await.unwrap();

    let mut update = quiet_update(&session);
    update.words_added = 550;
    update.duration_minutes = 8.0;
    update.copy_paste_events = 7;
    update.bulk_text_additions = vec![1200];

    let anomalies = engine.process_session_update(update).await.unwrap();
    let types: Vec<AnomalyType> = anomalies.iter().map(|a| a.anomaly_type).collect();
    assert_eq!(
        types,
        vec![
            AnomalyType::SuspiciousAddition,
            AnomalyType::AiPattern,
            AnomalyType::CopyPaste,
        ]
    );

    // The speed finding is informational; the other two need review.
    assert!(!anomalies[1].requires_review);
    assert!(anomalies[0].requires_review);
    assert!(anomalies[2].requires_review);

    let persisted = store.load(&session.id).await.unwrap().unwrap();
    assert_eq!(persisted.anomalies.len(), 3);
    assert_eq!(persisted.words_added, 550);
    assert_eq!(store.activity_count(&"student-1".to_string()), 1);
}

/// A high-severity style break escalates to background deep analysis,
/// which lands an undeclared-AI-usage notification routed to course
/// staff (no explicit recipient).
#[tokio::test]
async fn test_escalation_delivers_ai_risk_notification() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let session = engine.begin_session("student-1", "doc-1").await.unwrap();

    let now = Utc::now();
    store.push_version("doc-1", "We met. We talked. It was good.", now - Duration::hours(1));
    store.push_version(
        "doc-1",
        "Furthermore, the comprehensive analysis demonstrates significant \
         methodological outcomes across heterogeneous cohorts. Moreover, \
         the longitudinal investigation validates remarkably consistent \
         attitudinal convergence throughout participating populations. \
         Additionally, the theoretical framework provides substantial \
         explanatory benefits overall. Consequently, these findings \
         indicate meaningful implications for future research directions. \
         In conclusion, the evidence comprehensively supports the stated \
         hypothesis across every examined dimension.",
        now,
    );

    let mut update = quiet_update(&session);
    update.words_added = 800;
    update.words_deleted = 2;
    update.duration_minutes = 3.0;
    update.copy_paste_events = 12;

    let anomalies = engine.process_session_update(update).await.unwrap();
    assert!(anomalies.iter().any(|a| a.severity == AnomalySeverity::High));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let delivered = store.delivered_notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].alert.alert_type, AlertType::AiUsageRisk);
    assert_eq!(delivered[0].alert.severity, AlertSeverity::Warning);
    assert_eq!(delivered[0].recipient, None);
}

/// The same escalation with an AI-use declaration on file produces a
/// supportive acknowledgement instead of a risk intervention.
#[tokio::test]
async fn test_declaration_suppresses_risk_intervention() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let session = engine.begin_session("student-1", "doc-1").await.unwrap();

    store.declare_ai_use(
        "student-1",
        "doc-1",
        AiUseDeclaration {
            tools: vec!["outline assistant".to_string()],
            extent: DeclaredExtent::Substantial,
            declared_at: Utc::now(),
        },
    );

    let now = Utc::now();
    store.push_version("doc-1", "We met. We talked. It was good.", now - Duration::hours(1));
    store.push_version(
        "doc-1",
        "Notwithstanding considerable methodological heterogeneity, the \
         longitudinal investigation demonstrated remarkably consistent \
         attitudinal convergence across demographically diverse cohorts \
         throughout every examined analytical dimension considered.",
        now,
    );

    let mut update = quiet_update(&session);
    update.copy_paste_events = 12;
    let anomalies = engine.process_session_update(update).await.unwrap();
    assert!(anomalies.iter().any(|a| a.severity == AnomalySeverity::High));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let delivered = store.delivered_notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0].alert.alert_type,
        AlertType::AiUsageAcknowledged
    );
    assert_eq!(delivered[0].alert.severity, AlertSeverity::Info);
}

/// Course-wide analysis scans each enrolled student independently and
/// keeps findings attributed per student.
#[tokio::test]
async fn test_course_scan_isolates_students() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let course = "course-1".to_string();
    store.enroll(
        "course-1",
        vec!["busy".to_string(), "idle".to_string(), "late".to_string()],
    );

    let now = Utc::now();
    store.set_document_course("doc-busy", "course-1");
    let mut active = WritingSession::new("s-busy", "busy", "doc-busy", now);
    active.words_added = 500;
    active.last_activity = now - Duration::hours(4);
    store.save(&active).await.unwrap();

    // "late" has recent activity plus a procrastination history.
    store.set_document_course("doc-late", "course-1");
    let mut late_session = WritingSession::new("s-late", "late", "doc-late", now);
    late_session.words_added = 300;
    late_session.last_activity = now - Duration::hours(6);
    store.save(&late_session).await.unwrap();
    store.add_submission("late", submission("sub-1", "course-1", Some(400), Some(3), 500));
    store.add_submission("late", submission("sub-2", "course-1", Some(500), Some(1), 500));

    let alerts = engine.run_course_intervention_analysis(&course).await.unwrap();

    let idle: Vec<_> = alerts.iter().filter(|a| a.student_id == "idle").collect();
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].alert_type, AlertType::NoRecentActivity);

    let late: Vec<_> = alerts.iter().filter(|a| a.student_id == "late").collect();
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].alert_type, AlertType::ProcrastinationPattern);
    assert_eq!(late[0].severity, AlertSeverity::Critical);

    assert!(alerts.iter().all(|a| a.student_id != "busy"));
    // Batch finalization assigned every deadline.
    assert!(alerts.iter().all(|a| a.response_deadline.is_some()));
}

/// Student-level trend scan picks up the time-management crisis and
/// carries its explicit 24-hour response deadline through finalization.
#[tokio::test]
async fn test_student_scan_crisis_deadline_survives_finalization() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let user = "student-1".to_string();

    let now = Utc::now();
    let mut active = WritingSession::new("s1", "student-1", "doc-1", now);
    active.words_added = 350;
    active.last_activity = now - Duration::hours(2);
    store.save(&active).await.unwrap();

    store.add_submission("student-1", submission("sub-1", "course-1", Some(40), None, 30));
    store.add_submission("student-1", submission("sub-2", "course-1", Some(60), None, 80));

    let alerts = engine
        .analyze_student_writing_progress(&user, None, None)
        .await
        .unwrap();

    let crisis = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::TimeManagementCrisis)
        .expect("crisis alert");
    assert_eq!(crisis.severity, AlertSeverity::Critical);

    let deadline = crisis.response_deadline.expect("deadline");
    // The crisis rule's own 24-hour window, anchored at scan time.
    let hours = (deadline - now).num_minutes() as f64 / 60.0;
    assert!((hours - 24.0).abs() < 0.1, "deadline {hours}h from scan");
}

/// Dispatching an alert to an instructor maps severity onto priority.
#[tokio::test]
async fn test_notification_dispatch_round_trip() {
    use writepulse_core::{DispatchPriority, InterventionAlert};

    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());

    let alert = InterventionAlert::new(
        AlertType::ProductivityDecline,
        AlertSeverity::Warning,
        "Writing output declined sharply",
        "Output fell 80% versus the prior window.",
        "student-1",
    );
    let id = engine
        .create_intervention_notification(alert, "instructor-9")
        .await
        .unwrap();
    assert!(!id.is_empty());

    let delivered = store.delivered_notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].priority, DispatchPriority::High);
    assert_eq!(delivered[0].recipient.as_deref(), Some("instructor-9"));
}
