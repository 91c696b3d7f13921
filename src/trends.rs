//! Longitudinal trend analysis over a student's writing history.
//!
//! Runs over a bounded window (default 7 days) for one student,
//! optionally scoped to one course. Each sub-analysis independently
//! produces findings; all inputs are materialized up front, so a scan
//! either reports everything it found or fails as a whole.
//!
//! Missing history (no prior window, no dated submissions) is a
//! degraded signal, not an error: the sub-analysis is silently skipped.

use crate::alerts::{
    AlertContext, AlertMetrics, AlertSeverity, AlertType, CourseId, InterventionAlert,
    TrendDirection,
};
use crate::config::TrendConfig;
use crate::error::StoreError;
use crate::session::{UserId, WritingSession};
use crate::store::{SessionStore, SubmissionRecord, SubmissionStore};
use chrono::{DateTime, Duration, Utc};

pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    /// Run the full sub-analysis suite for one student.
    ///
    /// Returns the combined, unordered alert list; empty is a normal
    /// outcome. Any store failure fails the whole scan.
    pub async fn scan(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        timeframe_days: Option<i64>,
        sessions: &dyn SessionStore,
        submissions: &dyn SubmissionStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<InterventionAlert>, StoreError> {
        let days = timeframe_days.unwrap_or(self.config.window_days).max(1);
        let window_start = now - Duration::days(days);
        let prior_start = window_start - Duration::days(days);

        let current = sessions
            .sessions_in_window(user, course, window_start, now)
            .await?;
        let prior = sessions
            .sessions_in_window(user, course, prior_start, window_start)
            .await?;
        let student_submissions = submissions.submissions_for_student(user, course).await?;

        let mut alerts = Vec::new();
        alerts.extend(self.productivity_findings(user, course, &current, &prior));
        alerts.extend(self.procrastination_finding(user, course, &student_submissions));
        alerts.extend(self.collaboration_findings(user, &student_submissions));
        alerts.extend(self.deletion_finding(user, course, &current));
        alerts.extend(self.crisis_finding(user, course, &student_submissions, now));

        log::debug!(
            "trend scan for {user} produced {} finding(s) over {days} day window",
            alerts.len()
        );
        Ok(alerts)
    }

    /// Productivity: absence of activity, decline vs the prior window,
    /// and effort/output mismatch.
    fn productivity_findings(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        current: &[WritingSession],
        prior: &[WritingSession],
    ) -> Vec<InterventionAlert> {
        if current.is_empty() {
            return vec![self.with_course_context(
                InterventionAlert::new(
                    AlertType::NoRecentActivity,
                    AlertSeverity::Warning,
                    "No recent writing activity",
                    "No writing sessions were recorded in the analysis window.",
                    user.clone(),
                )
                .with_actions([
                    "Check in with the student about upcoming work",
                    "Confirm the student can access their documents",
                ]),
                course,
            )];
        }

        let mut alerts = Vec::new();
        let current_words: u64 = current.iter().map(|s| s.words_added).sum();
        let prior_words: u64 = prior.iter().map(|s| s.words_added).sum();

        if prior_words > 0 {
            let decline = (prior_words as f64 - current_words as f64) / prior_words as f64;
            // Both the relative decline and the absolute floor must hold.
            if decline >= self.config.decline_fraction
                && current_words < self.config.low_output_words
            {
                alerts.push(
                    self.with_course_context(
                        InterventionAlert::new(
                            AlertType::ProductivityDecline,
                            AlertSeverity::Warning,
                            "Writing output declined sharply",
                            format!(
                                "Output fell {:.0}% versus the prior window \
                                 ({prior_words} to {current_words} words).",
                                decline * 100.0
                            ),
                            user.clone(),
                        )
                        .with_actions([
                            "Ask whether something is blocking the student's progress",
                            "Offer to break upcoming work into smaller milestones",
                        ])
                        .with_metrics(AlertMetrics {
                            current_value: current_words as f64,
                            previous_value: prior_words as f64,
                            threshold: self.config.decline_fraction,
                            trend: TrendDirection::Declining,
                        }),
                        course,
                    ),
                );
            }
        }

        let total_minutes: f64 = current.iter().map(|s| s.duration_minutes).sum();
        let words_per_session = current_words as f64 / current.len() as f64;
        if total_minutes > self.config.effort_minutes_floor
            && words_per_session < self.config.effort_words_per_session
        {
            alerts.push(
                self.with_course_context(
                    InterventionAlert::new(
                        AlertType::EffortOutputMismatch,
                        AlertSeverity::Warning,
                        "High effort, little output",
                        format!(
                            "{total_minutes:.0} minutes of editing produced an average of \
                             {words_per_session:.0} words per session."
                        ),
                        user.clone(),
                    )
                    .with_actions([
                        "Discuss whether the student is stuck on planning or research",
                        "Suggest outlining before drafting",
                    ])
                    .with_metrics(AlertMetrics {
                        current_value: words_per_session,
                        previous_value: 0.0,
                        threshold: self.config.effort_words_per_session,
                        trend: TrendDirection::Stable,
                    }),
                    course,
                ),
            );
        }

        alerts
    }

    /// Procrastination: share of submissions first edited inside the
    /// last-minute window before their deadline.
    fn procrastination_finding(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        submissions: &[SubmissionRecord],
    ) -> Option<InterventionAlert> {
        let last_minute_window = Duration::hours(self.config.last_minute_hours);

        let dated: Vec<(DateTime<Utc>, DateTime<Utc>)> = submissions
            .iter()
            .filter_map(|s| s.due_date.zip(s.first_edit_at))
            .collect();
        if dated.len() < self.config.min_submissions {
            return None;
        }

        let last_minute = dated
            .iter()
            .filter(|(due, first_edit)| *first_edit >= *due - last_minute_window)
            .count();

        let rate = last_minute as f64 / dated.len() as f64;
        if rate < self.config.last_minute_fraction {
            return None;
        }

        Some(
            self.with_course_context(
                InterventionAlert::new(
                    AlertType::ProcrastinationPattern,
                    AlertSeverity::Critical,
                    "Consistent last-minute starts",
                    format!(
                        "{last_minute} of {} submissions were first edited within \
                         {} hours of their deadline.",
                        dated.len(),
                        self.config.last_minute_hours
                    ),
                    user.clone(),
                )
                .with_actions([
                    "Introduce intermediate checkpoints for upcoming assignments",
                    "Share time-planning resources with the student",
                ])
                .with_metrics(AlertMetrics {
                    current_value: rate,
                    previous_value: 0.0,
                    threshold: self.config.last_minute_fraction,
                    trend: TrendDirection::Declining,
                }),
                course,
            ),
        )
    }

    /// Collaboration balance: per collaborative submission, the
    /// student's share of contributed words versus the equal-split
    /// expectation. Each violating submission yields its own alert.
    fn collaboration_findings(
        &self,
        user: &UserId,
        submissions: &[SubmissionRecord],
    ) -> Vec<InterventionAlert> {
        let mut alerts = Vec::new();

        for submission in submissions {
            if !submission.collaborative
                || submission.participant_count < 2
                || submission.words_total == 0
            {
                continue;
            }

            let share_pct =
                submission.words_written as f64 / submission.words_total as f64 * 100.0;
            let expected_pct = 100.0 / submission.participant_count as f64;
            let context = AlertContext::submission(
                Some(submission.course_id.clone()),
                submission.assignment_id.clone(),
                submission.submission_id.clone(),
            );

            if share_pct < expected_pct * self.config.under_participation_ratio {
                alerts.push(
                    InterventionAlert::new(
                        AlertType::LowParticipation,
                        AlertSeverity::Warning,
                        "Low share of group contribution",
                        format!(
                            "Contributed {share_pct:.1}% of the group's words; an equal \
                             split among {} participants would be {expected_pct:.1}%.",
                            submission.participant_count
                        ),
                        user.clone(),
                    )
                    .with_actions([
                        "Check whether the student is able to participate in the group",
                        "Review how the group divided the work",
                    ])
                    .with_metrics(AlertMetrics {
                        current_value: share_pct,
                        previous_value: expected_pct,
                        threshold: expected_pct * self.config.under_participation_ratio,
                        trend: TrendDirection::Declining,
                    })
                    .with_context(context),
                );
            } else if share_pct > expected_pct * self.config.over_participation_ratio {
                alerts.push(
                    InterventionAlert::new(
                        AlertType::OverContribution,
                        AlertSeverity::Info,
                        "Carrying most of the group's work",
                        format!(
                            "Contributed {share_pct:.1}% of the group's words against an \
                             equal-split expectation of {expected_pct:.1}%.",
                        ),
                        user.clone(),
                    )
                    .with_actions([
                        "Check in about workload and possible burnout",
                        "Encourage the group to rebalance remaining tasks",
                    ])
                    .with_metrics(AlertMetrics {
                        current_value: share_pct,
                        previous_value: expected_pct,
                        threshold: expected_pct * self.config.over_participation_ratio,
                        trend: TrendDirection::Stable,
                    })
                    .with_context(context),
                );
            }
        }

        alerts
    }

    /// Quality concern: heavy deletion relative to added words. A
    /// signal for confidence-building support, not an accusation.
    fn deletion_finding(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        current: &[WritingSession],
    ) -> Option<InterventionAlert> {
        let added: u64 = current.iter().map(|s| s.words_added).sum();
        let deleted: u64 = current.iter().map(|s| s.words_deleted).sum();
        if added == 0 {
            return None;
        }

        let ratio = deleted as f64 / added as f64;
        if ratio <= self.config.deletion_ratio || deleted <= self.config.deletion_volume_words {
            return None;
        }

        Some(
            self.with_course_context(
                InterventionAlert::new(
                    AlertType::QualityConcern,
                    AlertSeverity::Info,
                    "Deleting most of what they write",
                    format!(
                        "Deleted {deleted} of {added} added words ({:.0}%). The student \
                         may benefit from confidence-building feedback.",
                        ratio * 100.0
                    ),
                    user.clone(),
                )
                .with_actions([
                    "Offer early feedback on drafts before polishing",
                    "Reassure the student that rough drafts are expected",
                ])
                .with_metrics(AlertMetrics {
                    current_value: ratio,
                    previous_value: 0.0,
                    threshold: self.config.deletion_ratio,
                    trend: TrendDirection::Stable,
                }),
                course,
            ),
        )
    }

    /// Time-management crisis: several imminent deadlines with almost
    /// no progress. Sets its own tight response deadline.
    fn crisis_finding(
        &self,
        user: &UserId,
        course: Option<&CourseId>,
        submissions: &[SubmissionRecord],
        now: DateTime<Utc>,
    ) -> Option<InterventionAlert> {
        let horizon = now + Duration::days(self.config.crisis_due_within_days);

        let at_risk: Vec<&SubmissionRecord> = submissions
            .iter()
            .filter(|s| {
                s.words_written < self.config.crisis_words_floor
                    && s.due_date.map(|due| due > now && due <= horizon).unwrap_or(false)
            })
            .collect();

        if at_risk.len() < self.config.crisis_min_submissions {
            return None;
        }

        Some(
            self.with_course_context(
                InterventionAlert::new(
                    AlertType::TimeManagementCrisis,
                    AlertSeverity::Critical,
                    "Multiple deadlines at risk",
                    format!(
                        "{} submissions are due within {} days with under {} words \
                         written each.",
                        at_risk.len(),
                        self.config.crisis_due_within_days,
                        self.config.crisis_words_floor
                    ),
                    user.clone(),
                )
                .with_actions([
                    "Reach out to the student today",
                    "Consider deadline flexibility or triage across assignments",
                ])
                .with_deadline(now + Duration::hours(self.config.crisis_response_hours)),
                course,
            ),
        )
    }

    fn with_course_context(
        &self,
        alert: InterventionAlert,
        course: Option<&CourseId>,
    ) -> InterventionAlert {
        match course {
            Some(course_id) => alert.with_context(AlertContext::course(course_id.clone())),
            None => alert,
        }
    }
}
