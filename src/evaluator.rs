use chrono::NaiveDateTime;

use crate::config::GradingPolicy;
use crate::models::{
    Activity, Assessment, AttendanceFlags, AttendanceRecord, CategorizedActivities, Category,
    CategoryCounts, PerformanceSummary, Snapshot, Status, Suggestion, SuggestionType,
};

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    policy: GradingPolicy,
}

impl Evaluator {
    pub fn new(policy: GradingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    /// First match wins: a grade, then an overdue unsubmitted deadline.
    pub fn categorize_activity(&self, activity: &Activity, now: NaiveDateTime) -> Category {
        if let Some(pct) = activity.score_percentage() {
            return if pct >= self.policy.pass_mark {
                Category::Passed
            } else if pct >= self.policy.low_mark {
                Category::Low
            } else {
                Category::Failed
            };
        }

        match activity.deadline {
            Some(deadline) if !activity.submitted && deadline < now => Category::Missed,
            _ => Category::Pending,
        }
    }

    pub fn categorize_all(
        &self,
        activities: &[Activity],
        now: NaiveDateTime,
    ) -> (CategorizedActivities, CategoryCounts) {
        let mut buckets = CategorizedActivities::default();
        for activity in activities {
            buckets.push(self.categorize_activity(activity, now), activity.clone());
        }
        let counts = buckets.counts();
        (buckets, counts)
    }

    pub fn effective_absences(&self, attendance: &AttendanceRecord) -> u32 {
        let converted = attendance
            .late
            .checked_div(self.policy.lates_per_absence)
            .unwrap_or(0);
        attendance.absent.saturating_add(converted)
    }

    pub fn attendance_flags(&self, attendance: &AttendanceRecord) -> AttendanceFlags {
        let effective = self.effective_absences(attendance);
        let late_remainder = attendance
            .late
            .checked_rem(self.policy.lates_per_absence)
            .unwrap_or(attendance.late);

        AttendanceFlags {
            absent: attendance.absent,
            late: attendance.late,
            late_remainder,
            effective_absences: effective,
            absences_until_drop: self.policy.droppable_absences.saturating_sub(effective),
            is_at_risk: effective >= self.policy.at_risk_absences,
            is_critical: effective >= self.policy.droppable_absences,
            late_warning: late_remainder >= self.policy.late_warning_remainder,
        }
    }

    pub fn build_suggestions(
        &self,
        counts: &CategoryCounts,
        effective_absences: u32,
        percentage: Option<f64>,
    ) -> Assessment {
        let Some(pct) = percentage.filter(|p| p.is_finite()) else {
            return assessment(Status::NoData, false, false, Vec::new());
        };

        if pct >= self.policy.excellent_from {
            return assessment(Status::Excellent, false, false, Vec::new());
        }

        if pct >= self.policy.warning_from {
            let suggestions = [SuggestionType::Low, SuggestionType::Failed]
                .into_iter()
                .filter_map(|kind| self.suggestion(kind, counts, effective_absences))
                .collect();
            return assessment(Status::Warning, true, false, suggestions);
        }

        let critical = pct < self.policy.urgent_below;
        let status = if critical {
            Status::Urgent
        } else {
            Status::Critical
        };
        let suggestions = [
            SuggestionType::Missed,
            SuggestionType::Failed,
            SuggestionType::Low,
            SuggestionType::Pending,
            SuggestionType::Absences,
        ]
        .into_iter()
        .filter_map(|kind| self.suggestion(kind, counts, effective_absences))
        .collect();
        assessment(status, true, critical, suggestions)
    }

    pub fn evaluate(&self, snapshot: &Snapshot, now: NaiveDateTime) -> PerformanceSummary {
        let (categorized_activities, counts) = self.categorize_all(&snapshot.activities, now);
        let attendance = self.attendance_flags(&snapshot.attendance);
        let assessment = self.build_suggestions(
            &counts,
            attendance.effective_absences,
            snapshot.weighted_percentage,
        );

        tracing::debug!(
            total = counts.total,
            missed = counts.missed,
            effective_absences = attendance.effective_absences,
            status = assessment.status.label(),
            "evaluated snapshot"
        );

        PerformanceSummary {
            percentage: snapshot.weighted_percentage.filter(|p| p.is_finite()),
            status: assessment.status,
            needs_improvement: assessment.needs_improvement,
            critical: assessment.critical,
            headline: assessment.headline,
            categorized_activities,
            counts,
            suggestions: assessment.suggestions,
            total_effective_absences: attendance.effective_absences,
            attendance,
        }
    }

    fn suggestion(
        &self,
        kind: SuggestionType,
        counts: &CategoryCounts,
        effective_absences: u32,
    ) -> Option<Suggestion> {
        let (count, text) = match kind {
            SuggestionType::Missed => (
                counts.missed,
                format!(
                    "You missed {}. Ask your professor whether late submissions are accepted.",
                    activities(counts.missed)
                ),
            ),
            SuggestionType::Failed => (
                counts.failed,
                format!(
                    "You failed {}. Review the material and request feedback on your work.",
                    activities(counts.failed)
                ),
            ),
            SuggestionType::Low => (
                counts.low,
                format!(
                    "You scored below {}% on {}. Aim higher on upcoming work.",
                    self.policy.pass_mark,
                    activities(counts.low)
                ),
            ),
            SuggestionType::Pending => (
                counts.pending,
                format!(
                    "You have {} pending. Submit your work before the deadlines.",
                    activities(counts.pending)
                ),
            ),
            SuggestionType::Absences => {
                if effective_absences < self.policy.at_risk_absences {
                    return None;
                }
                let count = effective_absences as usize;
                let noun = if count == 1 { "absence" } else { "absences" };
                (
                    count,
                    format!(
                        "You have {count} effective {noun}. \
                         Attend every remaining session to avoid being dropped."
                    ),
                )
            }
        };

        (count > 0).then_some(Suggestion { kind, text, count })
    }
}

fn activities(count: usize) -> String {
    if count == 1 {
        "1 activity".to_string()
    } else {
        format!("{count} activities")
    }
}

fn assessment(
    status: Status,
    needs_improvement: bool,
    critical: bool,
    suggestions: Vec<Suggestion>,
) -> Assessment {
    Assessment {
        status,
        needs_improvement,
        critical,
        headline: headline(status).to_string(),
        suggestions,
    }
}

fn headline(status: Status) -> &'static str {
    match status {
        Status::Excellent => "Great work! You are performing well in this subject.",
        Status::Warning => "You are close to the passing line. Keep up with the items below.",
        Status::Critical => "Your performance needs attention. Focus on the items below.",
        Status::Urgent => "Your standing in this subject is at risk. Act on the items below now.",
        Status::NoData => "No grades have been published for this subject yet.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_timestamp;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn graded(id: &str, grade: f64, points: u32) -> Activity {
        let mut activity = Activity::new(id);
        activity.grade = Some(grade);
        activity.points = points;
        activity.submitted = true;
        activity
    }

    fn due(id: &str, days_from_now: i64, submitted: bool) -> Activity {
        let mut activity = Activity::new(id);
        activity.deadline = Some(now() + Duration::days(days_from_now));
        activity.submitted = submitted;
        activity
    }

    fn kinds(assessment: &Assessment) -> Vec<SuggestionType> {
        assessment.suggestions.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn grade_boundaries_follow_marks() {
        let evaluator = Evaluator::default();
        let cases = [
            (80.0, Category::Passed),
            (79.0, Category::Low),
            (75.0, Category::Low),
            (74.0, Category::Failed),
            (0.0, Category::Failed),
        ];
        for (grade, expected) in cases {
            assert_eq!(
                evaluator.categorize_activity(&graded("a", grade, 100), now()),
                expected,
                "grade {grade}"
            );
        }
    }

    #[test]
    fn rounding_lifts_half_points_into_the_next_band() {
        let evaluator = Evaluator::default();
        // 79.5% rounds to 80.
        assert_eq!(
            evaluator.categorize_activity(&graded("a", 159.0, 200), now()),
            Category::Passed
        );
        // 74.5% rounds to 75.
        assert_eq!(
            evaluator.categorize_activity(&graded("b", 149.0, 200), now()),
            Category::Low
        );
    }

    #[test]
    fn zero_points_default_to_one_hundred() {
        let evaluator = Evaluator::default();
        assert_eq!(
            evaluator.categorize_activity(&graded("a", 85.0, 0), now()),
            Category::Passed
        );
    }

    #[test]
    fn overdue_unsubmitted_work_is_missed() {
        let evaluator = Evaluator::default();
        assert_eq!(
            evaluator.categorize_activity(&due("a", -1, false), now()),
            Category::Missed
        );
        assert_eq!(
            evaluator.categorize_activity(&due("b", 1, false), now()),
            Category::Pending
        );
        assert_eq!(
            evaluator.categorize_activity(&due("c", 0, false), now()),
            Category::Pending
        );
    }

    #[test]
    fn offset_deadline_is_compared_on_the_local_clock() {
        let evaluator = Evaluator::default();
        let mut activity = Activity::new("a");
        activity.deadline = parse_timestamp("2025-06-01T12:00:00+08:00");
        let deadline = activity.deadline.unwrap();

        assert_eq!(
            evaluator.categorize_activity(&activity, deadline - Duration::hours(2)),
            Category::Pending
        );
        assert_eq!(
            evaluator.categorize_activity(&activity, deadline + Duration::minutes(1)),
            Category::Missed
        );
    }

    #[test]
    fn submitted_ungraded_and_undated_work_is_pending() {
        let evaluator = Evaluator::default();
        assert_eq!(
            evaluator.categorize_activity(&due("a", -10, true), now()),
            Category::Pending
        );
        assert_eq!(
            evaluator.categorize_activity(&Activity::new("b"), now()),
            Category::Pending
        );
    }

    #[test]
    fn grade_wins_over_overdue_deadline() {
        let evaluator = Evaluator::default();
        let mut activity = due("a", -3, false);
        activity.grade = Some(90.0);
        assert_eq!(
            evaluator.categorize_activity(&activity, now()),
            Category::Passed
        );
    }

    #[test]
    fn categorize_all_partitions_every_activity() {
        let evaluator = Evaluator::default();
        let activities = vec![
            graded("1", 95.0, 100),
            graded("2", 76.0, 100),
            graded("3", 10.0, 100),
            due("4", -2, false),
            due("5", 2, false),
            Activity::new("6"),
            graded("7", 40.0, 50),
        ];

        let (buckets, counts) = evaluator.categorize_all(&activities, now());

        assert_eq!(counts.total, activities.len());
        let mut seen: Vec<&str> = Category::ALL
            .iter()
            .flat_map(|c| buckets.bucket(*c).iter().map(|a| a.id.as_str()))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["1", "2", "3", "4", "5", "6", "7"]);
        assert_eq!(counts.passed, 2);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.missed, 1);
        assert_eq!(counts.pending, 2);
    }

    #[test]
    fn empty_input_yields_zero_counts() {
        let evaluator = Evaluator::default();
        let (buckets, counts) = evaluator.categorize_all(&[], now());
        assert_eq!(counts, CategoryCounts::default());
        assert!(buckets.pending.is_empty());
    }

    #[test]
    fn lates_convert_with_floor_division() {
        let evaluator = Evaluator::default();
        assert_eq!(
            evaluator.effective_absences(&AttendanceRecord { absent: 1, late: 5 }),
            2
        );
        assert_eq!(
            evaluator.effective_absences(&AttendanceRecord { absent: 0, late: 2 }),
            0
        );
    }

    #[test]
    fn attendance_tiers_are_independent() {
        let evaluator = Evaluator::default();

        let at_risk = evaluator.attendance_flags(&AttendanceRecord { absent: 2, late: 0 });
        assert!(at_risk.is_at_risk);
        assert!(!at_risk.is_critical);
        assert_eq!(at_risk.absences_until_drop, 1);

        let droppable = evaluator.attendance_flags(&AttendanceRecord { absent: 2, late: 4 });
        assert_eq!(droppable.effective_absences, 3);
        assert!(droppable.is_critical);
        assert!(droppable.is_at_risk);
        assert!(!droppable.late_warning);

        let close = evaluator.attendance_flags(&AttendanceRecord { absent: 0, late: 5 });
        assert_eq!(close.late_remainder, 2);
        assert!(close.late_warning);
        assert!(!close.is_at_risk);
    }

    #[test]
    fn excellent_band_has_no_remediation() {
        let evaluator = Evaluator::default();
        let counts = CategoryCounts {
            total: 3,
            failed: 1,
            missed: 1,
            pending: 1,
            ..CategoryCounts::default()
        };
        let result = evaluator.build_suggestions(&counts, 5, Some(75.0));
        assert_eq!(result.status, Status::Excellent);
        assert!(!result.needs_improvement);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn warning_band_lists_low_then_failed_only() {
        let evaluator = Evaluator::default();
        let counts = CategoryCounts {
            total: 6,
            low: 2,
            failed: 1,
            missed: 2,
            pending: 1,
            ..CategoryCounts::default()
        };
        let result = evaluator.build_suggestions(&counts, 4, Some(71.0));
        assert_eq!(result.status, Status::Warning);
        assert!(result.needs_improvement);
        assert!(!result.critical);
        assert_eq!(
            kinds(&result),
            vec![SuggestionType::Low, SuggestionType::Failed]
        );
        assert_eq!(result.suggestions[0].count, 2);
    }

    #[test]
    fn urgent_band_orders_suggestions_and_skips_empty_buckets() {
        let evaluator = Evaluator::default();
        let counts = CategoryCounts {
            total: 6,
            missed: 2,
            failed: 1,
            low: 0,
            pending: 3,
            ..CategoryCounts::default()
        };
        let result = evaluator.build_suggestions(&counts, 1, Some(40.0));
        assert_eq!(result.status, Status::Urgent);
        assert!(result.critical);
        assert_eq!(
            kinds(&result),
            vec![
                SuggestionType::Missed,
                SuggestionType::Failed,
                SuggestionType::Pending
            ]
        );
        assert_eq!(
            result.suggestions[0].text,
            "You missed 2 activities. Ask your professor whether late submissions are accepted."
        );
    }

    #[test]
    fn critical_band_starts_at_fifty() {
        let evaluator = Evaluator::default();
        let counts = CategoryCounts::default();
        let at_fifty = evaluator.build_suggestions(&counts, 0, Some(50.0));
        assert_eq!(at_fifty.status, Status::Critical);
        assert!(!at_fifty.critical);
        assert!(at_fifty.needs_improvement);

        let below = evaluator.build_suggestions(&counts, 0, Some(49.9));
        assert_eq!(below.status, Status::Urgent);
        assert!(below.critical);
    }

    #[test]
    fn missing_percentage_is_its_own_state() {
        let evaluator = Evaluator::default();
        let counts = CategoryCounts {
            total: 1,
            missed: 1,
            ..CategoryCounts::default()
        };
        let unset = evaluator.build_suggestions(&counts, 3, None);
        assert_eq!(unset.status, Status::NoData);
        assert!(unset.suggestions.is_empty());

        let zero = evaluator.build_suggestions(&counts, 3, Some(0.0));
        assert_eq!(zero.status, Status::Urgent);
        assert_eq!(
            kinds(&zero),
            vec![SuggestionType::Missed, SuggestionType::Absences]
        );
    }

    #[test]
    fn scenario_snapshot_is_critical_with_full_suggestion_list() {
        let evaluator = Evaluator::default();
        let mut missed = Activity::new("4");
        missed.deadline = NaiveDate::from_ymd_opt(2020, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let mut upcoming = Activity::new("5");
        upcoming.deadline =
            NaiveDate::from_ymd_opt(2099, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));

        let snapshot = Snapshot {
            weighted_percentage: Some(65.0),
            attendance: AttendanceRecord { absent: 2, late: 4 },
            activities: vec![
                graded("1", 85.0, 100),
                graded("2", 77.0, 100),
                graded("3", 60.0, 100),
                missed,
                upcoming,
            ],
            ..Snapshot::default()
        };

        let summary = evaluator.evaluate(&snapshot, now());

        assert_eq!(
            summary.counts,
            CategoryCounts {
                total: 5,
                passed: 1,
                low: 1,
                failed: 1,
                missed: 1,
                pending: 1,
            }
        );
        assert_eq!(summary.total_effective_absences, 3);
        assert!(summary.attendance.is_critical);
        assert_eq!(summary.status, Status::Critical);
        assert!(summary.needs_improvement);
        assert!(!summary.critical);
        let kinds: Vec<SuggestionType> = summary.suggestions.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SuggestionType::Missed,
                SuggestionType::Failed,
                SuggestionType::Low,
                SuggestionType::Pending,
                SuggestionType::Absences,
            ]
        );
        assert_eq!(summary.suggestions[4].count, 3);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let evaluator = Evaluator::default();
        let snapshot = Snapshot {
            weighted_percentage: Some(72.5),
            attendance: AttendanceRecord { absent: 1, late: 2 },
            activities: vec![graded("1", 77.0, 100), due("2", -1, false)],
            ..Snapshot::default()
        };

        let first = serde_json::to_string(&evaluator.evaluate(&snapshot, now())).unwrap();
        let second = serde_json::to_string(&evaluator.evaluate(&snapshot, now())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_policy_moves_the_pass_mark() {
        let evaluator = Evaluator::new(GradingPolicy {
            pass_mark: 90,
            ..GradingPolicy::default()
        });
        assert_eq!(
            evaluator.categorize_activity(&graded("a", 85.0, 100), now()),
            Category::Low
        );
    }
}
