use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::models::{Activity, ActivityTypeSummary, Category, PerformanceSummary, Snapshot};

pub fn summarize_by_type(activities: &[Activity]) -> Vec<ActivityTypeSummary> {
    let mut map: HashMap<String, (usize, usize, i64)> = HashMap::new();

    for activity in activities {
        let entry = map
            .entry(activity.activity_type.clone())
            .or_insert((0, 0, 0));
        entry.0 += 1;
        if let Some(pct) = activity.score_percentage() {
            entry.1 += 1;
            entry.2 += pct;
        }
    }

    let mut summaries: Vec<ActivityTypeSummary> = map
        .into_iter()
        .map(
            |(activity_type, (count, graded_count, total_pct))| ActivityTypeSummary {
                activity_type,
                count,
                graded_count,
                avg_percentage: if graded_count == 0 {
                    None
                } else {
                    Some(total_pct as f64 / graded_count as f64)
                },
            },
        )
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.activity_type.cmp(&b.activity_type))
    });
    summaries
}

pub fn build_report(
    snapshot: &Snapshot,
    summary: &PerformanceSummary,
    now: NaiveDateTime,
) -> String {
    let by_type = summarize_by_type(&snapshot.activities);
    let mut output = String::new();

    let _ = writeln!(output, "# Student Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} in {} on {}",
        snapshot.student.as_deref().unwrap_or("unknown student"),
        snapshot.subject.as_deref().unwrap_or("all subjects"),
        now.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    match summary.percentage {
        Some(pct) => {
            let _ = writeln!(output, "- Weighted percentage: {pct:.2}%");
        }
        None => {
            let _ = writeln!(output, "- Weighted percentage: not yet available");
        }
    }
    let _ = writeln!(output, "- Status: {}", summary.status.label());
    let _ = writeln!(output, "- {}", summary.headline);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Breakdown");
    let _ = writeln!(output, "- total: {}", summary.counts.total);
    for category in Category::ALL {
        let _ = writeln!(
            output,
            "- {}: {}",
            category.label(),
            summary.counts.get(category)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Activity Type");
    if by_type.is_empty() {
        let _ = writeln!(output, "No activities recorded for this subject.");
    } else {
        for entry in by_type.iter() {
            match entry.avg_percentage {
                Some(avg) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} activities, {} graded (avg {:.1}%)",
                        entry.activity_type, entry.count, entry.graded_count, avg
                    );
                }
                None => {
                    let _ = writeln!(
                        output,
                        "- {}: {} activities, none graded",
                        entry.activity_type, entry.count
                    );
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Suggestions");
    if summary.suggestions.is_empty() {
        let _ = writeln!(output, "No suggestions at this time.");
    } else {
        for suggestion in summary.suggestions.iter() {
            let _ = writeln!(output, "- {}", suggestion.text);
        }
    }

    let attendance = &summary.attendance;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");
    let _ = writeln!(
        output,
        "- {} absences, {} lates ({} effective absences)",
        attendance.absent, attendance.late, attendance.effective_absences
    );
    if attendance.is_critical {
        let _ = writeln!(output, "- Droppable: absence limit reached");
    } else if attendance.is_at_risk {
        let remaining = attendance.absences_until_drop;
        let _ = writeln!(
            output,
            "- At risk: {} {} left before the absence limit",
            remaining,
            if remaining == 1 { "absence" } else { "absences" }
        );
    }
    if attendance.late_warning {
        let _ = writeln!(
            output,
            "- Late warning: {} lates toward the next converted absence",
            attendance.late_remainder
        );
    }

    let mut missed = summary.categorized_activities.missed.clone();
    missed.sort_by(|a, b| b.deadline.cmp(&a.deadline));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Missed Activities");

    if missed.is_empty() {
        let _ = writeln!(output, "No missed activities.");
    } else {
        for activity in missed.iter() {
            let deadline = activity
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} #{} {} (due {})",
                activity.activity_type, activity.task_number, activity.title, deadline
            );
        }
    }

    output
}
