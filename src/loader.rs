use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::errors::AppResult;
use crate::models::{
    parse_count, parse_flag, parse_number, parse_points, parse_timestamp, Activity,
    AttendanceRecord, Snapshot, DEFAULT_ACTIVITY_TYPE, DEFAULT_POINTS,
};

pub fn load_snapshot(path: &Path) -> AppResult<Snapshot> {
    let content = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        activities = snapshot.activities.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> AppResult<()> {
    let body = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, body)?;
    Ok(())
}

/// Reads a gradebook CSV export. Blank cells count as missing values.
pub fn import_csv(csv_path: &Path) -> AppResult<Vec<Activity>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        activity_type: Option<String>,
        #[serde(default)]
        task_number: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        deadline: Option<String>,
        #[serde(default)]
        points: Option<String>,
        #[serde(default)]
        grade: Option<String>,
        #[serde(default)]
        submitted: Option<String>,
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)?;
    let mut activities = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let id = row
            .id
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("row-{}", index + 1));
        let activity_type = row
            .activity_type
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTIVITY_TYPE.to_string());

        activities.push(Activity {
            id,
            activity_type,
            task_number: row.task_number.as_deref().map(parse_count).unwrap_or(0),
            title: row.title.unwrap_or_default(),
            deadline: row.deadline.as_deref().and_then(parse_timestamp),
            points: row
                .points
                .as_deref()
                .map(parse_points)
                .unwrap_or(DEFAULT_POINTS),
            grade: row.grade.as_deref().and_then(parse_number),
            submitted: row.submitted.as_deref().map(parse_flag).unwrap_or(false),
        });
    }

    tracing::info!(
        path = %csv_path.display(),
        rows = activities.len(),
        "imported activities"
    );
    Ok(activities)
}

/// A realistic snapshot covering every category, useful for demos.
pub fn sample_snapshot() -> Snapshot {
    let at_midnight =
        |y, m, d| NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(0, 0, 0));

    let records = vec![
        ("1", "Assignment", 1, "Essay outline", Some(85.0), true, (2025, 2, 7)),
        ("2", "Quiz", 1, "Chapter 1 quiz", Some(77.0), true, (2025, 2, 14)),
        ("3", "Exam", 1, "Prelim exam", Some(60.0), true, (2025, 3, 3)),
        ("4", "Assignment", 2, "Lab report", None, false, (2020, 1, 1)),
        ("5", "Assignment", 3, "Final project", None, false, (2099, 1, 1)),
    ];

    let activities = records
        .into_iter()
        .map(
            |(id, activity_type, task_number, title, grade, submitted, (y, m, d))| Activity {
                id: id.to_string(),
                activity_type: activity_type.to_string(),
                task_number,
                title: title.to_string(),
                deadline: at_midnight(y, m, d),
                points: 100,
                grade,
                submitted,
            },
        )
        .collect();

    Snapshot {
        student: Some("Avery Lee".to_string()),
        subject: Some("English 101".to_string()),
        weighted_percentage: Some(65.0),
        attendance: AttendanceRecord { absent: 2, late: 4 },
        activities,
    }
}
