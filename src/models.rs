use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_POINTS: u32 = 100;
pub const DEFAULT_ACTIVITY_TYPE: &str = "Activity";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, deserialize_with = "de_text")]
    pub id: String,
    #[serde(
        default = "default_activity_type",
        deserialize_with = "de_activity_type"
    )]
    pub activity_type: String,
    #[serde(default, deserialize_with = "de_count")]
    pub task_number: u32,
    #[serde(default, deserialize_with = "de_text")]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "de_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default = "default_points", deserialize_with = "de_points")]
    pub points: u32,
    #[serde(default, deserialize_with = "de_number")]
    pub grade: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub submitted: bool,
}

impl Activity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            activity_type: default_activity_type(),
            task_number: 0,
            title: String::new(),
            deadline: None,
            points: DEFAULT_POINTS,
            grade: None,
            submitted: false,
        }
    }

    /// Maximum score, with zero treated as unset.
    pub fn effective_points(&self) -> u32 {
        if self.points == 0 {
            DEFAULT_POINTS
        } else {
            self.points
        }
    }

    /// Graded score as a whole percentage of the activity's points.
    pub fn score_percentage(&self) -> Option<i64> {
        let grade = self.grade.filter(|g| g.is_finite())?;
        let pct = grade * 100.0 / f64::from(self.effective_points());
        Some(pct.round() as i64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "de_count")]
    pub absent: u32,
    #[serde(default, deserialize_with = "de_count")]
    pub late: u32,
}

/// Everything the backend hands over for one student in one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "de_number")]
    pub weighted_percentage: Option<f64>,
    #[serde(default, deserialize_with = "de_attendance")]
    pub attendance: AttendanceRecord,
    #[serde(default, deserialize_with = "de_activities")]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Passed,
    Low,
    Failed,
    Missed,
    Pending,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Passed,
        Category::Low,
        Category::Failed,
        Category::Missed,
        Category::Pending,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Passed => "passed",
            Category::Low => "low",
            Category::Failed => "failed",
            Category::Missed => "missed",
            Category::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorizedActivities {
    pub passed: Vec<Activity>,
    pub low: Vec<Activity>,
    pub failed: Vec<Activity>,
    pub missed: Vec<Activity>,
    pub pending: Vec<Activity>,
}

impl CategorizedActivities {
    pub fn bucket(&self, category: Category) -> &[Activity] {
        match category {
            Category::Passed => &self.passed,
            Category::Low => &self.low,
            Category::Failed => &self.failed,
            Category::Missed => &self.missed,
            Category::Pending => &self.pending,
        }
    }

    pub fn push(&mut self, category: Category, activity: Activity) {
        let bucket = match category {
            Category::Passed => &mut self.passed,
            Category::Low => &mut self.low,
            Category::Failed => &mut self.failed,
            Category::Missed => &mut self.missed,
            Category::Pending => &mut self.pending,
        };
        bucket.push(activity);
    }

    pub fn counts(&self) -> CategoryCounts {
        CategoryCounts {
            total: Category::ALL.iter().map(|c| self.bucket(*c).len()).sum(),
            passed: self.passed.len(),
            low: self.low.len(),
            failed: self.failed.len(),
            missed: self.missed.len(),
            pending: self.pending.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub total: usize,
    pub passed: usize,
    pub low: usize,
    pub failed: usize,
    pub missed: usize,
    pub pending: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Passed => self.passed,
            Category::Low => self.low,
            Category::Failed => self.failed,
            Category::Missed => self.missed,
            Category::Pending => self.pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Excellent,
    Warning,
    Critical,
    Urgent,
    /// No weighted percentage has been published yet.
    NoData,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Excellent => "excellent",
            Status::Warning => "warning",
            Status::Critical => "critical",
            Status::Urgent => "urgent",
            Status::NoData => "noData",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionType {
    Missed,
    Failed,
    Low,
    Pending,
    Absences,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionType,
    pub text: String,
    pub count: usize,
}

/// Percentage band outcome produced alongside the suggestion list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub status: Status,
    pub needs_improvement: bool,
    pub critical: bool,
    pub headline: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFlags {
    pub absent: u32,
    pub late: u32,
    pub late_remainder: u32,
    pub effective_absences: u32,
    /// Effective absences left before the droppable limit is reached.
    pub absences_until_drop: u32,
    pub is_at_risk: bool,
    pub is_critical: bool,
    pub late_warning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub percentage: Option<f64>,
    pub status: Status,
    pub needs_improvement: bool,
    pub critical: bool,
    pub headline: String,
    pub categorized_activities: CategorizedActivities,
    pub counts: CategoryCounts,
    pub suggestions: Vec<Suggestion>,
    pub total_effective_absences: u32,
    pub attendance: AttendanceFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTypeSummary {
    pub activity_type: String,
    pub count: usize,
    pub graded_count: usize,
    pub avg_percentage: Option<f64>,
}

/// Accepts the date and datetime shapes the backend emits. Offset
/// timestamps are shifted to local wall-clock time, the basis of every
/// other format and of the default evaluation clock.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_count(raw: &str) -> u32 {
    parse_number(raw).map(clamp_count).unwrap_or(0)
}

pub fn parse_points(raw: &str) -> u32 {
    parse_number(raw).map(normalize_points).unwrap_or(DEFAULT_POINTS)
}

pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn clamp_count(value: f64) -> u32 {
    if value <= 0.0 {
        0
    } else {
        value.min(f64::from(u32::MAX)) as u32
    }
}

fn normalize_points(value: f64) -> u32 {
    match clamp_count(value) {
        0 => DEFAULT_POINTS,
        points => points,
    }
}

fn default_points() -> u32 {
    DEFAULT_POINTS
}

fn default_activity_type() -> String {
    DEFAULT_ACTIVITY_TYPE.to_string()
}

/// Any scalar the backend might send for a field.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn number(&self) -> Option<f64> {
        match self {
            Loose::Flag(_) => None,
            Loose::Int(v) => Some(*v as f64),
            Loose::Float(v) => Some(*v).filter(|v| v.is_finite()),
            Loose::Text(s) => parse_number(s),
        }
    }

    fn text(self) -> String {
        match self {
            Loose::Flag(b) => b.to_string(),
            Loose::Int(v) => v.to_string(),
            Loose::Float(v) => v.to_string(),
            Loose::Text(s) => s,
        }
    }
}

fn de_loose<'de, D>(deserializer: D) -> Result<Option<Loose>, D::Error>
where
    D: Deserializer<'de>,
{
    // Objects and arrays in a scalar slot are treated as missing.
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<Loose>(value).ok())
}

fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_loose(deserializer)?.map(Loose::text).unwrap_or_default())
}

fn de_activity_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let label = de_text(deserializer)?;
    if label.trim().is_empty() {
        Ok(default_activity_type())
    } else {
        Ok(label)
    }
}

fn de_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_loose(deserializer)?.and_then(|v| v.number()))
}

fn de_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_number(deserializer)?.map(clamp_count).unwrap_or(0))
}

fn de_points<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_number(deserializer)?
        .map(normalize_points)
        .unwrap_or(DEFAULT_POINTS))
}

fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match de_loose(deserializer)? {
        Some(Loose::Flag(b)) => b,
        Some(Loose::Int(v)) => v != 0,
        Some(Loose::Float(v)) => v != 0.0,
        Some(Loose::Text(s)) => parse_flag(&s),
        None => false,
    })
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match de_loose(deserializer)? {
        Some(Loose::Text(s)) => parse_timestamp(&s),
        _ => None,
    })
}

fn de_attendance<'de, D>(deserializer: D) -> Result<AttendanceRecord, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<AttendanceRecord>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

fn de_activities<'de, D>(deserializer: D) -> Result<Vec<Activity>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Vec<Activity>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
