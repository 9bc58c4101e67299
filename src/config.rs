use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::parse_timestamp;

/// Thresholds used to grade activities and band the weighted percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingPolicy {
    /// Minimum rounded activity percentage counted as passed.
    pub pass_mark: i64,
    /// Minimum rounded activity percentage counted as low rather than failed.
    pub low_mark: i64,
    pub excellent_from: f64,
    pub warning_from: f64,
    /// Below this the status is urgent instead of critical.
    pub urgent_below: f64,
    pub lates_per_absence: u32,
    pub at_risk_absences: u32,
    pub droppable_absences: u32,
    pub late_warning_remainder: u32,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            pass_mark: 80,
            low_mark: 75,
            excellent_from: 75.0,
            warning_from: 71.0,
            urgent_below: 50.0,
            lates_per_absence: 3,
            at_risk_absences: 2,
            droppable_absences: 3,
            late_warning_remainder: 2,
        }
    }
}

impl GradingPolicy {
    /// Read a policy file; keys left out keep their default value.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let policy = match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                serde_json::from_str::<GradingPolicy>(&content)?
            }
            None => GradingPolicy::default(),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.lates_per_absence == 0 {
            return Err(AppError::Config(
                "lates_per_absence must be at least 1".to_string(),
            ));
        }
        if self.low_mark > self.pass_mark {
            return Err(AppError::Config(format!(
                "low_mark ({}) cannot exceed pass_mark ({})",
                self.low_mark, self.pass_mark
            )));
        }
        if self.urgent_below > self.warning_from || self.warning_from > self.excellent_from {
            return Err(AppError::Config(format!(
                "percentage bands must satisfy \
                 urgent_below ({}) <= warning_from ({}) <= excellent_from ({})",
                self.urgent_below, self.warning_from, self.excellent_from
            )));
        }
        if self.at_risk_absences > self.droppable_absences {
            return Err(AppError::Config(format!(
                "at_risk_absences ({}) cannot exceed droppable_absences ({})",
                self.at_risk_absences, self.droppable_absences
            )));
        }
        Ok(())
    }
}

/// Evaluation clock: a pinned timestamp if given, otherwise local time.
pub fn resolve_now(pinned: Option<&str>) -> AppResult<NaiveDateTime> {
    match pinned {
        Some(raw) => {
            parse_timestamp(raw).ok_or_else(|| AppError::InvalidTimestamp(raw.to_string()))
        }
        None => Ok(Local::now().naive_local()),
    }
}
