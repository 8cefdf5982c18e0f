//! Cumulative calorie deficit series.
//!
//! A day's actual deficit is the resting expenditure estimate minus what was
//! eaten, plus what was burned through cardio. The series is numbered and
//! accumulated over every goal day from the start date, then days without meal
//! data are hidden.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::DailyEnergy;

pub const DEFAULT_WINDOW: usize = 7;

/// Body parameters for the Mifflin-St Jeor resting expenditure estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyProfile {
    pub activity_factor: f64,
    pub height_cm: f64,
    pub age_years: f64,
    /// +5 for men, -161 for women.
    pub sex_offset: f64,
}

impl Default for BodyProfile {
    fn default() -> Self {
        Self {
            activity_factor: 1.2,
            height_cm: 182.0,
            age_years: 34.0,
            sex_offset: 5.0,
        }
    }
}

impl BodyProfile {
    #[must_use]
    pub fn resting_expenditure(&self, weight_kg: f64) -> f64 {
        self.activity_factor
            * (10.0 * weight_kg + 6.25 * self.height_cm - 5.0 * self.age_years + self.sex_offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRow {
    pub day_number: usize,
    pub date: NaiveDate,
    pub calories_target: i64,
    pub deficit_target: i64,
    pub deficit_actual: i64,
    pub deficit_accumulated: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartCategory {
    Warning,
    OnTrack,
}

/// Progress toward `end_goal` as of the last reported day, split into three
/// stacked segments: banked before today, today's contribution, remaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSummary {
    pub category: ChartCategory,
    pub end_goal: i64,
    pub remaining: i64,
    pub segments: [i64; 3],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    pub user: String,
    pub rows: Vec<ProgressRow>,
    /// The last `window` rows, oldest first.
    pub window: Vec<ProgressRow>,
    pub current_day: Option<usize>,
    pub chart: Option<ChartSummary>,
}

impl ProgressReport {
    #[must_use]
    pub fn empty(user: &str) -> Self {
        Self {
            user: user.to_string(),
            rows: Vec::new(),
            window: Vec::new(),
            current_day: None,
            chart: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Options that shape a report but not its numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub end_goal: i64,
    pub window: usize,
    pub today: NaiveDate,
}

// Mirrors an SQL integer cast: truncate toward zero.
#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> i64 {
    value.trunc() as i64
}

/// Number, compute and accumulate every day, then drop days with no meal data.
///
/// `days` must be ascending by date.
#[must_use]
pub fn build_progress_series(days: &[DailyEnergy], resting_expenditure: f64) -> Vec<ProgressRow> {
    let mut accumulated: i64 = 0;
    let mut rows = Vec::with_capacity(days.len());

    for (idx, day) in days.iter().enumerate() {
        let Some(goal) = day.calories_target else {
            continue;
        };
        let target = resting_expenditure - goal + day.calories_burned;
        let Some(consumed) = day.calories_consumed else {
            continue;
        };
        let actual = whole(target + (goal - consumed));
        accumulated += actual;
        rows.push(ProgressRow {
            day_number: idx + 1,
            date: day.date,
            calories_target: whole(goal),
            deficit_target: whole(target),
            deficit_actual: actual,
            deficit_accumulated: accumulated,
        });
    }
    rows
}

/// Chart segments for the most recent row.
#[must_use]
pub fn chart_summary(end_goal: i64, row: &ProgressRow) -> ChartSummary {
    let actual = row.deficit_actual;
    let accumulated = row.deficit_accumulated;
    if actual < 0 {
        let remaining = end_goal - accumulated + actual.abs();
        ChartSummary {
            category: ChartCategory::Warning,
            end_goal,
            remaining,
            segments: [accumulated - actual.abs(), actual.abs(), remaining + actual],
        }
    } else {
        let remaining = end_goal - accumulated - actual;
        ChartSummary {
            category: ChartCategory::OnTrack,
            end_goal,
            remaining,
            segments: [accumulated, actual, remaining],
        }
    }
}

/// Assemble the report. It is empty unless the last visible day is yesterday.
#[must_use]
pub fn build_report(user: &str, rows: Vec<ProgressRow>, options: &ReportOptions) -> ProgressReport {
    let yesterday = options.today.pred_opt();
    let Some(last) = rows.last() else {
        return ProgressReport::empty(user);
    };
    if Some(last.date) != yesterday {
        return ProgressReport::empty(user);
    }

    let chart = chart_summary(options.end_goal, last);
    let current_day = last.day_number;
    let window_start = rows.len().saturating_sub(options.window);
    let window = rows[window_start..].to_vec();

    ProgressReport {
        user: user.to_string(),
        rows,
        window,
        current_day: Some(current_day),
        chart: Some(chart),
    }
}

/// Human-readable date as used in report headers, e.g. `03-Jan-2021`.
#[must_use]
pub fn display_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}
