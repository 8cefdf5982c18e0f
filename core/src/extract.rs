//! Boundary types for the remote day source and their mapping into
//! canonical [`DayRecord`]s.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DayRecord, Exercise, FoodEntry, Meal, Note, NutrientTotals};

// --- Wire types ---

/// One day as the remote source returns it. Maps are unordered here; order is
/// fixed when the day is materialized.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteDay {
    pub meals: Vec<Option<RemoteMeal>>,
    pub exercises: Vec<Vec<RemoteExercise>>,
    pub goals: HashMap<String, f64>,
    pub notes: Option<RemoteNote>,
    pub water: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteMeal {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<RemoteEntry>,
    #[serde(default)]
    pub totals: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteEntry {
    pub short_name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub totals: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteExercise {
    pub name: String,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteNote {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub body: String,
}

// --- Errors and retry policy ---

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Timeouts, connection failures, throttling and server errors.
    #[error("transient source failure: {0}")]
    Transient(String),

    #[error("source rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("could not decode source response: {0}")]
    Decode(String),
}

impl FetchError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Bounds on each extraction call: per-attempt timeout, fixed delay between
/// attempts, attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_secs: 10,
            timeout_secs: 15,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether another attempt follows a failure on attempt `attempt` (1-based).
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        error.is_transient() && attempt < self.max_attempts.max(1)
    }
}

// --- Materialization ---

impl NutrientTotals {
    /// Pick the known nutrients out of a source map; unknown keys are ignored.
    #[must_use]
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        Self {
            calories: map.get("calories").copied(),
            carbohydrates: map.get("carbohydrates").copied(),
            fat: map.get("fat").copied(),
            protein: map.get("protein").copied(),
            sodium: map.get("sodium").copied(),
            sugar: map.get("sugar").copied(),
        }
    }
}

fn ordered(map: HashMap<String, f64>) -> BTreeMap<String, f64> {
    map.into_iter().collect()
}

impl DayRecord {
    /// Build the canonical record for one extracted day.
    ///
    /// Empty goals become `None`; a missing water figure becomes zero.
    #[must_use]
    pub fn materialize(
        user: &str,
        date: NaiveDate,
        remote: RemoteDay,
        measurements: BTreeMap<String, f64>,
    ) -> Self {
        let meals = remote
            .meals
            .into_iter()
            .map(|meal| {
                meal.map(|m| Meal {
                    name: m.name,
                    totals: NutrientTotals::from_map(&m.totals),
                    entries: m
                        .entries
                        .into_iter()
                        .map(|e| FoodEntry {
                            short_name: e.short_name,
                            quantity: e.quantity,
                            unit: e.unit,
                            totals: NutrientTotals::from_map(&e.totals),
                        })
                        .collect(),
                })
            })
            .collect();

        let exercises = remote
            .exercises
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|x| Exercise {
                        name: x.name,
                        metrics: ordered(x.metrics),
                    })
                    .collect()
            })
            .collect();

        let goals = Some(NutrientTotals::from_map(&remote.goals)).filter(|g| !g.is_empty());

        DayRecord {
            user: user.to_string(),
            date,
            meals,
            exercises,
            goals,
            notes: remote.notes.map(|n| Note {
                kind: n.kind,
                body: n.body,
            }),
            water: remote.water.unwrap_or(0.0),
            measurements,
        }
    }
}

/// Values recorded on `date` across several measurement series.
#[must_use]
pub fn measurements_on(
    series: &BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    date: NaiveDate,
) -> BTreeMap<String, f64> {
    series
        .iter()
        .filter_map(|(name, values)| values.get(&date).map(|v| (name.clone(), *v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::encode;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
    }

    const DAY_JSON: &str = r#"{
        "meals": [
            null,
            {"name": "breakfast",
             "entries": [{"short_name": "oats", "quantity": 1, "unit": "cup",
                          "totals": {"calories": 300, "protein": 10, "fiber": 8}}],
             "totals": {"calories": 300, "protein": 10}}
        ],
        "exercises": [
            [{"name": "Running", "metrics": {"minutes": 30, "calories burned": 310}}],
            []
        ],
        "goals": {"calories": 1800, "protein": 120},
        "notes": {"type": "food", "body": "late dinner"},
        "water": 1500
    }"#;

    #[test]
    fn test_remote_day_decodes_and_materializes() {
        let remote: RemoteDay = serde_json::from_str(DAY_JSON).unwrap();
        let day = DayRecord::materialize("alice", date(), remote, BTreeMap::new());
        assert_eq!(day.meals.len(), 2);
        assert!(day.meals[0].is_none());
        let breakfast = day.meals[1].as_ref().unwrap();
        assert_eq!(breakfast.entries[0].totals.calories, Some(300.0));
        assert_eq!(breakfast.entries[0].totals.fat, None);
        assert_eq!(day.exercises[0][0].metrics["calories burned"], 310.0);
        assert_eq!(day.goals.unwrap().calories, Some(1800.0));
        assert_eq!(day.notes.unwrap().body, "late dinner");
        assert!((day.water - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sparse_remote_day_defaults() {
        let remote: RemoteDay = serde_json::from_str("{}").unwrap();
        let day = DayRecord::materialize("alice", date(), remote, BTreeMap::new());
        assert!(day.meals.is_empty());
        assert!(day.goals.is_none());
        assert!(day.notes.is_none());
        assert!(day.water.abs() < f64::EPSILON);
    }

    #[test]
    fn test_materialized_encoding_ignores_source_map_order() {
        let a: RemoteDay = serde_json::from_str(
            r#"{"exercises": [[{"name": "Row", "metrics": {"minutes": 20, "calories burned": 150}}]]}"#,
        )
        .unwrap();
        let b: RemoteDay = serde_json::from_str(
            r#"{"exercises": [[{"name": "Row", "metrics": {"calories burned": 150, "minutes": 20}}]]}"#,
        )
        .unwrap();
        let a = encode(&DayRecord::materialize("alice", date(), a, BTreeMap::new())).unwrap();
        let b = encode(&DayRecord::materialize("alice", date(), b, BTreeMap::new())).unwrap();
        assert_eq!(a.payload, b.payload);
    }

    #[test]
    fn test_retry_policy() {
        let policy = RetryPolicy::default();
        let transient = FetchError::Transient("timed out".to_string());
        let rejected = FetchError::Rejected {
            status: 404,
            message: "no such user".to_string(),
        };
        assert!(policy.should_retry(1, &transient));
        assert!(!policy.should_retry(5, &transient));
        assert!(!policy.should_retry(1, &rejected));
        assert_eq!(policy.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_measurements_on_picks_matching_date() {
        let mut weight = BTreeMap::new();
        weight.insert(date(), 82.0);
        let mut series = BTreeMap::new();
        series.insert("Weight".to_string(), weight);
        series.insert("Waist".to_string(), BTreeMap::new());

        let today = measurements_on(&series, date());
        assert_eq!(today.len(), 1);
        assert_eq!(today["Weight"], 82.0);
        assert!(measurements_on(&series, date().succ_opt().unwrap()).is_empty());
    }
}
