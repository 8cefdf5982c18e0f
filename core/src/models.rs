use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-nutrient totals or targets. A missing nutrient is `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub protein: Option<f64>,
    pub sodium: Option<f64>,
    pub sugar: Option<f64>,
}

impl NutrientTotals {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calories.is_none()
            && self.carbohydrates.is_none()
            && self.fat.is_none()
            && self.protein.is_none()
            && self.sodium.is_none()
            && self.sugar.is_none()
    }
}

// --- Canonical day record ---

/// The canonical, immutable form of one user's day. Its JSON encoding is the
/// snapshot payload, so field order here is part of the storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub user: String,
    pub date: NaiveDate,
    /// `None` entries are placeholders the source returns for empty meal slots.
    pub meals: Vec<Option<Meal>>,
    /// Positional groups: index 0 holds cardio, index 1 holds strength.
    pub exercises: Vec<Vec<Exercise>>,
    pub goals: Option<NutrientTotals>,
    pub notes: Option<Note>,
    pub water: f64,
    pub measurements: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    pub entries: Vec<FoodEntry>,
    pub totals: NutrientTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub short_name: String,
    pub quantity: f64,
    pub unit: String,
    pub totals: NutrientTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    /// Metric name to value, e.g. `minutes`, `calories burned`, `sets`, `reps/set`.
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "type")]
    pub kind: String,
    pub body: String,
}

// --- Stored snapshot ---

/// A serialized day as held in the snapshot store, keyed by (user, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySnapshot {
    pub user: String,
    pub date: NaiveDate,
    pub payload: String,
}

/// Snapshot lookup result for one key; `payload` is `None` when nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub user: String,
    pub date: NaiveDate,
    pub payload: Option<String>,
}

// --- Relational rows ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealRow {
    pub user: String,
    pub date: NaiveDate,
    pub name: String,
    pub totals: NutrientTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealEntryRow {
    pub user: String,
    pub date: NaiveDate,
    pub meal_name: String,
    pub short_name: String,
    pub quantity: f64,
    pub unit: String,
    pub totals: NutrientTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRow {
    pub user: String,
    pub date: NaiveDate,
    pub kind: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterRow {
    pub user: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalRow {
    pub user: String,
    pub date: NaiveDate,
    pub targets: NutrientTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardioRow {
    pub user: String,
    pub date: NaiveDate,
    pub exercise_name: String,
    pub minutes: Option<f64>,
    pub calories_burned: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthRow {
    pub user: String,
    pub date: NaiveDate,
    pub exercise_name: String,
    pub sets: Option<f64>,
    pub reps: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub user: String,
    pub date: NaiveDate,
    pub measure_name: String,
    pub value: f64,
}

/// Every child row derivable from one day, grouped by relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayRows {
    pub meals: Vec<MealRow>,
    pub meal_entries: Vec<MealEntryRow>,
    pub notes: Vec<NoteRow>,
    pub water: Vec<WaterRow>,
    pub goals: Vec<GoalRow>,
    pub cardio: Vec<CardioRow>,
    pub strength: Vec<StrengthRow>,
    pub measurements: Vec<MeasurementRow>,
}

impl DayRows {
    /// Append another day's rows, keeping relation grouping.
    pub fn extend(&mut self, other: DayRows) {
        self.meals.extend(other.meals);
        self.meal_entries.extend(other.meal_entries);
        self.notes.extend(other.notes);
        self.water.extend(other.water);
        self.goals.extend(other.goals);
        self.cardio.extend(other.cardio);
        self.strength.extend(other.strength);
        self.measurements.extend(other.measurements);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.meals.len()
            + self.meal_entries.len()
            + self.notes.len()
            + self.water.len()
            + self.goals.len()
            + self.cardio.len()
            + self.strength.len()
            + self.measurements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- Report inputs ---

/// One goal day with the energy figures the progress report needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEnergy {
    pub date: NaiveDate,
    pub calories_target: Option<f64>,
    /// Sum over the day's meals; `None` when no meal calories were logged.
    pub calories_consumed: Option<f64>,
    pub calories_burned: f64,
}

/// Actual intake next to the goal for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionDay {
    pub date: NaiveDate,
    pub actual: NutrientTotals,
    pub goal: NutrientTotals,
}

/// Stored history of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub user: String,
    pub days: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

// --- Pipeline results ---

/// Row counts written per relation by one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCounts {
    pub snapshots: usize,
    pub meals: usize,
    pub meal_entries: usize,
    pub notes: usize,
    pub water: usize,
    pub goals: usize,
    pub cardio: usize,
    pub strength: usize,
    pub measurements: usize,
}

/// Outcome of one synchronization run for one user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub user: String,
    pub days_extracted: usize,
    pub days_new: usize,
    pub days_changed: usize,
    pub days_unchanged: usize,
    pub loaded: LoadCounts,
}

// --- Validation ---

/// Validate a user name used as a snapshot key: non-empty, no surrounding whitespace.
pub fn validate_user(user: &str) -> anyhow::Result<()> {
    if user.trim().is_empty() {
        anyhow::bail!("User name must not be empty");
    }
    if user.trim() != user {
        anyhow::bail!("User name '{user}' must not have leading or trailing whitespace");
    }
    Ok(())
}

/// Validate a day before it is stored: known user, unique meal names,
/// non-negative water, finite measurements.
pub fn validate_day_record(day: &DayRecord) -> anyhow::Result<()> {
    validate_user(&day.user)?;
    let mut meal_names = std::collections::HashSet::new();
    for meal in day.meals.iter().flatten() {
        if !meal_names.insert(meal.name.as_str()) {
            anyhow::bail!(
                "Meal '{}' appears more than once for {} {}",
                meal.name,
                day.user,
                day.date
            );
        }
    }
    if !day.water.is_finite() || day.water < 0.0 {
        anyhow::bail!(
            "Water quantity for {} {} must be a non-negative number",
            day.user,
            day.date
        );
    }
    for (name, value) in &day.measurements {
        if !value.is_finite() {
            anyhow::bail!(
                "Measurement '{name}' for {} {} is not a finite number",
                day.user,
                day.date
            );
        }
    }
    Ok(())
}
