//! Expansion of a canonical day into rows for every child relation.
//!
//! The output depends on the day alone. Rows from earlier versions of the same
//! day are never consulted; the loader's cascade removes them.

use crate::models::{
    CardioRow, DayRecord, DayRows, GoalRow, MealEntryRow, MealRow, MeasurementRow, NoteRow,
    StrengthRow, WaterRow,
};

const CARDIO_GROUP: usize = 0;
const STRENGTH_GROUP: usize = 1;

#[must_use]
pub fn decompose(day: &DayRecord) -> DayRows {
    DayRows {
        meals: meal_rows(day),
        meal_entries: meal_entry_rows(day),
        notes: note_rows(day),
        water: water_rows(day),
        goals: goal_rows(day),
        cardio: cardio_rows(day),
        strength: strength_rows(day),
        measurements: measurement_rows(day),
    }
}

/// Decompose several days into one set of relation batches.
#[must_use]
pub fn decompose_all(days: &[DayRecord]) -> DayRows {
    let mut rows = DayRows::default();
    for day in days {
        rows.extend(decompose(day));
    }
    rows
}

fn meal_rows(day: &DayRecord) -> Vec<MealRow> {
    day.meals
        .iter()
        .flatten()
        .map(|meal| MealRow {
            user: day.user.clone(),
            date: day.date,
            name: meal.name.clone(),
            totals: meal.totals.clone(),
        })
        .collect()
}

fn meal_entry_rows(day: &DayRecord) -> Vec<MealEntryRow> {
    day.meals
        .iter()
        .flatten()
        .flat_map(|meal| {
            meal.entries.iter().map(move |entry| MealEntryRow {
                user: day.user.clone(),
                date: day.date,
                meal_name: meal.name.clone(),
                short_name: entry.short_name.clone(),
                quantity: entry.quantity,
                unit: entry.unit.clone(),
                totals: entry.totals.clone(),
            })
        })
        .collect()
}

fn note_rows(day: &DayRecord) -> Vec<NoteRow> {
    day.notes
        .iter()
        .filter(|note| !note.body.is_empty())
        .map(|note| NoteRow {
            user: day.user.clone(),
            date: day.date,
            kind: note.kind.clone(),
            body: note.body.clone(),
        })
        .collect()
}

fn water_rows(day: &DayRecord) -> Vec<WaterRow> {
    vec![WaterRow {
        user: day.user.clone(),
        date: day.date,
        quantity: day.water,
    }]
}

fn goal_rows(day: &DayRecord) -> Vec<GoalRow> {
    day.goals
        .iter()
        .map(|targets| GoalRow {
            user: day.user.clone(),
            date: day.date,
            targets: targets.clone(),
        })
        .collect()
}

fn cardio_rows(day: &DayRecord) -> Vec<CardioRow> {
    day.exercises
        .get(CARDIO_GROUP)
        .into_iter()
        .flatten()
        .map(|exercise| CardioRow {
            user: day.user.clone(),
            date: day.date,
            exercise_name: exercise.name.clone(),
            minutes: exercise.metrics.get("minutes").copied(),
            calories_burned: exercise.metrics.get("calories burned").copied(),
        })
        .collect()
}

fn strength_rows(day: &DayRecord) -> Vec<StrengthRow> {
    day.exercises
        .get(STRENGTH_GROUP)
        .into_iter()
        .flatten()
        .map(|exercise| StrengthRow {
            user: day.user.clone(),
            date: day.date,
            exercise_name: exercise.name.clone(),
            sets: exercise.metrics.get("sets").copied(),
            reps: exercise.metrics.get("reps/set").copied(),
            weight: exercise.metrics.get("weight/set").copied(),
        })
        .collect()
}

fn measurement_rows(day: &DayRecord) -> Vec<MeasurementRow> {
    day.measurements
        .iter()
        .map(|(name, value)| MeasurementRow {
            user: day.user.clone(),
            date: day.date,
            measure_name: name.clone(),
            value: *value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Exercise, FoodEntry, Meal, Note, NutrientTotals};

    fn base_day() -> DayRecord {
        DayRecord {
            user: "alice".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            meals: Vec::new(),
            exercises: Vec::new(),
            goals: None,
            notes: None,
            water: 0.0,
            measurements: BTreeMap::new(),
        }
    }

    fn meal(name: &str, entries: Vec<FoodEntry>) -> Meal {
        Meal {
            name: name.to_string(),
            entries,
            totals: NutrientTotals {
                calories: Some(300.0),
                protein: Some(12.0),
                ..NutrientTotals::default()
            },
        }
    }

    fn exercise(name: &str, metrics: &[(&str, f64)]) -> Exercise {
        Exercise {
            name: name.to_string(),
            metrics: metrics
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn test_placeholder_meals_are_skipped() {
        let mut day = base_day();
        day.meals = vec![None, Some(meal("breakfast", Vec::new()))];
        let rows = decompose(&day);
        assert_eq!(rows.meals.len(), 1);
        assert_eq!(rows.meals[0].name, "breakfast");
    }

    #[test]
    fn test_meal_entries_carry_meal_name() {
        let mut day = base_day();
        day.meals = vec![Some(meal(
            "lunch",
            vec![
                FoodEntry {
                    short_name: "rice".to_string(),
                    quantity: 1.5,
                    unit: "cup".to_string(),
                    totals: NutrientTotals {
                        calories: Some(300.0),
                        ..NutrientTotals::default()
                    },
                },
                FoodEntry {
                    short_name: "chicken".to_string(),
                    quantity: 150.0,
                    unit: "g".to_string(),
                    totals: NutrientTotals::default(),
                },
            ],
        ))];
        let rows = decompose(&day);
        assert_eq!(rows.meal_entries.len(), 2);
        assert!(rows.meal_entries.iter().all(|e| e.meal_name == "lunch"));
        assert_eq!(rows.meal_entries[1].short_name, "chicken");
    }

    #[test]
    fn test_absent_nutrient_stays_none() {
        let mut day = base_day();
        day.meals = vec![Some(meal("dinner", Vec::new()))];
        let rows = decompose(&day);
        assert_eq!(rows.meals[0].totals.calories, Some(300.0));
        assert_eq!(rows.meals[0].totals.sodium, None);
    }

    #[test]
    fn test_empty_note_body_is_dropped() {
        let mut day = base_day();
        day.notes = Some(Note {
            kind: "food".to_string(),
            body: String::new(),
        });
        assert!(decompose(&day).notes.is_empty());

        day.notes = Some(Note {
            kind: "food".to_string(),
            body: "noted".to_string(),
        });
        let rows = decompose(&day);
        assert_eq!(rows.notes.len(), 1);
        assert_eq!(rows.notes[0].body, "noted");
        assert_eq!(rows.notes[0].kind, "food");
    }

    #[test]
    fn test_exercises_split_by_position() {
        let mut day = base_day();
        // A strength-looking metric in the cardio slot stays cardio.
        day.exercises = vec![
            vec![
                exercise("Running", &[("minutes", 30.0), ("calories burned", 320.0)]),
                exercise("Odd", &[("sets", 3.0)]),
            ],
            vec![exercise(
                "Bench Press",
                &[("sets", 3.0), ("reps/set", 8.0), ("weight/set", 60.0)],
            )],
        ];
        let rows = decompose(&day);
        assert_eq!(rows.cardio.len(), 2);
        assert_eq!(rows.cardio[0].calories_burned, Some(320.0));
        assert_eq!(rows.cardio[1].exercise_name, "Odd");
        assert_eq!(rows.cardio[1].minutes, None);
        assert_eq!(rows.strength.len(), 1);
        assert_eq!(rows.strength[0].reps, Some(8.0));
        assert_eq!(rows.strength[0].weight, Some(60.0));
    }

    #[test]
    fn test_missing_exercise_groups_yield_no_rows() {
        let mut day = base_day();
        day.exercises = vec![vec![exercise("Walk", &[("minutes", 20.0)])]];
        let rows = decompose(&day);
        assert_eq!(rows.cardio.len(), 1);
        assert!(rows.strength.is_empty());
    }

    #[test]
    fn test_measurements_only_when_present() {
        let mut day = base_day();
        assert!(decompose(&day).measurements.is_empty());
        day.measurements.insert("Weight".to_string(), 81.2);
        let rows = decompose(&day);
        assert_eq!(rows.measurements.len(), 1);
        assert_eq!(rows.measurements[0].measure_name, "Weight");
        assert_eq!(rows.measurements[0].value, 81.2);
    }

    #[test]
    fn test_goal_row_only_when_goals_present() {
        let mut day = base_day();
        assert!(decompose(&day).goals.is_empty());
        day.goals = Some(NutrientTotals {
            calories: Some(1800.0),
            ..NutrientTotals::default()
        });
        let rows = decompose(&day);
        assert_eq!(rows.goals.len(), 1);
        assert_eq!(rows.goals[0].targets.calories, Some(1800.0));
    }

    #[test]
    fn test_water_row_always_emitted() {
        let rows = decompose(&base_day());
        assert_eq!(rows.water.len(), 1);
        assert_eq!(rows.water[0].quantity, 0.0);
    }

    #[test]
    fn test_decompose_all_concatenates_days() {
        let d1 = base_day();
        let mut d2 = base_day();
        d2.date = d1.date.succ_opt().unwrap();
        let rows = decompose_all(&[d1, d2]);
        assert_eq!(rows.water.len(), 2);
    }
}
