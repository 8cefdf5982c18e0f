use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::NutritionDay;

/// Actual intake against goal for one day, flattened for tables and CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionRow {
    pub date: NaiveDate,
    pub weekday: String,
    pub calories_actual: Option<f64>,
    pub calories_goal: Option<f64>,
    pub carbohydrates_actual: Option<f64>,
    pub carbohydrates_goal: Option<f64>,
    pub fat_actual: Option<f64>,
    pub fat_goal: Option<f64>,
    pub protein_actual: Option<f64>,
    pub protein_goal: Option<f64>,
    pub sodium_actual: Option<f64>,
    pub sodium_goal: Option<f64>,
    pub sugar_actual: Option<f64>,
    pub sugar_goal: Option<f64>,
}

impl From<&NutritionDay> for NutritionRow {
    fn from(day: &NutritionDay) -> Self {
        Self {
            date: day.date,
            weekday: day.date.format("%A").to_string(),
            calories_actual: day.actual.calories,
            calories_goal: day.goal.calories,
            carbohydrates_actual: day.actual.carbohydrates,
            carbohydrates_goal: day.goal.carbohydrates,
            fat_actual: day.actual.fat,
            fat_goal: day.goal.fat,
            protein_actual: day.actual.protein,
            protein_goal: day.goal.protein,
            sodium_actual: day.actual.sodium,
            sodium_goal: day.goal.sodium,
            sugar_actual: day.actual.sugar,
            sugar_goal: day.goal.sugar,
        }
    }
}

#[must_use]
pub fn build_nutrition_rows(days: &[NutritionDay]) -> Vec<NutritionRow> {
    days.iter().map(NutritionRow::from).collect()
}

pub fn write_csv<W: Write>(rows: &[NutritionRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write CSV row for {}", row.date))?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}
