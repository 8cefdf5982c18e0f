use std::io;

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use paw_core::nutrition::{NutritionRow, write_csv};
use paw_core::progress::{ChartCategory, ProgressReport, ProgressRow, ReportOptions, display_date};
use paw_core::service::PawService;

use super::helpers::{fmt_opt, fmt_signed, print_json, resolve_window, today};
use crate::config::Config;

pub(crate) fn cmd_report_progress(
    svc: &PawService,
    config: &Config,
    user: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut reports = Vec::new();
    for user in config.select_users(user)? {
        let progress = user.progress.as_ref().with_context(|| {
            format!(
                "User '{}' has no [users.progress] section in the config",
                user.name
            )
        })?;
        let options = ReportOptions {
            end_goal: progress.end_goal,
            window: progress.window,
            today: today(),
        };
        reports.push(svc.progress_report(
            &user.name,
            progress.start_date,
            &progress.body,
            &options,
        )?);
    }

    if json {
        return print_json(&reports);
    }
    for report in &reports {
        print_progress(report);
    }
    Ok(())
}

fn print_progress(report: &ProgressReport) {
    let (Some(current_day), Some(chart), Some(last)) =
        (report.current_day, report.chart.as_ref(), report.rows.last())
    else {
        eprintln!(
            "No progress data for {} up to yesterday. Run `paw sync` first.",
            report.user
        );
        return;
    };

    println!(
        "{} | Day {current_day} | {}",
        report.user,
        display_date(last.date)
    );
    print_progress_table(&report.window);

    let status = match chart.category {
        ChartCategory::OnTrack => "on track",
        ChartCategory::Warning => "warning",
    };
    let [banked, latest, remaining] = chart.segments;
    println!(
        "Goal {} kcal: {banked} banked, {} latest day, {remaining} remaining ({status})",
        chart.end_goal,
        fmt_signed(latest)
    );
}

fn print_progress_table(rows: &[ProgressRow]) {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Day")]
        day: usize,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Cal Target")]
        calories_target: i64,
        #[tabled(rename = "Deficit Target")]
        deficit_target: i64,
        #[tabled(rename = "Deficit Actual")]
        deficit_actual: String,
        #[tabled(rename = "Running Deficit")]
        deficit_accumulated: i64,
    }

    let rows: Vec<Row> = rows
        .iter()
        .map(|r| Row {
            day: r.day_number,
            date: r.date.format("%Y-%m-%d").to_string(),
            calories_target: r.calories_target,
            deficit_target: r.deficit_target,
            deficit_actual: fmt_signed(r.deficit_actual),
            deficit_accumulated: r.deficit_accumulated,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_report_nutrition(
    svc: &PawService,
    config: &Config,
    user: &str,
    from: Option<&str>,
    to: Option<&str>,
    csv: bool,
    json: bool,
) -> Result<()> {
    let user = config.user(user)?;
    let window = resolve_window(from, to)?;
    let rows = svc.nutrition_report(&user.name, window.from, window.to)?;

    if csv {
        write_csv(&rows, io::stdout().lock())
    } else if json {
        print_json(&rows)
    } else if rows.is_empty() {
        eprintln!(
            "No days with both meals and goals for {} between {} and {}",
            user.name, window.from, window.to
        );
        Ok(())
    } else {
        print_nutrition_table(&rows);
        Ok(())
    }
}

fn print_nutrition_table(rows: &[NutritionRow]) {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Day")]
        weekday: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Carbs (g)")]
        carbs: String,
        #[tabled(rename = "Fat (g)")]
        fat: String,
        #[tabled(rename = "Protein (g)")]
        protein: String,
        #[tabled(rename = "Sodium (mg)")]
        sodium: String,
        #[tabled(rename = "Sugar (g)")]
        sugar: String,
    }

    let pair = |actual: Option<f64>, goal: Option<f64>| {
        format!("{} / {}", fmt_opt(actual, 0), fmt_opt(goal, 0))
    };

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|r| Row {
            date: r.date.format("%Y-%m-%d").to_string(),
            weekday: r.weekday.clone(),
            calories: pair(r.calories_actual, r.calories_goal),
            carbs: pair(r.carbohydrates_actual, r.carbohydrates_goal),
            fat: pair(r.fat_actual, r.fat_goal),
            protein: pair(r.protein_actual, r.protein_goal),
            sodium: pair(r.sodium_actual, r.sodium_goal),
            sugar: pair(r.sugar_actual, r.sugar_goal),
        })
        .collect();

    let table = Table::new(&table_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("Values are actual / goal.");
}
