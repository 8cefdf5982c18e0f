use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use paw_core::models::SyncSummary;
use paw_core::service::PawService;

use super::helpers::{print_json, resolve_window};
use crate::config::Config;
use crate::harvest::{DaySource, harvest_user};

#[derive(Serialize)]
struct SyncReport {
    summaries: Vec<SyncSummary>,
    failures: Vec<FailedDay>,
}

#[derive(Serialize)]
struct FailedDay {
    user: String,
    date: String,
    error: String,
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_sync<S: DaySource>(
    svc: &PawService,
    config: &Config,
    source: Arc<S>,
    user: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    force: bool,
    json: bool,
) -> Result<()> {
    let window = resolve_window(from, to)?;
    let users = config.select_users(user)?;

    let mut report = SyncReport {
        summaries: Vec::new(),
        failures: Vec::new(),
    };
    for user in users {
        let harvest = harvest_user(
            Arc::clone(&source),
            &user.name,
            &user.measures,
            window,
            config.source.retry,
            config.source.concurrency,
        )
        .await?;

        report
            .summaries
            .push(svc.sync_days(&user.name, &harvest.days, force)?);
        report
            .failures
            .extend(harvest.failures.into_iter().map(|f| FailedDay {
                user: user.name.clone(),
                date: f.date.format("%Y-%m-%d").to_string(),
                error: f.error.to_string(),
            }));
    }

    if json {
        print_json(&report)?;
    } else {
        print_sync_table(&report.summaries);
        for failure in &report.failures {
            eprintln!(
                "Failed to extract {} {}: {}",
                failure.user, failure.date, failure.error
            );
        }
    }

    if !report.failures.is_empty() {
        bail!(
            "{} day(s) could not be extracted; rerun sync to retry them",
            report.failures.len()
        );
    }
    Ok(())
}

fn print_sync_table(summaries: &[SyncSummary]) {
    #[derive(Tabled)]
    struct SyncRow {
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Extracted")]
        extracted: usize,
        #[tabled(rename = "New")]
        new: usize,
        #[tabled(rename = "Changed")]
        changed: usize,
        #[tabled(rename = "Unchanged")]
        unchanged: usize,
        #[tabled(rename = "Meals")]
        meals: usize,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Exercises")]
        exercises: usize,
        #[tabled(rename = "Measurements")]
        measurements: usize,
    }

    let rows: Vec<SyncRow> = summaries
        .iter()
        .map(|s| SyncRow {
            user: s.user.clone(),
            extracted: s.days_extracted,
            new: s.days_new,
            changed: s.days_changed,
            unchanged: s.days_unchanged,
            meals: s.loaded.meals,
            entries: s.loaded.meal_entries,
            exercises: s.loaded.cardio + s.loaded.strength,
            measurements: s.loaded.measurements,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
