use std::collections::HashSet;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::db::Database;
use crate::decompose::decompose_all;
use crate::detect::{ChangeKind, detect_changes, force_all};
use crate::error::PawError;
use crate::models::{
    DayRecord, DaySnapshot, LoadCounts, SyncSummary, UserActivity, validate_day_record,
    validate_user,
};
use crate::nutrition::{NutritionRow, build_nutrition_rows};
use crate::progress::{BodyProfile, ProgressReport, ReportOptions, build_progress_series, build_report};
use crate::snapshot::{decode, encode_all};

/// Measure the progress report reads body weight from.
pub const WEIGHT_MEASURE: &str = "weight";

pub struct PawService {
    db: Database,
}

impl PawService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Synchronization ---

    /// Store freshly extracted days for one user.
    ///
    /// Only days whose canonical payload differs from the stored one are
    /// written, unless `force` is set. Every written snapshot is decoded before
    /// the first write, so a bad payload aborts the run with nothing stored.
    pub fn sync_days(&self, user: &str, days: &[DayRecord], force: bool) -> Result<SyncSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync", %run_id, user);
        let _guard = span.enter();

        validate_user(user)?;
        let mut seen = HashSet::new();
        for day in days {
            validate_day_record(day)?;
            if day.user != user {
                bail!("Day {} belongs to '{}', not '{user}'", day.date, day.user);
            }
            if !seen.insert(day.date) {
                bail!("Day {} was extracted more than once for '{user}'", day.date);
            }
        }

        let extracted = encode_all(days)?;
        let keys: Vec<(String, NaiveDate)> =
            extracted.iter().map(|s| (s.user.clone(), s.date)).collect();
        let stored = self.db.select_snapshots(&keys)?;

        let changes = if force {
            force_all(&extracted, &stored)
        } else {
            detect_changes(&extracted, &stored)
        };
        for change in &changes {
            debug!(
                date = %change.snapshot.date,
                kind = ?change.kind,
                old = change.old_digest.as_deref().unwrap_or("-"),
                new = %change.new_digest,
                "day queued for load"
            );
        }

        let days_new = changes.iter().filter(|c| c.kind == ChangeKind::New).count();
        let days_changed = changes.len() - days_new;
        let upserts: Vec<DaySnapshot> = changes.into_iter().map(|c| c.snapshot).collect();
        let loaded = self.load_snapshots(&upserts)?;

        let summary = SyncSummary {
            user: user.to_string(),
            days_extracted: days.len(),
            days_new,
            days_changed,
            days_unchanged: days.len() - upserts.len(),
            loaded,
        };
        info!(
            extracted = summary.days_extracted,
            new = summary.days_new,
            changed = summary.days_changed,
            unchanged = summary.days_unchanged,
            "sync finished"
        );
        Ok(summary)
    }

    /// Re-derive child rows from stored snapshots in the range, without
    /// extracting anything. Repairs days whose child load failed earlier.
    pub fn rebuild(&self, user: &str, from: NaiveDate, to: NaiveDate) -> Result<LoadCounts> {
        let span = info_span!("rebuild", user, %from, %to);
        let _guard = span.enter();

        validate_user(user)?;
        if from > to {
            bail!("Start date {from} is after end date {to}");
        }
        let snapshots = self.db.get_snapshots_between(user, from, to)?;
        let counts = self.load_snapshots(&snapshots)?;
        info!(days = counts.snapshots, "rebuild finished");
        Ok(counts)
    }

    fn load_snapshots(&self, snapshots: &[DaySnapshot]) -> Result<LoadCounts> {
        let decoded = snapshots
            .iter()
            .map(decode)
            .collect::<Result<Vec<DayRecord>>>()?;

        let written = self.db.upsert_snapshots(snapshots)?;
        let rows = decompose_all(&decoded);
        let mut counts = self.db.load_rows(&rows)?;
        counts.snapshots = written;
        debug!(snapshots = written, rows = rows.len(), "load finished");
        Ok(counts)
    }

    pub fn get_stored_day(&self, user: &str, date: NaiveDate) -> Result<Option<DayRecord>> {
        match self.db.get_snapshot(user, date)? {
            Some(snapshot) => Ok(Some(decode(&snapshot)?)),
            None => Ok(None),
        }
    }

    // --- Reports ---

    pub fn progress_report(
        &self,
        user: &str,
        start: NaiveDate,
        profile: &BodyProfile,
        options: &ReportOptions,
    ) -> Result<ProgressReport> {
        let weight = self
            .db
            .get_latest_measurement(user, WEIGHT_MEASURE)?
            .ok_or_else(|| PawError::MissingWeight {
                user: user.to_string(),
            })?;
        let days = self.db.get_daily_energy(user, start)?;
        let rows = build_progress_series(&days, profile.resting_expenditure(weight));
        let report = build_report(user, rows, options);
        if report.is_empty() {
            info!(user, "no progress data up to yesterday");
        }
        Ok(report)
    }

    pub fn nutrition_report(
        &self,
        user: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NutritionRow>> {
        let days = self.db.get_nutrition_days(user, from, to)?;
        Ok(build_nutrition_rows(&days))
    }

    pub fn get_user_activity(&self) -> Result<Vec<UserActivity>> {
        self.db.get_user_activity()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{Exercise, FoodEntry, Meal, Note, NutrientTotals};
    use crate::progress::ChartCategory;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
    }

    fn totals(calories: f64) -> NutrientTotals {
        NutrientTotals {
            calories: Some(calories),
            protein: Some(calories / 20.0),
            ..NutrientTotals::default()
        }
    }

    fn sample_day(day: u32, eaten: f64) -> DayRecord {
        let mut metrics = BTreeMap::new();
        metrics.insert("minutes".to_string(), 30.0);
        metrics.insert("calories burned".to_string(), 200.0);
        let mut measurements = BTreeMap::new();
        measurements.insert("Weight".to_string(), 80.0);
        DayRecord {
            user: "alice".to_string(),
            date: date(day),
            meals: vec![
                Some(Meal {
                    name: "breakfast".to_string(),
                    entries: vec![FoodEntry {
                        short_name: "oats".to_string(),
                        quantity: 1.0,
                        unit: "cup".to_string(),
                        totals: totals(eaten),
                    }],
                    totals: totals(eaten),
                }),
                None,
            ],
            exercises: vec![
                vec![Exercise {
                    name: "Running".to_string(),
                    metrics,
                }],
                Vec::new(),
            ],
            goals: Some(totals(1800.0)),
            notes: Some(Note {
                kind: "food".to_string(),
                body: String::new(),
            }),
            water: 1000.0,
            measurements,
        }
    }

    #[test]
    fn test_first_sync_loads_everything() {
        let svc = PawService::new_in_memory().unwrap();
        let summary = svc
            .sync_days("alice", &[sample_day(1, 1500.0), sample_day(2, 1600.0)], false)
            .unwrap();
        assert_eq!(summary.days_new, 2);
        assert_eq!(summary.days_changed, 0);
        assert_eq!(summary.loaded.snapshots, 2);
        assert_eq!(summary.loaded.meals, 2);
        assert_eq!(summary.loaded.meal_entries, 2);
        assert_eq!(summary.loaded.notes, 0);
        assert_eq!(summary.loaded.water, 2);
        assert_eq!(summary.loaded.goals, 2);
        assert_eq!(summary.loaded.cardio, 2);
        assert_eq!(summary.loaded.strength, 0);
        assert_eq!(summary.loaded.measurements, 2);
    }

    #[test]
    fn test_second_identical_sync_writes_nothing() {
        let svc = PawService::new_in_memory().unwrap();
        let days = [sample_day(1, 1500.0), sample_day(2, 1600.0)];
        svc.sync_days("alice", &days, false).unwrap();
        let summary = svc.sync_days("alice", &days, false).unwrap();
        assert_eq!(summary.days_unchanged, 2);
        assert_eq!(summary.loaded, LoadCounts::default());
    }

    #[test]
    fn test_forced_sync_rewrites_without_duplicates() {
        let svc = PawService::new_in_memory().unwrap();
        let days = [sample_day(1, 1500.0)];
        svc.sync_days("alice", &days, false).unwrap();
        let summary = svc.sync_days("alice", &days, true).unwrap();
        assert_eq!(summary.days_changed, 1);
        assert_eq!(summary.loaded.meals, 1);

        let nutrition = svc.nutrition_report("alice", date(1), date(1)).unwrap();
        assert_eq!(nutrition.len(), 1);
        assert_eq!(nutrition[0].calories_actual, Some(1500.0));
    }

    #[test]
    fn test_changed_day_children_are_rederived() {
        let svc = PawService::new_in_memory().unwrap();
        svc.sync_days("alice", &[sample_day(1, 1500.0)], false)
            .unwrap();

        let mut edited = sample_day(1, 1500.0);
        edited.meals = vec![Some(Meal {
            name: "dinner".to_string(),
            entries: Vec::new(),
            totals: totals(900.0),
        })];
        let summary = svc.sync_days("alice", &[edited], false).unwrap();
        assert_eq!(summary.days_changed, 1);
        assert_eq!(summary.loaded.meals, 1);
        assert_eq!(summary.loaded.meal_entries, 0);

        let nutrition = svc.nutrition_report("alice", date(1), date(1)).unwrap();
        assert_eq!(nutrition[0].calories_actual, Some(900.0));
    }

    #[test]
    fn test_forced_resync_keeps_row_counts() {
        const TABLES: [&str; 9] = [
            "day_snapshots",
            "meals",
            "meal_entries",
            "notes",
            "water",
            "goals",
            "cardio_exercises",
            "strength_exercises",
            "measurements",
        ];
        fn row_counts(path: &Path) -> Vec<i64> {
            let conn = rusqlite::Connection::open(path).unwrap();
            TABLES
                .iter()
                .map(|table| {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })
                    .unwrap()
                })
                .collect()
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paw.db");
        let svc = PawService::new(path.to_str().unwrap()).unwrap();

        let mut lifting = BTreeMap::new();
        lifting.insert("sets".to_string(), 3.0);
        lifting.insert("reps/set".to_string(), 8.0);
        lifting.insert("weight/set".to_string(), 60.0);
        let mut day = sample_day(1, 1500.0);
        day.exercises[1].push(Exercise {
            name: "Squat".to_string(),
            metrics: lifting,
        });
        day.notes = Some(Note {
            kind: "food".to_string(),
            body: "late dinner".to_string(),
        });
        let days = [day, sample_day(2, 1600.0)];

        svc.sync_days("alice", &days, false).unwrap();
        let first = row_counts(&path);
        assert_eq!(first, vec![2, 2, 2, 1, 2, 2, 2, 1, 2]);

        svc.sync_days("alice", &days, true).unwrap();
        assert_eq!(row_counts(&path), first);
        svc.sync_days("alice", &days, false).unwrap();
        assert_eq!(row_counts(&path), first);
    }

    #[test]
    fn test_duplicate_meal_names_rejected_before_write() {
        let svc = PawService::new_in_memory().unwrap();
        let snacks = || {
            Some(Meal {
                name: "snacks".to_string(),
                entries: Vec::new(),
                totals: totals(150.0),
            })
        };
        let mut bad = sample_day(2, 1600.0);
        bad.meals = vec![snacks(), snacks()];

        let err = svc
            .sync_days("alice", &[sample_day(1, 1500.0), bad], false)
            .unwrap_err();
        assert!(err.to_string().contains("snacks"));
        assert!(svc.get_user_activity().unwrap().is_empty());
        assert!(svc.get_stored_day("alice", date(1)).unwrap().is_none());

        let summary = svc
            .sync_days("alice", &[sample_day(1, 1500.0)], false)
            .unwrap();
        assert_eq!(summary.days_new, 1);
        assert_eq!(summary.loaded.meals, 1);
        assert_eq!(svc.nutrition_report("alice", date(1), date(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_dates_rejected_before_write() {
        let svc = PawService::new_in_memory().unwrap();
        let result = svc.sync_days("alice", &[sample_day(1, 1500.0), sample_day(1, 1400.0)], false);
        assert!(result.is_err());
        assert!(svc.get_user_activity().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_user_rejected() {
        let svc = PawService::new_in_memory().unwrap();
        let result = svc.sync_days("bob", &[sample_day(1, 1500.0)], false);
        assert!(result.is_err());
    }

    #[test]
    fn test_rebuild_restores_children() {
        let svc = PawService::new_in_memory().unwrap();
        svc.sync_days("alice", &[sample_day(1, 1500.0), sample_day(2, 1600.0)], false)
            .unwrap();
        let counts = svc.rebuild("alice", date(1), date(2)).unwrap();
        assert_eq!(counts.snapshots, 2);
        assert_eq!(counts.meals, 2);
        assert_eq!(counts.water, 2);
        assert!(svc.rebuild("alice", date(2), date(1)).is_err());
    }

    #[test]
    fn test_stored_day_round_trips() {
        let svc = PawService::new_in_memory().unwrap();
        let day = sample_day(3, 1500.0);
        svc.sync_days("alice", std::slice::from_ref(&day), false)
            .unwrap();
        assert_eq!(svc.get_stored_day("alice", date(3)).unwrap(), Some(day));
        assert!(svc.get_stored_day("alice", date(4)).unwrap().is_none());
    }

    #[test]
    fn test_progress_report_requires_weight() {
        let svc = PawService::new_in_memory().unwrap();
        let options = ReportOptions {
            end_goal: 10_000,
            window: 7,
            today: date(2),
        };
        let err = svc
            .progress_report("alice", date(1), &BodyProfile::default(), &options)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PawError>(),
            Some(PawError::MissingWeight { .. })
        ));
    }

    #[test]
    fn test_progress_report_end_to_end() {
        let svc = PawService::new_in_memory().unwrap();
        svc.sync_days("alice", &[sample_day(1, 1500.0), sample_day(2, 2500.0)], false)
            .unwrap();
        let profile = BodyProfile::default();
        let rmr = profile.resting_expenditure(80.0);
        let options = ReportOptions {
            end_goal: 10_000,
            window: 7,
            today: date(3),
        };

        let report = svc
            .progress_report("alice", date(1), &profile, &options)
            .unwrap();
        assert_eq!(report.rows.len(), 2);
        // actual = rmr - eaten + burned
        let first = (rmr - 1500.0 + 200.0).trunc() as i64;
        let second = (rmr - 2500.0 + 200.0).trunc() as i64;
        assert_eq!(report.rows[0].deficit_actual, first);
        assert_eq!(report.rows[1].deficit_accumulated, first + second);
        assert_eq!(report.current_day, Some(2));
        let chart = report.chart.unwrap();
        assert_eq!(
            chart.category,
            if second < 0 {
                ChartCategory::Warning
            } else {
                ChartCategory::OnTrack
            }
        );

        let stale = ReportOptions {
            today: date(5),
            ..options
        };
        assert!(
            svc.progress_report("alice", date(1), &profile, &stale)
                .unwrap()
                .is_empty()
        );
    }
}
