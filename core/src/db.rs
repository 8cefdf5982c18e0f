use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::PawError;
use crate::models::{
    CardioRow, DailyEnergy, DayRows, DaySnapshot, GoalRow, LoadCounts, MealEntryRow, MealRow,
    MeasurementRow, NoteRow, NutrientTotals, NutritionDay, StoredSnapshot, StrengthRow,
    UserActivity, WaterRow,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const SNAPSHOTS: &str = "day_snapshots";
pub const MEALS: &str = "meals";
pub const MEAL_ENTRIES: &str = "meal_entries";
pub const NOTES: &str = "notes";
pub const WATER: &str = "water";
pub const GOALS: &str = "goals";
pub const CARDIO: &str = "cardio_exercises";
pub const STRENGTH: &str = "strength_exercises";
pub const MEASUREMENTS: &str = "measurements";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    fn configure(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign key enforcement")?;
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS day_snapshots (
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    loaded_at TEXT NOT NULL,
                    PRIMARY KEY (user, date)
                );

                CREATE TABLE IF NOT EXISTS meals (
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    name TEXT NOT NULL,
                    calories REAL,
                    carbohydrates REAL,
                    fat REAL,
                    protein REAL,
                    sodium REAL,
                    sugar REAL,
                    PRIMARY KEY (user, date, name),
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS meal_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    meal_name TEXT NOT NULL,
                    short_name TEXT NOT NULL,
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    calories REAL,
                    carbohydrates REAL,
                    fat REAL,
                    protein REAL,
                    sodium REAL,
                    sugar REAL,
                    FOREIGN KEY (user, date, meal_name)
                        REFERENCES meals(user, date, name) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS notes (
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    type TEXT NOT NULL,
                    body TEXT NOT NULL,
                    PRIMARY KEY (user, date),
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS water (
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    quantity REAL NOT NULL,
                    PRIMARY KEY (user, date),
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS goals (
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    calories REAL,
                    carbohydrates REAL,
                    fat REAL,
                    protein REAL,
                    sodium REAL,
                    sugar REAL,
                    PRIMARY KEY (user, date),
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS cardio_exercises (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    exercise_name TEXT NOT NULL,
                    minutes REAL,
                    calories_burned REAL,
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS strength_exercises (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    exercise_name TEXT NOT NULL,
                    sets REAL,
                    reps REAL,
                    weight REAL,
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS measurements (
                    user TEXT NOT NULL,
                    date TEXT NOT NULL,
                    measure_name TEXT NOT NULL,
                    value REAL NOT NULL,
                    PRIMARY KEY (user, date, measure_name),
                    FOREIGN KEY (user, date) REFERENCES day_snapshots(user, date) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_meal_entries_meal ON meal_entries(user, date, meal_name);
                CREATE INDEX IF NOT EXISTS idx_cardio_day ON cardio_exercises(user, date);
                CREATE INDEX IF NOT EXISTS idx_strength_day ON strength_exercises(user, date);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Fail unless this connection enforces foreign keys. Without enforcement
    /// the snapshot rewrite would leave stale children behind.
    fn ensure_foreign_keys(&self, relation: &'static str) -> Result<()> {
        let enabled: i64 = self
            .conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        if enabled != 1 {
            return Err(PawError::ForeignKeysDisabled { relation }.into());
        }
        Ok(())
    }

    /// Write one relation batch in its own transaction.
    fn write_batch<T>(
        &self,
        relation: &'static str,
        rows: &[T],
        write: impl Fn(&Connection, &T) -> rusqlite::Result<()>,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.ensure_foreign_keys(relation)?;

        self.run_in_transaction(rows, write)
            .map_err(|source| PawError::Load {
                relation,
                rows: rows.len(),
                source,
            })?;

        debug!(relation, rows = rows.len(), "relation batch committed");
        Ok(rows.len())
    }

    fn run_in_transaction<T>(
        &self,
        rows: &[T],
        write: impl Fn(&Connection, &T) -> rusqlite::Result<()>,
    ) -> rusqlite::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for row in rows {
            write(&tx, row)?;
        }
        tx.commit()
    }

    // --- Row mapping helpers ---

    fn date_from_row(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let text: String = row.get(idx)?;
        NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    // Expects six nutrient columns starting at `start`, in `NutrientTotals` field order.
    fn totals_from_row(row: &rusqlite::Row, start: usize) -> rusqlite::Result<NutrientTotals> {
        Ok(NutrientTotals {
            calories: row.get(start)?,
            carbohydrates: row.get(start + 1)?,
            fat: row.get(start + 2)?,
            protein: row.get(start + 3)?,
            sodium: row.get(start + 4)?,
            sugar: row.get(start + 5)?,
        })
    }

    fn snapshot_from_row(row: &rusqlite::Row) -> rusqlite::Result<DaySnapshot> {
        Ok(DaySnapshot {
            user: row.get(0)?,
            date: Self::date_from_row(row, 1)?,
            payload: row.get(2)?,
        })
    }

    // --- Snapshots ---

    /// Look up the stored payload for each key, preserving key order.
    pub fn select_snapshots(&self, keys: &[(String, NaiveDate)]) -> Result<Vec<StoredSnapshot>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT payload FROM day_snapshots WHERE user = ?1 AND date = ?2")?;
        let mut stored = Vec::with_capacity(keys.len());
        for (user, date) in keys {
            let date_str = date.format(DATE_FORMAT).to_string();
            let mut rows = stmt.query(params![user, date_str])?;
            let payload = match rows.next()? {
                Some(row) => Some(row.get::<_, String>(0)?),
                None => None,
            };
            stored.push(StoredSnapshot {
                user: user.clone(),
                date: *date,
                payload,
            });
        }
        Ok(stored)
    }

    pub fn get_snapshot(&self, user: &str, date: NaiveDate) -> Result<Option<DaySnapshot>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self
            .conn
            .prepare("SELECT user, date, payload FROM day_snapshots WHERE user = ?1 AND date = ?2")?;
        let mut rows = stmt.query(params![user, date_str])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::snapshot_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_snapshots_between(
        &self,
        user: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DaySnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT user, date, payload FROM day_snapshots
             WHERE user = ?1 AND date BETWEEN ?2 AND ?3
             ORDER BY date",
        )?;
        let snapshots = stmt
            .query_map(
                params![
                    user,
                    from.format(DATE_FORMAT).to_string(),
                    to.format(DATE_FORMAT).to_string()
                ],
                Self::snapshot_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    /// Replace each snapshot by (user, date). The delete runs first so every
    /// child row of the old version is removed by cascade.
    pub fn upsert_snapshots(&self, snapshots: &[DaySnapshot]) -> Result<usize> {
        let loaded_at = Local::now().to_rfc3339();
        self.write_batch(SNAPSHOTS, snapshots, |conn, s| {
            let date_str = s.date.format(DATE_FORMAT).to_string();
            conn.execute(
                "DELETE FROM day_snapshots WHERE user = ?1 AND date = ?2",
                params![s.user, date_str],
            )?;
            conn.execute(
                "INSERT INTO day_snapshots (user, date, payload, loaded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![s.user, date_str, s.payload, loaded_at],
            )?;
            Ok(())
        })
    }

    // --- Child relations ---

    /// Insert every child relation, parents first, one transaction per relation.
    pub fn load_rows(&self, rows: &DayRows) -> Result<LoadCounts> {
        Ok(LoadCounts {
            snapshots: 0,
            meals: self.insert_meals(&rows.meals)?,
            meal_entries: self.insert_meal_entries(&rows.meal_entries)?,
            notes: self.insert_notes(&rows.notes)?,
            water: self.insert_water(&rows.water)?,
            goals: self.insert_goals(&rows.goals)?,
            cardio: self.insert_cardio(&rows.cardio)?,
            strength: self.insert_strength(&rows.strength)?,
            measurements: self.insert_measurements(&rows.measurements)?,
        })
    }

    pub fn insert_meals(&self, rows: &[MealRow]) -> Result<usize> {
        self.write_batch(MEALS, rows, |conn, r| {
            let t = &r.totals;
            conn.execute(
                "INSERT INTO meals
                    (user, date, name, calories, carbohydrates, fat, protein, sodium, sugar)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    r.user,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.name,
                    t.calories,
                    t.carbohydrates,
                    t.fat,
                    t.protein,
                    t.sodium,
                    t.sugar
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_meal_entries(&self, rows: &[MealEntryRow]) -> Result<usize> {
        self.write_batch(MEAL_ENTRIES, rows, |conn, r| {
            let t = &r.totals;
            conn.execute(
                "INSERT INTO meal_entries
                    (user, date, meal_name, short_name, quantity, unit,
                     calories, carbohydrates, fat, protein, sodium, sugar)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    r.user,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.meal_name,
                    r.short_name,
                    r.quantity,
                    r.unit,
                    t.calories,
                    t.carbohydrates,
                    t.fat,
                    t.protein,
                    t.sodium,
                    t.sugar
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_notes(&self, rows: &[NoteRow]) -> Result<usize> {
        self.write_batch(NOTES, rows, |conn, r| {
            conn.execute(
                "INSERT INTO notes (user, date, type, body) VALUES (?1, ?2, ?3, ?4)",
                params![r.user, r.date.format(DATE_FORMAT).to_string(), r.kind, r.body],
            )?;
            Ok(())
        })
    }

    pub fn insert_water(&self, rows: &[WaterRow]) -> Result<usize> {
        self.write_batch(WATER, rows, |conn, r| {
            conn.execute(
                "INSERT INTO water (user, date, quantity) VALUES (?1, ?2, ?3)",
                params![r.user, r.date.format(DATE_FORMAT).to_string(), r.quantity],
            )?;
            Ok(())
        })
    }

    pub fn insert_goals(&self, rows: &[GoalRow]) -> Result<usize> {
        self.write_batch(GOALS, rows, |conn, r| {
            let t = &r.targets;
            conn.execute(
                "INSERT INTO goals
                    (user, date, calories, carbohydrates, fat, protein, sodium, sugar)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    r.user,
                    r.date.format(DATE_FORMAT).to_string(),
                    t.calories,
                    t.carbohydrates,
                    t.fat,
                    t.protein,
                    t.sodium,
                    t.sugar
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_cardio(&self, rows: &[CardioRow]) -> Result<usize> {
        self.write_batch(CARDIO, rows, |conn, r| {
            conn.execute(
                "INSERT INTO cardio_exercises (user, date, exercise_name, minutes, calories_burned)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    r.user,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.exercise_name,
                    r.minutes,
                    r.calories_burned
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_strength(&self, rows: &[StrengthRow]) -> Result<usize> {
        self.write_batch(STRENGTH, rows, |conn, r| {
            conn.execute(
                "INSERT INTO strength_exercises (user, date, exercise_name, sets, reps, weight)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    r.user,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.exercise_name,
                    r.sets,
                    r.reps,
                    r.weight
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_measurements(&self, rows: &[MeasurementRow]) -> Result<usize> {
        self.write_batch(MEASUREMENTS, rows, |conn, r| {
            conn.execute(
                "INSERT INTO measurements (user, date, measure_name, value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    r.user,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.measure_name,
                    r.value
                ],
            )?;
            Ok(())
        })
    }

    // --- Report queries ---

    /// Goal days from `start` onward with consumed and burned calories, ascending.
    pub fn get_daily_energy(&self, user: &str, start: NaiveDate) -> Result<Vec<DailyEnergy>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.date, g.calories,
                    (SELECT SUM(m.calories) FROM meals m
                      WHERE m.user = g.user AND m.date = g.date),
                    (SELECT COALESCE(SUM(c.calories_burned), 0) FROM cardio_exercises c
                      WHERE c.user = g.user AND c.date = g.date)
             FROM goals g
             WHERE g.user = ?1 AND g.date >= ?2
             ORDER BY g.date",
        )?;
        let days = stmt
            .query_map(
                params![user, start.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok(DailyEnergy {
                        date: Self::date_from_row(row, 0)?,
                        calories_target: row.get(1)?,
                        calories_consumed: row.get(2)?,
                        calories_burned: row.get(3)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(days)
    }

    /// Most recent value of a measure, matched case-insensitively.
    pub fn get_latest_measurement(&self, user: &str, measure: &str) -> Result<Option<f64>> {
        let mut stmt = self.conn.prepare(
            "SELECT value FROM measurements
             WHERE user = ?1 AND lower(measure_name) = lower(?2)
             ORDER BY date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![user, measure])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    /// Days in the range having both meals and a goal, with summed meal totals.
    pub fn get_nutrition_days(
        &self,
        user: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NutritionDay>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.date,
                    SUM(m.calories), SUM(m.carbohydrates), SUM(m.fat),
                    SUM(m.protein), SUM(m.sodium), SUM(m.sugar),
                    g.calories, g.carbohydrates, g.fat, g.protein, g.sodium, g.sugar
             FROM goals g
             JOIN meals m ON m.user = g.user AND m.date = g.date
             WHERE g.user = ?1 AND g.date BETWEEN ?2 AND ?3
             GROUP BY g.date
             ORDER BY g.date",
        )?;
        let days = stmt
            .query_map(
                params![
                    user,
                    from.format(DATE_FORMAT).to_string(),
                    to.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(NutritionDay {
                        date: Self::date_from_row(row, 0)?,
                        actual: Self::totals_from_row(row, 1)?,
                        goal: Self::totals_from_row(row, 7)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(days)
    }

    pub fn get_user_activity(&self) -> Result<Vec<UserActivity>> {
        let mut stmt = self.conn.prepare(
            "SELECT user, COUNT(*), MIN(date), MAX(date)
             FROM day_snapshots GROUP BY user ORDER BY user",
        )?;
        let users = stmt
            .query_map([], |row| {
                let days: i64 = row.get(1)?;
                Ok(UserActivity {
                    user: row.get(0)?,
                    days: usize::try_from(days).unwrap_or_default(),
                    first_date: Self::date_from_row(row, 2)?,
                    last_date: Self::date_from_row(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}
