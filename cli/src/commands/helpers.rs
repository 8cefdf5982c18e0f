use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;

use paw_core::window::DateWindow;

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolve `--from`/`--to` against today's date.
pub(crate) fn resolve_window(from: Option<&str>, to: Option<&str>) -> Result<DateWindow> {
    DateWindow::resolve(from, to, today())
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.*}", decimals, no_neg_zero(v)))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn fmt_signed(v: i64) -> String {
    if v > 0 { format!("+{v}") } else { v.to_string() }
}
