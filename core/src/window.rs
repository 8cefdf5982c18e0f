use anyhow::{Context, Result, bail};
use chrono::{Days, NaiveDate};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Inclusive range of days to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    /// The six days ending yesterday.
    pub fn default_for(today: NaiveDate) -> Result<Self> {
        let from = today
            .checked_sub_days(Days::new(6))
            .context("Date out of range")?;
        let to = today.pred_opt().context("Date out of range")?;
        Ok(Self { from, to })
    }

    /// Build a window from optional user-supplied bounds. Both or neither.
    pub fn resolve(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> Result<Self> {
        match (from, to) {
            (None, None) => Self::default_for(today),
            (Some(from), Some(to)) => {
                let window = Self {
                    from: parse_date(from)?,
                    to: parse_date(to)?,
                };
                if window.from > window.to {
                    bail!(
                        "Start date {} is after end date {}",
                        window.from,
                        window.to
                    );
                }
                Ok(window)
            }
            _ => bail!("Provide both --from and --to, or neither"),
        }
    }

    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.from.iter_days().take_while(|d| *d <= self.to).collect()
    }
}

/// Parse `YYYY-MM-DD` or `DD.MM.YYYY`.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .with_context(|| format!("Invalid date '{s}'; expected YYYY-MM-DD or DD.MM.YYYY"))
}
