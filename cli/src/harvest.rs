//! Concurrent extraction of a user's days from a [`DaySource`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use paw_core::extract::{FetchError, RemoteDay, RetryPolicy, measurements_on};
use paw_core::models::DayRecord;
use paw_core::window::DateWindow;

/// Remote source of per-day logs.
///
/// The CLI implements this over HTTP; tests use an in-memory fake.
pub trait DaySource: Send + Sync + 'static {
    fn fetch_day(
        &self,
        user: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<RemoteDay, FetchError>> + Send;

    /// Values of one measure by date. Unknown measures yield an empty map.
    fn fetch_measurement_series(
        &self,
        user: &str,
        measure: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<BTreeMap<NaiveDate, f64>, FetchError>> + Send;
}

/// A date whose extraction failed after all attempts.
#[derive(Debug)]
pub struct DateFailure {
    pub date: NaiveDate,
    pub error: FetchError,
}

#[derive(Debug, Default)]
pub struct Harvest {
    /// Successfully extracted days, ascending by date.
    pub days: Vec<DayRecord>,
    pub failures: Vec<DateFailure>,
}

/// Run `call` under the policy's per-attempt timeout, retrying transient failures.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut call: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt: u32 = 1;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout(), call()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transient(format!(
                "timed out after {}s",
                policy.timeout_secs
            ))),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(error) if policy.should_retry(attempt, &error) => {
                warn!(what, attempt, %error, "extraction failed, retrying");
                tokio::time::sleep(policy.delay()).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Extract every day of `window` for one user.
///
/// Measurement series are fetched once for the window; failures there abort
/// the harvest. Day fetches run concurrently, bounded by `concurrency`, and a
/// day that still fails after retries is reported in [`Harvest::failures`].
pub async fn harvest_user<S: DaySource>(
    source: Arc<S>,
    user: &str,
    measures: &[String],
    window: DateWindow,
    policy: RetryPolicy,
    concurrency: usize,
) -> Result<Harvest> {
    let mut series = BTreeMap::new();
    for measure in measures {
        let what = format!("{user} measurement {measure}");
        let values = with_retry(&policy, &what, || {
            source.fetch_measurement_series(user, measure, window.from, window.to)
        })
        .await
        .with_context(|| format!("extract stage failed for {user}: measurement '{measure}'"))?;
        if values.is_empty() {
            warn!(user, measure = %measure, "no measurements recorded in window");
        }
        series.insert(measure.clone(), values);
    }

    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for date in window.dates() {
        let source = Arc::clone(&source);
        let permits = Arc::clone(&permits);
        let user = user.to_string();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let what = format!("{user} {date}");
            let result = with_retry(&policy, &what, || {
                let source = Arc::clone(&source);
                let user = user.clone();
                async move { source.fetch_day(&user, date).await }
            })
            .await;
            (date, result)
        });
    }

    let mut harvest = Harvest::default();
    while let Some(joined) = tasks.join_next().await {
        let (date, result) = joined.context("extraction task panicked")?;
        match result {
            Ok(remote) => {
                debug!(user, %date, "day extracted");
                let measurements = measurements_on(&series, date);
                harvest
                    .days
                    .push(DayRecord::materialize(user, date, remote, measurements));
            }
            Err(error) => {
                warn!(user, %date, %error, "day extraction failed");
                harvest.failures.push(DateFailure { date, error });
            }
        }
    }
    harvest.days.sort_by_key(|d| d.date);
    harvest.failures.sort_by_key(|f| f.date);

    info!(
        user,
        extracted = harvest.days.len(),
        failed = harvest.failures.len(),
        "harvest finished"
    );
    Ok(harvest)
}
