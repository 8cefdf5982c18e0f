use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use paw_core::extract::{FetchError, RemoteDay};

use crate::config::SourceConfig;
use crate::harvest::DaySource;

/// JSON-over-HTTP day source.
///
/// `GET {base}/users/{user}/days/{date}` returns one day;
/// `GET {base}/users/{user}/measurements/{measure}?from=..&to=..` returns a
/// `{date: value}` map, or 404 when the user never recorded that measure.
pub struct HttpDaySource {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpDaySource {
    pub fn new(config: &SourceConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("paw/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.retry.timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid source base_url: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Source base_url must be an http(s) URL: {}", config.base_url);
        }
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn day_url(&self, user: &str, date: NaiveDate) -> Url {
        let date = date.format("%Y-%m-%d").to_string();
        self.endpoint(&["users", user, "days", &date])
    }

    fn measurement_url(&self, user: &str, measure: &str) -> Url {
        self.endpoint(&["users", user, "measurements", measure])
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Option<T>, FetchError> {
        let mut request = self.client.get(url.clone()).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await.map_err(classify_transport)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if is_transient_status(status) {
            return Err(FetchError::Transient(format!("{url} returned HTTP {status}")));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await.map_err(classify_transport)?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| FetchError::Decode(format!("{url}: {e}")))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_transport(e: reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        FetchError::Transient(e.to_string())
    } else {
        FetchError::Rejected {
            status: e.status().map_or(0, |s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl DaySource for HttpDaySource {
    async fn fetch_day(&self, user: &str, date: NaiveDate) -> Result<RemoteDay, FetchError> {
        let url = self.day_url(user, date);
        self.get_json(url, &[])
            .await?
            .ok_or_else(|| FetchError::Rejected {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("no day {date} for user '{user}'"),
            })
    }

    async fn fetch_measurement_series(
        &self,
        user: &str,
        measure: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>, FetchError> {
        let url = self.measurement_url(user, measure);
        let query = [
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
        ];
        Ok(self.get_json(url, &query).await?.unwrap_or_default())
    }
}
