use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use tokio::time::{sleep, timeout, Instant};
use watch_logging::{watch_debug, watch_info};

use crate::decode::decode_markup;
use crate::extract::{JOBS_REGION, NOTIFICATIONS_REGION};
use crate::session::PortalSession;
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// How long to wait for the page and its content regions.
    pub wait_timeout: Duration,
    /// Pause between reloads while the regions are not there yet.
    pub poll_interval: Duration,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    /// Selectors that must all match before the page counts as ready.
    pub ready_selectors: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            ready_selectors: vec![JOBS_REGION.to_string(), NOTIFICATIONS_REGION.to_string()],
        }
    }
}

/// Loads the monitored page through an authenticated session.
#[async_trait::async_trait]
pub trait ContentFetcher<S: Sync>: Send + Sync {
    async fn fetch(&self, session: &S, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct PortalFetcher {
    settings: FetchSettings,
}

impl PortalFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn load(&self, client: &reqwest::Client, url: &reqwest::Url) -> Result<String, FetchError> {
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(decode_markup(&bytes, content_type.as_deref()))
    }
}

#[async_trait::async_trait]
impl ContentFetcher<PortalSession> for PortalFetcher {
    async fn fetch(&self, session: &PortalSession, url: &str) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let selectors = &self.settings.ready_selectors;
        let mut missing = missing_regions("", selectors)?;

        let deadline = Instant::now() + self.settings.wait_timeout;
        watch_info!("Navigating to target page {}", parsed);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let markup = match timeout(remaining, self.load(session.client(), &parsed)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(FetchError::new(
                        FailureKind::ContentNotReady { missing },
                        format!("page did not load within {:?}", self.settings.wait_timeout),
                    ))
                }
            };

            missing = missing_regions(&markup, selectors)?;
            if missing.is_empty() {
                watch_info!("Page content ready ({} bytes)", markup.len());
                return Ok(markup);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FetchError::new(
                    FailureKind::ContentNotReady { missing },
                    format!(
                        "content regions did not appear within {:?}",
                        self.settings.wait_timeout
                    ),
                ));
            }
            let pause = self.settings.poll_interval.min(remaining);
            watch_debug!("Waiting for {} to appear; retrying in {:?}", missing.join(", "), pause);
            sleep(pause).await;
        }
    }
}

/// Selectors from `selectors` that match nothing in `markup`.
fn missing_regions(markup: &str, selectors: &[String]) -> Result<Vec<String>, FetchError> {
    let doc = Html::parse_document(markup);
    let mut missing = Vec::new();
    for css in selectors {
        let selector = Selector::parse(css).map_err(|err| {
            FetchError::new(FailureKind::InvalidSelector, format!("{css}: {err}"))
        })?;
        if doc.select(&selector).next().is_none() {
            missing.push(css.clone());
        }
    }
    Ok(missing)
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
