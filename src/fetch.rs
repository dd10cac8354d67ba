use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

/// Failure taxonomy for one fetch. The retry loop keys off `is_transient`;
/// everything else is permanent for this run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout fetching {url}")]
    Timeout { url: String },
    #[error("connection error fetching {url}: {message}")]
    Connect { url: String, message: String },
    #[error("rate limited (429) at {url}")]
    RateLimited { url: String },
    #[error("server error {status} at {url}")]
    Server { status: u16, url: String },
    #[error("board not found (404) at {url}")]
    NotFound { url: String },
    #[error("HTTP {status} at {url}")]
    Http { status: u16, url: String },
    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. }
                | FetchError::Connect { .. }
                | FetchError::RateLimited { .. }
                | FetchError::Server { .. }
        )
    }

    /// A terminal signal from the provider: the board itself is gone, not
    /// just this request. Callers leave the company for re-verification.
    pub fn is_board_gone(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    /// Whether the provider actually answered; timeouts and connect
    /// failures never reached it.
    pub fn reached_provider(&self) -> bool {
        !matches!(
            self,
            FetchError::Timeout { .. } | FetchError::Connect { .. }
        )
    }
}

/// Bounded-concurrency HTTP fetcher with retry/backoff.
///
/// Two ceilings apply to every request: a global one sized for the runtime's
/// outbound capacity, and a per-host one so no single provider sees a burst.
/// The underlying client is replaced after enough consecutive transport
/// failures; a wedged connection pool must not absorb the whole retry budget.
pub struct Fetcher {
    client: Mutex<reqwest::Client>,
    global: Semaphore,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    transport_failures: AtomicU32,
    timeout_secs: u64,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_jitter_ms: u64,
    client_reset_threshold: u32,
    per_host_limit: usize,
}

impl Fetcher {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Fetcher {
            client: Mutex::new(build_client(config.timeout_secs)?),
            global: Semaphore::new(config.concurrency),
            per_host: Mutex::new(HashMap::new()),
            transport_failures: AtomicU32::new(0),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
            backoff_jitter_ms: config.backoff_jitter_ms,
            client_reset_threshold: config.client_reset_threshold,
            per_host_limit: config.per_host_limit,
        })
    }

    /// GET a JSON document, retrying transient failures with exponential
    /// backoff plus jitter. Exhausting the retry budget returns the last
    /// transient error as-is; the caller treats it as a company-level error.
    pub async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.request(url, Some("application/json")).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GET a plain-text document (seed lists, READMEs), same ceilings and
    /// retry behavior.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.request(url, None).await
    }

    async fn request(&self, url: &str, accept: Option<&str>) -> Result<String, FetchError> {
        let _global = self.global.acquire().await.map_err(|e| FetchError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let host_sem = self.host_semaphore(url);
        let _host = host_sem.acquire().await.map_err(|e| FetchError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            match self.request_once(url, accept).await {
                Ok(body) => {
                    self.transport_failures.store(0, Ordering::Relaxed);
                    return Ok(body);
                }
                Err(err) => {
                    if !err.reached_provider() {
                        self.note_transport_failure();
                    }
                    if err.is_transient() && attempt < self.max_retries {
                        let delay =
                            backoff_delay(attempt, self.backoff_base_ms, self.backoff_jitter_ms);
                        debug!(url, attempt, ?delay, "transient failure, backing off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn request_once(&self, url: &str, accept: Option<&str>) -> Result<String, FetchError> {
        let client = self.client.lock().expect("client lock poisoned").clone();
        let mut request = client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Connect {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        if let Some(err) = classify_status(status, url) {
            return Err(err);
        }

        response.text().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn note_transport_failure(&self) {
        let failures = self.transport_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.client_reset_threshold {
            warn!(
                failures,
                "replacing HTTP client after consecutive transport failures"
            );
            if let Ok(fresh) = build_client(self.timeout_secs) {
                *self.client.lock().expect("client lock poisoned") = fresh;
            }
            self.transport_failures.store(0, Ordering::Relaxed);
        }
    }

    fn host_semaphore(&self, url: &str) -> Arc<Semaphore> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let mut map = self.per_host.lock().expect("host map lock poisoned");
        map.entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }
}

fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("boardfeed/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Map an HTTP status to a fetch error; None means 2xx.
fn classify_status(status: u16, url: &str) -> Option<FetchError> {
    match status {
        200..=299 => None,
        404 | 410 => Some(FetchError::NotFound {
            url: url.to_string(),
        }),
        429 => Some(FetchError::RateLimited {
            url: url.to_string(),
        }),
        500..=599 => Some(FetchError::Server {
            status,
            url: url.to_string(),
        }),
        other => Some(FetchError::Http {
            status: other,
            url: url.to_string(),
        }),
    }
}

fn backoff_delay(attempt: u32, base_ms: u64, jitter_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(10));
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };
    Duration::from_millis(exp + jitter)
}
