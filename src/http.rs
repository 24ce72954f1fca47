//! Retrying HTTP client shared by every external provider
//!
//! Requests run one attempt at a time. Connection failures, timeouts and
//! transient statuses (5xx, 408, 429) are retried with a fixed or exponential
//! backoff; other statuses surface immediately as [`HttpError::Status`]. A
//! TLS/certificate failure is retried exactly once with certificate
//! verification disabled. That path is weaker security and is reported back
//! through [`Fetched::insecure`].

use http::Extensions;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next, RequestBuilder};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{RetryDecision, RetryPolicy};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cascade::Failure;

/// Delay strategy between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// Exponential delay with jitter, bounded by `min..=max`
    Exponential { min: Duration, max: Duration },
}

impl Backoff {
    #[must_use]
    pub fn exponential(min: Duration, max: Duration) -> Self {
        Backoff::Exponential {
            min,
            max: max.max(min),
        }
    }

    /// Delay before retry number `past_retries + 1`
    fn delay(&self, started: SystemTime, past_retries: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { min, max } => {
                let policy = ExponentialBackoff::builder()
                    .retry_bounds(min, max)
                    .build_with_max_retries(u32::MAX);
                match policy.should_retry(started, past_retries) {
                    RetryDecision::Retry { execute_after } => execute_after
                        .duration_since(SystemTime::now())
                        .unwrap_or(Duration::ZERO),
                    RetryDecision::DoNotRetry => max,
                }
            }
        }
    }
}

/// Per-call limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl FetchOptions {
    #[must_use]
    pub fn new(timeout: Duration, max_retries: u32, backoff: Backoff) -> Self {
        Self {
            timeout,
            max_retries,
            backoff,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(10),
            2,
            Backoff::Fixed(Duration::from_millis(500)),
        )
    }
}

/// A successful response plus how it was obtained
#[derive(Debug)]
pub struct Fetched<T> {
    pub body: T,
    /// The response arrived over a connection without certificate verification
    pub insecure: bool,
}

/// Errors surfaced by [`RetryingHttpClient`]
#[derive(Error, Debug)]
pub enum HttpError {
    /// Retries exhausted; carries the last underlying cause
    #[error("network failure after {attempts} attempt(s): {cause}")]
    Network {
        attempts: u32,
        #[source]
        cause: reqwest_middleware::Error,
    },

    #[error("HTTP status {0}")]
    Status(u16),

    /// Body could not be decoded; never retried
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl HttpError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<HttpError> for Failure {
    fn from(err: HttpError) -> Self {
        Failure::ProviderUnavailable(err.to_string())
    }
}

/// Logs every request that goes through the client
struct RequestLogger;

#[async_trait::async_trait]
impl Middleware for RequestLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let url = redact_url(req.url().as_str());
        let started = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(response) => debug!(
                %method,
                %url,
                status = response.status().as_u16(),
                elapsed_ms,
                "HTTP request completed"
            ),
            Err(e) => debug!(%method, %url, elapsed_ms, "HTTP request failed: {}", e),
        }

        result
    }
}

/// HTTP client with retry, backoff and TLS-downgrade fallback
#[derive(Clone)]
pub struct RetryingHttpClient {
    client: ClientWithMiddleware,
    insecure: Option<ClientWithMiddleware>,
}

impl RetryingHttpClient {
    /// Create a client; `allow_insecure_fallback` enables the
    /// no-certificate-verification retry
    pub fn new(user_agent: &str, allow_insecure_fallback: bool) -> Result<Self, HttpError> {
        let client = Self::build(user_agent, false)?;
        let insecure = if allow_insecure_fallback {
            Some(Self::build(user_agent, true)?)
        } else {
            None
        };
        Ok(Self { client, insecure })
    }

    fn build(user_agent: &str, accept_invalid_certs: bool) -> Result<ClientWithMiddleware, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(ClientBuilder::new(client).with(RequestLogger).build())
    }

    /// GET `url` under the retry policy in `options`
    #[instrument(skip(self, options), fields(url = %redact_url(url)))]
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Fetched<Response>, HttpError> {
        self.execute(options, |client| client.get(url)).await
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Fetched<T>, HttpError> {
        let fetched = self.fetch(url, options).await?;
        let body = decode(fetched.body).await?;
        Ok(Fetched {
            body,
            insecure: fetched.insecure,
        })
    }

    /// POST a JSON body, optionally with a bearer token, and decode the JSON answer
    #[instrument(skip(self, body, bearer, options), fields(url = %redact_url(url)))]
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &B,
        options: &FetchOptions,
    ) -> Result<Fetched<T>, HttpError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| HttpError::Malformed(e.to_string()))?;

        let fetched = self
            .execute(options, |client| {
                let request = client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.clone());
                match bearer {
                    Some(key) => request.header(AUTHORIZATION, format!("Bearer {key}")),
                    None => request,
                }
            })
            .await?;

        let body = decode(fetched.body).await?;
        Ok(Fetched {
            body,
            insecure: fetched.insecure,
        })
    }

    async fn execute<F>(
        &self,
        options: &FetchOptions,
        build: F,
    ) -> Result<Fetched<Response>, HttpError>
    where
        F: Fn(&ClientWithMiddleware) -> RequestBuilder,
    {
        let started = SystemTime::now();
        let max_attempts = options.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Making HTTP request (attempt {}/{})", attempt, max_attempts);

            match build(&self.client).timeout(options.timeout).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(Fetched {
                            body: response,
                            insecure: false,
                        });
                    }

                    if is_retryable_status(status) && attempt < max_attempts {
                        warn!("HTTP {} on attempt {}, retrying", status, attempt);
                        self.pause(options, started, attempt - 1).await;
                        continue;
                    }

                    warn!("HTTP request failed with status {}", status);
                    return Err(HttpError::Status(status.as_u16()));
                }
                Err(err) if is_tls_failure(&err) => {
                    if let Some(insecure) = &self.insecure {
                        return Self::insecure_attempt(insecure, options, &build, attempt).await;
                    }
                    return Err(HttpError::Network {
                        attempts: attempt,
                        cause: err,
                    });
                }
                Err(err) if is_transient(&err) && attempt < max_attempts => {
                    warn!("Network error on attempt {}: {}", attempt, err);
                    self.pause(options, started, attempt - 1).await;
                }
                Err(err) => {
                    warn!("Network error after {} attempt(s): {}", attempt, err);
                    return Err(HttpError::Network {
                        attempts: attempt,
                        cause: err,
                    });
                }
            }
        }
    }

    async fn insecure_attempt<F>(
        client: &ClientWithMiddleware,
        options: &FetchOptions,
        build: &F,
        attempts_so_far: u32,
    ) -> Result<Fetched<Response>, HttpError>
    where
        F: Fn(&ClientWithMiddleware) -> RequestBuilder,
    {
        warn!("TLS verification failed; retrying once WITHOUT certificate verification");

        match build(client).timeout(options.timeout).send().await {
            Ok(response) if response.status().is_success() => {
                warn!("Response accepted over an unverified TLS connection");
                Ok(Fetched {
                    body: response,
                    insecure: true,
                })
            }
            Ok(response) => Err(HttpError::Status(response.status().as_u16())),
            Err(cause) => Err(HttpError::Network {
                attempts: attempts_so_far + 1,
                cause,
            }),
        }
    }

    async fn pause(&self, options: &FetchOptions, started: SystemTime, past_retries: u32) {
        let delay = options.backoff.delay(started, past_retries);
        if !delay.is_zero() {
            debug!("Backing off for {:.3}s", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    let bytes = response.bytes().await.map_err(|e| HttpError::Network {
        attempts: 1,
        cause: e.into(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| HttpError::Malformed(e.to_string()))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn is_transient(err: &reqwest_middleware::Error) -> bool {
    match err {
        reqwest_middleware::Error::Reqwest(e) => e.is_timeout() || e.is_connect(),
        reqwest_middleware::Error::Middleware(_) => false,
    }
}

const TLS_MARKERS: [&str; 4] = ["certificate", "tls", "ssl", "handshake"];

fn mentions_tls(err: &(dyn std::error::Error + 'static)) -> bool {
    let text = err.to_string().to_lowercase();
    TLS_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Certificate or handshake failure on an HTTPS request
///
/// Only the causes are inspected: the top-level reqwest message embeds the
/// request URL, which may contain any of the markers.
fn is_tls_failure(err: &reqwest_middleware::Error) -> bool {
    match err {
        reqwest_middleware::Error::Reqwest(e) => {
            if e.url().is_some_and(|url| url.scheme() != "https") {
                return false;
            }
            std::iter::successors(std::error::Error::source(e), |cause| cause.source())
                .any(mentions_tls)
        }
        reqwest_middleware::Error::Middleware(e) => e.chain().any(mentions_tls),
    }
}

/// Hide API keys passed as query parameters
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name.eq_ignore_ascii_case("key") => format!("{name}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}
