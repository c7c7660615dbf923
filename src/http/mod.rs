// Shared blocking HTTP plumbing for the hosted services
// Every outbound call goes through one agent with a global timeout and the same retry policy

#[cfg(test)]
mod tests;

use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::HttpConfig;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const BACKOFF_UNIT_MS: u64 = 1000;

/// Largest response body accepted, boundary files can be several megabytes
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit: Duration,
}

impl HttpClient {
    #[inline]
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            agent: build_agent(config.timeout()),
            retry_attempts: config.retry_attempts.max(1),
            backoff_unit: Duration::from_millis(BACKOFF_UNIT_MS),
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Scale the delay between retries, tests use a few milliseconds
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// GET a URL with query parameters and return the body as text
    #[inline]
    pub fn get_text(&self, url: &str, query: &[(&str, &str)], user_agent: &str) -> Result<String> {
        self.request_with_retry(url, || {
            let mut request = self.agent.get(url).header("User-Agent", user_agent);
            for (key, value) in query {
                request = request.query(*key, *value);
            }
            request.call().and_then(|mut resp| {
                resp.body_mut()
                    .with_config()
                    .limit(MAX_BODY_BYTES)
                    .read_to_string()
            })
        })
    }

    /// POST a JSON document and return the body as text
    #[inline]
    pub fn post_json(&self, url: &str, body: &str) -> Result<String> {
        self.request_with_retry(url, || {
            self.agent
                .post(url)
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn request_with_retry<F>(&self, target: &str, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        warn!("Non-retryable error from {}: {}", target, error);
                        return Err(match error {
                            ureq::Error::StatusCode(status) => {
                                anyhow!("Client error: HTTP {}", status)
                            }
                            other => anyhow!("Non-retryable error: {}", other),
                        });
                    }

                    warn!(
                        "Retryable error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay =
                            self.backoff_unit * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) as u32;
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", target);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Server errors and transport failures are worth another attempt, client errors are not
fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}
