//! Outbound HTTP acquisition for site extractors.
//!
//! Wraps `reqwest` with the behaviors scraped sites demand: a rotated
//! user-agent pool, locale-appropriate headers, explicit gzip/brotli
//! decoding, and bounded retries on the statuses anti-bot layers return.

use rand::Rng;
use reqwest::{Client, Method, header};
use std::io::Read;
use std::time::Duration;
use tokio::time::sleep;

use crate::AppError;
use crate::config::FetcherConfig;

/// Per-site request shaping: language and referer matching the target site.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub accept_language: String,
    pub referer: Option<String>,
}

impl HeaderProfile {
    pub fn new(accept_language: &str) -> Self {
        Self {
            accept_language: accept_language.to_string(),
            referer: None,
        }
    }

    pub fn with_referer(accept_language: &str, referer: &str) -> Self {
        Self {
            accept_language: accept_language.to_string(),
            referer: Some(referer.to_string()),
        }
    }
}

/// HTTP client for scraping with retry and decoding behavior.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    /// Builds the underlying client. Decompression stays manual so decode
    /// failures surface as their own error kind.
    pub fn new(config: FetcherConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Issues a GET and returns the decoded body.
    pub async fn get(&self, url: &str, profile: &HeaderProfile) -> Result<String, AppError> {
        self.execute(Method::GET, url, None, profile).await
    }

    /// Issues a POST with a JSON body and returns the decoded response body.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        profile: &HeaderProfile,
    ) -> Result<String, AppError> {
        self.execute(Method::POST, url, Some(body), profile).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        profile: &HeaderProfile,
    ) -> Result<String, AppError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = AppError::Transport(format!("No attempt issued for {}", url));

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.backoff_delay(attempt);
                tracing::warn!(
                    url = %url,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying request"
                );
                sleep(backoff).await;
            }

            sleep(self.jitter_delay()).await;

            let request = self.build_request(method.clone(), url, body, profile)?;

            match self.client.execute(request).await {
                Err(e) => {
                    last_error = AppError::Transport(format!("Request to {} failed: {}", url, e));
                }
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.read_body(response).await;
                    }

                    if AppError::is_retryable_status(status.as_u16()) {
                        tracing::warn!(url = %url, status = status.as_u16(), "Gated response");
                        last_error = AppError::Blocked {
                            status: status.as_u16(),
                            url: url.to_string(),
                        };
                    } else {
                        // Plain bad statuses are terminal, retrying will not help
                        return Err(AppError::BadStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                }
            }
        }

        Err(last_error)
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        profile: &HeaderProfile,
    ) -> Result<reqwest::Request, AppError> {
        let mut builder = self
            .client
            .request(method, url)
            .header(header::USER_AGENT, self.pick_user_agent())
            .header(
                header::ACCEPT,
                "text/html,application/json,application/xhtml+xml,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, profile.accept_language.as_str())
            .header(header::ACCEPT_ENCODING, "gzip, br");

        if let Some(referer) = &profile.referer {
            builder = builder.header(header::REFERER, referer.as_str());
        }

        if let Some(json) = body {
            builder = builder.json(json);
        }

        builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build request for {}: {}", url, e)))
    }

    fn pick_user_agent(&self) -> &str {
        let pool = &self.config.user_agents;
        let index = rand::thread_rng().gen_range(0..pool.len());
        pool[index].as_str()
    }

    fn jitter_delay(&self) -> Duration {
        let min = self.config.min_delay_ms;
        let max = self.config.max_delay_ms.max(min);
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_millis(ms)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms;
        Duration::from_millis((attempt as u64 * base).min(base * 5))
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String, AppError> {
        let url = response.url().to_string();
        let encoding = response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_lowercase());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to read body from {}: {}", url, e)))?;

        decode_body(encoding.as_deref(), &bytes, &url)
    }
}

/// Decodes a response body according to its `Content-Encoding`.
///
/// Unknown encodings are passed through raw rather than failing the fetch.
fn decode_body(encoding: Option<&str>, bytes: &[u8], url: &str) -> Result<String, AppError> {
    match encoding {
        None | Some("") | Some("identity") => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Some("gzip") => {
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| AppError::Decode(format!("gzip decode failed for {}: {}", url, e)))?;
            Ok(String::from_utf8_lossy(&decoded).into_owned())
        }
        Some("br") => {
            let mut decoder = brotli::Decompressor::new(bytes, 4096);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| AppError::Decode(format!("brotli decode failed for {}: {}", url, e)))?;
            Ok(String::from_utf8_lossy(&decoded).into_owned())
        }
        Some(other) => {
            tracing::warn!(url = %url, encoding = %other, "Unknown content encoding, returning raw body");
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
