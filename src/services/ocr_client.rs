//! Client for the asynchronous read (OCR) service.
//!
//! The remote protocol has two phases: a POST carrying the raw image returns
//! an `operation-location` URL, which is then polled with GETs until the
//! operation reports `succeeded` or `failed`. `OcrClient` hides both phases
//! behind [`OcrClient::analyze`].
//!
//! Polling is a small state machine (`PollState`) advanced by the pure
//! [`next_state`] function; the client only performs I/O and sleeps.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::OcrSettings,
    models::ocr::{CompletedRead, OcrResponse, OcrStatus},
};

const OPERATION_LOCATION_HEADER: &str = "operation-location";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR submission returned no operation-location header")]
    MissingOperationLocation,
    #[error("OCR operation `{operation_location}` failed")]
    AnalysisFailed { operation_location: String },
    #[error("OCR operation did not finish after {attempts} polls")]
    AnalysisTimeout { attempts: u32 },
    #[error("OCR service answered HTTP {status} during {stage}")]
    UnexpectedStatus { stage: &'static str, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

/// The two HTTP exchanges of the read protocol.
#[async_trait]
pub trait OcrTransport: Send + Sync {
    /// Upload the image; yields the `operation-location` header if present.
    async fn submit(&self, image: Bytes) -> Result<Option<String>, OcrError>;

    /// Fetch the current state of an operation as raw JSON.
    async fn fetch(&self, operation_location: &str) -> Result<serde_json::Value, OcrError>;
}

/// reqwest-backed transport talking to the configured endpoint.
pub struct HttpOcrTransport {
    client: reqwest::Client,
    endpoint: String,
    key_header: String,
    api_key: SecretString,
}

impl HttpOcrTransport {
    pub fn new(settings: &OcrSettings) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            key_header: settings.key_header.clone(),
            api_key: SecretString::from(settings.api_key.expose_secret().to_owned()),
        })
    }
}

#[async_trait]
impl OcrTransport for HttpOcrTransport {
    async fn submit(&self, image: Bytes) -> Result<Option<String>, OcrError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(self.key_header.as_str(), self.api_key.expose_secret())
            .body(image)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::UnexpectedStatus {
                stage: "submit",
                status: status.as_u16(),
            });
        }

        Ok(response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string))
    }

    async fn fetch(&self, operation_location: &str) -> Result<serde_json::Value, OcrError> {
        let response = self
            .client
            .get(operation_location)
            .header(self.key_header.as_str(), self.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::UnexpectedStatus {
                stage: "poll",
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }
}

/// How often and how long to poll an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    /// Fixed delay between attempts; there is no backoff.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// Lifecycle of one OCR operation.
#[derive(Debug)]
pub enum PollState {
    Submitted { operation_location: String },
    Polling { operation_location: String, attempts: u32 },
    Succeeded(CompletedRead),
    Failed { operation_location: String },
    TimedOut { attempts: u32 },
}

/// Fold one polling response into the state machine.
///
/// `attempts` counts polls made before this response.
pub fn next_state(
    operation_location: String,
    attempts: u32,
    response: OcrResponse,
    raw: serde_json::Value,
    max_attempts: u32,
) -> PollState {
    let attempts = attempts + 1;
    match response.status() {
        OcrStatus::Succeeded => PollState::Succeeded(CompletedRead { response, raw }),
        OcrStatus::Failed => PollState::Failed { operation_location },
        OcrStatus::Running(_) if attempts >= max_attempts => PollState::TimedOut { attempts },
        OcrStatus::Running(_) => PollState::Polling {
            operation_location,
            attempts,
        },
    }
}

/// Submit-and-poll front end over an [`OcrTransport`].
#[derive(Clone)]
pub struct OcrClient {
    transport: Arc<dyn OcrTransport>,
    policy: PollPolicy,
}

impl OcrClient {
    pub fn new(transport: Arc<dyn OcrTransport>, policy: PollPolicy) -> Self {
        Self { transport, policy }
    }

    /// Run the full round-trip for one image.
    pub async fn analyze(&self, image: Bytes) -> Result<CompletedRead, OcrError> {
        let operation_location = self.submit(image).await?;
        self.poll(operation_location).await
    }

    /// Start an operation. A response without `operation-location` is fatal.
    pub async fn submit(&self, image: Bytes) -> Result<String, OcrError> {
        self.transport
            .submit(image)
            .await?
            .ok_or(OcrError::MissingOperationLocation)
    }

    /// Poll until a terminal status or until the attempt budget is spent.
    pub async fn poll(&self, operation_location: String) -> Result<CompletedRead, OcrError> {
        let mut state = PollState::Submitted { operation_location };
        loop {
            state = match state {
                PollState::Submitted { operation_location } => {
                    self.poll_once(operation_location, 0).await?
                }
                PollState::Polling {
                    operation_location,
                    attempts,
                } => {
                    debug!(
                        attempts,
                        max_attempts = self.policy.max_attempts,
                        "OCR operation still running"
                    );
                    tokio::time::sleep(self.policy.interval).await;
                    self.poll_once(operation_location, attempts).await?
                }
                PollState::Succeeded(read) => return Ok(read),
                PollState::Failed { operation_location } => {
                    return Err(OcrError::AnalysisFailed { operation_location });
                }
                PollState::TimedOut { attempts } => {
                    return Err(OcrError::AnalysisTimeout { attempts });
                }
            };
        }
    }

    async fn poll_once(
        &self,
        operation_location: String,
        attempts: u32,
    ) -> Result<PollState, OcrError> {
        let raw = self.transport.fetch(&operation_location).await?;
        let response: OcrResponse = serde_json::from_value(raw.clone())?;
        Ok(next_state(
            operation_location,
            attempts,
            response,
            raw,
            self.policy.max_attempts,
        ))
    }
}
