use reqwest::Method;
use serde_json::Value;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use super::config::ClientConfig;
use super::transport::{ApiRequest, Transport, TransportError};
use crate::error::{DatasourceError, DatasourceResult};
use crate::metrics;

/// Delays between attempts after connection failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub deadline: Option<Duration>,
}

impl BackoffPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            initial: config.initial_backoff,
            max: config.max_backoff,
            deadline: config.retry_deadline,
        }
    }

    /// Delay following `current`: doubled, capped at `max`
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

enum RetryState {
    Attempting { attempt: u32, delay: Duration },
    BackingOff { attempt: u32, delay: Duration },
    Succeeded(Value),
    FailedTerminal(DatasourceError),
}

/// Issues requests, retrying for as long as the server cannot be reached.
///
/// Any response carrying a status, including 5xx, ends the call.
#[derive(Debug, Clone)]
pub struct RequestClient<T> {
    transport: T,
    policy: BackoffPolicy,
}

impl<T: Transport> RequestClient<T> {
    pub fn new(transport: T, policy: BackoffPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> DatasourceResult<Value> {
        let request = ApiRequest::new(method, path, payload);
        let started = Instant::now();
        let mut state = RetryState::Attempting {
            attempt: 1,
            delay: self.policy.initial,
        };

        loop {
            state = match state {
                RetryState::Attempting { attempt, delay } => {
                    match self.transport.execute(&request).await {
                        Ok(body) => RetryState::Succeeded(body),
                        Err(TransportError::Unreachable(reason)) => {
                            let expired = self
                                .policy
                                .deadline
                                .map_or(false, |deadline| started.elapsed() + delay > deadline);
                            if expired {
                                RetryState::FailedTerminal(DatasourceError::RetriesExhausted {
                                    attempts: attempt,
                                    reason,
                                })
                            } else {
                                warn!(
                                    path = %request.path,
                                    attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %reason,
                                    "Request failed, retrying"
                                );
                                RetryState::BackingOff { attempt, delay }
                            }
                        }
                        Err(err) => {
                            warn!(path = %request.path, status = err.status(), "Request rejected");
                            metrics::record_request_failure(err.status());
                            RetryState::FailedTerminal(terminal_error(err))
                        }
                    }
                }
                RetryState::BackingOff { attempt, delay } => {
                    metrics::record_request_retry();
                    sleep(delay).await;
                    RetryState::Attempting {
                        attempt: attempt + 1,
                        delay: self.policy.next_delay(delay),
                    }
                }
                RetryState::Succeeded(body) => {
                    debug!(
                        path = %request.path,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Request succeeded"
                    );
                    return Ok(body);
                }
                RetryState::FailedTerminal(err) => return Err(err),
            };
        }
    }
}

fn terminal_error(err: TransportError) -> DatasourceError {
    match err {
        TransportError::Status { status, body } => DatasourceError::Api { status, body },
        TransportError::Decode { message, .. } => DatasourceError::Decode(message),
        TransportError::Unreachable(reason) => DatasourceError::RetriesExhausted {
            attempts: 1,
            reason,
        },
    }
}
