//! Retrying connect-per-call proxy.

use crate::client::{Client, ClientConfig};
use crate::error::ClientError;
use serde_json::Value;
use wirecall_protocol::RpcResponse;

/// Client wrapper that re-attempts a call over fresh connections, up to
/// the configured attempt count. This is the primary calling surface; the
/// non-retrying [`Client`] is its internal collaborator.
///
/// Each attempt dials anew, invokes once, and closes its connection.
/// There is no backoff between attempts and no deadline spanning the
/// whole sequence; the per-attempt timeout bounds each try.
pub struct RpcProxy {
    config: ClientConfig,
}

impl RpcProxy {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Calls `service.method(args)`.
    ///
    /// Transport failures (dial errors, resets, timeouts) are retried; an
    /// error-coded response is a completed call and is returned to the
    /// caller unchanged. After the final failed attempt the last transport
    /// error is surfaced.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<RpcResponse, ClientError> {
        let attempts = self.config.retries;
        let mut last_err = ClientError::NoAttempts;

        for attempt in 1..=attempts {
            let client = match Client::connect(self.config.clone()).await {
                Ok(client) => client,
                Err(e) => {
                    tracing::debug!("connect attempt {}/{} failed: {}", attempt, attempts, e);
                    last_err = e;
                    continue;
                }
            };

            match client.invoke(service, method, args.clone()).await {
                Ok(response) => {
                    client.close().await;
                    return Ok(response);
                }
                Err(e) => {
                    tracing::debug!("call attempt {}/{} failed: {}", attempt, attempts, e);
                    client.close().await;
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}
