//! HTTP client for the relay protocol.
//!
//! Every relay endpoint answers HTTP 200 with a JSON body whose `status`
//! field carries the verdict: `ok`, `warning` for soft conditions the
//! caller may retry or ignore, `error` and `fatal-error` for rejections.
//! Transport failures are retried on a fixed delay; rejections are not.

use minibit_core::{Block, BlockError, Transaction};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay rejected {op} ({status}): {reason}")]
    Rejected {
        op: &'static str,
        status: String,
        reason: String,
    },
    #[error("{op} still failing after {attempts} attempts")]
    Exhausted { op: &'static str, attempts: u32 },
    #[error(transparent)]
    Structural(#[from] BlockError),
    #[error("relay reply missing field `{0}`")]
    MissingField(&'static str),
    #[error("encoding answer body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Knobs for retries and the full-sync answer poll.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempts per operation before giving up on the relay.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Pause between answer polls during a full sync.
    pub poll_interval: Duration,
    /// Polls before a full sync gives up waiting for answers.
    pub poll_attempts: u32,
    /// Grace period peers get to notice a full-sync request.
    pub settle_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            poll_attempts: 20,
            settle_delay: Duration::from_secs(3),
        }
    }
}

/// A peer's pending full-sync request, handed out by `/jupdate`.
#[derive(Debug, Clone)]
pub struct PendingSync {
    pub uuid: String,
    pub target: String,
    pub timestamp: u64,
}

/// One relay reply. Which fields are present depends on the endpoint.
#[derive(Debug, Deserialize)]
struct Reply {
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    answers: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    num: Option<u64>,
}

/// A registered connection to one relay.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    config: SyncConfig,
}

impl RelayClient {
    /// Register with the relay and return a client carrying the issued token.
    pub async fn connect(base_url: impl Into<String>, config: SyncConfig) -> Result<Self, SyncError> {
        let mut client = Self::unregistered(base_url, config)?;
        client.token = client.register_token().await?;
        Ok(client)
    }

    /// Reuse a previously issued token instead of registering.
    pub fn with_token(
        base_url: impl Into<String>,
        config: SyncConfig,
        token: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let mut client = Self::unregistered(base_url, config)?;
        client.token = token.into();
        Ok(client)
    }

    fn unregistered(base_url: impl Into<String>, config: SyncConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token: String::new(),
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Ask the relay for a fresh attribution token.
    pub async fn register_token(&self) -> Result<String, SyncError> {
        let reply = self
            .with_retry("regtoken", || self.post("regtoken", json!({})))
            .await?;
        reply.token.ok_or(SyncError::MissingField("token"))
    }

    /// How many tokens the relay has handed out. An estimate of the swarm
    /// size, not a liveness count.
    pub async fn peer_count(&self) -> Result<u64, SyncError> {
        let reply = self
            .with_retry("nodesnum", || {
                self.post("nodesnum", json!({ "token": self.token }))
            })
            .await?;
        reply.num.ok_or(SyncError::MissingField("num"))
    }

    /// Open a request for `blockchain`, `newblock` or `newtransac` and
    /// return its uuid for later `check` calls.
    pub async fn request_update(&self, target: &str) -> Result<String, SyncError> {
        let reply = self
            .with_retry("update", || {
                self.post("update", json!({ "token": self.token, "target": target }))
            })
            .await?;
        reply.uuid.ok_or(SyncError::MissingField("uuid"))
    }

    /// Collect the answers for a request. `None` means the request is still
    /// inside its settling window; answers are consumed on first success.
    pub async fn check(&self, uuid: &str) -> Result<Option<Vec<serde_json::Value>>, SyncError> {
        let reply = self
            .with_retry("check", || {
                self.post("check", json!({ "token": self.token, "uuid": uuid }))
            })
            .await?;
        if reply.status == "warning" {
            return Ok(None);
        }
        Ok(Some(reply.answers.unwrap_or_default()))
    }

    /// The oldest pending request from another peer, if any.
    pub async fn fetch_pending(&self) -> Result<Option<PendingSync>, SyncError> {
        let reply = self
            .with_retry("jupdate", || {
                self.post("jupdate", json!({ "token": self.token }))
            })
            .await?;
        if reply.status == "warning" {
            return Ok(None);
        }
        match (reply.uuid, reply.target, reply.timestamp) {
            (Some(uuid), Some(target), Some(timestamp)) => Ok(Some(PendingSync {
                uuid,
                target,
                timestamp,
            })),
            _ => Err(SyncError::MissingField("uuid")),
        }
    }

    /// Answer a peer's pending request.
    pub async fn send_answer(&self, uuid: &str, body: &serde_json::Value) -> Result<(), SyncError> {
        self.with_retry("answer", || {
            self.post(
                "answer",
                json!({ "token": self.token, "uuid": uuid, "body": body }),
            )
        })
        .await?;
        Ok(())
    }

    /// Hand a mined block to the relay's broadcast buffer.
    pub async fn propagate_block(&self, block: &Block) -> Result<(), SyncError> {
        block.ensure_not_self_parented()?;
        self.with_retry("prp_block", || {
            self.post("prp_block", json!({ "token": self.token, "block": block }))
        })
        .await?;
        Ok(())
    }

    /// Hand a signed transaction to the relay's broadcast buffer.
    pub async fn propagate_transaction(&self, tx: &Transaction) -> Result<(), SyncError> {
        self.with_retry("prp_transaction", || {
            self.post(
                "prp_transaction",
                json!({ "token": self.token, "transaction": tx }),
            )
        })
        .await?;
        Ok(())
    }

    /// Run one relay call, retrying transport failures on a fixed delay.
    /// Rejections pass straight through; running out of attempts is final.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(SyncError::Transport(err)) if attempt < self.config.max_retries => {
                    warn!(op, attempt, error = %err, "relay unreachable, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(SyncError::Transport(err)) => {
                    warn!(op, attempt, error = %err, "relay unreachable, giving up");
                    return Err(SyncError::Exhausted {
                        op,
                        attempts: attempt,
                    });
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn post(&self, op: &'static str, body: serde_json::Value) -> Result<Reply, SyncError> {
        let url = format!("{}/{}", self.base_url, op);
        let reply: Reply = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        match reply.status.as_str() {
            "ok" | "warning" => Ok(reply),
            _ => Err(SyncError::Rejected {
                op,
                status: reply.status,
                reason: reply.reason.unwrap_or_default(),
            }),
        }
    }
}
