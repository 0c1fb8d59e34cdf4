//! Relay bookkeeping: tokens, pending requests and broadcast buffers.
//!
//! The relay never validates chain content beyond the self-parent guard;
//! it hands out what it was given and lets the nodes judge it. All
//! methods take the current time as a parameter so the rules stay
//! testable without a clock.

use minibit_core::{Block, BlockError, Transaction};
use uuid::Uuid;

/// Retention and settling knobs.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Grace period before a full-sync request hands out its answers,
    /// milliseconds.
    pub settle_millis: u64,
    /// How long broadcast blocks and transactions stay served, milliseconds.
    pub buffer_retention_millis: u64,
    /// How long an unconsumed request may linger, milliseconds.
    pub request_ttl_millis: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            settle_millis: 3_000,
            buffer_retention_millis: 300_000,
            request_ttl_millis: 600_000,
        }
    }
}

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Blockchain,
    NewBlock,
    NewTransaction,
}

impl Target {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "blockchain" => Some(Target::Blockchain),
            "newblock" => Some(Target::NewBlock),
            "newtransac" => Some(Target::NewTransaction),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Blockchain => "blockchain",
            Target::NewBlock => "newblock",
            Target::NewTransaction => "newtransac",
        }
    }

    /// Immediate targets are answered from the buffers on `check` and never
    /// offered to other nodes.
    pub fn is_immediate(&self) -> bool {
        !matches!(self, Target::Blockchain)
    }
}

/// An open request waiting for answers or a buffer read.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub uuid: String,
    pub author: String,
    pub target: Target,
    pub created_millis: u64,
    pub answers: Vec<serde_json::Value>,
}

/// What `check` found for a uuid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Unknown,
    Settling,
    Ready(Vec<serde_json::Value>),
}

#[derive(Debug, Clone)]
struct Buffered<T> {
    received_millis: u64,
    value: T,
}

/// The whole broker state. Lives behind one mutex; every handler takes the
/// lock, does its bookkeeping and returns.
#[derive(Debug)]
pub struct RelayState {
    settings: RelaySettings,
    tokens: Vec<String>,
    requests: Vec<PendingRequest>,
    block_buffer: Vec<Buffered<Block>>,
    tx_buffer: Vec<Buffered<Transaction>>,
}

impl RelayState {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            settings,
            tokens: Vec::new(),
            requests: Vec::new(),
            block_buffer: Vec::new(),
            tx_buffer: Vec::new(),
        }
    }

    /// Hand out a fresh attribution token.
    pub fn register(&mut self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.push(token.clone());
        token
    }

    /// Registered-token count, the swarm size estimate served by `/nodesnum`.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Open a request and return its uuid and creation time. Requests past
    /// their ttl are dropped on the way in.
    pub fn open_request(&mut self, author: &str, target: Target, now: u64) -> (String, u64) {
        let ttl = self.settings.request_ttl_millis;
        self.requests
            .retain(|r| now.saturating_sub(r.created_millis) <= ttl);

        let uuid = Uuid::new_v4().to_string();
        self.requests.push(PendingRequest {
            uuid: uuid.clone(),
            author: author.to_string(),
            target,
            created_millis: now,
            answers: Vec::new(),
        });
        (uuid, now)
    }

    /// The oldest non-immediate request some other node is waiting on.
    pub fn next_pending(&self, poller: &str) -> Option<&PendingRequest> {
        self.requests
            .iter()
            .find(|r| !r.target.is_immediate() && r.author != poller)
    }

    /// Attach an answer to a request. False when the uuid is unknown.
    pub fn add_answer(&mut self, uuid: &str, body: serde_json::Value) -> bool {
        match self.requests.iter_mut().find(|r| r.uuid == uuid) {
            Some(request) => {
                request.answers.push(body);
                true
            }
            None => false,
        }
    }

    /// Resolve a request: immediate ones read the matching buffer, others
    /// hand out collected answers once the settling window has passed.
    /// A `Ready` outcome consumes the request.
    pub fn take_answers(&mut self, uuid: &str, now: u64) -> CheckOutcome {
        let index = match self.requests.iter().position(|r| r.uuid == uuid) {
            Some(index) => index,
            None => return CheckOutcome::Unknown,
        };

        if self.requests[index].target.is_immediate() {
            let request = self.requests.remove(index);
            let answers = match request.target {
                Target::NewBlock => serialize_buffer(&self.block_buffer),
                Target::NewTransaction => serialize_buffer(&self.tx_buffer),
                Target::Blockchain => Vec::new(),
            };
            return CheckOutcome::Ready(answers);
        }

        let age = now.saturating_sub(self.requests[index].created_millis);
        if age < self.settings.settle_millis {
            return CheckOutcome::Settling;
        }
        CheckOutcome::Ready(self.requests.remove(index).answers)
    }

    /// Buffer a broadcast block, refusing self-parented ones outright.
    pub fn buffer_block(&mut self, block: Block, now: u64) -> Result<(), BlockError> {
        block.ensure_not_self_parented()?;
        let retention = self.settings.buffer_retention_millis;
        self.block_buffer
            .retain(|b| now.saturating_sub(b.received_millis) <= retention);
        self.block_buffer.push(Buffered {
            received_millis: now,
            value: block,
        });
        Ok(())
    }

    /// Buffer a broadcast transaction.
    pub fn buffer_transaction(&mut self, tx: Transaction, now: u64) {
        let retention = self.settings.buffer_retention_millis;
        self.tx_buffer
            .retain(|t| now.saturating_sub(t.received_millis) <= retention);
        self.tx_buffer.push(Buffered {
            received_millis: now,
            value: tx,
        });
    }
}

fn serialize_buffer<T: serde::Serialize>(buffer: &[Buffered<T>]) -> Vec<serde_json::Value> {
    buffer
        .iter()
        .filter_map(|entry| serde_json::to_value(&entry.value).ok())
        .collect()
}
