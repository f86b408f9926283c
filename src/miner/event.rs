// src/miner/event.rs
//! Note events as they move through a mining run
//!
//! A [`MiningConfiguration`] is snapshotted into one [`CandidateEvent`] per
//! run. Workers receive the candidate serialized as JSON and the winner hands
//! back a [`MinedEvent`], which carries the nonce tag and the event id.

use crate::miner::algorithm::leading_zero_bits;
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of every mined event (short text note)
pub const TEXT_NOTE_KIND: u32 = 1;

/// Default target difficulty in leading zero bits
pub const DEFAULT_DIFFICULTY: u32 = 20;

/// Nostr-style tag list, each tag an ordered list of strings
pub type Tags = Vec<Vec<String>>;

/// Parameters of a mining run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfiguration {
    /// Note content
    pub content: String,
    /// Tags attached to the note, in order
    pub tags: Tags,
    /// Author public key (hex)
    pub public_key: String,
    /// Required leading zero bits of the event id
    pub difficulty: u32,
    /// Number of parallel workers
    pub worker_count: usize,
}

impl Default for MiningConfiguration {
    fn default() -> Self {
        Self {
            content: String::new(),
            tags: Vec::new(),
            public_key: String::new(),
            difficulty: DEFAULT_DIFFICULTY,
            worker_count: num_cpus::get().max(1),
        }
    }
}

impl MiningConfiguration {
    /// Checks that a run can be started from this configuration
    ///
    /// # Errors
    /// `ConfigError` when the public key or content is empty or no workers
    /// are requested.
    pub fn validate(&self) -> Result<(), MinerError> {
        if self.public_key.is_empty() {
            return Err(MinerError::ConfigError("Public key is not set.".into()));
        }
        if self.content.is_empty() {
            return Err(MinerError::ConfigError("Content is not set.".into()));
        }
        if self.worker_count == 0 {
            return Err(MinerError::ConfigError(
                "Worker count must be at least 1.".into(),
            ));
        }
        Ok(())
    }
}

/// Unsigned event searched by every worker of one run
///
/// `created_at` is fixed once per run; workers hashing different timestamps
/// would be searching different preimages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEvent {
    /// Author public key
    pub pubkey: String,
    /// Event kind
    pub kind: u32,
    /// Tags, without the nonce tag
    pub tags: Tags,
    /// Note content
    pub content: String,
    /// Unix seconds at submission
    pub created_at: u64,
}

impl CandidateEvent {
    /// Builds the candidate for a run started at `created_at`
    pub fn new(config: &MiningConfiguration, created_at: u64) -> Self {
        Self {
            pubkey: config.public_key.clone(),
            kind: TEXT_NOTE_KIND,
            tags: config.tags.clone(),
            content: config.content.clone(),
            created_at,
        }
    }

    /// Serializes the candidate for hand-off to a worker
    pub fn to_json(&self) -> Result<String, MinerError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a candidate handed to a worker
    pub fn from_json(payload: &str) -> Result<Self, MinerError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Finalized event ready for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedEvent {
    /// Hex encoded sha256 of the canonical serialization
    pub id: String,
    /// Author public key
    pub pubkey: String,
    /// Unix seconds at submission
    pub created_at: u64,
    /// Event kind
    pub kind: u32,
    /// Tags including the trailing nonce tag
    pub tags: Tags,
    /// Note content
    pub content: String,
}

impl MinedEvent {
    fn digest(&self) -> [u8; 32] {
        let canonical = json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ]);
        Sha256::digest(canonical.to_string().as_bytes()).into()
    }

    /// Recomputes the event id from the other fields
    pub fn compute_id(&self) -> String {
        hex::encode(self.digest())
    }

    /// True when `id` matches the event contents
    pub fn has_valid_id(&self) -> bool {
        self.id == self.compute_id()
    }

    /// The nonce tag appended by the miner, if present
    pub fn nonce_tag(&self) -> Option<&[String]> {
        self.tags
            .iter()
            .rev()
            .find(|tag| tag.first().map(String::as_str) == Some("nonce"))
            .map(Vec::as_slice)
    }

    /// Proof of work this event can claim
    ///
    /// The leading zero bits of the recomputed id, capped at the target
    /// committed in the nonce tag. Zero when the nonce tag is missing, has
    /// no target, or the target is not a number.
    pub fn pow_difficulty(&self) -> u32 {
        let Some(target) = self
            .nonce_tag()
            .and_then(|tag| tag.get(2))
            .and_then(|target| target.parse::<u32>().ok())
        else {
            return 0;
        };
        leading_zero_bits(&self.digest()).min(target)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedResult {
    /// The finalized event
    pub event: MinedEvent,
    /// Wall-clock seconds the winning worker spent
    pub total_time_seconds: f64,
    /// Winning worker's average hash rate (hashes per second)
    pub hash_rate: f64,
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MiningConfiguration {
        MiningConfiguration {
            content: "hello".into(),
            tags: vec![vec!["t".into(), "pow".into()]],
            public_key: "abc".into(),
            difficulty: 4,
            worker_count: 2,
        }
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let mut cfg = config();
        cfg.public_key.clear();
        assert!(matches!(cfg.validate(), Err(MinerError::ConfigError(_))));

        let mut cfg = config();
        cfg.content.clear();
        assert!(matches!(cfg.validate(), Err(MinerError::ConfigError(_))));

        let mut cfg = config();
        cfg.worker_count = 0;
        assert!(matches!(cfg.validate(), Err(MinerError::ConfigError(_))));

        assert!(config().validate().is_ok());
    }

    #[test]
    fn candidate_json_roundtrips_fields() {
        let candidate = CandidateEvent::new(&config(), 1_700_000_000);
        let parsed = CandidateEvent::from_json(&candidate.to_json().unwrap()).unwrap();
        assert_eq!(parsed, candidate);
        assert_eq!(parsed.kind, TEXT_NOTE_KIND);
        assert_eq!(parsed.pubkey, "abc");
    }

    #[test]
    fn compute_id_detects_tampering() {
        let mut event = MinedEvent {
            id: String::new(),
            pubkey: "abc".into(),
            created_at: 1,
            kind: TEXT_NOTE_KIND,
            tags: vec![vec!["nonce".into(), "7".into(), "4".into()]],
            content: "hello".into(),
        };
        event.id = event.compute_id();
        assert!(event.has_valid_id());
        assert_eq!(event.nonce_tag().unwrap()[1], "7");

        event.content.push('!');
        assert!(!event.has_valid_id());
    }

    fn with_tags(tags: Tags) -> MinedEvent {
        let mut event = MinedEvent {
            id: String::new(),
            pubkey: "abc".into(),
            created_at: 1,
            kind: TEXT_NOTE_KIND,
            tags,
            content: "hello".into(),
        };
        event.id = event.compute_id();
        event
    }

    #[test]
    fn pow_difficulty_needs_a_full_nonce_tag() {
        assert_eq!(with_tags(Vec::new()).pow_difficulty(), 0);
        assert_eq!(with_tags(vec![vec!["t".into(), "pow".into()]]).pow_difficulty(), 0);
        assert_eq!(
            with_tags(vec![vec!["nonce".into(), "7".into()]]).pow_difficulty(),
            0
        );
        assert_eq!(
            with_tags(vec![vec!["nonce".into(), "7".into(), "lots".into()]]).pow_difficulty(),
            0
        );
    }

    #[test]
    fn pow_difficulty_is_capped_by_the_committed_target() {
        let event = with_tags(vec![vec!["nonce".into(), "7".into(), "0".into()]]);
        assert_eq!(event.pow_difficulty(), 0);

        let event = with_tags(vec![vec!["nonce".into(), "7".into(), "256".into()]]);
        let bits = leading_zero_bits(&hex::decode(&event.id).unwrap());
        assert_eq!(event.pow_difficulty(), bits);
    }
}
