// src/miner/algorithm/nip13.rs
//! NIP-13 proof of work
//!
//! The event id is the sha256 of the compact JSON array
//! `[0, pubkey, created_at, kind, tags, content]`. Mining appends a
//! `["nonce", "<n>", "<difficulty>"]` tag and searches for an id with at
//! least `difficulty` leading zero bits.

use crate::miner::algorithm::{CancelFn, MinePrimitive, MiningJob, ProgressFn};
use crate::miner::event::{CandidateEvent, MinedEvent, MinedResult};
use crate::types::ProofOfWork;
use crate::utils::error::MinerError;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Nonces hashed between two cancellation polls
const CANCEL_POLL_INTERVAL: u64 = 4096;

/// Counts the leading zero bits of a digest
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut bits = 0;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// sha256 state with everything before the nonce already absorbed
struct Preimage {
    prefix: Sha256,
    suffix: String,
}

impl Preimage {
    fn new(event: &CandidateEvent, difficulty: u32) -> Result<Self, MinerError> {
        let tags = serde_json::to_string(&event.tags)?;
        // Reopen the tag array so the nonce tag lands as its last element.
        let open_tags = &tags[..tags.len() - 1];
        let separator = if event.tags.is_empty() { "" } else { "," };

        let prefix = format!(
            "[0,{},{},{},{}{}[\"nonce\",\"",
            serde_json::to_string(&event.pubkey)?,
            event.created_at,
            event.kind,
            open_tags,
            separator
        );
        let suffix = format!(
            "\",\"{}\"]],{}]",
            difficulty,
            serde_json::to_string(&event.content)?
        );

        Ok(Self {
            prefix: Sha256::new_with_prefix(prefix.as_bytes()),
            suffix,
        })
    }

    fn hash(&self, nonce: u64) -> [u8; 32] {
        self.prefix
            .clone()
            .chain_update(nonce.to_string().as_bytes())
            .chain_update(self.suffix.as_bytes())
            .finalize()
            .into()
    }
}

/// Default CPU primitive for NIP-13 note mining
#[derive(Debug, Clone)]
pub struct Nip13Miner {
    /// Upper bound between two progress reports
    progress_interval: Duration,
}

impl Default for Nip13Miner {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Nip13Miner {
    /// Creates a miner reporting progress at least every `progress_interval`
    ///
    /// Reports are also sent whenever the worker's best difficulty improves.
    pub fn new(progress_interval: Duration) -> Self {
        Self { progress_interval }
    }
}

fn hash_rate(hashes: u64, started: Instant) -> f64 {
    let secs = started.elapsed().as_secs_f64();
    if secs > 0.0 { hashes as f64 / secs } else { 0.0 }
}

impl MinePrimitive for Nip13Miner {
    /// Searches `job.start_nonce, job.start_nonce + job.step, ...`
    ///
    /// # Returns
    /// - `Ok(Some(MinedResult))` - event whose id meets the difficulty
    /// - `Ok(None)` - `should_cancel` reported true
    /// - `Err(MinerError)` - malformed job payload or exhausted nonce space
    fn mine(
        &self,
        job: &MiningJob,
        on_progress: &mut ProgressFn<'_>,
        should_cancel: &CancelFn<'_>,
    ) -> Result<Option<MinedResult>, MinerError> {
        let candidate = CandidateEvent::from_json(&job.event)?;
        let preimage = Preimage::new(&candidate, job.difficulty)?;

        let started = Instant::now();
        let mut last_report = started;
        let mut hashes: u64 = 0;
        let mut best_bits: Option<u32> = None;
        let mut nonce = job.start_nonce;

        log::debug!(
            "Worker {} searching from nonce {} step {} for {} bits",
            job.worker_id,
            job.start_nonce,
            job.step,
            job.difficulty
        );

        loop {
            if hashes % CANCEL_POLL_INTERVAL == 0 {
                if should_cancel() {
                    log::debug!("Worker {} cancelled after {} hashes", job.worker_id, hashes);
                    return Ok(None);
                }
                if last_report.elapsed() >= self.progress_interval {
                    on_progress(hash_rate(hashes, started), None);
                    last_report = Instant::now();
                }
            }

            let hash = preimage.hash(nonce);
            hashes += 1;
            let bits = leading_zero_bits(&hash);

            if best_bits.is_none_or(|best| bits > best) {
                best_bits = Some(bits);

                if bits >= job.difficulty {
                    let total_time = started.elapsed().as_secs_f64();
                    let mut tags = candidate.tags.clone();
                    tags.push(vec![
                        "nonce".to_string(),
                        nonce.to_string(),
                        job.difficulty.to_string(),
                    ]);

                    return Ok(Some(MinedResult {
                        event: MinedEvent {
                            id: hex::encode(hash),
                            pubkey: candidate.pubkey,
                            created_at: candidate.created_at,
                            kind: candidate.kind,
                            tags,
                            content: candidate.content,
                        },
                        total_time_seconds: total_time,
                        hash_rate: hash_rate(hashes, started),
                    }));
                }

                on_progress(
                    hash_rate(hashes, started),
                    Some(ProofOfWork {
                        best_difficulty_bits: bits,
                        nonce: nonce.to_string(),
                        hash: hex::encode(hash),
                    }),
                );
                last_report = Instant::now();
            }

            nonce = nonce
                .checked_add(job.step)
                .ok_or(MinerError::NonceSpaceExhausted {
                    last_nonce: nonce,
                    step: job.step,
                })?;
        }
    }

    fn name(&self) -> &'static str {
        "nip13-sha256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::event::{MiningConfiguration, TEXT_NOTE_KIND};

    fn job(difficulty: u32, start_nonce: u64, step: u64) -> MiningJob {
        let config = MiningConfiguration {
            content: "hello \"nostr\"\n".into(),
            tags: vec![vec!["t".into(), "pow".into()]],
            public_key: "abc".into(),
            difficulty,
            worker_count: 1,
        };
        MiningJob {
            worker_id: 0,
            event: CandidateEvent::new(&config, 1_700_000_000).to_json().unwrap(),
            difficulty,
            start_nonce,
            step,
        }
    }

    #[test]
    fn leading_zero_bits_counts_across_bytes() {
        assert_eq!(leading_zero_bits(&[0xff]), 0);
        assert_eq!(leading_zero_bits(&[0x0f, 0x00]), 4);
        assert_eq!(leading_zero_bits(&[0x00, 0x01]), 15);
        assert_eq!(leading_zero_bits(&[0x00, 0x00]), 16);
    }

    #[test]
    fn mined_event_id_matches_canonical_serialization() {
        let miner = Nip13Miner::default();
        let result = miner
            .mine(&job(8, 0, 1), &mut |_, _| {}, &|| false)
            .unwrap()
            .expect("8 bits is found quickly");

        let event = &result.event;
        assert!(event.has_valid_id());
        assert!(leading_zero_bits(&hex::decode(&event.id).unwrap()) >= 8);
        assert_eq!(event.kind, TEXT_NOTE_KIND);
        assert_eq!(event.pubkey, "abc");
        assert_eq!(event.tags.len(), 2);
        assert_eq!(event.nonce_tag().unwrap()[2], "8");
        assert_eq!(event.pow_difficulty(), 8);
    }

    #[test]
    fn respects_start_and_step() {
        let miner = Nip13Miner::default();
        let result = miner
            .mine(&job(6, 3, 5), &mut |_, _| {}, &|| false)
            .unwrap()
            .unwrap();
        let nonce: u64 = result.event.nonce_tag().unwrap()[1].parse().unwrap();
        assert_eq!(nonce % 5, 3);
    }

    #[test]
    fn progress_reports_strictly_improve() {
        let miner = Nip13Miner::default();
        let mut seen = Vec::new();
        miner
            .mine(
                &job(10, 0, 1),
                &mut |_, pow| {
                    if let Some(pow) = pow {
                        seen.push(pow.best_difficulty_bits);
                    }
                },
                &|| false,
            )
            .unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn cancelled_search_returns_none() {
        let miner = Nip13Miner::default();
        let result = miner.mine(&job(255, 0, 1), &mut |_, _| {}, &|| true).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn nonce_overflow_is_an_error() {
        let miner = Nip13Miner::default();
        let err = miner
            .mine(&job(255, u64::MAX - 1, 2), &mut |_, _| {}, &|| false)
            .unwrap_err();
        assert!(matches!(err, MinerError::NonceSpaceExhausted { .. }));
    }

    #[test]
    fn bad_payload_is_an_error() {
        let miner = Nip13Miner::default();
        let mut bad = job(4, 0, 1);
        bad.event = "not json".into();
        assert!(miner.mine(&bad, &mut |_, _| {}, &|| false).is_err());
    }
}
