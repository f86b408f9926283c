// Property tests for nonce partitioning, best tracking and event ids

use notemine_rs::miner::algorithm::leading_zero_bits;
use notemine_rs::miner::nonce::{allocate, allocate_all};
use notemine_rs::{MinedEvent, PowTracker, ProofOfWork};
use proptest::prelude::*;

fn pow(bits: u32, nonce: usize) -> ProofOfWork {
    ProofOfWork {
        best_difficulty_bits: bits,
        nonce: nonce.to_string(),
        hash: String::new(),
    }
}

proptest! {
    #[test]
    fn every_nonce_has_exactly_one_owner(workers in 1usize..64, nonce in 0u64..1_000_000) {
        let owners = allocate_all(workers)
            .iter()
            .filter(|assignment| assignment.covers(nonce))
            .count();
        prop_assert_eq!(owners, 1);
    }

    #[test]
    fn assignment_matches_worker_index(workers in 1usize..64, index in 0usize..64) {
        prop_assume!(index < workers);
        let assignment = allocate(index, workers);
        prop_assert_eq!(assignment.start, index as u64);
        prop_assert_eq!(assignment.step, workers as u64);
    }

    #[test]
    fn tracker_keeps_first_maximum(reports in prop::collection::vec((0usize..8, 0u32..32), 1..50)) {
        let mut tracker = PowTracker::new();
        let mut previous = 0;

        for (i, (worker, bits)) in reports.iter().enumerate() {
            tracker.update(&pow(*bits, i), *worker);
            prop_assert!(tracker.best_bits() >= previous);
            previous = tracker.best_bits();
        }

        let max = reports.iter().map(|(_, bits)| *bits).max().unwrap_or(0);
        let first = reports.iter().position(|(_, bits)| *bits == max).unwrap_or(0);
        let best = tracker.best().unwrap();
        prop_assert_eq!(best.pow.best_difficulty_bits, max);
        prop_assert_eq!(best.worker_id, reports[first].0);
        prop_assert_eq!(best.pow.nonce.clone(), first.to_string());
    }

    #[test]
    fn leading_zero_bits_is_bounded(bytes in prop::collection::vec(any::<u8>(), 32)) {
        let bits = leading_zero_bits(&bytes);
        prop_assert!(bits <= 256);
        if let Some(first) = bytes.first() {
            prop_assert_eq!(bits >= 8, *first == 0);
        }
    }

    #[test]
    fn id_changes_with_content(content in "[a-z ]{0,40}", nonce in 0u64..10_000) {
        let event = MinedEvent {
            id: String::new(),
            pubkey: "abc".into(),
            created_at: 1_700_000_000,
            kind: 1,
            tags: vec![vec!["nonce".into(), nonce.to_string(), "4".into()]],
            content,
        };
        let mut other = event.clone();
        other.content.push('!');
        prop_assert_ne!(event.compute_id(), other.compute_id());
        prop_assert_eq!(event.compute_id().len(), 64);
    }
}
