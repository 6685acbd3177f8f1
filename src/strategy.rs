//! Lending strategy selection
//!
//! Selection is a pure function over the available connections so it can be
//! exercised without a pool or a lock.

use crate::config::LendingStrategy;
use crate::connection::ConnectionInfo;
use rand::Rng;
use std::time::Instant;

/// Pick an index into `candidates`, or `None` when there are none.
///
/// `cursor` is the round-robin position; it advances on every round-robin
/// call, including calls with no candidates, and is left alone by the other
/// strategies. Ties go to the earliest candidate.
pub(crate) fn select<R: Rng + ?Sized>(
    strategy: LendingStrategy,
    candidates: &[&ConnectionInfo],
    cursor: &mut usize,
    rng: &mut R,
    now: Instant,
) -> Option<usize> {
    match strategy {
        LendingStrategy::RoundRobin => {
            let position = *cursor;
            *cursor = cursor.wrapping_add(1);
            (!candidates.is_empty()).then(|| position % candidates.len())
        }
        _ if candidates.is_empty() => None,
        LendingStrategy::LeastConnections => candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, info)| info.use_count)
            .map(|(index, _)| index),
        LendingStrategy::Weighted => {
            let mut best: Option<(usize, f64)> = None;
            for (index, info) in candidates.iter().enumerate() {
                let idle = now.saturating_duration_since(info.last_used).as_secs_f64();
                let score = info.use_count as f64 * idle;
                if best.is_none_or(|(_, lowest)| score < lowest) {
                    best = Some((index, score));
                }
            }
            best.map(|(index, _)| index)
        }
        LendingStrategy::Random => Some(rng.gen_range(0..candidates.len())),
    }
}
