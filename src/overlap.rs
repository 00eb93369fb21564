//! Overlap detector: confirms an emitted train window contains the incoming
//! batch as one contiguous span, catching merges that silently dropped,
//! reordered, or interleaved rows. Batches must arrive disjoint and
//! subsequent per user; a violation here means that contract was breached
//! and the user's cache needs manual remediation.

use crate::error::{Error, ViolationReason};
use crate::rows::{Row, StoredRow};

/// Locate the incoming batch inside `window` by fingerprinting its first and
/// last rows in original batch order (which may differ from post-merge sort
/// order when timestamps tie). Tie-break for duplicated fingerprints is
/// deterministic: leftmost match for the first row, rightmost for the last.
///
/// Returns the `(first, last)` window indices of the span.
pub fn locate(user_id: &str, incoming: &[Row], window: &[StoredRow]) -> Result<(usize, usize), Error> {
    let (Some(head), Some(tail)) = (incoming.first(), incoming.last()) else {
        return Err(Error::violation(user_id, ViolationReason::LeadRowMissing));
    };
    let head_hash = head.fingerprint();
    let tail_hash = tail.fingerprint();

    let first = window
        .iter()
        .position(|r| r.row_hash == head_hash)
        .ok_or_else(|| Error::violation(user_id, ViolationReason::LeadRowMissing))?;
    let last = window
        .iter()
        .rposition(|r| r.row_hash == tail_hash)
        .ok_or_else(|| Error::violation(user_id, ViolationReason::TailRowMissing))?;

    let found = (last + 1).saturating_sub(first);
    if found != incoming.len() {
        return Err(Error::violation(
            user_id,
            ViolationReason::NonContiguousSpan {
                expected: incoming.len(),
                found,
            },
        ));
    }
    Ok((first, last))
}
