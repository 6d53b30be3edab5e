//! Parallel rebase: transforming two transactions made against the same
//! document state so they can be applied in either order. Non-overlapping
//! active ranges commute by retain adjustment; overlapping ones are a
//! conflict, reported as a first-class result rather than an error.

use crate::operation::{AnnotationBias, Op};
use crate::transaction::Transaction;

/// Where [`adjust_retain`] should work: the leading or trailing retain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Place {
    Start,
    End,
}

/// The minimal range of the *start state* outside which a transaction is
/// observationally the identity, plus its length diff. `start`/`end` are
/// `None` for a pure no-op.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ActiveRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub diff: isize,
}

impl Transaction {
    /// Compute the active range and length diff. Annotate ops keep a running
    /// span counter; while it is positive, even retains count as active.
    /// Attribute and replaceMetadata ops have zero cursor length but modify
    /// one position, so they place the end marker one past the cursor.
    pub fn active_range_and_length_diff(&self) -> ActiveRange {
        let mut offset = 0usize;
        let mut diff = 0isize;
        let mut annotations = 0isize;
        let mut start: Option<usize> = None;
        let mut end: Option<usize> = None;

        for op in &self.operations {
            if let Op::Annotate { bias, .. } = op {
                annotations += match bias {
                    AnnotationBias::Start => 1,
                    AnnotationBias::Stop => -1,
                };
                continue;
            }
            let passive = matches!(op, Op::Retain { .. } | Op::RetainMeta { .. });
            let active = annotations > 0 || !passive;

            if active && start.is_none() {
                start = Some(offset);
            }

            match op {
                Op::Retain { length } => offset += length,
                Op::Replace { remove, insert, .. } => {
                    offset += remove.len();
                    diff += insert.len() as isize - remove.len() as isize;
                }
                _ => {}
            }

            if matches!(op, Op::Attribute { .. } | Op::ReplaceMeta { .. }) {
                end = Some(offset + 1);
            } else if active {
                end = Some(offset);
            }
        }

        ActiveRange { start, end, diff }
    }

    /// Rebase this transaction onto `other`, parallel to it over the same
    /// start state. With `startmost = true` this transaction wins the
    /// tiebreak for co-located insertions (its content ends up first);
    /// otherwise `other` does. `None` means conflict.
    pub fn rebased_onto(&self, other: &Transaction, startmost: bool) -> Option<Transaction> {
        if startmost {
            rebase_transactions(self, other).map(|(rebased, _)| rebased)
        } else {
            rebase_transactions(other, self).map(|(_, rebased)| rebased)
        }
    }
}

/// Grow (or shrink) the retain at one end of the op list by `diff`,
/// removing it if it hits zero and creating it if absent. When adjusting the
/// end, a trailing `retainMetadata` is stepped over.
///
/// Panics if the adjustment would drive a retain negative; for transactions
/// that really were parallel over the same state this cannot happen.
fn adjust_retain(ops: &mut Vec<Op>, place: Place, diff: isize) {
    if diff == 0 {
        return;
    }
    let mut index = match place {
        Place::Start => 0usize,
        Place::End => ops.len().saturating_sub(1),
    };
    if place == Place::End && matches!(ops.last(), Some(Op::RetainMeta { .. })) {
        index = ops.len().saturating_sub(2);
    }

    if let Some(Op::Retain { length }) = ops.get_mut(index) {
        let adjusted = *length as isize + diff;
        assert!(adjusted >= 0, "retain adjusted to a negative length");
        if adjusted == 0 {
            ops.remove(index);
        } else {
            *length = adjusted as usize;
        }
        return;
    }

    assert!(diff >= 0, "retain adjusted to a negative length");
    let insert_at = match place {
        Place::Start => 0,
        Place::End => {
            if matches!(ops.last(), Some(Op::RetainMeta { .. })) {
                ops.len() - 1
            } else {
                ops.len()
            }
        }
    };
    ops.insert(insert_at, Op::retain(diff as usize));
}

/// Rebase two parallel transactions over the same start state onto each
/// other: `Some((a2, b2))` where `a2` applies after `b` and `b2` after `a`,
/// or `None` when the active ranges overlap (conflict).
///
/// Two insertions at the same offset have two zero-length active ranges at
/// the same place, which order `a` before `b`; callers pick sides with
/// [`Transaction::rebased_onto`].
pub fn rebase_transactions(a: &Transaction, b: &Transaction) -> Option<(Transaction, Transaction)> {
    let mut a = a.clone();
    let mut b = b.clone();
    let info_a = a.active_range_and_length_diff();
    let info_b = b.active_range_and_length_diff();

    match (info_a.start, info_a.end, info_b.start, info_b.end) {
        (None, _, _, _) | (_, _, None, _) => {
            // One of them is a pure no-op. A no-op has diff 0, so adjusting
            // both leading retains is safe.
            adjust_retain(&mut a.operations, Place::Start, info_b.diff);
            adjust_retain(&mut b.operations, Place::Start, info_a.diff);
        }
        (Some(_), Some(end_a), Some(start_b), _) if end_a <= start_b => {
            // a is startmost (this is also the co-located insert case).
            adjust_retain(&mut b.operations, Place::Start, info_a.diff);
            adjust_retain(&mut a.operations, Place::End, info_b.diff);
        }
        (Some(start_a), _, Some(_), Some(end_b)) if end_b <= start_a => {
            adjust_retain(&mut a.operations, Place::Start, info_b.diff);
            adjust_retain(&mut b.operations, Place::End, info_a.diff);
        }
        _ => return None,
    }
    Some((a, b))
}
