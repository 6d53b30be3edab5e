//! The transaction value and the transforms on it: reversal, offset and
//! range translation, modified-range extraction, and the applied latch.

use std::fmt::{Display, Formatter};

use crate::document::{Document, InternalList, Node};
use crate::operation::{AnnotationBias, Op, OpKind};
use crate::range::DocRange;

/// A reversible, rebaseable edit: an ordered operation list mapping one
/// document state to another, plus a latch recording whether it has been
/// committed.
///
/// Transactions are pure values. They are synthesized by the `new_*`
/// constructors against a pre-transaction document, and applied by an
/// external executor.
#[derive(Debug, Eq, PartialEq, Default)]
pub struct Transaction {
    pub(crate) operations: Vec<Op>,
    pub(crate) applied: bool,
}

/// Cloning a transaction clears the applied latch: the clone is the same
/// edit, not the same commit. Undo/redo relies on this to re-commit an
/// undone transaction.
impl Clone for Transaction {
    fn clone(&self) -> Self {
        Transaction { operations: self.operations.clone(), applied: false }
    }
}

impl Transaction {
    pub fn new() -> Transaction {
        Transaction { operations: Vec::new(), applied: false }
    }

    pub(crate) fn from_ops(operations: Vec<Op>) -> Transaction {
        Transaction { operations, applied: false }
    }

    pub fn operations(&self) -> &[Op] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Op> {
        self.operations
    }

    /// The transaction that exactly undoes this one.
    pub fn reversed(&self) -> Transaction {
        Transaction {
            operations: self.operations.iter().map(Op::reversed).collect(),
            applied: false,
        }
    }

    /// A transaction is an identity if it only carries the document along:
    /// no ops at all, a single retain, or a retain plus a trailing metadata
    /// retain.
    pub fn is_no_op(&self) -> bool {
        match self.operations.as_slice() {
            [] => true,
            [Op::Retain { .. }] => true,
            [Op::Retain { .. }, Op::RetainMeta { .. }] => true,
            _ => false,
        }
    }

    pub fn has_op_kind(&self, kind: OpKind) -> bool {
        self.operations.iter().any(|op| op.kind() == kind)
    }

    /// Does this transaction insert or remove data?
    pub fn has_content_data_operations(&self) -> bool {
        self.has_op_kind(OpKind::Replace)
    }

    pub fn has_element_attribute_operations(&self) -> bool {
        self.has_op_kind(OpKind::Attribute)
    }

    pub fn has_annotation_operations(&self) -> bool {
        self.has_op_kind(OpKind::Annotate)
    }

    /// Has this transaction been committed to a document?
    pub fn has_been_applied(&self) -> bool {
        self.applied
    }

    /// Latch the transaction as committed. One-way: the core never clears
    /// this; take a [`clone`](Clone::clone) to re-commit.
    pub fn mark_as_applied(&mut self) {
        self.applied = true;
    }

    /// Map a source-state offset to the target state.
    ///
    /// An offset inside a removed region snaps to the end of the removal. An
    /// offset at a replacement boundary is placed before or after any
    /// inserted content depending on `exclude_insertion`.
    pub fn translate_offset(&self, offset: usize, exclude_insertion: bool) -> usize {
        fn apply(offset: usize, adjustment: isize) -> usize {
            let translated = offset as isize + adjustment;
            debug_assert!(translated >= 0, "offset translated past the document start");
            translated as usize
        }

        let mut cursor = 0usize;
        let mut adjustment = 0isize;

        for op in &self.operations {
            match op {
                Op::Replace { remove, insert, .. } => {
                    let remove_len = remove.len();
                    let insert_len = insert.len();
                    let prev_adjustment = adjustment;
                    adjustment += insert_len as isize - remove_len as isize;

                    if offset == cursor + remove_len {
                        // Right after the removal / right before the insertion.
                        return if exclude_insertion && insert_len > remove_len {
                            apply(offset, adjustment - insert_len as isize + remove_len as isize)
                        } else {
                            apply(offset, adjustment)
                        };
                    } else if offset == cursor {
                        // Right before the removal or replacement.
                        return if insert_len == 0 {
                            apply(cursor + remove_len, adjustment)
                        } else {
                            apply(offset, prev_adjustment)
                        };
                    } else if offset > cursor && offset < cursor + remove_len {
                        // Inside the removal: snap to its end.
                        return apply(cursor + remove_len, adjustment);
                    }
                    cursor += remove_len;
                }
                Op::Retain { length } => cursor += length,
                _ => {}
            }
        }
        apply(offset, adjustment)
    }

    /// Map a source-state range to the target state.
    ///
    /// The start is translated with `!exclude_insertion` and the end with
    /// `exclude_insertion`, so by default the result grows to cover content
    /// inserted at either boundary. Backwards ranges stay backwards.
    pub fn translate_range(&self, range: DocRange, exclude_insertion: bool) -> DocRange {
        let start = self.translate_offset(range.start(), !exclude_insertion);
        let end = self.translate_offset(range.end(), exclude_insertion);
        DocRange::new_directed(start, end, range.is_backwards())
    }

    /// The smallest target-state range covering this transaction's effects.
    ///
    /// Modifications that fall entirely within the source document's
    /// internal-list region are ignored, and replacements padded by insertion
    /// fixup report their caller-intended sub-range, so undo/selection code
    /// never selects fixup wrappers. Returns `None` for a no-op.
    pub fn modified_range<D: Document>(&self, doc: &D) -> Option<DocRange> {
        let internal = doc.internal_list().list_node().outer_range();
        let mut old_offset = 0usize;
        let mut offset = 0usize;
        let mut start: Option<usize> = None;
        let mut end: Option<usize> = None;

        // An insertion exactly at the list boundary lands outside the list,
        // so zero-footprint ops only count as internal strictly inside it.
        let inside_internal = |s: usize, e: usize| {
            if internal.is_empty() {
                false
            } else if e > s {
                internal.start() <= s && e <= internal.end()
            } else {
                internal.start() < s && s < internal.end()
            }
        };

        for op in &self.operations {
            match op {
                Op::RetainMeta { .. } => {}
                Op::Retain { length } => {
                    offset += length;
                    old_offset += length;
                }
                Op::Attribute { .. } => {
                    if !inside_internal(old_offset, old_offset + 1) {
                        start.get_or_insert(offset);
                        end = Some(offset + 1);
                    }
                }
                Op::ReplaceMeta { .. } => {
                    if !inside_internal(old_offset, old_offset + 1) {
                        start.get_or_insert(offset);
                        end = Some(offset + 1);
                    }
                }
                Op::Annotate { bias, .. } => {
                    if !inside_internal(old_offset, old_offset + 1) {
                        match bias {
                            AnnotationBias::Start => {
                                start.get_or_insert(offset);
                            }
                            AnnotationBias::Stop => end = Some(offset),
                        }
                    }
                }
                Op::Replace {
                    remove,
                    insert,
                    inserted_data_offset,
                    inserted_data_length,
                    ..
                } => {
                    if !inside_internal(old_offset, old_offset + remove.len()) {
                        let inner_offset = inserted_data_offset.unwrap_or(0);
                        start.get_or_insert(offset + inner_offset);
                        end = Some(match inserted_data_length {
                            Some(len) => offset + inner_offset + len,
                            None => offset + insert.len(),
                        });
                    }
                    old_offset += remove.len();
                    offset += insert.len();
                }
            }
        }

        match (start, end) {
            (Some(start), Some(end)) => Some(DocRange::new(start, end)),
            _ => None,
        }
    }

    /// Deep validation, for tests and fuzzers. Asserts the length accounting
    /// on both axes against `doc`, op-list hygiene (no zero-length retains,
    /// no replace directly after replaceMetadata, balanced annotate pairs),
    /// and that removed and inserted markers agree on net tree depth.
    pub fn dbg_check<D: Document>(&self, doc: &D) {
        let mut consumed = 0usize;
        let mut annotations = 0isize;
        let mut net_removed = 0isize;
        let mut net_inserted = 0isize;
        let mut prev_was_replace_meta = false;

        for op in &self.operations {
            match op {
                Op::Retain { length } | Op::RetainMeta { length } => {
                    assert!(*length > 0, "zero-length retain in op list");
                }
                _ => {}
            }
            match op {
                Op::Replace { remove, insert, remove_metadata, insert_metadata, .. } => {
                    assert!(!prev_was_replace_meta, "replace directly after replaceMetadata");
                    assert!(
                        !remove.is_empty() || !insert.is_empty(),
                        "empty replace in op list"
                    );
                    if let Some(cells) = remove_metadata {
                        assert_eq!(cells.len(), remove.len(), "removeMetadata length mismatch");
                    }
                    if let Some(cells) = insert_metadata {
                        assert_eq!(cells.len(), insert.len(), "insertMetadata length mismatch");
                    }
                    net_removed += depth_delta(remove);
                    net_inserted += depth_delta(insert);
                }
                Op::Annotate { bias, .. } => {
                    annotations += match bias {
                        AnnotationBias::Start => 1,
                        AnnotationBias::Stop => -1,
                    };
                    assert!(annotations >= 0, "annotate stop without start");
                }
                _ => {}
            }
            prev_was_replace_meta = matches!(op, Op::ReplaceMeta { .. });
            consumed += op.data_consumed();
        }

        assert_eq!(annotations, 0, "unbalanced annotate spans");
        assert_eq!(consumed, doc.data().len(), "transaction does not consume the document");
        assert_eq!(
            net_removed, net_inserted,
            "removed and inserted markers disagree on tree depth"
        );

        fn depth_delta(items: &[crate::linear::DataItem]) -> isize {
            items
                .iter()
                .map(|item| {
                    if item.is_open() {
                        1
                    } else if item.is_close() {
                        -1
                    } else {
                        0
                    }
                })
                .sum()
        }
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, op) in self.operations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", op)?;
        }
        f.write_str("]")
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    //! A transaction's wire form is its bare operations list; the applied
    //! latch is session state and never travels.

    use super::Transaction;
    use crate::operation::Op;
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::{Serialize, Serializer};

    impl Serialize for Transaction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.operations.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Transaction {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let operations = Vec::<Op>::deserialize(deserializer)?;
            Ok(Transaction { operations, applied: false })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::DataItem;

    fn insert_at(offset: usize, items: Vec<DataItem>, tail: usize) -> Transaction {
        let mut ops = Vec::new();
        if offset > 0 {
            ops.push(Op::retain(offset));
        }
        ops.push(Op::replace(vec![], items));
        if tail > 0 {
            ops.push(Op::retain(tail));
        }
        Transaction::from_ops(ops)
    }

    fn remove_at(offset: usize, items: Vec<DataItem>, tail: usize) -> Transaction {
        let mut ops = Vec::new();
        if offset > 0 {
            ops.push(Op::retain(offset));
        }
        ops.push(Op::replace(items, vec![]));
        if tail > 0 {
            ops.push(Op::retain(tail));
        }
        Transaction::from_ops(ops)
    }

    #[test]
    fn no_op_shapes() {
        assert!(Transaction::new().is_no_op());
        assert!(Transaction::from_ops(vec![Op::retain(5)]).is_no_op());
        assert!(Transaction::from_ops(vec![Op::retain(5), Op::retain_meta(1)]).is_no_op());
        assert!(!Transaction::from_ops(vec![Op::retain_meta(1)]).is_no_op());
        assert!(!insert_at(0, vec![DataItem::ch('x')], 2).is_no_op());
    }

    #[test]
    fn clone_clears_applied() {
        let mut tx = insert_at(1, vec![DataItem::ch('x')], 3);
        tx.mark_as_applied();
        assert!(tx.has_been_applied());
        let copy = tx.clone();
        assert!(!copy.has_been_applied());
        assert_eq!(copy.operations(), tx.operations());
    }

    #[test]
    fn predicates_route() {
        let tx = insert_at(1, vec![DataItem::ch('x')], 3);
        assert!(tx.has_content_data_operations());
        assert!(!tx.has_element_attribute_operations());
        assert!(!tx.has_annotation_operations());
    }

    #[test]
    fn translate_offset_around_insertion() {
        // retain 2, insert "xy", retain 2  (source len 4, target len 6)
        let tx = insert_at(2, vec![DataItem::ch('x'), DataItem::ch('y')], 2);

        // Before the insertion: unchanged.
        assert_eq!(tx.translate_offset(0, false), 0);
        assert_eq!(tx.translate_offset(1, false), 1);
        // At the insertion point: after the inserted content by default...
        assert_eq!(tx.translate_offset(2, false), 4);
        // ...before it when insertions are excluded.
        assert_eq!(tx.translate_offset(2, true), 2);
        // Past the insertion: shifted.
        assert_eq!(tx.translate_offset(3, false), 5);
        assert_eq!(tx.translate_offset(4, false), 6);
    }

    #[test]
    fn translate_offset_around_removal() {
        // retain 1, remove 2 items, retain 2  (source len 5)
        let tx = remove_at(1, vec![DataItem::ch('a'), DataItem::ch('b')], 2);

        assert_eq!(tx.translate_offset(0, false), 0);
        // At the start of the removal: snaps past it.
        assert_eq!(tx.translate_offset(1, false), 1);
        // Inside the removal: snaps to its end.
        assert_eq!(tx.translate_offset(2, false), 1);
        assert_eq!(tx.translate_offset(3, false), 1);
        assert_eq!(tx.translate_offset(4, false), 2);
        assert_eq!(tx.translate_offset(5, false), 3);
    }

    #[test]
    fn translate_range_grows_over_insertions() {
        let tx = insert_at(2, vec![DataItem::ch('x')], 2);
        // Range ending at the insertion point grows to cover the insertion.
        assert_eq!(tx.translate_range(DocRange::new(0, 2), false), DocRange::new(0, 3));
        // Backwards ranges stay backwards.
        let backwards = tx.translate_range(DocRange::new(2, 0), false);
        assert!(backwards.is_backwards());
        assert_eq!(backwards.flipped(), DocRange::new(0, 3));
    }

    #[test]
    fn reversed_round_trips_ops() {
        let tx = Transaction::from_ops(vec![
            Op::retain(1),
            Op::replace(vec![DataItem::ch('a')], vec![DataItem::ch('b'), DataItem::ch('c')]),
            Op::retain(2),
        ]);
        assert_eq!(tx.reversed().reversed(), tx);
    }
}
