//! High-level constructors: each one reads the pre-transaction document,
//! turns an editing intent into a complete operation list, and ends with a
//! final retain so the whole document is consumed.

use crate::builder::TransactionBuilder;
use crate::document::{Document, InternalList, Node, NodePolicy};
use crate::error::TransactionError;
use crate::linear::{DataItem, MetaItem, StoreIndex};
use crate::operation::AnnotationMethod;
use crate::range::DocRange;
use crate::transaction::Transaction;
use crate::values::AttrChanges;

impl Transaction {
    /// Insert `data` at `offset`. The document may re-seat the offset and
    /// pad the data to keep the tree balanced (inserting bare text at a
    /// structural position grows a paragraph around it); the op records the
    /// caller-intended slice so selection code can ignore the padding.
    pub fn new_insertion<D: Document>(
        doc: &D,
        offset: usize,
        data: Vec<DataItem>,
    ) -> Result<Transaction, TransactionError> {
        let mut builder = TransactionBuilder::new();
        let end = builder.push_insertion(doc, 0, offset, data)?;
        builder.push_final_retain(doc, end, 0);
        Ok(builder.into_transaction())
    }

    /// Remove `range`. Mergeable endpoints are spliced together; otherwise
    /// fully covered nodes go whole and partially covered ones are stripped.
    /// Undeletable nodes inside the range are preserved.
    ///
    /// Removing everything up to the internal list leaves an empty paragraph
    /// behind, so the document never ends up with no content at all.
    pub fn new_removal<D: Document>(
        doc: &D,
        range: DocRange,
        remove_metadata: bool,
    ) -> Result<Transaction, TransactionError> {
        let mut builder = TransactionBuilder::new();
        let end = builder.push_removal(doc, range, remove_metadata)?;

        let internal_start = doc.internal_list().list_node().outer_range().start();
        if range.start() == 0 && !range.is_collapsed() && range.end() >= internal_start {
            builder.push_replace(
                doc,
                end,
                0,
                vec![DataItem::open("paragraph"), DataItem::close("paragraph")],
                None,
                None,
                None,
            )?;
        }

        builder.push_final_retain(doc, end, 0);
        Ok(builder.into_transaction())
    }

    /// Remove `range`, then insert `data` where the removal ended.
    pub fn new_replacement<D: Document>(
        doc: &D,
        range: DocRange,
        data: Vec<DataItem>,
        remove_metadata: bool,
    ) -> Result<Transaction, TransactionError> {
        let mut builder = TransactionBuilder::new();
        let end = builder.push_removal(doc, range, remove_metadata)?;
        let end = builder.push_insertion(doc, end, end, data)?;
        builder.push_final_retain(doc, end, 0);
        Ok(builder.into_transaction())
    }

    /// Change attributes on the opening marker at `offset`. Only attributes
    /// whose value actually differs produce ops.
    pub fn new_attribute_changes<D: Document>(
        doc: &D,
        offset: usize,
        changes: &AttrChanges,
    ) -> Result<Transaction, TransactionError> {
        let old_attrs = match doc.data().get(offset) {
            Some(DataItem::Open { attributes, .. }) => attributes.clone(),
            _ => return Err(TransactionError::InvalidAttributeTarget { offset }),
        };
        let mut builder = TransactionBuilder::new();
        builder.push_retain(offset);
        builder.push_attribute_changes(changes, &old_attrs);
        builder.push_final_retain(doc, offset, 0);
        Ok(builder.into_transaction())
    }

    /// Set or clear the annotation at store index `index` over `range`.
    ///
    /// One linear scan. Characters are always annotatable; structural markers
    /// never are; a content-node opening is annotatable for `set` when its
    /// type accepts the annotation, and nothing inside an ignore-children
    /// subtree is. For `set`, positions already carrying a *comparable*
    /// annotation are skipped; for `clear`, positions not carrying the
    /// *exact* annotation are skipped, so one pass never has to add or
    /// remove two annotations at the same offset.
    pub fn new_annotation<D: Document>(
        doc: &D,
        range: DocRange,
        method: AnnotationMethod,
        index: StoreIndex,
    ) -> Result<Transaction, TransactionError> {
        let annotation = doc
            .store()
            .get(index)
            .expect("annotation index not present in the document store")
            .clone();
        let clear = method == AnnotationMethod::Clear;
        let data = doc.data();
        let policy = doc.policy();

        let mut builder = TransactionBuilder::new();
        let mut on = false;
        let mut span = range.start();
        let mut inside_content_node = false;
        let mut ignore_children_depth = 0isize;

        for i in range.start()..range.end() {
            let is_element = data.is_element_data(i);
            let is_open = data.is_open_element_data(i);
            let is_close = data.is_close_element_data(i);
            let name = data.item_name(i).unwrap_or("");

            if is_element && policy.ignores_children(name) {
                ignore_children_depth += if is_open { 1 } else { -1 };
            }

            let annotatable = if ignore_children_depth > 0 {
                false
            } else if !is_element {
                true
            } else {
                // Content-node markers take annotations for set only; clear
                // walks characters and exact matches, never elements.
                !clear && policy.is_content(name) && policy.can_take_annotation(name, &annotation)
            };

            if !annotatable || (inside_content_node && !is_close) {
                // Structural marker, or we're somewhere a span can't cover.
                if on {
                    builder.push_retain(span);
                    builder.push_stop_annotating(method, index);
                    span = 0;
                    on = false;
                }
            } else if (!is_element || !is_close) && !inside_content_node {
                // Character or content-node opening.
                if is_element {
                    inside_content_node = true;
                }
                let covered = match data.annotations_from_offset(i) {
                    Some(set) => {
                        if clear {
                            set.contains(index)
                        } else {
                            set.contains_comparable(doc.store(), &annotation)
                        }
                    }
                    None => false,
                };
                if covered != clear {
                    // Already set (for set) / not present (for clear): skip.
                    if on {
                        builder.push_retain(span);
                        builder.push_stop_annotating(method, index);
                        span = 0;
                        on = false;
                    }
                } else if !on {
                    builder.push_retain(span);
                    builder.push_start_annotating(method, index);
                    span = 0;
                    on = true;
                }
            } else if is_close {
                inside_content_node = false;
            }
            span += 1;
        }

        builder.push_retain(span);
        if on {
            builder.push_stop_annotating(method, index);
        }
        builder.push_final_retain(doc, range.end(), 0);
        Ok(builder.into_transaction())
    }

    /// Insert metadata elements at sub-index `index` of the cell at `offset`.
    pub fn new_metadata_insertion<D: Document>(
        doc: &D,
        offset: usize,
        index: usize,
        elements: Vec<MetaItem>,
    ) -> Result<Transaction, TransactionError> {
        let cell_len = doc.metadata().get(offset).len();
        if index > cell_len {
            return Err(TransactionError::MetadataBounds { offset, index, len: cell_len });
        }
        let mut builder = TransactionBuilder::new();
        builder.push_retain(offset);
        builder.push_retain_meta(index);
        builder.push_replace_meta(Vec::new(), elements);
        builder.push_retain_meta(cell_len - index);
        builder.push_final_retain(doc, offset, cell_len);
        Ok(builder.into_transaction())
    }

    /// Remove the metadata elements covered by `range` (a sub-range of the
    /// cell at `offset`).
    pub fn new_metadata_removal<D: Document>(
        doc: &D,
        offset: usize,
        range: DocRange,
    ) -> Result<Transaction, TransactionError> {
        let cell = doc.metadata().get(offset);
        if cell.is_empty() {
            return Err(TransactionError::EmptyMetadata { offset });
        }
        if range.end() > cell.len() {
            return Err(TransactionError::MetadataBounds { offset, index: range.end(), len: cell.len() });
        }
        let removed = cell[range.start()..range.end()].to_vec();
        let cell_len = cell.len();

        let mut builder = TransactionBuilder::new();
        builder.push_retain(offset);
        builder.push_retain_meta(range.start());
        builder.push_replace_meta(removed, Vec::new());
        builder.push_retain_meta(cell_len - range.end());
        builder.push_final_retain(doc, offset, cell_len);
        Ok(builder.into_transaction())
    }

    /// Replace the single metadata element at sub-index `index` of the cell
    /// at `offset`.
    pub fn new_metadata_element_replacement<D: Document>(
        doc: &D,
        offset: usize,
        index: usize,
        element: MetaItem,
    ) -> Result<Transaction, TransactionError> {
        let cell = doc.metadata().get(offset);
        if index >= cell.len() {
            return Err(TransactionError::MetadataBounds { offset, index, len: cell.len() });
        }
        let old = cell[index].clone();
        let cell_len = cell.len();

        let mut builder = TransactionBuilder::new();
        builder.push_retain(offset);
        builder.push_retain_meta(index);
        builder.push_replace_meta(vec![old], vec![element]);
        builder.push_retain_meta(cell_len - index - 1);
        builder.push_final_retain(doc, offset, cell_len);
        Ok(builder.into_transaction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Op;
    use crate::testdoc::SimpleDoc;

    fn doc_ab() -> SimpleDoc {
        SimpleDoc::from_items(vec![
            DataItem::open("paragraph"),
            DataItem::ch('a'),
            DataItem::ch('b'),
            DataItem::close("paragraph"),
        ])
    }

    #[test]
    fn insertion_at_a_point() {
        let doc = doc_ab();
        let tx = Transaction::new_insertion(&doc, 2, vec![DataItem::ch('x')]).unwrap();
        assert_eq!(
            tx.operations(),
            &[
                Op::retain(2),
                Op::replace(vec![], vec![DataItem::ch('x')]),
                Op::retain(2),
            ]
        );
        tx.dbg_check(&doc);
    }

    #[test]
    fn removal_of_inline_range() {
        let doc = SimpleDoc::from_items(vec![
            DataItem::open("paragraph"),
            DataItem::ch('a'),
            DataItem::ch('b'),
            DataItem::ch('c'),
            DataItem::close("paragraph"),
        ]);
        let tx = Transaction::new_removal(&doc, DocRange::new(1, 3), false).unwrap();
        assert_eq!(
            tx.operations(),
            &[
                Op::retain(1),
                Op::replace(vec![DataItem::ch('a'), DataItem::ch('b')], vec![]),
                Op::retain(2),
            ]
        );
        tx.dbg_check(&doc);
    }

    #[test]
    fn removal_of_everything_leaves_a_paragraph() {
        let doc = doc_ab();
        let tx = Transaction::new_removal(&doc, DocRange::new(0, 4), false).unwrap();
        assert_eq!(
            tx.operations(),
            &[
                Op::replace(doc.data().slice_vec(DocRange::new(0, 4)), vec![]),
                Op::replace(vec![], vec![DataItem::open("paragraph"), DataItem::close("paragraph")]),
            ]
        );
        tx.dbg_check(&doc);
    }

    #[test]
    fn collapsed_removal_is_a_no_op() {
        let doc = doc_ab();
        let tx = Transaction::new_removal(&doc, DocRange::new(2, 2), false).unwrap();
        assert!(tx.is_no_op());
    }

    #[test]
    fn removal_of_a_marker_only_range_is_invalid() {
        let doc = doc_ab();
        assert_eq!(
            Transaction::new_removal(&doc, DocRange::new(0, 1), false),
            Err(TransactionError::InvalidRange { from: 0, to: 1 })
        );
    }

    #[test]
    fn metadata_insertion_walks_both_axes() {
        let mut doc = doc_ab();
        doc.metadata_mut().get_cell_mut(1).push(MetaItem::new("comment"));
        let tx =
            Transaction::new_metadata_insertion(&doc, 1, 1, vec![MetaItem::new("category")]).unwrap();
        assert_eq!(
            tx.operations(),
            &[
                Op::retain(1),
                Op::retain_meta(1),
                Op::ReplaceMeta { remove: vec![], insert: vec![MetaItem::new("category")] },
                Op::retain(3),
            ]
        );
        tx.dbg_check(&doc);
    }

    #[test]
    fn metadata_bounds_are_checked() {
        let doc = doc_ab();
        assert_eq!(
            Transaction::new_metadata_insertion(&doc, 1, 2, vec![MetaItem::new("x")]),
            Err(TransactionError::MetadataBounds { offset: 1, index: 2, len: 0 })
        );
        assert_eq!(
            Transaction::new_metadata_removal(&doc, 1, DocRange::new(0, 1)),
            Err(TransactionError::EmptyMetadata { offset: 1 })
        );
        assert_eq!(
            Transaction::new_metadata_element_replacement(&doc, 1, 0, MetaItem::new("x")),
            Err(TransactionError::MetadataBounds { offset: 1, index: 0, len: 0 })
        );
    }

    #[test]
    fn attribute_change_rejects_non_elements() {
        let doc = doc_ab();
        let mut changes = AttrChanges::new();
        changes.insert("level".into(), Some(crate::values::Value::Int(2)));
        assert_eq!(
            Transaction::new_attribute_changes(&doc, 1, &changes),
            Err(TransactionError::InvalidAttributeTarget { offset: 1 })
        );
        assert_eq!(
            Transaction::new_attribute_changes(&doc, 3, &changes),
            Err(TransactionError::InvalidAttributeTarget { offset: 3 })
        );
    }
}
