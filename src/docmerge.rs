//! Inserting one document into another. This is the only constructor with
//! side effects: the two annotation stores and the two internal lists are
//! merged (mutating the target document's), and every index in the extracted
//! data is remapped before it lands in an op payload.

use crate::builder::TransactionBuilder;
use crate::document::{Document, InternalList, Node};
use crate::error::TransactionError;
use crate::linear::{all_cells_empty, DataItem, LinearData, MetaCell};
use crate::range::DocRange;
use crate::transaction::Transaction;

/// Pad extracted metadata cells so they line up with fixed-up insertion data:
/// empty cells in front of the caller's payload and behind it.
fn pad_cells(cells: Vec<MetaCell>, lead: usize, total: usize) -> Vec<MetaCell> {
    let mut padded = vec![MetaCell::new(); lead];
    padded.extend(cells);
    padded.resize(total, MetaCell::new());
    padded
}

impl Transaction {
    /// Insert (a range of) `new_doc` into `doc` at `offset`.
    ///
    /// The stores are merged and annotation indices remapped; the internal
    /// lists are merged and reference indices remapped through the resulting
    /// mapping. The target's internal-list region is then rewritten to the
    /// merged list: existing items keep their data, except that when
    /// `new_doc` is a slice of `doc` the slice's version of originally-shared
    /// items wins (edits made in the slice propagate back), and new items
    /// are appended. Depending on where `offset` falls relative to the
    /// internal list, the node insertion lands before it, after it, or is
    /// spliced into the owning internal item's slot.
    pub fn new_document_insertion<D: Document>(
        doc: &mut D,
        offset: usize,
        new_doc: &D,
        new_doc_range: Option<DocRange>,
    ) -> Result<Transaction, TransactionError> {
        let list_range = doc.internal_list().list_node().range();
        let new_list_node = new_doc.internal_list().list_node();
        let new_list_range = new_list_node.range();
        let new_list_outer = new_list_node.outer_range();

        // How many items the target list holds before the merge grows it.
        let doc_item_count = doc.internal_list().item_count();
        let new_item_count = new_doc.internal_list().item_count();

        let store_mapping = doc.store_mut().merge(new_doc.store());
        let list_merge = doc
            .internal_list_mut()
            .merge(new_doc.internal_list(), new_doc.orig_internal_list_len());

        // Everything extracted from new_doc goes through both mappings.
        let extract = |range: DocRange| -> (Vec<DataItem>, Vec<MetaCell>) {
            let mut data = new_doc.data().slice_vec(range);
            LinearData::remap_annotations(&mut data, &store_mapping);
            LinearData::remap_list_references(&mut data, &list_merge.mapping);
            (data, new_doc.metadata().slice_vec(range))
        };

        // The node data being inserted: the requested range, or the whole
        // document minus its internal list.
        let (data, metadata) = match new_doc_range {
            Some(range) => extract(range),
            None => {
                let (mut data, mut metadata) = extract(DocRange::new(0, new_list_outer.start()));
                let back = DocRange::new(new_list_outer.end(), new_doc.data().len());
                let (back_data, _) = extract(back);
                data.extend(back_data);
                // TODO: carry the metadata cells flanking the internal list
                // through the merge; for now they are dropped and the run is
                // padded back to length below.
                if new_list_outer.end() + 1 < new_doc.data().len() {
                    metadata.extend(
                        new_doc
                            .metadata()
                            .slice_vec(DocRange::new(new_list_outer.end() + 1, new_doc.data().len())),
                    );
                }
                metadata.resize(data.len(), MetaCell::new());
                (data, metadata)
            }
        };

        // Assemble the merged internal list.
        let related = new_doc.orig_doc() == Some(doc.id());
        let shared = new_doc.orig_internal_list_len().min(new_item_count);
        let mut list_data: Vec<DataItem> = Vec::new();
        let mut list_meta: Vec<MetaCell> = Vec::new();
        for k in 0..doc_item_count {
            if related && k < shared {
                let outer = new_doc.internal_list().item_node(k).outer_range();
                let (item_data, item_meta) = extract(outer);
                list_data.extend(item_data);
                list_meta.extend(item_meta);
            } else {
                let outer = doc.internal_list().item_node(k).outer_range();
                list_data.extend(doc.data().slice_vec(outer));
                list_meta.extend(doc.metadata().slice_vec(outer));
            }
        }
        for range in &list_merge.new_item_ranges {
            let (item_data, item_meta) = extract(*range);
            list_data.extend(item_data);
            list_meta.extend(item_meta);
        }

        let mut builder = TransactionBuilder::new();
        let node_meta = |cells: &[MetaCell]| -> bool { !all_cells_empty(cells) };

        if offset <= list_range.start() {
            // Before the internal list: node insertion first, then the list.
            let insertion = doc.fixup_insertion(data, offset);
            let lead = insertion.inserted_offset.unwrap_or(0);
            let insert_meta = if node_meta(&metadata) {
                Some(pad_cells(metadata, lead, insertion.data.len()))
            } else {
                None
            };
            builder.push_retain(insertion.offset);
            let node_end = insertion.offset + insertion.remove;
            builder.push_replace(
                doc,
                insertion.offset,
                insertion.remove,
                insertion.data,
                insert_meta,
                insertion.inserted_offset,
                insertion.inserted_len,
            )?;
            builder.push_retain(list_range.start() - node_end);
            builder.push_replace(doc, list_range.start(), list_range.len(), list_data, Some(list_meta), None, None)?;
            builder.push_final_retain(doc, list_range.end(), 0);
        } else if offset >= list_range.end() {
            // After the internal list: list first, then the node insertion.
            builder.push_retain(list_range.start());
            builder.push_replace(doc, list_range.start(), list_range.len(), list_data, Some(list_meta), None, None)?;
            builder.push_retain(offset - list_range.end());
            let insertion = doc.fixup_insertion(data, offset);
            let lead = insertion.inserted_offset.unwrap_or(0);
            let insert_meta = if node_meta(&metadata) {
                Some(pad_cells(metadata, lead, insertion.data.len()))
            } else {
                None
            };
            builder.push_retain(insertion.offset - offset);
            builder.push_replace(
                doc,
                insertion.offset,
                insertion.remove,
                insertion.data,
                insert_meta,
                insertion.inserted_offset,
                insertion.inserted_len,
            )?;
            builder.push_final_retain(doc, insertion.offset + insertion.remove, 0);
        } else {
            // Inside the internal list: splice into the owning item's slot.
            let mut index = 0;
            while index + 1 < doc_item_count
                && offset > doc.internal_list().item_node(index).range().end()
            {
                index += 1;
            }
            let (item_range, splice_base) = if related && index < new_item_count {
                // The slice carries this item, so its coordinates line up
                // with the assembled list data.
                (new_doc.internal_list().item_node(index).range(), new_list_range.start())
            } else {
                (doc.internal_list().item_node(index).range(), list_range.start())
            };
            let from = item_range.start() - splice_base;
            let to = item_range.end() - splice_base;
            let data_len = data.len();
            list_data.splice(from..to, data);
            list_meta.splice(from..to, pad_cells(metadata, 0, data_len));

            builder.push_retain(list_range.start());
            builder.push_replace(doc, list_range.start(), list_range.len(), list_data, Some(list_meta), None, None)?;
            builder.push_final_retain(doc, list_range.end(), 0);
        }

        Ok(builder.into_transaction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::Annotation;
    use crate::testdoc::SimpleDoc;
    use crate::values::{attrs, Value};

    fn reference(index: i64) -> Vec<DataItem> {
        vec![
            DataItem::open_with("reference", attrs([("listIndex", Value::Int(index))])),
            DataItem::close("reference"),
        ]
    }

    /// `[p a R0 /p] [internalList [item [p x /p]] /internalList]`
    fn doc_with_list() -> SimpleDoc {
        let mut items = vec![DataItem::open("paragraph"), DataItem::ch('a')];
        items.extend(reference(0));
        items.push(DataItem::close("paragraph"));
        SimpleDoc::with_internal_items(items, vec![("ref-a", vec![DataItem::ch('x')])])
    }

    #[test]
    fn insertion_before_the_list_merges_lists() {
        let mut doc = doc_with_list();
        let mut pasted = vec![DataItem::open("paragraph"), DataItem::ch('q')];
        pasted.extend(reference(0));
        pasted.push(DataItem::close("paragraph"));
        let new_doc = SimpleDoc::with_internal_items(pasted, vec![("ref-b", vec![DataItem::ch('y')])]);

        let list_start = doc.internal_list().list_node().range().start();
        let tx = Transaction::new_document_insertion(&mut doc, 0, &new_doc, None).unwrap();

        // The target list grew by the pasted item.
        assert_eq!(doc.internal_list().item_count(), 2);

        // The pasted reference was remapped onto the merged list.
        let ops = tx.operations();
        let inserted = match &ops[0] {
            crate::operation::Op::Replace { insert, .. } => insert.clone(),
            other => panic!("expected node replace first, got {}", other),
        };
        let remapped = inserted
            .iter()
            .find(|item| item.name() == Some("reference"))
            .and_then(|item| item.attributes().unwrap().get("listIndex").cloned());
        assert_eq!(remapped, Some(Value::Int(1)));

        // The second replace rewrites the whole internal-list interior.
        match &ops[2] {
            crate::operation::Op::Replace { remove, insert, .. } => {
                assert_eq!(remove.len(), doc.data().len() - list_start - 1);
                assert!(insert.len() > remove.len());
            }
            other => panic!("expected list replace, got {}", other),
        }
    }

    #[test]
    fn annotations_are_remapped_through_the_merged_store() {
        let mut doc = doc_with_list();
        doc.store_mut().index(Annotation::new("bold"));

        let mut new_doc = SimpleDoc::with_internal_items(
            vec![DataItem::open("paragraph"), DataItem::ch('z'), DataItem::close("paragraph")],
            vec![],
        );
        let italic = new_doc.store_mut().index(Annotation::new("italic"));
        match new_doc.data_mut().items_mut().get_mut(1).unwrap() {
            DataItem::Char { annotations, .. } => annotations.push(italic),
            _ => unreachable!(),
        }

        let tx = Transaction::new_document_insertion(&mut doc, 0, &new_doc, None).unwrap();
        let inserted = match &tx.operations()[0] {
            crate::operation::Op::Replace { insert, .. } => insert.clone(),
            other => panic!("expected replace, got {}", other),
        };
        let set = inserted
            .iter()
            .find_map(|item| item.annotations().filter(|set| !set.is_empty()))
            .expect("annotated character survived extraction");
        let index = set.iter().next().unwrap();
        assert_eq!(doc.store().get(index).unwrap().name.as_str(), "italic");
    }
}
