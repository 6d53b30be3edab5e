//! Builder primitives: the append-only op-list writer every constructor is
//! made of. The pushes guarantee local coalescing (adjacent retains fuse,
//! remove-only replaces fuse) and keep the metadata axis paired with the data
//! axis, so a constructor can think in document offsets and still emit a
//! well-formed list.

use crate::document::{Document, NodePolicy};
use crate::error::TransactionError;
use crate::linear::{all_cells_empty, DataItem, MetaCell, MetaItem, MetaLinearData, StoreIndex};
use crate::operation::{AnnotationBias, AnnotationMethod, Op};
use crate::range::DocRange;
use crate::transaction::Transaction;
use crate::values::{AttrChanges, AttrMap, Value};

#[derive(Debug, Default)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    pub fn new() -> TransactionBuilder {
        TransactionBuilder { tx: Transaction::new() }
    }

    pub fn into_transaction(self) -> Transaction {
        self.tx
    }

    pub fn operations(&self) -> &[Op] {
        self.tx.operations()
    }

    /// Advance over `length` items. Zero is dropped; adjacent retains fuse.
    pub fn push_retain(&mut self, length: usize) {
        if length == 0 {
            return;
        }
        if let Some(Op::Retain { length: last }) = self.tx.operations.last_mut() {
            *last += length;
        } else {
            self.tx.operations.push(Op::retain(length));
        }
    }

    /// Advance over `length` metadata elements in the current cell.
    pub fn push_retain_meta(&mut self, length: usize) {
        if length == 0 {
            return;
        }
        if let Some(Op::RetainMeta { length: last }) = self.tx.operations.last_mut() {
            *last += length;
        } else {
            self.tx.operations.push(Op::retain_meta(length));
        }
    }

    /// Replace `remove_len` items at `offset` with `insert`. The removed data
    /// and metadata are read from the live document, so op payloads always
    /// carry current attributes and annotations.
    ///
    /// If the removed region carries metadata and no `insert_meta` is given,
    /// the removed cells are collapsed into one cell attached just before the
    /// inserted content; with nothing inserted, the collapsed cell is carried
    /// onto the following offset by an extra `replaceMetadata` op.
    pub fn push_replace<D: Document>(
        &mut self,
        doc: &D,
        offset: usize,
        remove_len: usize,
        insert: Vec<DataItem>,
        insert_meta: Option<Vec<MetaCell>>,
        inserted_data_offset: Option<usize>,
        inserted_data_length: Option<usize>,
    ) -> Result<(), TransactionError> {
        if remove_len == 0 && insert.is_empty() {
            return Ok(());
        }

        let range = DocRange::new_from_len(offset, remove_len);
        let remove = doc.data().slice_vec(range);
        let removed_cells = doc.metadata().slice_vec(range);

        // Pair up the metadata axis.
        let mut extra_meta: Option<MetaCell> = None;
        let (remove_metadata, insert_metadata) =
            if insert_meta.is_some() || !all_cells_empty(&removed_cells) {
                let insert_metadata = match insert_meta {
                    Some(cells) => cells,
                    None => {
                        let merged = MetaLinearData::merge(&removed_cells);
                        if insert.is_empty() {
                            extra_meta = Some(merged);
                            Vec::new()
                        } else {
                            let mut cells = vec![merged];
                            cells.resize(insert.len(), MetaCell::new());
                            cells
                        }
                    }
                };
                (Some(removed_cells), Some(insert_metadata))
            } else {
                (None, None)
            };

        if matches!(self.tx.operations.last(), Some(Op::ReplaceMeta { .. })) {
            // The replace would touch the metadata offset the previous op
            // just rewrote.
            return Err(TransactionError::ReplaceAfterReplaceMetadata);
        }

        // Remove-after-remove coalescing.
        let mergeable = match self.tx.operations.last() {
            Some(Op::Replace {
                insert: last_insert,
                remove_metadata: last_rm,
                inserted_data_offset: last_ido,
                ..
            }) => {
                last_insert.is_empty()
                    && insert.is_empty()
                    && extra_meta.is_none()
                    && last_ido.is_none()
                    && inserted_data_offset.is_none()
                    && last_rm.is_some() == remove_metadata.is_some()
            }
            _ => false,
        };

        if mergeable {
            if let Some(Op::Replace {
                remove: last_remove,
                remove_metadata: last_rm,
                insert_metadata: last_im,
                ..
            }) = self.tx.operations.last_mut()
            {
                last_remove.extend(remove);
                if let (Some(last_rm), Some(cells)) = (last_rm.as_mut(), remove_metadata) {
                    last_rm.extend(cells);
                }
                if let (Some(last_im), Some(cells)) = (last_im.as_mut(), insert_metadata) {
                    last_im.extend(cells);
                }
            }
        } else {
            self.tx.operations.push(Op::Replace {
                remove,
                insert,
                remove_metadata,
                insert_metadata,
                inserted_data_offset,
                inserted_data_length,
            });
        }

        if let Some(merged) = extra_meta {
            self.push_replace_meta(Vec::new(), merged.into_vec());
        }
        Ok(())
    }

    /// Splice metadata elements at the current cursor. Empty-for-empty is
    /// dropped.
    pub fn push_replace_meta(&mut self, remove: Vec<MetaItem>, insert: Vec<MetaItem>) {
        if remove.is_empty() && insert.is_empty() {
            return;
        }
        self.tx.operations.push(Op::ReplaceMeta { remove, insert });
    }

    pub fn push_replace_element_attribute(
        &mut self,
        key: &str,
        from: Option<Value>,
        to: Option<Value>,
    ) {
        self.tx.operations.push(Op::Attribute { key: key.into(), from, to });
    }

    /// Emit attribute ops for every requested change whose value actually
    /// differs from `old_attrs`.
    pub fn push_attribute_changes(&mut self, changes: &AttrChanges, old_attrs: &AttrMap) {
        for (key, to) in changes {
            let from = old_attrs.get(key).cloned();
            if from != *to {
                self.push_replace_element_attribute(key, from, to.clone());
            }
        }
    }

    pub fn push_start_annotating(&mut self, method: AnnotationMethod, index: StoreIndex) {
        self.tx.operations.push(Op::Annotate { method, bias: AnnotationBias::Start, index });
    }

    pub fn push_stop_annotating(&mut self, method: AnnotationMethod, index: StoreIndex) {
        self.tx.operations.push(Op::Annotate { method, bias: AnnotationBias::Stop, index });
    }

    /// Retain whatever is left: the rest of the data, and the rest of the
    /// trailing metadata cell. `meta_offset` is how much of that cell earlier
    /// ops already consumed (only meaningful when `offset` is already at the
    /// end of the data).
    pub fn push_final_retain<D: Document>(&mut self, doc: &D, offset: usize, meta_offset: usize) {
        let data_len = doc.data().len();
        let mut meta_offset = meta_offset;
        if offset < data_len {
            self.push_retain(data_len - offset);
            meta_offset = 0;
        }
        let trailing = doc.metadata().get(data_len);
        if !trailing.is_empty() {
            self.push_retain_meta(trailing.len() - meta_offset);
        }
    }

    /// Remove `[remove_start, remove_end)`, stepping over undeletable nodes:
    /// deletable stretches become remove-only replaces, and each undeletable
    /// node (markers and contents) is retained whole. Returns the offset
    /// actually reached.
    ///
    /// `remove_metadata` removes the metadata under the range too; otherwise
    /// it is collapsed and carried (see [`push_replace`]).
    ///
    /// [`push_replace`]: TransactionBuilder::push_replace
    pub fn add_safe_remove_ops<D: Document>(
        &mut self,
        doc: &D,
        remove_start: usize,
        remove_end: usize,
        remove_metadata: bool,
    ) -> Result<usize, TransactionError> {
        let discard_meta = || -> Option<Vec<MetaCell>> {
            if remove_metadata {
                Some(Vec::new())
            } else {
                None
            }
        };
        let mut remove_start = remove_start;
        let mut retain_start = remove_start;
        let mut depth = 0isize;

        for i in remove_start..remove_end {
            let data = doc.data();
            let undeletable = data.is_element_data(i)
                && !doc.policy().is_deletable(data.item_name(i).unwrap_or(""));
            if !undeletable {
                continue;
            }
            if !data.is_close_element_data(i) {
                if depth == 0 {
                    if remove_start != i {
                        self.push_replace(doc, remove_start, i - remove_start, Vec::new(), discard_meta(), None, None)?;
                    }
                    retain_start = i;
                }
                depth += 1;
            } else {
                depth -= 1;
                if depth == 0 {
                    self.push_retain(i + 1 - retain_start);
                    remove_start = i + 1;
                }
            }
        }
        if remove_end > remove_start {
            self.push_replace(doc, remove_start, remove_end - remove_start, Vec::new(), discard_meta(), None, None)?;
        }
        Ok(remove_end)
    }

    /// Remove a range of nodes, merging mergeable endpoints and coalescing
    /// contiguous removals. Returns the offset the ops have consumed up to.
    pub fn push_removal<D: Document>(
        &mut self,
        doc: &D,
        range: DocRange,
        remove_metadata: bool,
    ) -> Result<usize, TransactionError> {
        use crate::document::{Node, SelectMode};

        if range.is_collapsed() {
            return Ok(0);
        }

        let selection = doc.select_nodes(range, SelectMode::Covered);
        let (first, last) = match (selection.first(), selection.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(TransactionError::InvalidRange { from: range.from, to: range.to });
            }
        };

        // Mergeable endpoints: splice out everything between them (whole
        // nodes when both are fully covered, the selected stretch otherwise)
        // and let the halves join.
        if first.node.can_be_merged_with(&last.node) {
            let (remove_start, remove_end) = if first.range.is_none() && last.range.is_none() {
                (first.node.outer_range().start(), last.node.outer_range().end())
            } else {
                (first.covered_or_inner().start(), last.covered_or_inner().end())
            };
            self.push_retain(remove_start);
            return self.add_safe_remove_ops(doc, remove_start, remove_end, remove_metadata);
        }

        // Not mergeable: remove fully covered nodes whole and strip the
        // covered content out of partially covered ones, fusing contiguous
        // removals as we go.
        let mut offset = 0usize;
        let mut pending: Option<(usize, usize)> = None;
        for selected in &selection {
            let node_range = match selected.range {
                None => selected.node.outer_range(),
                Some(covered) => covered,
            };
            let (node_start, node_end) = (node_range.start(), node_range.end());
            match pending {
                Some((_, pending_end)) if node_end <= pending_end => {
                    // Engulfed by the current removal.
                }
                Some((pending_start, pending_end)) if node_start == pending_end => {
                    pending = Some((pending_start, node_end));
                }
                Some((pending_start, pending_end)) => {
                    self.push_retain(pending_start - offset);
                    offset = self.add_safe_remove_ops(doc, pending_start, pending_end, remove_metadata)?;
                    pending = Some((node_start, node_end));
                }
                None => {
                    pending = Some((node_start, node_end));
                }
            }
        }
        if let Some((pending_start, pending_end)) = pending {
            self.push_retain(pending_start - offset);
            offset = self.add_safe_remove_ops(doc, pending_start, pending_end, remove_metadata)?;
        }
        Ok(offset)
    }

    /// Insert `data` at `insert_offset`, letting the document fix the
    /// insertion up first. Returns the offset the ops have consumed up to.
    pub fn push_insertion<D: Document>(
        &mut self,
        doc: &D,
        current_offset: usize,
        insert_offset: usize,
        data: Vec<DataItem>,
    ) -> Result<usize, TransactionError> {
        let insertion = doc.fixup_insertion(data, insert_offset);
        let lead = insertion
            .offset
            .checked_sub(current_offset)
            .expect("insertion fixup re-seated the offset before already-consumed data");
        self.push_retain(lead);
        self.push_replace(
            doc,
            insertion.offset,
            insertion.remove,
            insertion.data,
            None,
            insertion.inserted_offset,
            insertion.inserted_len,
        )?;
        Ok(insertion.offset + insertion.remove)
    }
}
