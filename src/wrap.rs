//! Structural re-shaping: converting content branches to another type, and
//! wrapping/unwrapping ranges with element sequences.

use smartstring::alias::String as SmartString;

use crate::builder::TransactionBuilder;
use crate::document::{Document, Node, SelectMode};
use crate::error::TransactionError;
use crate::linear::DataItem;
use crate::range::DocRange;
use crate::transaction::Transaction;
use crate::values::{attrs_match, AttrChanges, AttrMap};

/// The reversed-closing form of a run of opening markers.
fn closing_array(openings: &[DataItem]) -> Vec<DataItem> {
    openings
        .iter()
        .rev()
        .filter_map(DataItem::closing)
        .collect()
}

impl Transaction {
    /// Convert every content branch touched by `range` to `name` with
    /// `attributes`. Branches already of the target type get attribute ops
    /// only (or nothing, if all requested attributes already match); other
    /// branches get their opening and closing markers replaced around a
    /// retain of the contents. Each branch is edited at most once no matter
    /// how many of its leaves the range covers.
    pub fn new_content_branch_conversion<D: Document>(
        doc: &D,
        range: DocRange,
        name: &str,
        attributes: Option<AttrMap>,
    ) -> Result<Transaction, TransactionError> {
        let wanted = attributes.unwrap_or_default();
        let opening = DataItem::open_with(name, wanted.clone());
        let closing = DataItem::close(name);
        let changes: AttrChanges =
            wanted.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect();

        let mut builder = TransactionBuilder::new();
        let mut cursor = 0usize;
        let mut previous: Option<D::Node> = None;

        for selected in doc.select_nodes(range, SelectMode::Leaves) {
            let branch = if selected.node.is_content() {
                match selected.node.parent() {
                    Some(parent) => parent,
                    None => continue,
                }
            } else {
                selected.node
            };
            if !branch.can_contain_content() {
                continue;
            }
            if previous.as_ref() == Some(&branch) {
                // Another leaf of the branch we just converted.
                continue;
            }
            let branch_attrs = branch.attributes();
            if branch.name() == name && attrs_match(&wanted, &branch_attrs) {
                // Nothing to do for this branch.
                continue;
            }

            let outer = branch.outer_range();
            builder.push_retain(outer.start() - cursor);
            if branch.name() == name {
                builder.push_attribute_changes(&changes, &branch_attrs);
                builder.push_retain(outer.len());
            } else {
                builder.push_replace(doc, outer.start(), 1, vec![opening.clone()], None, None, None)?;
                builder.push_retain(branch.len());
                builder.push_replace(doc, outer.end() - 1, 1, vec![closing.clone()], None, None, None)?;
            }
            cursor = outer.end();
            previous = Some(branch);
        }

        builder.push_final_retain(doc, cursor, 0);
        Ok(builder.into_transaction())
    }

    /// Wrap/unwrap `range`. `unwrap_outer` names the markers that must sit
    /// immediately before the range (they are removed); `wrap_outer` is put
    /// in their place, with its reversed-closing form at the range's end.
    /// When `unwrap_each`/`wrap_each` are given, every top-level child inside
    /// the range gets the same treatment.
    ///
    /// Whatever this removes, the op payload is the live document slice, so
    /// current attributes ride along into the `remove` arrays and reversal
    /// restores them. No nesting check is performed on the wrappers; callers
    /// own the validity of what they ask for.
    pub fn new_wrap<D: Document>(
        doc: &D,
        range: DocRange,
        unwrap_outer: &[DataItem],
        wrap_outer: &[DataItem],
        unwrap_each: &[DataItem],
        wrap_each: &[DataItem],
    ) -> Result<Transaction, TransactionError> {
        let data = doc.data();
        let start = range.start();
        let end = range.end();

        if start < unwrap_outer.len() {
            return Err(TransactionError::UnwrapMismatch {
                offset: start,
                expected: unwrap_outer
                    .first()
                    .and_then(DataItem::name)
                    .unwrap_or("")
                    .into(),
                found: SmartString::new(),
            });
        }
        for (i, expected) in unwrap_outer.iter().enumerate() {
            let offset = start - unwrap_outer.len() + i;
            let found = data.item_name(offset).unwrap_or("");
            if Some(found) != expected.name() {
                return Err(TransactionError::UnwrapMismatch {
                    offset,
                    expected: expected.name().unwrap_or("").into(),
                    found: found.into(),
                });
            }
        }

        let mut builder = TransactionBuilder::new();
        builder.push_retain(start - unwrap_outer.len());
        if !wrap_outer.is_empty() || !unwrap_outer.is_empty() {
            builder.push_replace(
                doc,
                start - unwrap_outer.len(),
                unwrap_outer.len(),
                wrap_outer.to_vec(),
                None,
                None,
                None,
            )?;
        }

        if !wrap_each.is_empty() || !unwrap_each.is_empty() {
            let closing_wrap_each = closing_array(wrap_each);
            let mut start_offset = start;
            let mut depth = 0isize;
            for i in start..end {
                if data.is_open_element_data(i) {
                    depth += 1;
                    if depth == 1 {
                        // A top-level child starts here; its opening markers
                        // must match the unwrap template.
                        for (j, expected) in unwrap_each.iter().enumerate() {
                            let found = data.item_name(i + j).unwrap_or("");
                            if Some(found) != expected.name() {
                                return Err(TransactionError::UnwrapMismatch {
                                    offset: i + j,
                                    expected: expected.name().unwrap_or("").into(),
                                    found: found.into(),
                                });
                            }
                        }
                        builder.push_retain(i - start_offset);
                        builder.push_replace(doc, i, unwrap_each.len(), wrap_each.to_vec(), None, None, None)?;
                        start_offset = i + unwrap_each.len();
                    }
                } else if data.is_close_element_data(i) {
                    depth -= 1;
                    if depth == 0 {
                        builder.push_retain(i + 1 - unwrap_each.len() - start_offset);
                        builder.push_replace(
                            doc,
                            i + 1 - unwrap_each.len(),
                            unwrap_each.len(),
                            closing_wrap_each.clone(),
                            None,
                            None,
                            None,
                        )?;
                        start_offset = i + 1;
                    }
                }
            }
            builder.push_retain(end - start_offset);
        } else {
            builder.push_retain(end - start);
        }

        if !wrap_outer.is_empty() || !unwrap_outer.is_empty() {
            builder.push_replace(doc, end, unwrap_outer.len(), closing_array(wrap_outer), None, None, None)?;
        }
        builder.push_final_retain(doc, end + unwrap_outer.len(), 0);
        Ok(builder.into_transaction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Op;
    use crate::testdoc::SimpleDoc;
    use crate::values::{attrs, Value};

    fn two_paragraphs() -> SimpleDoc {
        SimpleDoc::from_items(vec![
            DataItem::open("paragraph"),
            DataItem::ch('a'),
            DataItem::close("paragraph"),
            DataItem::open("paragraph"),
            DataItem::ch('b'),
            DataItem::close("paragraph"),
        ])
    }

    #[test]
    fn wrap_paragraphs_into_a_list() {
        let doc = two_paragraphs();
        let item = DataItem::open_with("listItem", attrs([("styles", Value::List(vec!["bullet".into()]))]));
        let tx = Transaction::new_wrap(
            &doc,
            DocRange::new(0, 6),
            &[],
            &[DataItem::open("list")],
            &[],
            &[item.clone()],
        )
        .unwrap();

        assert_eq!(
            tx.operations(),
            &[
                Op::replace(vec![], vec![DataItem::open("list")]),
                Op::replace(vec![], vec![item.clone()]),
                Op::retain(3),
                Op::replace(vec![], vec![DataItem::close("listItem")]),
                Op::replace(vec![], vec![item.clone()]),
                Op::retain(3),
                Op::replace(vec![], vec![DataItem::close("listItem")]),
                Op::replace(vec![], vec![DataItem::close("list")]),
            ]
        );
        tx.dbg_check(&doc);
    }

    #[test]
    fn unwrap_template_must_match() {
        let doc = two_paragraphs();
        // Nothing before the range to unwrap.
        let err = Transaction::new_wrap(
            &doc,
            DocRange::new(0, 6),
            &[DataItem::open("list")],
            &[],
            &[],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, TransactionError::UnwrapMismatch { .. }));

        // Each-template mismatch inside the range.
        let err = Transaction::new_wrap(
            &doc,
            DocRange::new(0, 6),
            &[],
            &[],
            &[DataItem::open("listItem")],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, TransactionError::UnwrapMismatch { offset: 0, .. }));
    }

    #[test]
    fn unwrap_removes_live_attributes() {
        // A list whose opening carries attributes that must survive reversal.
        let doc = SimpleDoc::from_items(vec![
            DataItem::open_with("list", attrs([("style", "number".into())])),
            DataItem::open("listItem"),
            DataItem::open("paragraph"),
            DataItem::ch('a'),
            DataItem::close("paragraph"),
            DataItem::close("listItem"),
            DataItem::close("list"),
        ]);
        // Unwrap the list: range covers the listItem run.
        let tx = Transaction::new_wrap(
            &doc,
            DocRange::new(1, 6),
            &[DataItem::open("list")],
            &[],
            &[DataItem::open("listItem")],
            &[],
        )
        .unwrap();
        // The removed opener is the live one, attributes included.
        match &tx.operations()[0] {
            Op::Replace { remove, insert, .. } => {
                assert_eq!(remove[0].attributes().unwrap().get("style"), Some(&Value::Str("number".into())));
                assert!(insert.is_empty());
            }
            other => panic!("expected replace, got {}", other),
        }
        tx.dbg_check(&doc);
    }

    #[test]
    fn conversion_edits_each_branch_once() {
        let doc = two_paragraphs();
        let tx = Transaction::new_content_branch_conversion(
            &doc,
            DocRange::new(1, 5),
            "heading",
            Some(attrs([("level", Value::Int(2))])),
        )
        .unwrap();
        let heading = DataItem::open_with("heading", attrs([("level", Value::Int(2))]));
        assert_eq!(
            tx.operations(),
            &[
                Op::replace(vec![DataItem::open("paragraph")], vec![heading.clone()]),
                Op::retain(1),
                Op::replace(vec![DataItem::close("paragraph")], vec![DataItem::close("heading")]),
                Op::replace(vec![DataItem::open("paragraph")], vec![heading]),
                Op::retain(1),
                Op::replace(vec![DataItem::close("paragraph")], vec![DataItem::close("heading")]),
            ]
        );
        tx.dbg_check(&doc);
    }

    #[test]
    fn conversion_skips_branches_already_converted() {
        let doc = SimpleDoc::from_items(vec![
            DataItem::open_with("heading", attrs([("level", Value::Int(2))])),
            DataItem::ch('a'),
            DataItem::close("heading"),
        ]);
        let tx = Transaction::new_content_branch_conversion(
            &doc,
            DocRange::new(1, 2),
            "heading",
            Some(attrs([("level", Value::Int(2))])),
        )
        .unwrap();
        assert!(tx.is_no_op());

        // Same type, different attributes: attribute op plus retain.
        let tx = Transaction::new_content_branch_conversion(
            &doc,
            DocRange::new(1, 2),
            "heading",
            Some(attrs([("level", Value::Int(3))])),
        )
        .unwrap();
        assert_eq!(
            tx.operations(),
            &[
                Op::Attribute {
                    key: "level".into(),
                    from: Some(Value::Int(2)),
                    to: Some(Value::Int(3)),
                },
                Op::retain(3),
            ]
        );
        tx.dbg_check(&doc);
    }
}
