//! The operation language. A transaction is an ordered list of these six
//! variants; the list as a whole always consumes the source document exactly
//! once on each axis, even though a single op may transiently unbalance the
//! tree (removing a wrapper takes one op for the opener and one for the
//! closer).

use std::fmt::{Display, Formatter};
use smartstring::alias::String as SmartString;

use crate::linear::{DataItem, MetaCell, MetaItem, StoreIndex};
use crate::values::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Set or clear.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum AnnotationMethod {
    Set,
    Clear,
}

impl AnnotationMethod {
    /// The method that undoes this one.
    pub fn reversed(self) -> AnnotationMethod {
        match self {
            AnnotationMethod::Set => AnnotationMethod::Clear,
            AnnotationMethod::Clear => AnnotationMethod::Set,
        }
    }
}

impl Display for AnnotationMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AnnotationMethod::Set => "set",
            AnnotationMethod::Clear => "clear",
        })
    }
}

/// Whether an annotate op opens or closes an annotating span.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum AnnotationBias {
    Start,
    Stop,
}

/// Operation discriminant, for routing predicates.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpKind {
    Retain,
    RetainMeta,
    Replace,
    ReplaceMeta,
    Attribute,
    Annotate,
}

/// One operation.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum Op {
    /// Advance the data cursor, emitting `length` items unchanged.
    Retain { length: usize },

    /// Advance the metadata cursor within the current offset's cell.
    #[cfg_attr(feature = "serde", serde(rename = "retainMetadata"))]
    RetainMeta { length: usize },

    /// Replace `remove` with `insert` at the data cursor, optionally carrying
    /// the same-length cell runs on the metadata axis. `inserted_data_offset`
    /// and `inserted_data_length` mark the caller-intended payload inside
    /// `insert` when the document padded it with fixup wrappers.
    Replace {
        remove: Vec<DataItem>,
        insert: Vec<DataItem>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
        remove_metadata: Option<Vec<MetaCell>>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
        insert_metadata: Option<Vec<MetaCell>>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
        inserted_data_offset: Option<usize>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
        inserted_data_length: Option<usize>,
    },

    /// Splice metadata elements within the cell at the current cursor.
    #[cfg_attr(feature = "serde", serde(rename = "replaceMetadata"))]
    ReplaceMeta { remove: Vec<MetaItem>, insert: Vec<MetaItem> },

    /// Change one attribute on the opening marker at the data cursor. Zero
    /// cursor length, but it modifies one position. `to: None` removes.
    Attribute {
        key: SmartString,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
        from: Option<Value>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
        to: Option<Value>,
    },

    /// Open or close an annotating span: every annotatable item retained
    /// while a span is open gets the store index applied.
    Annotate {
        method: AnnotationMethod,
        bias: AnnotationBias,
        index: StoreIndex,
    },
}

impl Op {
    pub fn retain(length: usize) -> Op {
        Op::Retain { length }
    }

    pub fn retain_meta(length: usize) -> Op {
        Op::RetainMeta { length }
    }

    /// A plain replace with no metadata or fixup markers.
    pub fn replace(remove: Vec<DataItem>, insert: Vec<DataItem>) -> Op {
        Op::Replace {
            remove,
            insert,
            remove_metadata: None,
            insert_metadata: None,
            inserted_data_offset: None,
            inserted_data_length: None,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Retain { .. } => OpKind::Retain,
            Op::RetainMeta { .. } => OpKind::RetainMeta,
            Op::Replace { .. } => OpKind::Replace,
            Op::ReplaceMeta { .. } => OpKind::ReplaceMeta,
            Op::Attribute { .. } => OpKind::Attribute,
            Op::Annotate { .. } => OpKind::Annotate,
        }
    }

    /// How many source data items this op consumes. Summed over a
    /// transaction this must equal the source document's data length.
    pub fn data_consumed(&self) -> usize {
        match self {
            Op::Retain { length } => *length,
            Op::Replace { remove, .. } => remove.len(),
            _ => 0,
        }
    }

    /// How many target data items this op produces.
    pub fn data_produced(&self) -> usize {
        match self {
            Op::Retain { length } => *length,
            Op::Replace { insert, .. } => insert.len(),
            _ => 0,
        }
    }

    /// The op that exactly undoes this one.
    pub fn reversed(&self) -> Op {
        match self {
            Op::Annotate { method, bias, index } => Op::Annotate {
                method: method.reversed(),
                bias: *bias,
                index: *index,
            },
            Op::Attribute { key, from, to } => Op::Attribute {
                key: key.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Op::Replace {
                remove,
                insert,
                remove_metadata,
                insert_metadata,
                inserted_data_offset: _,
                inserted_data_length: _,
            } => Op::Replace {
                remove: insert.clone(),
                insert: remove.clone(),
                remove_metadata: insert_metadata.clone(),
                insert_metadata: remove_metadata.clone(),
                // The fixup markers describe the forward insertion; they
                // don't survive reversal.
                inserted_data_offset: None,
                inserted_data_length: None,
            },
            Op::ReplaceMeta { remove, insert } => Op::ReplaceMeta {
                remove: insert.clone(),
                insert: remove.clone(),
            },
            other => other.clone(),
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Retain { length } => write!(f, "retain {}", length),
            Op::RetainMeta { length } => write!(f, "retainMeta {}", length),
            Op::Replace { remove, insert, .. } => {
                write!(f, "replace -{} +{}", remove.len(), insert.len())
            }
            Op::ReplaceMeta { remove, insert } => {
                write!(f, "replaceMeta -{} +{}", remove.len(), insert.len())
            }
            Op::Attribute { key, .. } => write!(f, "attribute {}", key),
            Op::Annotate { method, bias, index } => {
                write!(f, "annotate {} {:?} #{}", method, bias, index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_swaps_per_variant() {
        let annotate = Op::Annotate {
            method: AnnotationMethod::Set,
            bias: AnnotationBias::Start,
            index: 3,
        };
        assert_eq!(
            annotate.reversed(),
            Op::Annotate { method: AnnotationMethod::Clear, bias: AnnotationBias::Start, index: 3 }
        );

        let attribute = Op::Attribute {
            key: "level".into(),
            from: Some(Value::Int(1)),
            to: Some(Value::Int(2)),
        };
        assert_eq!(
            attribute.reversed(),
            Op::Attribute { key: "level".into(), from: Some(Value::Int(2)), to: Some(Value::Int(1)) }
        );

        let replace = Op::replace(vec![DataItem::ch('a')], vec![DataItem::ch('b')]);
        let reversed = replace.reversed();
        assert_eq!(reversed, Op::replace(vec![DataItem::ch('b')], vec![DataItem::ch('a')]));

        let retain = Op::retain(5);
        assert_eq!(retain.reversed(), retain);
    }

    #[test]
    fn double_reversal_is_identity() {
        let ops = [
            Op::retain(2),
            Op::replace(vec![DataItem::ch('x')], vec![]),
            Op::ReplaceMeta { remove: vec![], insert: vec![MetaItem::new("comment")] },
            Op::Attribute { key: "style".into(), from: None, to: Some("bullet".into()) },
            Op::retain_meta(1),
        ];
        for op in &ops {
            assert_eq!(&op.reversed().reversed(), op);
        }
    }

    #[test]
    fn reversal_drops_fixup_markers() {
        let op = Op::Replace {
            remove: vec![],
            insert: vec![
                DataItem::open("paragraph"),
                DataItem::ch('x'),
                DataItem::close("paragraph"),
            ],
            remove_metadata: None,
            insert_metadata: None,
            inserted_data_offset: Some(1),
            inserted_data_length: Some(1),
        };
        match op.reversed() {
            Op::Replace { inserted_data_offset, inserted_data_length, .. } => {
                assert_eq!(inserted_data_offset, None);
                assert_eq!(inserted_data_length, None);
            }
            other => panic!("expected replace, got {}", other),
        }
    }

    #[test]
    fn length_accounting() {
        assert_eq!(Op::retain(4).data_consumed(), 4);
        let op = Op::replace(vec![DataItem::ch('a'), DataItem::ch('b')], vec![DataItem::ch('c')]);
        assert_eq!(op.data_consumed(), 2);
        assert_eq!(op.data_produced(), 1);
        assert_eq!(Op::retain_meta(3).data_consumed(), 0);
    }
}
