//! The linear document data: a flat item sequence encoding the pre-order
//! traversal of the document tree. Opening and closing markers bracket
//! structural nodes; characters live between them. The transaction core reads
//! this representation directly but asks the document collaborator for any
//! tree-level fact.

use smartstring::alias::String as SmartString;

use crate::linear::annotation::{AnnotationSet, StoreMapping};
use crate::range::DocRange;
use crate::values::{AttrMap, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One item of linear data.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "camelCase"))]
pub enum DataItem {
    /// A character, with the annotations covering it.
    Char {
        ch: char,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "AnnotationSet::is_empty"))]
        annotations: AnnotationSet,
    },
    /// An opening element marker. Content-level elements (inline nodes) can
    /// carry annotations just like characters.
    Open {
        name: SmartString,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "AttrMap::is_empty"))]
        attributes: AttrMap,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "AnnotationSet::is_empty"))]
        annotations: AnnotationSet,
    },
    /// A closing element marker.
    Close { name: SmartString },
}

impl DataItem {
    pub fn ch(ch: char) -> DataItem {
        DataItem::Char { ch, annotations: AnnotationSet::new() }
    }

    pub fn ch_annotated(ch: char, annotations: AnnotationSet) -> DataItem {
        DataItem::Char { ch, annotations }
    }

    pub fn open(name: &str) -> DataItem {
        DataItem::Open { name: name.into(), attributes: AttrMap::new(), annotations: AnnotationSet::new() }
    }

    pub fn open_with(name: &str, attributes: AttrMap) -> DataItem {
        DataItem::Open { name: name.into(), attributes, annotations: AnnotationSet::new() }
    }

    pub fn close(name: &str) -> DataItem {
        DataItem::Close { name: name.into() }
    }

    pub fn is_element(&self) -> bool {
        !matches!(self, DataItem::Char { .. })
    }

    pub fn is_open(&self) -> bool {
        matches!(self, DataItem::Open { .. })
    }

    pub fn is_close(&self) -> bool {
        matches!(self, DataItem::Close { .. })
    }

    /// The element name, for markers.
    pub fn name(&self) -> Option<&str> {
        match self {
            DataItem::Open { name, .. } | DataItem::Close { name } => Some(name.as_str()),
            DataItem::Char { .. } => None,
        }
    }

    pub fn attributes(&self) -> Option<&AttrMap> {
        match self {
            DataItem::Open { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn annotations(&self) -> Option<&AnnotationSet> {
        match self {
            DataItem::Char { annotations, .. } | DataItem::Open { annotations, .. } => Some(annotations),
            DataItem::Close { .. } => None,
        }
    }

    pub fn annotations_mut(&mut self) -> Option<&mut AnnotationSet> {
        match self {
            DataItem::Char { annotations, .. } | DataItem::Open { annotations, .. } => Some(annotations),
            DataItem::Close { .. } => None,
        }
    }

    /// The matching closing marker for an opening one.
    pub fn closing(&self) -> Option<DataItem> {
        match self {
            DataItem::Open { name, .. } => Some(DataItem::Close { name: name.clone() }),
            _ => None,
        }
    }
}

impl From<char> for DataItem {
    fn from(ch: char) -> Self {
        DataItem::ch(ch)
    }
}

/// The flat item sequence, with the offset queries the transaction core uses.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct LinearData {
    items: Vec<DataItem>,
}

impl LinearData {
    pub fn new(items: Vec<DataItem>) -> LinearData {
        LinearData { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<&DataItem> {
        self.items.get(offset)
    }

    pub fn items(&self) -> &[DataItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<DataItem> {
        &mut self.items
    }

    pub fn slice(&self, range: DocRange) -> &[DataItem] {
        &self.items[range.start()..range.end()]
    }

    /// Owned copy of a range, for op payloads.
    pub fn slice_vec(&self, range: DocRange) -> Vec<DataItem> {
        self.slice(range).to_vec()
    }

    pub fn is_element_data(&self, offset: usize) -> bool {
        self.get(offset).is_some_and(DataItem::is_element)
    }

    pub fn is_open_element_data(&self, offset: usize) -> bool {
        self.get(offset).is_some_and(DataItem::is_open)
    }

    pub fn is_close_element_data(&self, offset: usize) -> bool {
        self.get(offset).is_some_and(DataItem::is_close)
    }

    pub fn item_name(&self, offset: usize) -> Option<&str> {
        self.get(offset).and_then(DataItem::name)
    }

    pub fn annotations_from_offset(&self, offset: usize) -> Option<&AnnotationSet> {
        self.get(offset).and_then(DataItem::annotations)
    }

    /// Rewrite annotation store indices in every item through `mapping`.
    /// Used when data extracted from one document is inserted into another
    /// after a store merge.
    pub fn remap_annotations(items: &mut [DataItem], mapping: &StoreMapping) {
        for item in items {
            if let Some(set) = item.annotations_mut() {
                set.remap(mapping);
            }
        }
    }

    /// Rewrite internal-list references in element attributes through a
    /// merged-list index mapping. Reference nodes point at internal items
    /// via their `listIndex` attribute.
    pub fn remap_list_references(items: &mut [DataItem], mapping: &[usize]) {
        for item in items {
            if let DataItem::Open { attributes, .. } = item {
                if let Some(Value::Int(old)) = attributes.get("listIndex") {
                    let old = *old as usize;
                    if old < mapping.len() {
                        attributes.insert("listIndex".into(), Value::Int(mapping[old] as i64));
                    }
                }
            }
        }
    }
}

impl From<Vec<DataItem>> for LinearData {
    fn from(items: Vec<DataItem>) -> Self {
        LinearData::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LinearData {
        LinearData::new(vec![
            DataItem::open("paragraph"),
            DataItem::ch('a'),
            DataItem::ch('b'),
            DataItem::close("paragraph"),
        ])
    }

    #[test]
    fn offset_queries() {
        let data = sample();
        assert!(data.is_element_data(0));
        assert!(data.is_open_element_data(0));
        assert!(!data.is_close_element_data(0));
        assert!(data.is_close_element_data(3));
        assert!(!data.is_element_data(1));
        assert_eq!(data.item_name(0), Some("paragraph"));
        assert_eq!(data.item_name(1), None);
        assert!(!data.is_element_data(17));
    }

    #[test]
    fn list_reference_remap() {
        let mut items = vec![
            DataItem::open_with("reference", crate::values::attrs([("listIndex", Value::Int(1))])),
            DataItem::close("reference"),
        ];
        LinearData::remap_list_references(&mut items, &[2, 5]);
        assert_eq!(items[0].attributes().unwrap().get("listIndex"), Some(&Value::Int(5)));
    }
}
