//! Annotations and the pooled store that owns them.
//!
//! Characters (and annotatable content openings) don't carry annotation
//! values inline. The values are pooled in an [`AnnotationStore`] and the
//! linear data carries sets of store indices. This mirrors how the operation
//! log keeps inserted content in a context pool and lets ops refer to it by
//! offset: it makes items copyable, keeps the data small, and gives us a
//! well-defined notion of *exact* identity (same index) distinct from
//! *comparable* identity (same name and attributes).

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::values::AttrMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of an annotation in its store.
pub type StoreIndex = usize;

/// An annotation value: bold, a link, a language span.
///
/// `source` holds presentation payload carried over from whatever markup the
/// annotation was parsed from. It participates in store identity (so two
/// bolds from different source markup pool separately) but *not* in
/// comparable identity.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Annotation {
    pub name: SmartString,
    pub attributes: AttrMap,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "AttrMap::is_empty"))]
    pub source: AttrMap,
}

impl Annotation {
    pub fn new(name: &str) -> Annotation {
        Annotation { name: name.into(), attributes: AttrMap::new(), source: AttrMap::new() }
    }

    pub fn with_attributes(name: &str, attributes: AttrMap) -> Annotation {
        Annotation { name: name.into(), attributes, source: AttrMap::new() }
    }

    /// Value comparison, ignoring the `source` payload. Two annotations can
    /// be comparable while pooling at different store indices.
    pub fn comparable_to(&self, other: &Annotation) -> bool {
        self.name == other.name && self.attributes == other.attributes
    }
}

/// The set of annotations on one linear item, as store indices. Order is
/// meaningful (it is rendering order) and duplicates are not allowed.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct AnnotationSet(pub SmallVec<[StoreIndex; 2]>);

impl AnnotationSet {
    pub fn new() -> AnnotationSet {
        AnnotationSet(SmallVec::new())
    }

    pub fn single(index: StoreIndex) -> AnnotationSet {
        let mut set = AnnotationSet::new();
        set.push(index);
        set
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact membership: same store index.
    pub fn contains(&self, index: StoreIndex) -> bool {
        self.0.contains(&index)
    }

    /// Comparable membership: any member whose pooled value has the same name
    /// and attributes as `annotation`.
    pub fn contains_comparable(&self, store: &AnnotationStore, annotation: &Annotation) -> bool {
        self.0.iter().any(|&i| store.get(i).is_some_and(|a| a.comparable_to(annotation)))
    }

    pub fn push(&mut self, index: StoreIndex) {
        if !self.contains(index) {
            self.0.push(index);
        }
    }

    pub fn remove(&mut self, index: StoreIndex) {
        self.0.retain(|&mut i| i != index);
    }

    pub fn iter(&self) -> impl Iterator<Item = StoreIndex> + '_ {
        self.0.iter().copied()
    }

    /// Rewrite every member through `mapping` (old index -> new index).
    pub fn remap(&mut self, mapping: &StoreMapping) {
        for index in self.0.iter_mut() {
            *index = mapping.map(*index);
        }
    }
}

/// Mapping from indices in a merged-in store to indices in the receiver,
/// as returned by [`AnnotationStore::merge`].
#[derive(Debug, Clone, Default)]
pub struct StoreMapping(Vec<StoreIndex>);

impl StoreMapping {
    pub fn map(&self, old: StoreIndex) -> StoreIndex {
        self.0[old]
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &m)| i == m)
    }
}

/// Value-pooled annotation storage. Indexing the same value twice returns the
/// same index; values are never removed, so indices stay stable for the life
/// of the document.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct AnnotationStore {
    values: Vec<Annotation>,
}

impl AnnotationStore {
    pub fn new() -> AnnotationStore {
        AnnotationStore { values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: StoreIndex) -> Option<&Annotation> {
        self.values.get(index)
    }

    /// Pool `annotation`, returning its index. Pools by full value, so
    /// annotations differing only in `source` get distinct indices.
    pub fn index(&mut self, annotation: Annotation) -> StoreIndex {
        if let Some(i) = self.values.iter().position(|a| *a == annotation) {
            i
        } else {
            self.values.push(annotation);
            self.values.len() - 1
        }
    }

    /// Pool every value from `other` into `self`, returning the index
    /// mapping. Values already present keep their existing index.
    pub fn merge(&mut self, other: &AnnotationStore) -> StoreMapping {
        StoreMapping(other.values.iter().map(|a| self.index(a.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::attrs;

    #[test]
    fn index_pools_by_value() {
        let mut store = AnnotationStore::new();
        let bold = store.index(Annotation::new("bold"));
        assert_eq!(store.index(Annotation::new("bold")), bold);
        let italic = store.index(Annotation::new("italic"));
        assert_ne!(bold, italic);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn comparable_vs_exact() {
        let mut store = AnnotationStore::new();
        let plain = store.index(Annotation::new("bold"));
        let mut from_markup = Annotation::new("bold");
        from_markup.source = attrs([("tag", "b".into())]);
        let tagged = store.index(from_markup.clone());
        assert_ne!(plain, tagged);

        let set = AnnotationSet::single(plain);
        // Not the exact annotation...
        assert!(!set.contains(tagged));
        // ...but comparable to it.
        assert!(set.contains_comparable(&store, &from_markup));
    }

    #[test]
    fn merge_maps_indices() {
        let mut a = AnnotationStore::new();
        a.index(Annotation::new("bold"));
        let mut b = AnnotationStore::new();
        b.index(Annotation::new("italic"));
        b.index(Annotation::new("bold"));

        let mapping = a.merge(&b);
        assert_eq!(mapping.map(0), 1); // italic is new
        assert_eq!(mapping.map(1), 0); // bold already pooled
        assert!(!mapping.is_identity());

        let mut set = AnnotationSet::single(0);
        set.push(1);
        set.remap(&mapping);
        assert_eq!(set, AnnotationSet(smallvec::smallvec![1, 0]));
    }
}
