//! The collaborator seam. The transaction core never parses the document
//! tree itself; everything tree-shaped comes through these traits. A real
//! editor supplies its document model here; [`crate::testdoc`] supplies a
//! small reference implementation.

use crate::linear::{Annotation, AnnotationStore, DataItem, LinearData, MetaLinearData};
use crate::range::DocRange;
use crate::values::AttrMap;

/// Opaque document identity, used to recognize that a pasted document slice
/// was extracted from the document it is being pasted back into.
pub type DocId = u64;

/// Per-element-name policy queries. These correspond to static node-type
/// registrations in the editor: which names are structural fixtures, which
/// are content, which accept annotations.
pub trait NodePolicy {
    /// Can markers of this name be deleted? Undeletable nodes are stepped
    /// over by range removal.
    fn is_deletable(&self, name: &str) -> bool;

    /// Is this a content-level (inline) node, as opposed to structure?
    fn is_content(&self, name: &str) -> bool;

    /// Can an opening of this name carry `annotation`?
    fn can_take_annotation(&self, name: &str, annotation: &Annotation) -> bool;

    /// Should everything between this node's markers be treated as opaque?
    fn ignores_children(&self, name: &str) -> bool;
}

/// A handle to a node in the document tree. Handles are cheap to clone and
/// compare; equality is node identity.
pub trait Node: Clone + PartialEq {
    fn name(&self) -> &str;
    fn attributes(&self) -> AttrMap;

    /// Content-level node (text run, inline element)?
    fn is_content(&self) -> bool;

    /// Can this node hold content directly (paragraph, heading)?
    fn can_contain_content(&self) -> bool;

    /// Would removing the data between this node and `other` leave two
    /// halves that join into one valid node? True when the two nodes have
    /// the same type and their ancestor type chains match.
    fn can_be_merged_with(&self, other: &Self) -> bool;

    /// Inner range: between the markers.
    fn range(&self) -> DocRange;

    /// Outer range: including the markers.
    fn outer_range(&self) -> DocRange;

    fn len(&self) -> usize {
        self.range().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn outer_len(&self) -> usize {
        self.outer_range().len()
    }

    fn parent(&self) -> Option<Self>;
}

/// How [`Document::select_nodes`] should walk the tree.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SelectMode {
    /// The smallest set of nodes covering the range: fully covered nodes are
    /// returned whole (never descended into), partially covered nodes are
    /// descended into until a leaf reports the covered sub-range.
    Covered,
    /// Every leaf node the range touches.
    Leaves,
}

/// One result row from [`Document::select_nodes`].
#[derive(Debug, Clone)]
pub struct NodeSelection<N> {
    pub node: N,
    /// The covered portion of the node's inner range. `None` means the node
    /// is completely covered by the selection.
    pub range: Option<DocRange>,
}

impl<N: Node> NodeSelection<N> {
    /// The range this row contributes to a removal: the covered portion for
    /// partial coverage, the node's inner range otherwise.
    pub fn covered_or_inner(&self) -> DocRange {
        self.range.unwrap_or_else(|| self.node.range())
    }
}

/// The result of fixing up an insertion so the tree stays balanced. The
/// document may re-seat the offset, remove items, and pad the data with
/// wrapper markers; `inserted_offset`/`inserted_len` mark the caller's
/// original payload inside the padded data.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub offset: usize,
    pub remove: usize,
    pub data: Vec<DataItem>,
    pub inserted_offset: Option<usize>,
    pub inserted_len: Option<usize>,
}

/// The result of merging another document's internal list into this one.
#[derive(Debug, Clone, Default)]
pub struct ListMerge {
    /// For each item index in the merged-in list, its index in the merged
    /// result.
    pub mapping: Vec<usize>,
    /// Outer ranges (in the merged-in document) of the items that were new.
    pub new_item_ranges: Vec<DocRange>,
}

/// The reserved tail region holding referenceable items.
pub trait InternalList {
    type Node: Node;

    /// The node spanning the whole internal list.
    fn list_node(&self) -> Self::Node;

    fn item_count(&self) -> usize;

    /// The node for one internal item, in document order.
    fn item_node(&self, index: usize) -> Self::Node;

    /// Merge `other`'s items into this list. Items `0..orig_len` of `other`
    /// are assumed shared (identity-mapped); later items are matched by key,
    /// and unmatched ones are appended and reported in `new_item_ranges`.
    fn merge(&mut self, other: &Self, orig_len: usize) -> ListMerge;
}

/// The document collaborator: linear data and metadata plus the tree-level
/// services the transaction constructors need.
pub trait Document {
    type Node: Node;
    type Policy: NodePolicy;
    type List: InternalList<Node = Self::Node>;

    fn id(&self) -> DocId;

    /// For a document slice: the id of the document it was extracted from.
    fn orig_doc(&self) -> Option<DocId>;

    /// For a document slice: how many internal items the origin document had
    /// when the slice was taken.
    fn orig_internal_list_len(&self) -> usize;

    fn data(&self) -> &LinearData;
    fn metadata(&self) -> &MetaLinearData;
    fn store(&self) -> &AnnotationStore;
    fn store_mut(&mut self) -> &mut AnnotationStore;
    fn internal_list(&self) -> &Self::List;
    fn internal_list_mut(&mut self) -> &mut Self::List;
    fn policy(&self) -> &Self::Policy;

    /// Adjust an insertion so that applying it keeps the tree balanced.
    fn fixup_insertion(&self, data: Vec<DataItem>, offset: usize) -> Insertion;

    /// Enumerate the nodes a range touches. See [`SelectMode`].
    fn select_nodes(&self, range: DocRange, mode: SelectMode) -> Vec<NodeSelection<Self::Node>>;
}
