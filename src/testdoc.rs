//! A small, complete implementation of the document collaborators over the
//! linear model, plus the executor that applies transactions to it. The
//! transaction core consumes only the traits in [`crate::document`]; this
//! module is a peer consumer that exists so the test suite (and anyone
//! kicking the tires) has a real document to construct transactions against
//! and apply them to.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smartstring::alias::String as SmartString;

use crate::document::{
    DocId, Document, Insertion, InternalList, ListMerge, Node, NodePolicy, NodeSelection,
    SelectMode,
};
use crate::linear::{
    Annotation, AnnotationStore, DataItem, LinearData, MetaCell, MetaLinearData,
};
use crate::operation::{AnnotationBias, AnnotationMethod, Op};
use crate::range::DocRange;
use crate::transaction::Transaction;
use crate::values::AttrMap;

static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(1);

/// Fixed name-keyed policy: paragraphs/headings/preformatted hold content,
/// inline images and references are content-level, the internal list and its
/// items are undeletable and opaque.
#[derive(Debug, Clone, Default)]
pub struct SimplePolicy;

impl SimplePolicy {
    /// Content branches: nodes that hold characters directly.
    pub fn is_content_branch(name: &str) -> bool {
        matches!(name, "paragraph" | "heading" | "preformatted")
    }
}

impl NodePolicy for SimplePolicy {
    fn is_deletable(&self, name: &str) -> bool {
        !matches!(name, "internalList" | "internalItem" | "undeletableBlock")
    }

    fn is_content(&self, name: &str) -> bool {
        matches!(name, "inlineImage" | "reference")
    }

    fn can_take_annotation(&self, name: &str, _annotation: &Annotation) -> bool {
        name == "inlineImage"
    }

    fn ignores_children(&self, name: &str) -> bool {
        matches!(name, "internalList" | "internalItem" | "alien")
    }
}

#[derive(Debug)]
struct Core {
    name: SmartString,
    attributes: AttrMap,
    parent: Option<usize>,
    children: Vec<usize>,
    inner: DocRange,
    outer: DocRange,
    is_text: bool,
    is_content: bool,
    can_contain_content: bool,
}

/// A parsed-on-demand node handle. Equality is identity within one parse.
#[derive(Debug, Clone)]
pub struct SimpleNode {
    tree: Rc<Vec<Core>>,
    index: usize,
}

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.index == other.index
    }
}

impl SimpleNode {
    fn core(&self) -> &Core {
        &self.tree[self.index]
    }

    fn name_chain(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut index = Some(self.index);
        while let Some(i) = index {
            chain.push(self.tree[i].name.as_str());
            index = self.tree[i].parent;
        }
        chain
    }
}

impl Node for SimpleNode {
    fn name(&self) -> &str {
        self.core().name.as_str()
    }

    fn attributes(&self) -> AttrMap {
        self.core().attributes.clone()
    }

    fn is_content(&self) -> bool {
        self.core().is_content
    }

    fn can_contain_content(&self) -> bool {
        self.core().can_contain_content
    }

    fn can_be_merged_with(&self, other: &Self) -> bool {
        self.name_chain() == other.name_chain()
    }

    fn range(&self) -> DocRange {
        self.core().inner
    }

    fn outer_range(&self) -> DocRange {
        self.core().outer
    }

    fn parent(&self) -> Option<Self> {
        self.core().parent.map(|index| SimpleNode { tree: Rc::clone(&self.tree), index })
    }
}

/// Parse linear data into a node tree. Runs of characters become text nodes.
fn parse(data: &LinearData, policy: &SimplePolicy) -> Rc<Vec<Core>> {
    let len = data.len();
    let mut nodes = vec![Core {
        name: "document".into(),
        attributes: AttrMap::new(),
        parent: None,
        children: Vec::new(),
        inner: DocRange::new(0, len),
        outer: DocRange::new(0, len),
        is_text: false,
        is_content: false,
        can_contain_content: false,
    }];
    let mut stack = vec![0usize];
    let mut text_start: Option<usize> = None;

    fn close_text(nodes: &mut Vec<Core>, stack: &[usize], start: Option<usize>, end: usize) {
        if let Some(start) = start {
            let parent = *stack.last().unwrap();
            let index = nodes.len();
            nodes.push(Core {
                name: "text".into(),
                attributes: AttrMap::new(),
                parent: Some(parent),
                children: Vec::new(),
                inner: DocRange::new(start, end),
                outer: DocRange::new(start, end),
                is_text: true,
                is_content: true,
                can_contain_content: false,
            });
            nodes[parent].children.push(index);
        }
    }

    for (i, item) in data.items().iter().enumerate() {
        match item {
            DataItem::Char { .. } => {
                if text_start.is_none() {
                    text_start = Some(i);
                }
            }
            DataItem::Open { name, attributes, .. } => {
                close_text(&mut nodes, &stack, text_start.take(), i);
                let parent = *stack.last().unwrap();
                let index = nodes.len();
                nodes.push(Core {
                    name: name.clone(),
                    attributes: attributes.clone(),
                    parent: Some(parent),
                    children: Vec::new(),
                    inner: DocRange::new(i + 1, i + 1),
                    outer: DocRange::new(i, i),
                    is_text: false,
                    is_content: policy.is_content(name),
                    can_contain_content: SimplePolicy::is_content_branch(name),
                });
                nodes[parent].children.push(index);
                stack.push(index);
            }
            DataItem::Close { .. } => {
                close_text(&mut nodes, &stack, text_start.take(), i);
                let index = stack.pop().expect("unbalanced close marker");
                nodes[index].inner = DocRange::new(nodes[index].inner.start(), i);
                nodes[index].outer = DocRange::new(nodes[index].outer.start(), i + 1);
            }
        }
    }
    close_text(&mut nodes, &stack, text_start.take(), len);
    Rc::new(nodes)
}

/// Build a standalone two-node tree (document + one node) for handles that
/// live outside a full parse, like the internal-list node.
fn standalone_node(name: &str, inner: DocRange, outer: DocRange, doc_len: usize) -> SimpleNode {
    let nodes = vec![
        Core {
            name: "document".into(),
            attributes: AttrMap::new(),
            parent: None,
            children: vec![1],
            inner: DocRange::new(0, doc_len),
            outer: DocRange::new(0, doc_len),
            is_text: false,
            is_content: false,
            can_contain_content: false,
        },
        Core {
            name: name.into(),
            attributes: AttrMap::new(),
            parent: Some(0),
            children: Vec::new(),
            inner,
            outer,
            is_text: false,
            is_content: false,
            can_contain_content: false,
        },
    ];
    SimpleNode { tree: Rc::new(nodes), index: 1 }
}

#[derive(Debug, Clone)]
struct SimpleItem {
    key: SmartString,
    inner: DocRange,
    outer: DocRange,
}

/// Internal-list bookkeeping: the reserved tail region and its key-addressed
/// items.
#[derive(Debug, Clone, Default)]
pub struct SimpleList {
    inner: DocRange,
    outer: DocRange,
    items: Vec<SimpleItem>,
    doc_len: usize,
}

impl SimpleList {
    /// Scan the data for the internal-list region. Without one, the list is
    /// an empty region at the very end of the document.
    fn scan(data: &LinearData) -> SimpleList {
        let len = data.len();
        let mut list = SimpleList {
            inner: DocRange::new(len, len),
            outer: DocRange::new(len, len),
            items: Vec::new(),
            doc_len: len,
        };
        let Some(open) = (0..len).find(|&i| data.item_name(i) == Some("internalList") && data.is_open_element_data(i))
        else {
            return list;
        };
        let mut depth = 0isize;
        let mut item_open: Option<(usize, SmartString)> = None;
        for i in open..len {
            if !data.is_element_data(i) {
                continue;
            }
            let name = data.item_name(i).unwrap_or("");
            if data.is_open_element_data(i) {
                depth += 1;
                if depth == 2 && name == "internalItem" {
                    let key = data
                        .get(i)
                        .and_then(DataItem::attributes)
                        .and_then(|attrs| attrs.get("key"))
                        .and_then(|value| value.as_str())
                        .unwrap_or("")
                        .into();
                    item_open = Some((i, key));
                }
            } else {
                depth -= 1;
                if depth == 1 {
                    if let Some((start, key)) = item_open.take() {
                        list.items.push(SimpleItem {
                            key,
                            inner: DocRange::new(start + 1, i),
                            outer: DocRange::new(start, i + 1),
                        });
                    }
                } else if depth == 0 {
                    list.inner = DocRange::new(open + 1, i);
                    list.outer = DocRange::new(open, i + 1);
                    break;
                }
            }
        }
        list
    }
}

impl InternalList for SimpleList {
    type Node = SimpleNode;

    fn list_node(&self) -> SimpleNode {
        standalone_node("internalList", self.inner, self.outer, self.doc_len)
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn item_node(&self, index: usize) -> SimpleNode {
        let item = &self.items[index];
        standalone_node("internalItem", item.inner, item.outer, self.doc_len)
    }

    fn merge(&mut self, other: &Self, orig_len: usize) -> ListMerge {
        let mut merge = ListMerge::default();
        for (j, item) in other.items.iter().enumerate() {
            if j < orig_len {
                merge.mapping.push(j);
                continue;
            }
            if let Some(k) = self.items.iter().position(|mine| mine.key == item.key) {
                merge.mapping.push(k);
            } else {
                merge.mapping.push(self.items.len());
                // The ranges are other-document coordinates; they are only
                // bookkeeping until the next rescan.
                self.items.push(item.clone());
                merge.new_item_ranges.push(item.outer);
            }
        }
        merge
    }
}

/// The reference document: linear data, metadata, store, internal list, and
/// a transaction executor.
#[derive(Debug, Clone)]
pub struct SimpleDoc {
    id: DocId,
    orig_doc: Option<DocId>,
    orig_internal_list_len: usize,
    data: LinearData,
    metadata: MetaLinearData,
    store: AnnotationStore,
    list: SimpleList,
    policy: SimplePolicy,
}

impl SimpleDoc {
    pub fn from_items(items: Vec<DataItem>) -> SimpleDoc {
        let data = LinearData::new(items);
        let metadata = MetaLinearData::new_empty(data.len());
        let list = SimpleList::scan(&data);
        SimpleDoc {
            id: NEXT_DOC_ID.fetch_add(1, Ordering::Relaxed),
            orig_doc: None,
            orig_internal_list_len: 0,
            data,
            metadata,
            store: AnnotationStore::new(),
            list,
            policy: SimplePolicy,
        }
    }

    /// Build a document with an internal-list tail: each `(key, content)`
    /// becomes one internal item.
    pub fn with_internal_items(mut body: Vec<DataItem>, items: Vec<(&str, Vec<DataItem>)>) -> SimpleDoc {
        body.push(DataItem::open("internalList"));
        for (key, content) in items {
            body.push(DataItem::open_with("internalItem", crate::values::attrs([("key", key.into())])));
            body.extend(content);
            body.push(DataItem::close("internalItem"));
        }
        body.push(DataItem::close("internalList"));
        SimpleDoc::from_items(body)
    }

    /// Extract a copyable slice of this document, carrying the internal list
    /// along, the way copy/paste does. The result remembers where it came
    /// from so pasting it back propagates item edits.
    pub fn extract_slice(&self, range: DocRange) -> SimpleDoc {
        let mut items = self.data.slice_vec(range);
        items.extend(self.data.slice_vec(DocRange::new(self.list.outer.start(), self.data.len())));
        let mut slice = SimpleDoc::from_items(items);
        slice.orig_doc = Some(self.id);
        slice.orig_internal_list_len = self.list.items.len();
        slice
    }

    pub fn data_mut(&mut self) -> &mut LinearData {
        &mut self.data
    }

    pub fn metadata_mut(&mut self) -> &mut MetaLinearData {
        &mut self.metadata
    }

    fn tree(&self) -> Rc<Vec<Core>> {
        parse(&self.data, &self.policy)
    }

    fn collect_covered(
        &self,
        tree: &Rc<Vec<Core>>,
        index: usize,
        range: DocRange,
        out: &mut Vec<NodeSelection<SimpleNode>>,
    ) {
        for &child in &tree[index].children {
            let core = &tree[child];
            if core.outer.end() <= range.start() || core.outer.start() >= range.end() {
                continue;
            }
            let node = SimpleNode { tree: Rc::clone(tree), index: child };
            if range.contains_range(&core.outer) {
                out.push(NodeSelection { node, range: None });
            } else if !core.children.is_empty() {
                self.collect_covered(tree, child, range, out);
            } else {
                let covered = DocRange::new(
                    range.start().max(core.inner.start()),
                    range.end().min(core.inner.end()),
                );
                out.push(NodeSelection { node, range: Some(covered) });
            }
        }
    }

    fn collect_leaves(
        &self,
        tree: &Rc<Vec<Core>>,
        index: usize,
        range: DocRange,
        out: &mut Vec<NodeSelection<SimpleNode>>,
    ) {
        for &child in &tree[index].children {
            let core = &tree[child];
            if core.outer.end() <= range.start() || core.outer.start() >= range.end() {
                continue;
            }
            if core.children.is_empty() {
                let node = SimpleNode { tree: Rc::clone(tree), index: child };
                let covered = if range.contains_range(&core.outer) {
                    None
                } else {
                    Some(DocRange::new(
                        range.start().max(core.inner.start()),
                        range.end().min(core.inner.end()),
                    ))
                };
                out.push(NodeSelection { node, range: covered });
            } else {
                self.collect_leaves(tree, child, range, out);
            }
        }
    }

    /// The deepest node whose inner range contains `offset` as an insertion
    /// point.
    fn deepest_at(&self, tree: &Rc<Vec<Core>>, offset: usize) -> usize {
        let mut index = 0usize;
        'descend: loop {
            for &child in &tree[index].children {
                let inner = tree[child].inner;
                if !tree[child].is_text && inner.start() <= offset && offset <= inner.end() {
                    index = child;
                    continue 'descend;
                }
            }
            return index;
        }
    }

    /// Apply a transaction, producing the next document state and latching
    /// the transaction as applied.
    pub fn commit(&mut self, tx: &mut Transaction) {
        let mut old_items = std::mem::take(self.data.items_mut());
        let mut old_cells = std::mem::take(self.metadata.cells_mut());
        old_cells.resize(old_items.len() + 1, MetaCell::new());
        let mut items = Vec::with_capacity(old_items.len());
        let mut cells = Vec::with_capacity(old_cells.len());
        // Source cursor, and the in-cell metadata cursor at that offset.
        let mut cursor = 0usize;
        let mut meta_cursor = 0usize;
        let mut active: Vec<(AnnotationMethod, usize)> = Vec::new();

        fn annotate(item: &mut DataItem, active: &[(AnnotationMethod, usize)]) {
            if let Some(set) = item.annotations_mut() {
                for (method, index) in active {
                    match method {
                        AnnotationMethod::Set => set.push(*index),
                        AnnotationMethod::Clear => set.remove(*index),
                    }
                }
            }
        }

        for op in tx.operations() {
            match op {
                Op::Retain { length } => {
                    for _ in 0..*length {
                        let mut item = old_items[cursor].clone();
                        annotate(&mut item, &active);
                        items.push(item);
                        cells.push(std::mem::take(&mut old_cells[cursor]));
                        cursor += 1;
                    }
                    meta_cursor = 0;
                }
                Op::RetainMeta { length } => {
                    meta_cursor += length;
                }
                Op::ReplaceMeta { remove, insert } => {
                    let cell = &mut old_cells[cursor];
                    let removed: Vec<_> =
                        cell.drain(meta_cursor..meta_cursor + remove.len()).collect();
                    debug_assert_eq!(&removed, remove, "replaceMetadata removed the wrong elements");
                    for (i, element) in insert.iter().enumerate() {
                        cell.insert(meta_cursor + i, element.clone());
                    }
                    meta_cursor += insert.len();
                }
                Op::Replace { remove, insert, insert_metadata, .. } => {
                    cursor += remove.len();
                    for (i, item) in insert.iter().enumerate() {
                        let mut item = item.clone();
                        annotate(&mut item, &active);
                        items.push(item);
                        cells.push(
                            insert_metadata
                                .as_ref()
                                .and_then(|cells| cells.get(i).cloned())
                                .unwrap_or_default(),
                        );
                    }
                    meta_cursor = 0;
                }
                Op::Attribute { key, to, .. } => {
                    // Zero-length: patch the marker at the cursor in place; a
                    // later retain or replace moves past it.
                    match &mut old_items[cursor] {
                        DataItem::Open { attributes, .. } => match to {
                            Some(value) => {
                                attributes.insert(key.clone(), value.clone());
                            }
                            None => {
                                attributes.remove(key);
                            }
                        },
                        _ => panic!("attribute op targeting a non-element"),
                    }
                }
                Op::Annotate { method, bias, index } => match bias {
                    AnnotationBias::Start => active.push((*method, *index)),
                    AnnotationBias::Stop => {
                        let position = active
                            .iter()
                            .rposition(|(m, i)| m == method && i == index)
                            .expect("stop annotating without a matching start");
                        active.remove(position);
                    }
                },
            }
        }

        assert_eq!(cursor, old_items.len(), "transaction did not consume the whole document");
        // The trailing metadata cell.
        cells.push(std::mem::take(&mut old_cells[cursor]));

        *self.data.items_mut() = items;
        *self.metadata.cells_mut() = cells;
        self.list = SimpleList::scan(&self.data);
        tx.mark_as_applied();
    }
}

impl Document for SimpleDoc {
    type Node = SimpleNode;
    type Policy = SimplePolicy;
    type List = SimpleList;

    fn id(&self) -> DocId {
        self.id
    }

    fn orig_doc(&self) -> Option<DocId> {
        self.orig_doc
    }

    fn orig_internal_list_len(&self) -> usize {
        self.orig_internal_list_len
    }

    fn data(&self) -> &LinearData {
        &self.data
    }

    fn metadata(&self) -> &MetaLinearData {
        &self.metadata
    }

    fn store(&self) -> &AnnotationStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    fn internal_list(&self) -> &SimpleList {
        &self.list
    }

    fn internal_list_mut(&mut self) -> &mut SimpleList {
        &mut self.list
    }

    fn policy(&self) -> &SimplePolicy {
        &self.policy
    }

    fn fixup_insertion(&self, data: Vec<DataItem>, offset: usize) -> Insertion {
        let tree = self.tree();
        let enclosing = self.deepest_at(&tree, offset);
        let in_content_branch = tree[enclosing].can_contain_content;
        let starts_with_content = match data.first() {
            Some(DataItem::Char { .. }) => true,
            Some(DataItem::Open { name, .. }) => self.policy.is_content(name),
            _ => false,
        };

        if starts_with_content && !in_content_branch {
            // Bare content at a structural position: grow a paragraph.
            let original_len = data.len();
            let mut padded = Vec::with_capacity(original_len + 2);
            padded.push(DataItem::open("paragraph"));
            padded.extend(data);
            padded.push(DataItem::close("paragraph"));
            Insertion {
                offset,
                remove: 0,
                data: padded,
                inserted_offset: Some(1),
                inserted_len: Some(original_len),
            }
        } else if !starts_with_content && !data.is_empty() && in_content_branch {
            // Structural data inside a content branch: re-seat it after the
            // branch.
            let offset = tree[enclosing].outer.end();
            Insertion { offset, remove: 0, data, inserted_offset: None, inserted_len: None }
        } else {
            Insertion { offset, remove: 0, data, inserted_offset: None, inserted_len: None }
        }
    }

    fn select_nodes(&self, range: DocRange, mode: SelectMode) -> Vec<NodeSelection<SimpleNode>> {
        let tree = self.tree();
        let mut out = Vec::new();
        match mode {
            SelectMode::Covered => self.collect_covered(&tree, 0, range, &mut out),
            SelectMode::Leaves => self.collect_leaves(&tree, 0, range, &mut out),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Vec<DataItem> {
        let mut items = vec![DataItem::open("paragraph")];
        items.extend(text.chars().map(DataItem::ch));
        items.push(DataItem::close("paragraph"));
        items
    }

    #[test]
    fn covered_selection_descends_into_partial_nodes() {
        let doc = SimpleDoc::from_items(paragraph("abc"));
        let selection = doc.select_nodes(DocRange::new(1, 3), SelectMode::Covered);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].node.name(), "text");
        assert_eq!(selection[0].range, Some(DocRange::new(1, 3)));

        let selection = doc.select_nodes(DocRange::new(0, 5), SelectMode::Covered);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].node.name(), "paragraph");
        assert!(selection[0].range.is_none());
    }

    #[test]
    fn leaves_selection_finds_text_runs() {
        let mut items = paragraph("a");
        items.extend(paragraph("b"));
        let doc = SimpleDoc::from_items(items);
        let selection = doc.select_nodes(DocRange::new(1, 5), SelectMode::Leaves);
        assert_eq!(selection.len(), 2);
        assert!(selection.iter().all(|s| s.node.name() == "text"));
        assert_eq!(selection[0].node.parent().unwrap().name(), "paragraph");
    }

    #[test]
    fn merge_chain_comparison() {
        let mut items = paragraph("a");
        items.extend(paragraph("b"));
        items.push(DataItem::open("list"));
        items.push(DataItem::open("listItem"));
        items.extend(paragraph("c"));
        items.push(DataItem::close("listItem"));
        items.push(DataItem::close("list"));
        let doc = SimpleDoc::from_items(items);

        let leaves = doc.select_nodes(DocRange::new(0, doc.data().len()), SelectMode::Leaves);
        let a = &leaves[0].node;
        let b = &leaves[1].node;
        let c = &leaves[2].node;
        assert!(a.can_be_merged_with(b));
        assert!(!a.can_be_merged_with(c)); // different ancestry
    }

    #[test]
    fn fixup_wraps_bare_text_at_structural_positions() {
        let doc = SimpleDoc::from_items(paragraph("a"));
        let insertion = doc.fixup_insertion(vec![DataItem::ch('x')], 3);
        assert_eq!(insertion.offset, 3);
        assert_eq!(insertion.data.len(), 3);
        assert_eq!(insertion.inserted_offset, Some(1));
        assert_eq!(insertion.inserted_len, Some(1));

        // Inside the paragraph: no fixup needed.
        let insertion = doc.fixup_insertion(vec![DataItem::ch('x')], 2);
        assert_eq!(insertion.data.len(), 1);
        assert_eq!(insertion.inserted_offset, None);
    }

    #[test]
    fn scan_finds_internal_items() {
        let doc = SimpleDoc::with_internal_items(
            paragraph("a"),
            vec![("ref-a", vec![DataItem::ch('x')]), ("ref-b", vec![DataItem::ch('y')])],
        );
        assert_eq!(doc.internal_list().item_count(), 2);
        let list_node = doc.internal_list().list_node();
        assert_eq!(list_node.outer_range().start(), 3);
        let item = doc.internal_list().item_node(1);
        assert_eq!(item.range().len(), 1);
    }

    #[test]
    fn commit_applies_a_simple_insertion() {
        let mut doc = SimpleDoc::from_items(paragraph("ab"));
        let mut tx = Transaction::new_insertion(&doc, 2, vec![DataItem::ch('x')]).unwrap();
        doc.commit(&mut tx);
        assert!(tx.has_been_applied());
        assert_eq!(
            doc.data().items(),
            &[
                DataItem::open("paragraph"),
                DataItem::ch('a'),
                DataItem::ch('x'),
                DataItem::ch('b'),
                DataItem::close("paragraph"),
            ]
        );
        assert_eq!(doc.metadata().len(), doc.data().len() + 1);
    }

    #[test]
    fn commit_then_reversed_restores_the_document() {
        let mut doc = SimpleDoc::from_items(paragraph("abc"));
        let before = doc.data().clone();
        let mut tx = Transaction::new_removal(&doc, DocRange::new(1, 3), false).unwrap();
        doc.commit(&mut tx);
        assert_ne!(doc.data(), &before);
        let mut undo = tx.reversed();
        doc.commit(&mut undo);
        assert_eq!(doc.data(), &before);
    }
}
