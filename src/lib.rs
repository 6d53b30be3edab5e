//! Edits to a structured rich-text document as first-class transactions.
//!
//! The document is a flat *linear model*: the pre-order traversal of a tree,
//! with opening/closing markers around structure and annotated characters in
//! between, plus a parallel metadata stream and a pooled annotation store. A
//! [`Transaction`] is a pure value mapping one document state to another: an
//! ordered operation list that is reversible ([`Transaction::reversed`]),
//! composable with concurrent edits ([`rebase_transactions`]), and built so
//! that applying it to a tree-valid document always yields a tree-valid
//! document.
//!
//! Transactions are synthesized from editing intents by the `new_*`
//! constructors on [`Transaction`], which read the pre-transaction document
//! through the collaborator traits in [`document`]. Applying a transaction
//! is the job of an external executor; [`testdoc`] ships a small reference
//! document with one, used by the test suite.
//!
//! ```
//! use treedoc::{DataItem, Document, Transaction};
//! use treedoc::testdoc::SimpleDoc;
//!
//! let mut doc = SimpleDoc::from_items(vec![
//!     DataItem::open("paragraph"),
//!     DataItem::ch('h'),
//!     DataItem::ch('i'),
//!     DataItem::close("paragraph"),
//! ]);
//! let mut tx = Transaction::new_insertion(&doc, 3, vec![DataItem::ch('!')]).unwrap();
//! let mut undo = tx.reversed();
//! doc.commit(&mut tx);
//! assert_eq!(doc.data().len(), 5);
//! doc.commit(&mut undo);
//! assert_eq!(doc.data().len(), 4);
//! ```

pub mod builder;
pub mod document;
pub mod error;
pub mod linear;
pub mod operation;
pub mod range;
pub mod rebase;
pub mod testdoc;
pub mod transaction;
pub mod values;

mod construct;
mod docmerge;
mod wrap;

pub use builder::TransactionBuilder;
pub use document::{DocId, Document, Insertion, InternalList, ListMerge, Node, NodePolicy, NodeSelection, SelectMode};
pub use error::TransactionError;
pub use linear::{Annotation, AnnotationSet, AnnotationStore, DataItem, LinearData, MetaCell, MetaItem, MetaLinearData, StoreIndex};
pub use operation::{AnnotationBias, AnnotationMethod, Op, OpKind};
pub use range::DocRange;
pub use rebase::{rebase_transactions, ActiveRange};
pub use transaction::Transaction;
pub use values::{attrs, AttrChanges, AttrMap, Value};
