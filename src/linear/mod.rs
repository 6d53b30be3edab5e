//! The linear model: flat data items, the parallel metadata stream, and the
//! pooled annotation store.

pub mod annotation;
pub mod data;
pub mod meta;

pub use annotation::{Annotation, AnnotationSet, AnnotationStore, StoreIndex, StoreMapping};
pub use data::{DataItem, LinearData};
pub use meta::{all_cells_empty, MetaCell, MetaItem, MetaLinearData};
