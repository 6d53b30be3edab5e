//! The metadata stream: a second coordinate axis running parallel to the
//! data. Every data offset owns a (usually empty) ordered cell of metadata
//! elements, plus one trailing cell past the end of the data, so the stream
//! is always `data.len() + 1` cells long. `retainMetadata` and
//! `replaceMetadata` operations move and splice *within* the cell at the
//! current data offset; plain `retain`/`replace` carry whole cells along.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::range::DocRange;
use crate::values::AttrMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One metadata element: a comment, a category link, an invisible marker.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetaItem {
    pub name: SmartString,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "AttrMap::is_empty"))]
    pub attributes: AttrMap,
}

impl MetaItem {
    pub fn new(name: &str) -> MetaItem {
        MetaItem { name: name.into(), attributes: AttrMap::new() }
    }

    pub fn with_attributes(name: &str, attributes: AttrMap) -> MetaItem {
        MetaItem { name: name.into(), attributes }
    }
}

/// The metadata elements attached at one data offset.
pub type MetaCell = SmallVec<[MetaItem; 1]>;

/// The full metadata stream.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct MetaLinearData {
    cells: Vec<MetaCell>,
}

impl MetaLinearData {
    /// An all-empty stream for a document of `data_len` items.
    pub fn new_empty(data_len: usize) -> MetaLinearData {
        MetaLinearData { cells: vec![MetaCell::new(); data_len + 1] }
    }

    pub fn new(cells: Vec<MetaCell>) -> MetaLinearData {
        MetaLinearData { cells }
    }

    /// Number of cells (data length + 1 on a well-formed document).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at one data offset. Out-of-range reads return an empty slice
    /// rather than panicking; constructors probe the trailing cell this way.
    pub fn get(&self, offset: usize) -> &[MetaItem] {
        self.cells.get(offset).map_or(&[], |cell| cell.as_slice())
    }

    pub fn get_cell_mut(&mut self, offset: usize) -> &mut MetaCell {
        &mut self.cells[offset]
    }

    pub fn cells(&self) -> &[MetaCell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut Vec<MetaCell> {
        &mut self.cells
    }

    /// Owned copy of the cells covering a data range, for op payloads.
    pub fn slice_vec(&self, range: DocRange) -> Vec<MetaCell> {
        self.cells[range.start()..range.end()].to_vec()
    }

    /// The collapse rule: concatenate a run of cells into a single cell,
    /// preserving order. Used when a removal swallows offsets that carried
    /// metadata; the merged cell is re-attached just before the replacement.
    pub fn merge(cells: &[MetaCell]) -> MetaCell {
        let mut merged = MetaCell::new();
        for cell in cells {
            merged.extend(cell.iter().cloned());
        }
        merged
    }
}

/// True if every cell in the run is empty.
pub fn all_cells_empty(cells: &[MetaCell]) -> bool {
    cells.iter().all(|cell| cell.is_empty())
}
