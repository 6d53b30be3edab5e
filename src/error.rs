use std::error::Error;
use std::fmt::{Display, Formatter};
use smartstring::alias::String as SmartString;

/// Everything that can go wrong while synthesizing a transaction. These are
/// caller-facing conditions; rebase conflicts are deliberately *not* here
/// (a conflict is a first-class result, see [`rebase_transactions`]).
///
/// [`rebase_transactions`]: crate::rebase::rebase_transactions
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum TransactionError {
    /// A non-collapsed range selected no nodes at all.
    InvalidRange { from: usize, to: usize },
    /// Attribute change aimed at something that isn't an opening marker.
    InvalidAttributeTarget { offset: usize },
    /// A metadata index or sub-range fell outside its cell.
    MetadataBounds { offset: usize, index: usize, len: usize },
    /// Metadata removal from a cell with no elements.
    EmptyMetadata { offset: usize },
    /// The unwrap template didn't match the live document data. `found` is
    /// empty when the data before the range is too short to match at all.
    UnwrapMismatch { offset: usize, expected: SmartString, found: SmartString },
    /// A `replace` op would directly follow a `replaceMetadata` op, touching
    /// the same offset twice.
    ReplaceAfterReplaceMetadata,
}

impl Display for TransactionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::InvalidRange { from, to } => {
                write!(f, "invalid range, cannot select nodes from {} to {}", from, to)
            }
            TransactionError::InvalidAttributeTarget { offset } => {
                write!(f, "cannot set attributes at {}: not an opening element", offset)
            }
            TransactionError::MetadataBounds { offset, index, len } => {
                write!(f, "metadata index {} out of bounds at offset {} (cell has {} elements)", index, offset, len)
            }
            TransactionError::EmptyMetadata { offset } => {
                write!(f, "cannot remove metadata from empty list at offset {}", offset)
            }
            TransactionError::UnwrapMismatch { offset, expected, found } => {
                if found.is_empty() {
                    write!(f, "cannot unwrap at {}: expected {} but the preceding data is too short", offset, expected)
                } else {
                    write!(f, "cannot unwrap at {}: expected {} but found {}", offset, expected, found)
                }
            }
            TransactionError::ReplaceAfterReplaceMetadata => {
                f.write_str("replace immediately after replaceMetadata is not allowed")
            }
        }
    }
}

impl Error for TransactionError {}
