use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::common::Value;

/// Specifies the direction for sorting documents.
///
/// Used by the cursor: `sort_by("releaseDate", SortOrder::Ascending)`, or
/// through a sort document where `1` means ascending and `-1` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort in ascending order (undefined and null first)
    Ascending,
    /// Sort in descending order
    Descending,
}

impl SortOrder {
    /// Parses the `1` / `-1` convention of sort documents.
    pub fn from_value(value: &Value) -> DocDbResult<SortOrder> {
        match value.as_f64() {
            Some(v) if v == 1.0 => Ok(SortOrder::Ascending),
            Some(v) if v == -1.0 => Ok(SortOrder::Descending),
            _ => {
                log::error!("Invalid sort direction {}, expected 1 or -1", value);
                Err(DocDbError::new(
                    &format!("Invalid sort direction {}, expected 1 or -1", value),
                    ErrorKind::ValidationError,
                ))
            }
        }
    }
}
