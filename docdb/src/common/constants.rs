// doc constants
pub const DOC_ID: &str = "_id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const FIELD_SEPARATOR: char = '.';
pub const OPERATOR_PREFIX: char = '$';

// generated id length and default corrupt ratio tolerated on load
pub const ID_LENGTH: usize = 16;
pub const DEFAULT_CORRUPT_ALERT_THRESHOLD: f64 = 0.1;

// persisted record markers
pub const DATE_MARKER: &str = "$$date";
pub const DELETED_MARKER: &str = "$$deleted";
pub const INDEX_CREATED_MARKER: &str = "$$indexCreated";
pub const INDEX_REMOVED_MARKER: &str = "$$indexRemoved";
