use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::common::{Value, ID_LENGTH};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};

/// Generates a random 16 character alphanumeric `_id` that `taken`
/// reports as free.
pub(crate) fn generate_id<F>(taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    loop {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LENGTH)
            .map(char::from)
            .collect();
        if !taken(&id) {
            return id;
        }
        log::debug!("Generated id {} already in use, retrying", id);
    }
}

/// Checks a caller supplied `_id`. Only non-empty strings are accepted.
pub(crate) fn validate_id(id: &Value) -> DocDbResult<String> {
    match id {
        Value::String(id) if !id.is_empty() => Ok(id.clone()),
        Value::String(_) => {
            log::error!("Document _id cannot be empty");
            Err(DocDbError::new("Document _id cannot be empty", ErrorKind::InvalidId))
        }
        other => {
            log::error!("Document _id must be a string, found {}", other.type_name());
            Err(DocDbError::new(
                &format!("Document _id must be a string, found {}", other.type_name()),
                ErrorKind::InvalidId,
            ))
        }
    }
}
