use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocDbError, DocDbResult, ErrorKind};

use super::FilterProvider;

type Predicate = Arc<dyn Fn(&Document) -> Value + Send + Sync>;

/// Escape hatch that evaluates an arbitrary function against the candidate
/// document, which is passed explicitly.
pub(crate) struct WhereFilter {
    predicate: Predicate,
}

impl WhereFilter {
    pub(crate) fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        WhereFilter {
            predicate: Arc::new(predicate),
        }
    }
}

impl Display for WhereFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$where(fn)")
    }
}

impl FilterProvider for WhereFilter {
    fn apply(&self, entry: &Document) -> DocDbResult<bool> {
        match (self.predicate)(entry) {
            Value::Bool(result) => Ok(result),
            other => {
                log::error!("$where predicate must return a boolean, got {}", other.type_name());
                Err(DocDbError::new(
                    &format!("$where predicate must return a boolean, got {}", other.type_name()),
                    ErrorKind::InvalidPredicateResult,
                ))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
