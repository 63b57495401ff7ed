use std::any::Any;
use std::fmt::Display;

use crate::collection::Document;
use crate::common::Value;
use crate::errors::DocDbResult;

use super::operators::FieldCondition;
use super::FilterProvider;

/// A filter that matches every document.
pub(crate) struct AllFilter {}

impl Display for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllFilter")
    }
}

impl FilterProvider for AllFilter {
    #[inline]
    fn apply(&self, _entry: &Document) -> DocDbResult<bool> {
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A condition on a single field path.
///
/// The path is resolved with array mapping (see [Document] path rules) and
/// the resolved value, or its absence, is handed to the parsed
/// [FieldCondition].
pub(crate) struct FieldFilter {
    field_name: String,
    condition: FieldCondition,
}

impl FieldFilter {
    pub(crate) fn new(field_name: String, condition: FieldCondition) -> Self {
        FieldFilter {
            field_name,
            condition,
        }
    }

    pub(crate) fn parse(field_name: &str, value: &Value) -> DocDbResult<Self> {
        Ok(FieldFilter::new(
            field_name.to_string(),
            FieldCondition::parse(field_name, value)?,
        ))
    }
}

impl Display for FieldFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {})", self.field_name, self.condition)
    }
}

impl FilterProvider for FieldFilter {
    fn apply(&self, entry: &Document) -> DocDbResult<bool> {
        let resolved = entry.resolve(&self.field_name);
        self.condition.matches(resolved.as_ref())
    }

    fn equality_constraints(&self) -> Vec<(String, Value)> {
        match &self.condition {
            FieldCondition::Literal(value) => vec![(self.field_name.clone(), value.clone())],
            FieldCondition::Operators(_) => Vec::new(),
        }
    }

    fn index_lookup(&self) -> Option<(String, Vec<Value>)> {
        self.condition
            .index_keys()
            .map(|keys| (self.field_name.clone(), keys))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
