use crate::collection::Document;
use crate::common::Value;
use crate::errors::DocDbResult;

use super::operators::{ElemMatch, FieldCondition, FieldOperator};
use super::{FieldFilter, Filter};

/// Creates a fluent filter builder for the specified field path.
///
/// The builder produces the same filters as parsing the equivalent query
/// document, so `field("media").eq("Card")` and
/// `Filter::parse(&doc!{ media: "Card" })` behave identically.
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

/// A fluent builder for constructing filters on a specific field.
pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        self.with(FieldCondition::Literal(value.into()))
    }

    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        self.operator(FieldOperator::Ne(value.into()))
    }

    #[inline]
    pub fn gt<T: Into<Value>>(self, value: T) -> Filter {
        self.operator(FieldOperator::Gt(value.into()))
    }

    #[inline]
    pub fn gte<T: Into<Value>>(self, value: T) -> Filter {
        self.operator(FieldOperator::Gte(value.into()))
    }

    #[inline]
    pub fn lt<T: Into<Value>>(self, value: T) -> Filter {
        self.operator(FieldOperator::Lt(value.into()))
    }

    #[inline]
    pub fn lte<T: Into<Value>>(self, value: T) -> Filter {
        self.operator(FieldOperator::Lte(value.into()))
    }

    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        let values = values.into_iter().map(|v| v.into()).collect();
        self.operator(FieldOperator::In(values))
    }

    pub fn not_in_array<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        let values = values.into_iter().map(|v| v.into()).collect();
        self.operator(FieldOperator::Nin(values))
    }

    pub fn exists(self, exists: bool) -> Filter {
        self.operator(FieldOperator::Exists(exists))
    }

    pub fn size(self, size: usize) -> Filter {
        self.operator(FieldOperator::Size(size as i64))
    }

    /// Matches arrays with at least one document element satisfying `filter`.
    pub fn elem_match(self, filter: Filter) -> Filter {
        self.operator(FieldOperator::ElemMatch(ElemMatch::Query(filter)))
    }

    /// Matches arrays with at least one element equal to `value`.
    pub fn elem_match_value<T: Into<Value>>(self, value: T) -> Filter {
        let condition = FieldCondition::Literal(value.into());
        self.operator(FieldOperator::ElemMatch(ElemMatch::Condition(Box::new(condition))))
    }

    /// Matches string values against a regular expression.
    pub fn regex(self, pattern: &str) -> DocDbResult<Filter> {
        let regex = regex::Regex::new(pattern)?;
        Ok(self.operator(FieldOperator::Regex(regex)))
    }

    /// Parses an operator document such as `doc!{ "$gt": 1, "$lt": 5 }`.
    pub fn matches(self, condition: Document) -> DocDbResult<Filter> {
        let filter = FieldFilter::parse(&self.field_name, &Value::Document(condition))?;
        Ok(Filter::new(filter))
    }

    fn operator(self, operator: FieldOperator) -> Filter {
        self.with(FieldCondition::Operators(vec![operator]))
    }

    fn with(self, condition: FieldCondition) -> Filter {
        Filter::new(FieldFilter::new(self.field_name, condition))
    }
}
