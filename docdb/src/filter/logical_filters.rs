use std::{any::Any, fmt::Display};

use crate::{collection::Document, common::Value, errors::DocDbResult};

use super::{Filter, FilterProvider};

/// A filter that applies logical AND operation on multiple filters.
///
/// Filters are evaluated in order and evaluation stops at the first one
/// that fails, so an error in a later filter is not reported when an
/// earlier one already rejected the document.
pub(crate) struct AndFilter {
    filters: Vec<Filter>,
}

impl AndFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        AndFilter { filters }
    }
}

fn join(filters: &[Filter], separator: &str) -> String {
    filters
        .iter()
        .map(|filter| filter.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl Display for AndFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join(&self.filters, " && "))
    }
}

impl FilterProvider for AndFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocDbResult<bool> {
        for filter in &self.filters {
            if !filter.apply(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn equality_constraints(&self) -> Vec<(String, Value)> {
        self.filters
            .iter()
            .flat_map(|filter| filter.equality_constraints())
            .collect()
    }

    fn index_lookup(&self) -> Option<(String, Vec<Value>)> {
        // any conjunct narrows the whole conjunction
        self.filters.iter().find_map(|filter| filter.index_lookup())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A filter that applies logical OR operation on multiple filters.
///
/// Evaluation stops at the first filter that matches. An empty OR matches
/// nothing.
pub(crate) struct OrFilter {
    filters: Vec<Filter>,
}

impl OrFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        OrFilter { filters }
    }
}

impl Display for OrFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join(&self.filters, " || "))
    }
}

impl FilterProvider for OrFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocDbResult<bool> {
        for filter in &self.filters {
            if filter.apply(entry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A filter that negates another filter.
pub(crate) struct NotFilter {
    filter: Filter,
}

impl NotFilter {
    pub(crate) fn new(filter: Filter) -> Self {
        NotFilter { filter }
    }
}

impl Display for NotFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!({})", self.filter)
    }
}

impl FilterProvider for NotFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> DocDbResult<bool> {
        Ok(!self.filter.apply(entry)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::ErrorKind;
    use crate::filter::{all, field, Filter};

    #[test]
    fn test_and_short_circuits() {
        let failing = Filter::where_fn(|_| crate::val!("not a bool"));
        let filter = Filter::new(AndFilter::new(vec![field("a").eq(2), failing]));
        assert!(!filter.apply(&doc! { a: 1 }).unwrap());
        let err = filter.apply(&doc! { a: 2 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidPredicateResult);
    }

    #[test]
    fn test_or_short_circuits() {
        let failing = Filter::where_fn(|_| crate::val!(1));
        let filter = Filter::new(OrFilter::new(vec![field("a").eq(1), failing]));
        assert!(filter.apply(&doc! { a: 1 }).unwrap());
        assert!(filter.apply(&doc! { a: 2 }).is_err());
    }

    #[test]
    fn test_empty_logical_filters() {
        assert!(Filter::new(AndFilter::new(vec![])).apply(&doc! {}).unwrap());
        assert!(!Filter::new(OrFilter::new(vec![])).apply(&doc! {}).unwrap());
    }

    #[test]
    fn test_not_filter() {
        let filter = Filter::new(NotFilter::new(all()));
        assert!(!filter.apply(&doc! { a: 1 }).unwrap());
        assert_eq!(filter.to_string(), "!(AllFilter)");
    }

    #[test]
    fn test_and_index_lookup_uses_first_indexable_conjunct() {
        let filter = Filter::new(AndFilter::new(vec![field("a").gt(1), field("b").eq("x")]));
        assert_eq!(filter.index_lookup(), Some(("b".to_string(), vec![crate::val!("x")])));

        let filter = Filter::new(OrFilter::new(vec![field("b").eq("x"), field("b").eq("y")]));
        assert_eq!(filter.index_lookup(), None);
    }

    #[test]
    fn test_display() {
        let filter = Filter::new(OrFilter::new(vec![field("a").eq(1), field("b").eq(2)]));
        assert_eq!(filter.to_string(), "((a == 1) || (b == 2))");
    }
}
