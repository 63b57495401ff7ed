use crate::collection::Document;
use crate::common::{Value, OPERATOR_PREFIX};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use std::any::Any;
use std::fmt::Display;
use std::ops::Deref;
use std::sync::Arc;

use super::AllFilter;
use super::AndFilter;
use super::FieldFilter;
use super::NotFilter;
use super::OrFilter;
use super::WhereFilter;

/// Trait for implementing query predicates.
///
/// A `FilterProvider` decides whether a document matches. Providers are
/// built once, when a query is parsed, so that malformed operators are
/// rejected before any document is visited.
pub trait FilterProvider: Any + Send + Sync + Display {
    /// Applies the filter to a document and returns whether it matches.
    fn apply(&self, entry: &Document) -> DocDbResult<bool>;

    /// Literal `field == value` constraints implied by this filter.
    ///
    /// Upserts seed the new document with these.
    fn equality_constraints(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// A field and the values an index lookup on that field can use to
    /// narrow the candidate documents. Every matching document must be
    /// reachable through one of the values.
    fn index_lookup(&self) -> Option<(String, Vec<Value>)> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A compiled query.
///
/// Built from a query document with [Filter::parse], through the fluent
/// builder in [crate::filter::field], or from a predicate function with
/// [Filter::where_fn]. Filters compose with `and`, `or` and `not`.
///
/// ```rust,ignore
/// let filter = Filter::parse(&doc!{ "developer.name": "Sony" })?
///     .or(field("portable").eq(true));
/// ```
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    /// Creates a new filter from a filter provider implementation.
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter { inner: Arc::new(inner) }
    }

    /// Compiles a query document.
    ///
    /// Top level keys are combined with an implicit AND. Keys starting with
    /// `$` must be one of the logical operators `$and`, `$or` (array of
    /// sub-queries) or `$not` (a sub-query); every other key is a field path
    /// whose value is either a literal or a set of comparison operators.
    pub fn parse(query: &Document) -> DocDbResult<Filter> {
        let mut filters = Vec::with_capacity(query.size());
        for (key, value) in query.iter() {
            if key.starts_with(OPERATOR_PREFIX) {
                filters.push(parse_logical(key, value)?);
            } else {
                filters.push(Filter::new(FieldFilter::parse(key, value)?));
            }
        }

        Ok(match filters.len() {
            0 => all(),
            1 => filters.remove(0),
            _ => Filter::new(AndFilter::new(filters)),
        })
    }

    /// Creates a filter from a predicate over the whole document.
    ///
    /// The predicate must return [Value::Bool]; any other result makes the
    /// query fail with [ErrorKind::InvalidPredicateResult].
    pub fn where_fn<F>(predicate: F) -> Filter
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        Filter::new(WhereFilter::new(predicate))
    }

    /// Creates a filter from a boolean predicate over the whole document.
    pub fn where_bool<F>(predicate: F) -> Filter
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        Filter::where_fn(move |doc| Value::Bool(predicate(doc)))
    }

    /// Combines this filter with another using logical AND.
    pub fn and(&self, filter: Filter) -> Self {
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    /// Combines this filter with another using logical OR.
    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    /// Negates this filter.
    pub fn not(&self) -> Self {
        Filter::new(NotFilter::new(self.clone()))
    }
}

fn parse_logical(key: &str, value: &Value) -> DocDbResult<Filter> {
    match key {
        "$and" => Ok(Filter::new(AndFilter::new(parse_sub_queries(key, value)?))),
        "$or" => Ok(Filter::new(OrFilter::new(parse_sub_queries(key, value)?))),
        "$not" => match value {
            Value::Document(sub) => Ok(Filter::parse(sub)?.not()),
            _ => {
                log::error!("$not operator requires a sub-query document");
                Err(DocDbError::new(
                    "$not operator requires a sub-query document",
                    ErrorKind::ValidationError,
                ))
            }
        },
        "$where" => {
            log::error!("$where requires a predicate function, build it with Filter::where_fn");
            Err(DocDbError::new(
                "$where requires a predicate function, build it with Filter::where_fn",
                ErrorKind::ValidationError,
            ))
        }
        _ => {
            log::error!("Unknown logical operator {}", key);
            Err(DocDbError::new(
                &format!("Unknown logical operator {}", key),
                ErrorKind::UnknownOperator,
            ))
        }
    }
}

fn parse_sub_queries(key: &str, value: &Value) -> DocDbResult<Vec<Filter>> {
    let Value::Array(items) = value else {
        log::error!("{} operator used without an array", key);
        return Err(DocDbError::new(
            &format!("{} operator used without an array", key),
            ErrorKind::ValidationError,
        ));
    };

    let mut filters = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Document(sub) => filters.push(Filter::parse(sub)?),
            other => {
                log::error!("{} operator expects sub-query documents, found {}", key, other);
                return Err(DocDbError::new(
                    &format!("{} operator expects sub-query documents, found {}", key, other),
                    ErrorKind::ValidationError,
                ));
            }
        }
    }
    Ok(filters)
}

impl Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Creates a filter that matches all documents.
pub fn all() -> Filter {
    Filter::new(AllFilter {})
}

/// Anything the store accepts as a query.
pub trait IntoFilter {
    fn into_filter(self) -> DocDbResult<Filter>;
}

impl IntoFilter for Filter {
    fn into_filter(self) -> DocDbResult<Filter> {
        Ok(self)
    }
}

impl IntoFilter for &Filter {
    fn into_filter(self) -> DocDbResult<Filter> {
        Ok(self.clone())
    }
}

impl IntoFilter for Document {
    fn into_filter(self) -> DocDbResult<Filter> {
        Filter::parse(&self)
    }
}

impl IntoFilter for &Document {
    fn into_filter(self) -> DocDbResult<Filter> {
        Filter::parse(self)
    }
}
