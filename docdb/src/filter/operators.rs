use std::fmt::{Display, Formatter};

use regex::Regex;

use crate::collection::Document;
use crate::common::{Value, OPERATOR_PREFIX};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};

use super::Filter;

/// The condition attached to one field of a query document.
///
/// A plain value means equality; a sub-document whose keys all start with
/// `$` is a set of operators that must all hold.
#[derive(Clone)]
pub(crate) enum FieldCondition {
    Literal(Value),
    Operators(Vec<FieldOperator>),
}

/// A comparison operator applied to a resolved field value.
#[derive(Clone)]
pub(crate) enum FieldOperator {
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Ne(Value),
    Exists(bool),
    Size(i64),
    ElemMatch(ElemMatch),
    Regex(Regex),
}

/// Operand of `$elemMatch`.
#[derive(Clone)]
pub(crate) enum ElemMatch {
    /// Operators or a literal tested against each element.
    Condition(Box<FieldCondition>),
    /// A sub-query tested against each document element.
    Query(Filter),
}

const FIELD_OPERATORS: [&str; 11] = [
    "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$ne", "$exists", "$size", "$elemMatch", "$regex",
];

impl FieldCondition {
    /// Parses the value attached to `field` in a query document.
    pub(crate) fn parse(field: &str, value: &Value) -> DocDbResult<FieldCondition> {
        let Value::Document(sub) = value else {
            return Ok(FieldCondition::Literal(value.clone()));
        };

        let operator_keys = sub
            .iter()
            .filter(|(key, _)| key.starts_with(OPERATOR_PREFIX))
            .count();
        if operator_keys == 0 {
            return Ok(FieldCondition::Literal(value.clone()));
        }

        if operator_keys != sub.size() {
            log::error!("Cannot mix operators and normal fields in condition on {}", field);
            return Err(DocDbError::new(
                &format!("Cannot mix operators and normal fields in condition on {}", field),
                ErrorKind::ValidationError,
            ));
        }

        let mut operators = Vec::with_capacity(sub.size());
        for (key, operand) in sub.iter() {
            operators.push(FieldOperator::parse(field, key, operand)?);
        }
        Ok(FieldCondition::Operators(operators))
    }

    /// Tests the condition against a resolved value, `None` meaning the
    /// field is undefined.
    ///
    /// Arrays are matched existentially: the condition holds if any element
    /// satisfies it. Array literals and the array level operators (`$size`,
    /// `$elemMatch`, `$exists`) look at the array itself.
    pub(crate) fn matches(&self, resolved: Option<&Value>) -> DocDbResult<bool> {
        if let Some(Value::Array(items)) = resolved {
            if !self.targets_whole_array() {
                for item in items {
                    if self.matches(Some(item))? {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
        }

        match self {
            FieldCondition::Literal(expected) => Ok(resolved == Some(expected)),
            FieldCondition::Operators(operators) => {
                for operator in operators {
                    if !operator.matches(resolved)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn targets_whole_array(&self) -> bool {
        match self {
            FieldCondition::Literal(value) => value.is_array(),
            FieldCondition::Operators(operators) => operators.iter().any(|op| op.is_array_operator()),
        }
    }

    /// The scalar values an index lookup can use to narrow candidates.
    pub(crate) fn index_keys(&self) -> Option<Vec<Value>> {
        fn indexable(value: &Value) -> bool {
            !value.is_array() && !value.is_document()
        }

        match self {
            FieldCondition::Literal(value) if indexable(value) => Some(vec![value.clone()]),
            FieldCondition::Operators(operators) => operators.iter().find_map(|op| match op {
                FieldOperator::In(values) if values.iter().all(indexable) => Some(values.clone()),
                _ => None,
            }),
            _ => None,
        }
    }
}

impl FieldOperator {
    fn parse(field: &str, key: &str, operand: &Value) -> DocDbResult<FieldOperator> {
        match key {
            "$gt" => Ok(FieldOperator::Gt(operand.clone())),
            "$gte" => Ok(FieldOperator::Gte(operand.clone())),
            "$lt" => Ok(FieldOperator::Lt(operand.clone())),
            "$lte" => Ok(FieldOperator::Lte(operand.clone())),
            "$ne" => Ok(FieldOperator::Ne(operand.clone())),
            "$in" => Ok(FieldOperator::In(array_operand(field, key, operand)?)),
            "$nin" => Ok(FieldOperator::Nin(array_operand(field, key, operand)?)),
            "$exists" => Ok(FieldOperator::Exists(is_truthy(operand))),
            "$size" => match operand {
                Value::I64(size) => Ok(FieldOperator::Size(*size)),
                Value::F64(size) if size.fract() == 0.0 => Ok(FieldOperator::Size(*size as i64)),
                _ => {
                    log::error!("$size on {} called without an integer", field);
                    Err(DocDbError::new(
                        &format!("$size on {} called without an integer", field),
                        ErrorKind::ValidationError,
                    ))
                }
            },
            "$elemMatch" => Ok(FieldOperator::ElemMatch(ElemMatch::parse(field, operand)?)),
            "$regex" => match operand {
                Value::String(pattern) => Ok(FieldOperator::Regex(Regex::new(pattern)?)),
                _ => {
                    log::error!("$regex on {} requires a string pattern", field);
                    Err(DocDbError::new(
                        &format!("$regex on {} requires a string pattern", field),
                        ErrorKind::ValidationError,
                    ))
                }
            },
            _ => {
                log::error!("Unknown comparison operator {} on field {}", key, field);
                Err(DocDbError::new(
                    &format!("Unknown comparison operator {} on field {}", key, field),
                    ErrorKind::UnknownOperator,
                ))
            }
        }
    }

    fn is_array_operator(&self) -> bool {
        matches!(
            self,
            FieldOperator::Size(_) | FieldOperator::ElemMatch(_) | FieldOperator::Exists(_)
        )
    }

    fn matches(&self, resolved: Option<&Value>) -> DocDbResult<bool> {
        let result = match self {
            FieldOperator::Gt(operand) => compare(resolved, operand, |o| o.is_gt()),
            FieldOperator::Gte(operand) => compare(resolved, operand, |o| o.is_ge()),
            FieldOperator::Lt(operand) => compare(resolved, operand, |o| o.is_lt()),
            FieldOperator::Lte(operand) => compare(resolved, operand, |o| o.is_le()),
            FieldOperator::In(values) => resolved.is_some_and(|v| values.contains(v)),
            FieldOperator::Nin(values) => !resolved.is_some_and(|v| values.contains(v)),
            FieldOperator::Ne(operand) => resolved != Some(operand),
            FieldOperator::Exists(expected) => resolved.is_some() == *expected,
            FieldOperator::Size(size) => match resolved {
                Some(Value::Array(items)) => items.len() as i64 == *size,
                _ => false,
            },
            FieldOperator::ElemMatch(elem_match) => match resolved {
                Some(Value::Array(items)) => {
                    for item in items {
                        if elem_match.matches(item)? {
                            return Ok(true);
                        }
                    }
                    false
                }
                _ => false,
            },
            FieldOperator::Regex(regex) => match resolved {
                Some(Value::String(s)) => regex.is_match(s),
                _ => false,
            },
        };
        Ok(result)
    }
}

impl ElemMatch {
    pub(crate) fn parse(field: &str, operand: &Value) -> DocDbResult<ElemMatch> {
        match operand {
            Value::Document(sub) if is_operator_set(sub) => Ok(ElemMatch::Condition(Box::new(
                FieldCondition::parse(field, operand)?,
            ))),
            Value::Document(sub) => Ok(ElemMatch::Query(Filter::parse(sub)?)),
            other => Ok(ElemMatch::Condition(Box::new(FieldCondition::Literal(other.clone())))),
        }
    }

    pub(crate) fn matches(&self, element: &Value) -> DocDbResult<bool> {
        match self {
            ElemMatch::Condition(condition) => condition.matches(Some(element)),
            ElemMatch::Query(filter) => match element {
                Value::Document(doc) => filter.apply(doc),
                _ => Ok(false),
            },
        }
    }
}

/// `true` when every key of the document is a field operator.
fn is_operator_set(doc: &Document) -> bool {
    !doc.is_empty() && doc.iter().all(|(key, _)| FIELD_OPERATORS.contains(&key.as_str()))
}

fn array_operand(field: &str, key: &str, operand: &Value) -> DocDbResult<Vec<Value>> {
    match operand {
        Value::Array(values) => Ok(values.clone()),
        _ => {
            log::error!("{} on {} called with a non-array operand", key, field);
            Err(DocDbError::new(
                &format!("{} on {} called with a non-array operand", key, field),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn compare(
    resolved: Option<&Value>,
    operand: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match resolved {
        Some(value) if value.is_comparable_with(operand) => accept(value.cmp(operand)),
        _ => false,
    }
}

/// `$exists` truthiness: null, `false`, `0` and NaN are false, everything
/// else (the empty string included) is true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::I64(n) => *n != 0,
        Value::F64(n) => *n != 0.0 && !n.is_nan(),
        _ => true,
    }
}

impl Display for FieldCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldCondition::Literal(value) => write!(f, "== {}", value),
            FieldCondition::Operators(operators) => {
                let rendered: Vec<String> = operators.iter().map(|op| op.to_string()).collect();
                write!(f, "{}", rendered.join(" && "))
            }
        }
    }
}

impl Display for FieldOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldOperator::Gt(v) => write!(f, "> {}", v),
            FieldOperator::Gte(v) => write!(f, ">= {}", v),
            FieldOperator::Lt(v) => write!(f, "< {}", v),
            FieldOperator::Lte(v) => write!(f, "<= {}", v),
            FieldOperator::In(v) => write!(f, "in {:?}", v),
            FieldOperator::Nin(v) => write!(f, "not in {:?}", v),
            FieldOperator::Ne(v) => write!(f, "!= {}", v),
            FieldOperator::Exists(v) => write!(f, "exists {}", v),
            FieldOperator::Size(v) => write!(f, "size {}", v),
            FieldOperator::ElemMatch(ElemMatch::Condition(c)) => write!(f, "elemMatch ({})", c),
            FieldOperator::ElemMatch(ElemMatch::Query(q)) => write!(f, "elemMatch {}", q),
            FieldOperator::Regex(r) => write!(f, "=~ /{}/", r.as_str()),
        }
    }
}
