use std::fmt::{Display, Formatter};

use crate::collection::Document;
use crate::common::{Value, OPERATOR_PREFIX};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::filter::operators::ElemMatch;

/// One field modification taken from an update document such as
/// `{ "$inc": { price: 100 } }`.
#[derive(Clone)]
pub(crate) enum Modifier {
    Set(String, Value),
    Unset(String),
    Inc(String, Value),
    Push(String, ArrayInsert),
    AddToSet(String, ArrayInsert),
    Pop(String, f64),
    Pull(String, ElemMatch),
    Min(String, Value),
    Max(String, Value),
}

/// Operand of `$push` and `$addToSet`, either a single value or the
/// `{ $each: [...], $slice: n }` form.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ArrayInsert {
    values: Vec<Value>,
    slice: Option<i64>,
}

const MODIFIERS: [&str; 9] = [
    "$set", "$unset", "$inc", "$push", "$addToSet", "$pop", "$pull", "$min", "$max",
];

impl Modifier {
    /// Parses `modifier: { field: operand, ... }` into one modifier per field.
    pub(crate) fn parse_all(modifier: &str, argument: &Value) -> DocDbResult<Vec<Modifier>> {
        if !MODIFIERS.contains(&modifier) {
            log::error!("Unknown modifier {}", modifier);
            return Err(DocDbError::new(
                &format!("Unknown modifier {}", modifier),
                ErrorKind::UnknownOperator,
            ));
        }

        let Value::Document(fields) = argument else {
            log::error!("Modifier {}'s argument must be an object", modifier);
            return Err(DocDbError::new(
                &format!("Modifier {}'s argument must be an object", modifier),
                ErrorKind::ValidationError,
            ));
        };

        let mut modifiers = Vec::with_capacity(fields.size());
        for (field, operand) in fields.iter() {
            modifiers.push(Modifier::parse(modifier, field, operand)?);
        }
        Ok(modifiers)
    }

    fn parse(modifier: &str, field: &str, operand: &Value) -> DocDbResult<Modifier> {
        let field = field.to_string();
        match modifier {
            "$set" => Ok(Modifier::Set(field, operand.clone())),
            "$unset" => Ok(Modifier::Unset(field)),
            "$inc" => {
                if !operand.is_number() {
                    log::error!("{} must be a number", operand);
                    return Err(DocDbError::new(
                        &format!("{} must be a number", operand),
                        ErrorKind::ValidationError,
                    ));
                }
                Ok(Modifier::Inc(field, operand.clone()))
            }
            "$push" => Ok(Modifier::Push(field.clone(), ArrayInsert::parse(modifier, &field, operand)?)),
            "$addToSet" => Ok(Modifier::AddToSet(
                field.clone(),
                ArrayInsert::parse(modifier, &field, operand)?,
            )),
            "$pop" => match operand.as_f64() {
                Some(direction) if !direction.is_nan() => Ok(Modifier::Pop(field, direction)),
                _ => {
                    log::error!("{} isn't an integer, can't use it with $pop", operand);
                    Err(DocDbError::new(
                        &format!("{} isn't an integer, can't use it with $pop", operand),
                        ErrorKind::ValidationError,
                    ))
                }
            },
            "$pull" => Ok(Modifier::Pull(field.clone(), ElemMatch::parse(&field, operand)?)),
            "$min" => Ok(Modifier::Min(field, operand.clone())),
            "$max" => Ok(Modifier::Max(field, operand.clone())),
            _ => {
                log::error!("Unknown modifier {}", modifier);
                Err(DocDbError::new(
                    &format!("Unknown modifier {}", modifier),
                    ErrorKind::UnknownOperator,
                ))
            }
        }
    }

    /// Applies the modification to `doc` in place.
    pub(crate) fn apply(&self, doc: &mut Document) -> DocDbResult<()> {
        match self {
            Modifier::Set(field, value) => doc.put(field, value.clone()),
            Modifier::Unset(field) => {
                doc.remove(field);
                Ok(())
            }
            Modifier::Inc(field, delta) => match doc.get(field) {
                None => doc.put(field, delta.clone()),
                Some(current) if current.is_number() => doc.put(field, add(&current, delta)),
                Some(_) => {
                    log::error!("Don't use the $inc modifier on non-number field {}", field);
                    Err(DocDbError::new(
                        &format!("Don't use the $inc modifier on non-number field {}", field),
                        ErrorKind::ValidationError,
                    ))
                }
            },
            Modifier::Push(field, insert) => {
                let mut items = array_at(doc, field, "$push", true)?;
                items.extend(insert.values.iter().cloned());
                if let Some(slice) = insert.slice {
                    items = apply_slice(items, slice);
                }
                doc.put(field, Value::Array(items))
            }
            Modifier::AddToSet(field, insert) => {
                let mut items = array_at(doc, field, "$addToSet", true)?;
                for value in &insert.values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                doc.put(field, Value::Array(items))
            }
            Modifier::Pop(field, direction) => {
                let mut items = array_at(doc, field, "$pop", false)?;
                if *direction == 0.0 || items.is_empty() {
                    return Ok(());
                }
                if *direction > 0.0 {
                    items.pop();
                } else {
                    items.remove(0);
                }
                doc.put(field, Value::Array(items))
            }
            Modifier::Pull(field, condition) => {
                let items = array_at(doc, field, "$pull", false)?;
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if !condition.matches(&item)? {
                        kept.push(item);
                    }
                }
                doc.put(field, Value::Array(kept))
            }
            Modifier::Min(field, value) => match doc.get(field) {
                Some(current) if value >= &current => Ok(()),
                _ => doc.put(field, value.clone()),
            },
            Modifier::Max(field, value) => match doc.get(field) {
                Some(current) if value <= &current => Ok(()),
                _ => doc.put(field, value.clone()),
            },
        }
    }
}

impl ArrayInsert {
    fn parse(modifier: &str, field: &str, operand: &Value) -> DocDbResult<ArrayInsert> {
        let Value::Document(spec) = operand else {
            return Ok(ArrayInsert::single(operand.clone()));
        };
        if !spec.iter().any(|(key, _)| key.starts_with(OPERATOR_PREFIX)) {
            return Ok(ArrayInsert::single(operand.clone()));
        }

        let values = match spec.get_field("$each") {
            Some(Value::Array(values)) => values.clone(),
            _ => {
                log::error!("{} on {} requires $each with an array", modifier, field);
                return Err(DocDbError::new(
                    &format!("{} on {} requires $each with an array", modifier, field),
                    ErrorKind::ValidationError,
                ));
            }
        };

        let mut slice = None;
        for (key, value) in spec.iter() {
            match key.as_str() {
                "$each" => {}
                "$slice" if modifier == "$push" => match value {
                    Value::I64(n) => slice = Some(*n),
                    Value::F64(n) if n.fract() == 0.0 => slice = Some(*n as i64),
                    _ => {
                        log::error!("$slice on {} must be an integer", field);
                        return Err(DocDbError::new(
                            &format!("$slice on {} must be an integer", field),
                            ErrorKind::ValidationError,
                        ));
                    }
                },
                _ => {
                    log::error!("Unsupported key {} in {} on {}", key, modifier, field);
                    return Err(DocDbError::new(
                        &format!("Unsupported key {} in {} on {}", key, modifier, field),
                        ErrorKind::ValidationError,
                    ));
                }
            }
        }
        Ok(ArrayInsert { values, slice })
    }

    fn single(value: Value) -> ArrayInsert {
        ArrayInsert {
            values: vec![value],
            slice: None,
        }
    }
}

/// Reads the array at `field`. A missing field is an empty array when
/// `create` is set and an error otherwise.
fn array_at(doc: &Document, field: &str, modifier: &str, create: bool) -> DocDbResult<Vec<Value>> {
    match doc.get(field) {
        Some(Value::Array(items)) => Ok(items),
        None if create => Ok(Vec::new()),
        _ => {
            log::error!("Can't use {} on non-array field {}", modifier, field);
            Err(DocDbError::new(
                &format!("Can't use {} on non-array field {}", modifier, field),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn add(current: &Value, delta: &Value) -> Value {
    if let (Value::I64(a), Value::I64(b)) = (current, delta) {
        if let Some(sum) = a.checked_add(*b) {
            return Value::I64(sum);
        }
    }
    Value::F64(current.as_f64().unwrap_or_default() + delta.as_f64().unwrap_or_default())
}

/// Keeps the first `n` elements for a positive `n`, the last `|n|` for a
/// negative one.
fn apply_slice(mut items: Vec<Value>, slice: i64) -> Vec<Value> {
    let keep = slice.unsigned_abs() as usize;
    if slice >= 0 {
        items.truncate(keep);
        items
    } else {
        let start = items.len().saturating_sub(keep);
        items.split_off(start)
    }
}

impl Display for Modifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Modifier::Set(field, value) => write!(f, "$set {} = {}", field, value),
            Modifier::Unset(field) => write!(f, "$unset {}", field),
            Modifier::Inc(field, value) => write!(f, "$inc {} += {}", field, value),
            Modifier::Push(field, insert) => write!(f, "$push {} {:?}", field, insert.values),
            Modifier::AddToSet(field, insert) => write!(f, "$addToSet {} {:?}", field, insert.values),
            Modifier::Pop(field, direction) => write!(f, "$pop {} {}", field, direction),
            Modifier::Pull(field, _) => write!(f, "$pull {}", field),
            Modifier::Min(field, value) => write!(f, "$min {} {}", field, value),
            Modifier::Max(field, value) => write!(f, "$max {} {}", field, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn console() -> Document {
        doc! {
            _id: "id2",
            name: "Play Station Vita",
            price: 24980,
            connectivity: ["Wi-Fi", "Bluetooth", "3G"],
            developer: { name: "Sony", country: "JP" }
        }
    }

    fn modify(modifier: &str, argument: Value) -> DocDbResult<Document> {
        let mut doc = console();
        for m in Modifier::parse_all(modifier, &argument)? {
            m.apply(&mut doc)?;
        }
        Ok(doc)
    }

    #[test]
    fn test_set_nested_path() {
        let doc = modify("$set", val!(doc! { "developer.japaneseName": "ソニー" })).unwrap();
        assert_eq!(doc.get("developer.japaneseName"), Some(val!("ソニー")));
        assert_eq!(doc.get("developer.name"), Some(val!("Sony")));
    }

    #[test]
    fn test_unset() {
        let doc = modify("$unset", val!(doc! { connectivity: true, "developer.country": true })).unwrap();
        assert!(!doc.contains_key("connectivity"));
        assert_eq!(doc.get("developer"), Some(val!(doc! { name: "Sony" })));

        let unchanged = modify("$unset", val!(doc! { peripheral: true })).unwrap();
        assert_eq!(unchanged, console());
    }

    #[test]
    fn test_inc() {
        let doc = modify("$inc", val!(doc! { price: 100, stock: 3 })).unwrap();
        assert_eq!(doc.get("price"), Some(val!(25080)));
        assert_eq!(doc.get("stock"), Some(val!(3)));

        let doc = modify("$inc", val!(doc! { price: 0.5 })).unwrap();
        assert_eq!(doc.get("price"), Some(val!(24980.5)));

        let err = modify("$inc", val!(doc! { name: 1 })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = modify("$inc", val!(doc! { price: "1" })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_inc_overflow_falls_back_to_float() {
        let mut doc = doc! { n: (i64::MAX) };
        for m in Modifier::parse_all("$inc", &val!(doc! { n: 1 })).unwrap() {
            m.apply(&mut doc).unwrap();
        }
        assert!(matches!(doc.get("n"), Some(Value::F64(_))));
    }

    #[test]
    fn test_push() {
        let doc = modify("$push", val!(doc! { connectivity: "USB" })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Wi-Fi", "Bluetooth", "3G", "USB"])));

        let doc = modify("$push", val!(doc! { peripheral: "Camera" })).unwrap();
        assert_eq!(doc.get("peripheral"), Some(val!(vec!["Camera"])));

        let err = modify("$push", val!(doc! { name: "x" })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_push_each_and_slice() {
        let doc = modify(
            "$push",
            val!(doc! { connectivity: { "$each": ["USB", "HDMI"], "$slice": (-2) } }),
        )
        .unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["USB", "HDMI"])));

        let doc = modify("$push", val!(doc! { connectivity: { "$each": [], "$slice": 1 } })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Wi-Fi"])));

        let err = modify("$push", val!(doc! { connectivity: { "$slice": 1 } })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_push_document_value() {
        let doc = modify("$push", val!(doc! { games: { title: "Gravity Rush" } })).unwrap();
        assert_eq!(doc.get("games.0.title"), Some(val!("Gravity Rush")));
    }

    #[test]
    fn test_add_to_set() {
        let doc = modify("$addToSet", val!(doc! { connectivity: "3G" })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Wi-Fi", "Bluetooth", "3G"])));

        let doc = modify("$addToSet", val!(doc! { connectivity: { "$each": ["USB", "3G", "USB"] } })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Wi-Fi", "Bluetooth", "3G", "USB"])));
    }

    #[test]
    fn test_pop() {
        let doc = modify("$pop", val!(doc! { connectivity: 1 })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Wi-Fi", "Bluetooth"])));

        let doc = modify("$pop", val!(doc! { connectivity: (-1) })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Bluetooth", "3G"])));

        let doc = modify("$pop", val!(doc! { connectivity: 0 })).unwrap();
        assert_eq!(doc, console());

        let err = modify("$pop", val!(doc! { peripheral: 1 })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = modify("$pop", val!(doc! { connectivity: "last" })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_pop_empty_array() {
        let mut doc = doc! { list: [] };
        for m in Modifier::parse_all("$pop", &val!(doc! { list: 1 })).unwrap() {
            m.apply(&mut doc).unwrap();
        }
        assert_eq!(doc.get("list"), Some(Value::Array(vec![])));
    }

    #[test]
    fn test_pull() {
        let doc = modify("$pull", val!(doc! { connectivity: "3G" })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Wi-Fi", "Bluetooth"])));

        let doc = modify("$pull", val!(doc! { connectivity: { "$in": ["Wi-Fi", "3G"] } })).unwrap();
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["Bluetooth"])));

        let err = modify("$pull", val!(doc! { name: "x" })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_pull_sub_query() {
        let mut doc = doc! { games: [{ title: "A", year: 2012 }, { title: "B", year: 2015 }] };
        for m in Modifier::parse_all("$pull", &val!(doc! { games: { year: { "$lt": 2014 } } })).unwrap() {
            m.apply(&mut doc).unwrap();
        }
        assert_eq!(doc.get("games.0.title"), Some(val!("B")));
        assert_eq!(doc.get("games").and_then(|g| g.as_array().map(|a| a.len())), Some(1));
    }

    #[test]
    fn test_min_max() {
        let doc = modify("$min", val!(doc! { price: 19980 })).unwrap();
        assert_eq!(doc.get("price"), Some(val!(19980)));
        let doc = modify("$min", val!(doc! { price: 29980 })).unwrap();
        assert_eq!(doc.get("price"), Some(val!(24980)));

        let doc = modify("$max", val!(doc! { price: 29980 })).unwrap();
        assert_eq!(doc.get("price"), Some(val!(29980)));
        let doc = modify("$max", val!(doc! { stock: 1 })).unwrap();
        assert_eq!(doc.get("stock"), Some(val!(1)));
    }

    #[test]
    fn test_unknown_modifier() {
        let err = Modifier::parse_all("$rename", &val!(doc! { a: "b" })).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
    }

    #[test]
    fn test_modifier_argument_must_be_document() {
        let err = Modifier::parse_all("$set", &val!(5)).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
