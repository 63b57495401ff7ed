use im::OrdMap;
use smallvec::SmallVec;

use crate::common::{write_json_string, Value, DOC_ID, FIELD_SEPARATOR, OPERATOR_PREFIX};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use std::fmt::{Debug, Display};

type FieldVec = SmallVec<[String; 8]>;

/// A schema-less record: an ordered map from field name to [Value].
///
/// Fields of nested documents are addressable by dotted paths, so
/// `doc.get("developer.name")` descends into the `developer` sub-document and
/// `doc.get("connectivity.0")` reads the first element of an array.
///
/// The `_id` field is reserved. The store assigns a 16 character
/// alphanumeric identifier when a document without one is inserted, and the
/// identifier never changes afterwards.
///
/// ## Persistent map
///
/// The fields live in an `im::OrdMap`, so cloning a document is O(1) and a
/// mutation only copies the touched path. The store relies on this to hand
/// out snapshots and to compute updated documents without disturbing the
/// committed ones.
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of top level fields.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with the dotted `path`, creating intermediate
    /// documents when they are missing.
    ///
    /// A numeric path segment addresses an existing array element. Setting a
    /// path through a scalar value is rejected.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = doc!{ developer: { name: "Sony" } };
    /// doc.put("developer.japaneseName", "ソニー")?;
    /// assert_eq!(doc.get("developer.name"), Some(val!("Sony")));
    /// ```
    pub fn put<T: Into<Value>>(&mut self, path: &str, value: T) -> DocDbResult<()> {
        if path.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocDbError::new(
                "Document does not support empty key",
                ErrorKind::ValidationError,
            ));
        }

        let value = value.into();
        if path.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data.insert(path.to_string(), value);
            Ok(())
        }
    }

    /// Stores `value` under the literal key, without path splitting.
    ///
    /// Query and update documents use this to keep keys such as
    /// `"developer.name"` or `"$set"` as they are written.
    pub fn put_field<K: Into<String>, T: Into<Value>>(&mut self, key: K, value: T) {
        self.data.insert(key.into(), value.into());
    }

    /// Returns the value at the dotted `path`, or `None` when the path does
    /// not lead to a defined value.
    ///
    /// A literal top level key wins over path splitting.
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.data.get(path) {
            return Some(value.clone());
        }

        if !path.contains(FIELD_SEPARATOR) {
            return None;
        }

        let mut current: Option<&Value> = None;
        for (i, segment) in path.split(FIELD_SEPARATOR).enumerate() {
            current = if i == 0 {
                self.data.get(segment)
            } else {
                match current? {
                    Value::Document(doc) => doc.data.get(segment),
                    Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?),
                    _ => None,
                }
            };
        }
        current.cloned()
    }

    /// Returns a reference to a top level field.
    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Checks if a top level or embedded field exists.
    pub fn contains_field(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Removes the value at the dotted `path` and returns it.
    ///
    /// Removing a missing path is a no-op.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        if path.contains(FIELD_SEPARATOR) && !self.data.contains_key(path) {
            let splits: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
            self.deep_remove(&splits)
        } else {
            self.data.remove(path)
        }
    }

    /// Merges `other` into this document, recursing into nested documents.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (self.data.get(key).cloned(), value) {
                (Some(Value::Document(mut nested)), Value::Document(obj)) => {
                    nested.merge(obj);
                    self.data.insert(key.clone(), Value::Document(nested));
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Returns the string `_id` of this document, if any.
    pub fn id(&self) -> Option<&str> {
        match self.data.get(DOC_ID) {
            Some(Value::String(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn has_id(&self) -> bool {
        self.data.contains_key(DOC_ID)
    }

    /// Returns the top level field names in key order.
    pub fn fields(&self) -> FieldVec {
        self.data.keys().cloned().collect()
    }

    /// Iterates over top level fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Resolves a dotted path the way the query matcher sees it.
    ///
    /// Unlike [Document::get], an array met in the middle of the path is
    /// mapped: the rest of the path is resolved against every element and the
    /// defined results are collected into an array. A numeric segment right
    /// after an array selects a single element instead.
    pub(crate) fn resolve(&self, path: &str) -> Option<Value> {
        let splits: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
        self.resolve_splits(&splits)
    }

    fn resolve_splits(&self, splits: &[&str]) -> Option<Value> {
        let first = self.data.get(splits[0])?;
        if splits.len() == 1 {
            return Some(first.clone());
        }

        match first {
            Value::Array(arr) => {
                if let Ok(index) = splits[1].parse::<usize>() {
                    resolve_value(arr.get(index)?, &splits[2..])
                } else {
                    let items = arr
                        .iter()
                        .filter_map(|item| resolve_value(item, &splits[1..]))
                        .collect();
                    Some(Value::Array(items))
                }
            }
            other => resolve_value(other, &splits[1..]),
        }
    }

    /// Rejects field names that cannot be stored: names starting with `$`
    /// and names containing the path separator.
    pub(crate) fn check_keys(&self) -> DocDbResult<()> {
        for (key, value) in self.data.iter() {
            if key.starts_with(OPERATOR_PREFIX) {
                log::error!("Field name {} cannot begin with the $ character", key);
                return Err(DocDbError::new(
                    &format!("Field name {} cannot begin with the $ character", key),
                    ErrorKind::ValidationError,
                ));
            }

            if key.contains(FIELD_SEPARATOR) {
                log::error!("Field name {} cannot contain a '.'", key);
                return Err(DocDbError::new(
                    &format!("Field name {} cannot contain a '.'", key),
                    ErrorKind::ValidationError,
                ));
            }
            check_value_keys(value)?;
        }
        Ok(())
    }

    pub(crate) fn truncate_timestamps(&mut self) {
        self.data = self
            .data
            .iter()
            .map(|(key, value)| {
                let mut value = value.clone();
                value.truncate_timestamps();
                (key.clone(), value)
            })
            .collect();
    }

    pub(crate) fn write_json(&self, out: &mut String) {
        out.push('{');
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_json_string(out, key);
            out.push_str(": ");
            value.write_json(out);
        }
        out.push('}');
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> DocDbResult<()> {
        let key = splits[0];
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocDbError::new(
                "Document does not support empty key",
                ErrorKind::ValidationError,
            ));
        }

        if splits.len() == 1 {
            self.data.insert(key.to_string(), value);
            return Ok(());
        }

        let remaining = &splits[1..];
        match self.data.get(key).cloned() {
            None => {
                let mut nested = Document::new();
                nested.deep_put(remaining, value)?;
                self.data.insert(key.to_string(), Value::Document(nested));
                Ok(())
            }
            Some(Value::Document(mut nested)) => {
                nested.deep_put(remaining, value)?;
                self.data.insert(key.to_string(), Value::Document(nested));
                Ok(())
            }
            Some(Value::Array(mut arr)) => {
                let index = array_index(&arr, remaining[0])?;
                if remaining.len() == 1 {
                    arr[index] = value;
                } else if let Value::Document(nested) = &mut arr[index] {
                    nested.deep_put(&remaining[1..], value)?;
                } else {
                    log::error!("Cannot set field {} on a non-document array element", remaining[1]);
                    return Err(DocDbError::new(
                        &format!("Cannot set field {} on a non-document array element", remaining[1]),
                        ErrorKind::ValidationError,
                    ));
                }
                self.data.insert(key.to_string(), Value::Array(arr));
                Ok(())
            }
            Some(other) => {
                log::error!("Cannot set field {} inside {} value of {}", remaining[0], other.type_name(), key);
                Err(DocDbError::new(
                    &format!(
                        "Cannot set field {} inside {} value of {}",
                        remaining[0],
                        other.type_name(),
                        key
                    ),
                    ErrorKind::ValidationError,
                ))
            }
        }
    }

    fn deep_remove(&mut self, splits: &[&str]) -> Option<Value> {
        let key = splits[0];
        if splits.len() == 1 {
            return self.data.remove(key);
        }

        let remaining = &splits[1..];
        match self.data.get(key).cloned() {
            Some(Value::Document(mut nested)) => {
                let removed = nested.deep_remove(remaining);
                if removed.is_some() {
                    self.data.insert(key.to_string(), Value::Document(nested));
                }
                removed
            }
            Some(Value::Array(mut arr)) => {
                let index = remaining[0].parse::<usize>().ok().filter(|i| *i < arr.len())?;
                let removed = if remaining.len() == 1 {
                    Some(arr.remove(index))
                } else if let Value::Document(nested) = &mut arr[index] {
                    nested.deep_remove(&remaining[1..])
                } else {
                    None
                };
                if removed.is_some() {
                    self.data.insert(key.to_string(), Value::Array(arr));
                }
                removed
            }
            _ => None,
        }
    }
}

fn resolve_value(value: &Value, splits: &[&str]) -> Option<Value> {
    if splits.is_empty() {
        return Some(value.clone());
    }

    match value {
        Value::Document(doc) => doc.resolve_splits(splits),
        _ => None,
    }
}

fn check_value_keys(value: &Value) -> DocDbResult<()> {
    match value {
        Value::Document(doc) => doc.check_keys(),
        Value::Array(items) => {
            for item in items {
                check_value_keys(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn array_index(arr: &[Value], segment: &str) -> DocDbResult<usize> {
    match segment.parse::<usize>() {
        Ok(index) if index < arr.len() => Ok(index),
        Ok(index) => {
            log::error!("Array index {} out of bound", index);
            Err(DocDbError::new(
                &format!("Array index {} out of bound", index),
                ErrorKind::ValidationError,
            ))
        }
        Err(_) => {
            log::error!("Invalid array index {} to access array inside a document", segment);
            Err(DocDbError::new(
                &format!("Invalid array index {} to access array inside a document", segment),
                ErrorKind::ValidationError,
            ))
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.write_json(&mut out);
        write!(f, "{}", out)
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.write_json(&mut out);
        write!(f, "{}", out)
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// Keys are stored literally, so operator keys and dotted paths survive as
/// written. Negative numbers and other multi-token expressions go in
/// parentheses.
///
/// ```rust
/// use docdb::doc;
///
/// let query = doc!{
///     "developer.name": "Sony",
///     releaseDate: { "$gte": 2013 },
///     connectivity: ["HDMI", "USB"]
/// };
/// let sort = doc!{ price: (-1) };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put_field($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro to convert values for the doc! macro.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn set_up() -> Document {
        doc! {
            name: "Play Station 4",
            developer: { name: "Sony", country: "JP" },
            connectivity: ["HDMI", "USB"],
            games: [
                { title: "Bloodborne", year: 2015 },
                { title: "Horizon", year: 2017 },
                { year: 2020 }
            ],
            price: 39980
        }
    }

    #[test]
    fn test_new() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.size(), 0);
    }

    #[test]
    fn test_macro_keeps_literal_keys() {
        let doc = doc! { "developer.name": "Sony", "$set": { a: 1 } };
        assert!(doc.contains_key("developer.name"));
        assert!(doc.contains_key("$set"));
        assert_eq!(doc.size(), 2);
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let doc = set_up();
        assert_eq!(doc.get("developer.name"), Some(val!("Sony")));
        assert_eq!(doc.get("connectivity.1"), Some(val!("USB")));
        assert_eq!(doc.get("games.0.title"), Some(val!("Bloodborne")));
        assert_eq!(doc.get("connectivity.5"), None);
        assert_eq!(doc.get("developer.missing"), None);
        assert_eq!(doc.get("price.amount"), None);
    }

    #[test]
    fn test_put_creates_nested_documents() {
        let mut doc = set_up();
        doc.put("developer.japaneseName", "ソニー").unwrap();
        doc.put("specs.cpu.cores", 8).unwrap();
        assert_eq!(doc.get("developer.japaneseName"), Some(val!("ソニー")));
        assert_eq!(doc.get("developer.country"), Some(val!("JP")));
        assert_eq!(doc.get("specs.cpu.cores"), Some(val!(8)));
    }

    #[test]
    fn test_put_into_array_element() {
        let mut doc = set_up();
        doc.put("connectivity.0", "HDMI 2.0b").unwrap();
        doc.put("games.1.year", 2018).unwrap();
        assert_eq!(doc.get("connectivity.0"), Some(val!("HDMI 2.0b")));
        assert_eq!(doc.get("games.1.year"), Some(val!(2018)));
    }

    #[test]
    fn test_put_through_scalar_fails() {
        let mut doc = set_up();
        let err = doc.put("price.amount", 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(doc.put("connectivity.9", "x").is_err());
        assert!(doc.put("", 1).is_err());
    }

    #[test]
    fn test_remove() {
        let mut doc = set_up();
        assert_eq!(doc.remove("developer.country"), Some(val!("JP")));
        assert_eq!(doc.get("developer"), Some(Value::Document(doc! { name: "Sony" })));
        assert_eq!(doc.remove("connectivity.0"), Some(val!("HDMI")));
        assert_eq!(doc.get("connectivity"), Some(val!(vec!["USB"])));
        assert_eq!(doc.remove("missing.path"), None);
        assert_eq!(doc.remove("price"), Some(val!(39980)));
        assert!(!doc.contains_key("price"));
    }

    #[test]
    fn test_resolve_maps_over_arrays() {
        let doc = set_up();
        assert_eq!(doc.resolve("games.title"), Some(val!(vec!["Bloodborne", "Horizon"])));
        assert_eq!(doc.resolve("games.year"), Some(val!(vec![2015, 2017, 2020])));
        assert_eq!(doc.resolve("games.1.title"), Some(val!("Horizon")));
        assert_eq!(doc.resolve("developer.name"), Some(val!("Sony")));
        assert_eq!(doc.resolve("developer.city"), None);
        assert_eq!(doc.resolve("missing"), None);
    }

    #[test]
    fn test_merge() {
        let mut doc = set_up();
        doc.merge(&doc! { developer: { country: "US" }, portable: false });
        assert_eq!(doc.get("developer.name"), Some(val!("Sony")));
        assert_eq!(doc.get("developer.country"), Some(val!("US")));
        assert_eq!(doc.get("portable"), Some(val!(false)));
    }

    #[test]
    fn test_id() {
        let mut doc = set_up();
        assert_eq!(doc.id(), None);
        assert!(!doc.has_id());
        doc.put_field("_id", "id1");
        assert_eq!(doc.id(), Some("id1"));
    }

    #[test]
    fn test_check_keys() {
        assert!(set_up().check_keys().is_ok());
        assert!(doc! { "$bad": 1 }.check_keys().is_err());
        assert!(doc! { nested: { "a.b": 1 } }.check_keys().is_err());
        assert!(doc! { list: [{ "$x": 1 }] }.check_keys().is_err());
    }

    #[test]
    fn test_fields_and_iter() {
        let doc = doc! { b: 1, a: 2 };
        assert_eq!(doc.fields().to_vec(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(doc.iter().count(), 2);
    }

    #[test]
    fn test_display() {
        let doc = doc! { name: "Sony", price: 1 };
        assert_eq!(doc.to_string(), r#"{"name": "Sony", "price": 1}"#);
    }
}
