use crate::collection::Document;
use crate::common::{DOC_ID, OPERATOR_PREFIX};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};
use crate::filter::Filter;

use super::Modifier;

/// A compiled update document.
///
/// An update either replaces the whole document (no `$` keys at the top
/// level) or applies a list of modifiers (only `$` keys). Mixing the two is
/// rejected with [ErrorKind::MixedUpdateMode].
#[derive(Clone)]
pub(crate) enum UpdatePlan {
    Replacement(Document),
    Modifiers(Vec<Modifier>),
}

impl UpdatePlan {
    pub(crate) fn parse(update: &Document) -> DocDbResult<UpdatePlan> {
        let modifier_keys = update
            .iter()
            .filter(|(key, _)| key.starts_with(OPERATOR_PREFIX))
            .count();

        if modifier_keys == 0 {
            update.check_keys()?;
            return Ok(UpdatePlan::Replacement(update.clone()));
        }

        if modifier_keys != update.size() {
            log::error!("You cannot mix modifiers and normal fields in an update");
            return Err(DocDbError::new(
                "You cannot mix modifiers and normal fields in an update",
                ErrorKind::MixedUpdateMode,
            ));
        }

        let mut modifiers = Vec::new();
        for (key, argument) in update.iter() {
            modifiers.extend(Modifier::parse_all(key, argument)?);
        }
        Ok(UpdatePlan::Modifiers(modifiers))
    }

    /// Computes the updated version of `current` without touching it.
    ///
    /// The `_id` of the result always equals the `_id` of `current`.
    pub(crate) fn apply(&self, current: &Document) -> DocDbResult<Document> {
        let updated = match self {
            UpdatePlan::Replacement(replacement) => {
                let mut updated = replacement.clone();
                match (replacement.get_field(DOC_ID), current.get_field(DOC_ID)) {
                    (Some(new_id), Some(old_id)) if new_id != old_id => return Err(id_changed()),
                    (_, Some(old_id)) => updated.put_field(DOC_ID, old_id.clone()),
                    _ => {}
                }
                updated
            }
            UpdatePlan::Modifiers(modifiers) => {
                let mut updated = current.clone();
                for modifier in modifiers {
                    modifier.apply(&mut updated)?;
                }
                if updated.get_field(DOC_ID) != current.get_field(DOC_ID) {
                    return Err(id_changed());
                }
                updated
            }
        };

        updated.check_keys()?;
        Ok(updated)
    }

    /// Builds the document to insert when an upsert matches nothing.
    ///
    /// The literal equality constraints of the query seed the document. A
    /// replacement is laid over them field by field; modifiers are applied
    /// to them.
    pub(crate) fn upsert_document(&self, filter: &Filter) -> DocDbResult<Document> {
        let mut base = Document::new();
        for (field, value) in filter.equality_constraints() {
            base.put(&field, value)?;
        }

        let document = match self {
            UpdatePlan::Replacement(replacement) => {
                for (key, value) in replacement.iter() {
                    base.put_field(key.clone(), value.clone());
                }
                base
            }
            UpdatePlan::Modifiers(modifiers) => {
                for modifier in modifiers {
                    modifier.apply(&mut base)?;
                }
                base
            }
        };

        document.check_keys()?;
        Ok(document)
    }

    pub(crate) fn is_replacement(&self) -> bool {
        matches!(self, UpdatePlan::Replacement(_))
    }
}

fn id_changed() -> DocDbError {
    log::error!("You cannot change a document's _id");
    DocDbError::new("You cannot change a document's _id", ErrorKind::ValidationError)
}

impl std::fmt::Display for UpdatePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdatePlan::Replacement(doc) => write!(f, "replace with {}", doc),
            UpdatePlan::Modifiers(modifiers) => {
                let rendered: Vec<String> = modifiers.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", rendered.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn console() -> Document {
        doc! {
            _id: "id1",
            name: "Play Station 4",
            developer: { name: "Sony", country: "JP" },
            price: 39980,
            portable: false
        }
    }

    #[test]
    fn test_replacement_keeps_id() {
        let plan = UpdatePlan::parse(&doc! { name: "Play Station 4 Pro", price: 44980 }).unwrap();
        assert!(plan.is_replacement());

        let updated = plan.apply(&console()).unwrap();
        assert_eq!(updated.id(), Some("id1"));
        assert_eq!(updated.get("name"), Some(val!("Play Station 4 Pro")));
        assert!(!updated.contains_key("developer"));
    }

    #[test]
    fn test_replacement_with_same_id() {
        let plan = UpdatePlan::parse(&doc! { _id: "id1", name: "Pro" }).unwrap();
        assert_eq!(plan.apply(&console()).unwrap().id(), Some("id1"));
    }

    #[test]
    fn test_replacement_cannot_change_id() {
        let plan = UpdatePlan::parse(&doc! { _id: "id9", name: "Pro" }).unwrap();
        let err = plan.apply(&console()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_modifiers_cannot_change_id() {
        let plan = UpdatePlan::parse(&doc! { "$set": { _id: "id9" } }).unwrap();
        assert!(plan.apply(&console()).is_err());

        let plan = UpdatePlan::parse(&doc! { "$unset": { _id: true } }).unwrap();
        assert!(plan.apply(&console()).is_err());
    }

    #[test]
    fn test_modifiers_applied_in_order() {
        let plan = UpdatePlan::parse(&doc! {
            "$set": { "developer.japaneseName": "ソニー" },
            "$inc": { price: 20 }
        })
        .unwrap();
        let updated = plan.apply(&console()).unwrap();
        assert_eq!(updated.get("price"), Some(val!(40000)));
        assert_eq!(updated.get("developer.japaneseName"), Some(val!("ソニー")));
        assert_eq!(updated.get("name"), Some(val!("Play Station 4")));
    }

    #[test]
    fn test_mixed_update_rejected() {
        let err = UpdatePlan::parse(&doc! { "$set": { a: 1 }, name: "x" }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::MixedUpdateMode);
    }

    #[test]
    fn test_unknown_modifier_rejected() {
        let err = UpdatePlan::parse(&doc! { "$rename": { a: "b" } }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::UnknownOperator);
    }

    #[test]
    fn test_replacement_with_bad_keys_rejected() {
        let err = UpdatePlan::parse(&doc! { "a.b": 1 }).err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_set_cannot_introduce_operator_keys() {
        let plan = UpdatePlan::parse(&doc! { "$set": { developer: { "$bad": 1 } } }).unwrap();
        let err = plan.apply(&console()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_upsert_document_from_replacement() {
        let filter = Filter::parse(&doc! { name: "Play Station 3", price: { "$gt": 1 } }).unwrap();
        let plan = UpdatePlan::parse(&doc! { _id: "id6", name: "Play Station 3", media: "Blu-ray" }).unwrap();
        let doc = plan.upsert_document(&filter).unwrap();
        assert_eq!(doc, doc! { _id: "id6", name: "Play Station 3", media: "Blu-ray" });
    }

    #[test]
    fn test_upsert_document_from_modifiers() {
        let filter = Filter::parse(&doc! { "developer.name": "Sega", portable: false }).unwrap();
        let plan = UpdatePlan::parse(&doc! { "$set": { name: "Dreamcast" }, "$inc": { price: 100 } }).unwrap();
        let doc = plan.upsert_document(&filter).unwrap();
        assert_eq!(doc.get("developer.name"), Some(val!("Sega")));
        assert_eq!(doc.get("portable"), Some(val!(false)));
        assert_eq!(doc.get("name"), Some(val!("Dreamcast")));
        assert_eq!(doc.get("price"), Some(val!(100)));
    }
}
