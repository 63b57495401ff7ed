use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::{DocDbError, DocDbResult, ErrorKind};

/// A parsed projection such as `{ name: 1, price: 1, _id: 0 }`.
///
/// A projection either picks the listed fields or omits them; the two
/// cannot be mixed, except for `_id`, which is kept unless set to 0.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projection {
    fields: Vec<String>,
    pick: bool,
    keep_id: bool,
}

impl Projection {
    pub(crate) fn parse(spec: &Document) -> DocDbResult<Projection> {
        let mut fields = Vec::new();
        let mut pick = None;
        let mut keep_id = true;

        for (field, flag) in spec.iter() {
            let include = match flag.as_f64() {
                Some(f) if f == 1.0 => true,
                Some(f) if f == 0.0 => false,
                _ => match flag {
                    Value::Bool(b) => *b,
                    _ => {
                        log::error!("Projection of {} must be 0 or 1, found {}", field, flag);
                        return Err(DocDbError::new(
                            &format!("Projection of {} must be 0 or 1, found {}", field, flag),
                            ErrorKind::ValidationError,
                        ));
                    }
                },
            };

            if field == DOC_ID {
                keep_id = include;
                continue;
            }

            if pick.is_some_and(|p| p != include) {
                log::error!("Can't both keep and omit fields except for _id");
                return Err(DocDbError::new(
                    "Can't both keep and omit fields except for _id",
                    ErrorKind::ValidationError,
                ));
            }
            pick = Some(include);
            fields.push(field.clone());
        }

        Ok(Projection {
            fields,
            pick: pick.unwrap_or(false),
            keep_id,
        })
    }

    pub(crate) fn apply(&self, document: &Document) -> DocDbResult<Document> {
        let mut projected = if self.pick {
            let mut picked = Document::new();
            for field in &self.fields {
                if let Some(value) = document.get(field) {
                    picked.put(field, value)?;
                }
            }
            picked
        } else {
            let mut omitted = document.clone();
            for field in &self.fields {
                omitted.remove(field);
            }
            omitted
        };

        match document.get_field(DOC_ID) {
            Some(id) if self.keep_id => projected.put_field(DOC_ID, id.clone()),
            _ => {
                projected.remove(DOC_ID);
            }
        }
        Ok(projected)
    }
}
