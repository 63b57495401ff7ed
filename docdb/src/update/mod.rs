//! Update documents.
//!
//! An update document is either a full replacement,
//!
//! ```rust,ignore
//! db.update(doc!{ _id: "id1" }, &doc!{ name: "Play Station 4 Pro", price: 44980 }, UpdateOptions::default())?;
//! ```
//!
//! or a set of modifiers applied to every matched document:
//!
//! ```rust,ignore
//! db.update(doc!{ "developer.name": "Nintendo" }, &doc!{ "$inc": { price: 100 } }, update_multi())?;
//! ```
//!
//! # Supported Modifiers
//!
//! `$set`, `$unset`, `$inc`, `$push` (with `$each` and `$slice`),
//! `$addToSet` (with `$each`), `$pop`, `$pull`, `$min` and `$max`.
//!
//! Neither form may change `_id`.

mod modifiers;
mod update_plan;

pub(crate) use modifiers::*;
pub(crate) use update_plan::*;
