//! Query matching.
//!
//! A query is compiled into a [Filter] before any document is visited, so
//! malformed operators fail fast. Filters are built from query documents,
//!
//! ```rust,ignore
//! let filter = Filter::parse(&doc!{
//!     "developer.name": "Sony",
//!     releaseDate: { "$gte": date },
//!     "$or": [{ media: "Blu-ray" }, { portable: true }]
//! })?;
//! ```
//!
//! or with the fluent API, `field("price").gt(30000)`, and composed with
//! `and`, `or` and `not`.
//!
//! # Supported Operators
//!
//! - **Comparison**: `$gt`, `$gte`, `$lt`, `$lte`, `$ne`
//! - **Membership**: `$in`, `$nin`
//! - **Presence**: `$exists`
//! - **Array**: `$size`, `$elemMatch`
//! - **Pattern**: `$regex`
//! - **Logical**: `$and`, `$or`, `$not`
//! - **Predicate**: [Filter::where_fn]

mod filter;
mod fluent;

mod basic_filters;
mod logical_filters;
pub(crate) mod operators;
mod where_filter;

pub(crate) use basic_filters::*;
pub use filter::*;
pub use fluent::*;
pub(crate) use logical_filters::*;
pub(crate) use where_filter::*;
