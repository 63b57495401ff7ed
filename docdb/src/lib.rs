//! # docdb - Embedded Document Store
//!
//! docdb is a small, embedded, schema-less document store. Documents are
//! queried with MongoDB-style query documents, changed with replacement or
//! modifier updates, and optionally persisted to an append-only data file.
//!
//! ## Key Features
//!
//! - **Schema-less**: documents are nested maps of [common::Value]s
//! - **Rich Querying**: comparison, membership, array, regex and logical operators
//! - **Updates**: replacements and `$set`, `$inc`, `$push`, `$pop` and friends, with upsert
//! - **Indexing**: unique, sparse and TTL indexes on any field path
//! - **Cursors**: sort, skip, limit and projection
//! - **Persistence**: pluggable; in-memory or append-only JSON lines
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docdb::{doc, Datastore};
//! use docdb::collection::UpdateOptions;
//! use docdb::index::unique_index;
//!
//! let db = Datastore::builder().filename("consoles.db").open()?;
//! db.ensure_index(unique_index("name"))?;
//!
//! db.insert(doc!{ name: "Play Station 4", developer: { name: "Sony" }, price: 39980 })?;
//!
//! let sony = db
//!     .find(doc!{ "developer.name": "Sony" })?
//!     .sort(doc!{ price: 1 })
//!     .limit(10)
//!     .exec()?;
//!
//! db.update(doc!{ name: "Play Station 4" }, &doc!{ "$set": { price: 34980 } }, UpdateOptions::default())?;
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, cursors and write options
//! - [`common`] - The value model and shared constants
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Query matching
//! - [`index`] - Index options
//! - [`persistence`] - The persistence collaborator and its implementations
//! - [`datastore`] - The datastore handle
//! - [`datastore_builder`] - Opening a datastore
//! - [`datastore_config`] - Datastore configuration

pub mod collection;
pub mod common;
pub mod datastore;
pub mod datastore_builder;
pub mod datastore_config;
pub mod errors;
pub mod filter;
pub mod index;
pub mod persistence;
pub(crate) mod update;

pub use datastore::Datastore;
pub use datastore_builder::DatastoreBuilder;
pub use datastore_config::DatastoreConfig;
