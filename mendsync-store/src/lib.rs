//! # mendsync-store
//!
//! Relational adapter for the Mendeley Desktop SQLite catalog.
//!
//! [`MendeleyDb`] implements [`mendsync_core::AssociationStore`]: it lists the
//! reference-to-file links the catalog holds and applies idempotent add/remove
//! mutations. Everything about the host schema lives in [`schema`].

pub mod error;
pub mod mendeley;
pub mod schema;

pub use error::DbError;
pub use mendeley::{AccessMode, MendeleyDb};
