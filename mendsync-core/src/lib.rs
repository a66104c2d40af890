//! mendsync core library: association data model, path normalization,
//! snapshot codec and store capability traits.
//!
//! - [`types`]: newtypes and [`FileAssociation`]
//! - [`association`]: [`AssociationSet`]
//! - [`root`]: [`DocumentRoot`], the one place paths are normalized
//! - [`snapshot`]: text snapshot codec and [`SnapshotFile`]
//! - [`store`]: [`AssociationStore`] / [`BaselineStore`] traits
//! - [`memory`]: in-memory store implementations

pub mod association;
pub mod error;
pub mod memory;
pub mod root;
pub mod snapshot;
pub mod store;
pub mod types;

pub use association::AssociationSet;
pub use error::{CoreError, SnapshotError, StoreError};
pub use root::{DocumentRoot, Located};
pub use snapshot::{SnapshotFile, WriteResult};
pub use store::{ApplyOutcome, AssociationStore, BaselineStore};
pub use types::{DocPath, FileAssociation, FileHash, FileMeta, ReferenceId};
