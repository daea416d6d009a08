//! idmesh-storage: keyed record store for users and groups.
//!
//! The services above this crate see only the [`RecordStore`] contract: keyed
//! lookups, one unique secondary key per collection, filtered listing, and
//! serialized writes. [`MemoryRecordStore`] is the in-process implementation.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryRecordStore;
pub use traits::{
    parse_filter, AttrFilter, GroupMember, RecordStore, StoredEmail, StoredGroup, StoredUser,
};
