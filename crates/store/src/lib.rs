//! Widget collection store.
//!
//! - [`WidgetStore`]: ordered, copy-on-write widget collection with change
//!   notifications.
//! - [`StorageBackend`]: where the serialized collection is kept:
//!   [`JsonFileStorage`] on disk or [`MemoryStorage`] in process.

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{JsonFileStorage, MemoryStorage, StorageBackend};
pub use error::{StorageError, StoreError};
pub use store::{StoreEvent, StoreEventKind, WidgetStore};
