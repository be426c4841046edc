pub mod field_cache;
pub mod snapshot_state;
pub mod holder;

pub use field_cache::{FieldSet, FieldValues};
pub use holder::{ReaderFactory, SnapshotHandle, SnapshotHolder};
pub use snapshot_state::SnapshotState;
