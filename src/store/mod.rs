//! External stores the pipeline writes to.
//!
//! - `blob`: object storage addressed by bucket + key.
//! - `record`: keyed job-status records with upsert semantics.
//!
//! Both are traits so the pipeline can be driven against fakes; the local
//! implementations are a filesystem tree and SQLite.

pub mod blob;
pub mod record;

pub use blob::{BlobStore, FsBlobStore, ObjectMeta};
pub use record::{RecordStore, SqliteRecordStore};
