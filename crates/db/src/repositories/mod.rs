//! Zero-sized repository structs. Every method takes the pool (or a
//! transaction) explicitly and returns `sqlx::Error`.

pub mod bulk_modification_diff_repo;
pub mod bulk_modification_repo;

pub use bulk_modification_diff_repo::BulkModificationDiffRepo;
pub use bulk_modification_repo::BulkModificationRepo;
