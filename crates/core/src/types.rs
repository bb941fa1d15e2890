/// Primary keys of bulk modifications, their diffs, and catalog resources.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
