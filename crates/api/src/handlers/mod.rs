pub mod bulk_modification;
