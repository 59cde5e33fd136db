//! sea-orm entities
pub mod kv_entries;
