use redb::TableDefinition;

/// Primary mapping: short_id -> file_ref
pub const SHORTS: TableDefinition<&str, &str> = TableDefinition::new("shorts");

/// Unique secondary index: file_ref -> short_id (registration dedup)
pub const SHORT_FILE_REFS: TableDefinition<&str, &str> = TableDefinition::new("short_file_refs");
