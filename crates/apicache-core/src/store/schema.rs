//! Collection declarations and the SQL backing them.

/// Collection holding cached response envelopes.
pub const API_CACHE: &str = "apiCache";

/// Secondary index on `apiCache` used to enumerate entries.
pub const API_CACHE_TIMESTAMP_INDEX: &str = "timestamp";

/// Declared shape of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Record field holding the primary key.
    pub key_path: &'static str,
    /// Record fields with a secondary index. Index names equal field names.
    pub indexes: &'static [&'static str],
}

impl CollectionSchema {
    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.contains(&index)
    }
}

/// Collections every store created by this crate declares.
pub const DEFAULT_COLLECTIONS: &[CollectionSchema] = &[CollectionSchema {
    name: API_CACHE,
    key_path: "id",
    indexes: &[API_CACHE_TIMESTAMP_INDEX],
}];

pub(crate) const RECORDS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

/// Expression index for one declared secondary index.
pub(crate) fn index_ddl(collection: &str, index: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS idx_{c}_{i} ON records(collection, json_extract(body, '$.{i}'))",
        c = sanitize(collection),
        i = sanitize(index),
    )
}

/// JSON path for an index field, safe to splice into SQL.
pub(crate) fn index_path(index: &str) -> String {
    format!("$.{}", sanitize(index))
}

fn sanitize(ident: &str) -> String {
    ident
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
