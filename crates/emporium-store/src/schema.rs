//! Document store database schema.

/// SQL to create the documents and processed-message tables.
///
/// Mirrors `migrations/0001_documents.sql`.
pub const CREATE_DOCUMENT_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    collection  VARCHAR(128) NOT NULL,
    id          UUID NOT NULL,
    body        JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_body
    ON documents USING GIN (body jsonb_path_ops);

CREATE TABLE IF NOT EXISTS processed_messages (
    consumer      VARCHAR(255) NOT NULL,
    message_id    UUID NOT NULL,
    processed_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (consumer, message_id)
);
";

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(sql: &str) -> Vec<&str> {
        sql.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("--"))
            .collect()
    }

    #[test]
    fn test_schema_matches_migration() {
        let migration = include_str!("../../../migrations/0001_documents.sql");

        assert_eq!(normalize(CREATE_DOCUMENT_TABLES), normalize(migration));
    }
}
